//! Authentication and role domain module.
//!
//! - `model`: session, auth event and role types
//! - `gate`: read-only identity snapshot and capability checks

mod gate;
mod model;

pub use gate::{IdentityState, RoleGate};
pub use model::{AuthEvent, AuthSession, Role, Session};
