pub mod access;
pub mod model;
pub mod reconciler;

pub use access::accessible_workspaces;
pub use model::Workspace;
pub use reconciler::{ReconcileInput, reconcile};
