pub mod model;
pub mod repository;

pub use model::SelectionState;
pub use repository::SelectionRepository;
