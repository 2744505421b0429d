pub mod composition;
pub mod error;
pub mod exchange;
pub mod inventory;
pub mod repository;

pub use error::FfragranceError;
pub use repository::{Library, Repository};
