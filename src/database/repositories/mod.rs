//! Store trait definitions and their SeaORM-backed implementations

pub mod rating;
pub mod selection;
pub mod traits;

pub use rating::RatingSeaOrmRepository;
pub use selection::SelectionSeaOrmRepository;
pub use traits::{RatingStore, SelectionHistoryStore};
