//! SeaORM entity definitions

pub mod daily_selections;
pub mod modules;
pub mod prelude;
pub mod selection_modules;
pub mod user_ratings;
