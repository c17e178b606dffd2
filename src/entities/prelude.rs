pub use super::daily_selections::Entity as DailySelections;
pub use super::modules::Entity as Modules;
pub use super::selection_modules::Entity as SelectionModules;
pub use super::user_ratings::Entity as UserRatings;
