pub mod auth_handler;
pub mod meal_handler;

pub use auth_handler::AuthHandler;
pub use meal_handler::MealHandler;
