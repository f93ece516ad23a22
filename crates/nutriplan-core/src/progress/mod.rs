//! Progress tracking: weight, food intake, and plan check-offs.

pub mod completion;
pub mod food;
pub mod weight;

pub use completion::{toggle_meal_item, toggle_shopping_item};
pub use food::{DailyIntake, FoodLogInput};
pub use weight::{ProgressStats, compute_progress};
