pub mod character;
pub mod validation;

pub use character::*;
pub use validation::*;
