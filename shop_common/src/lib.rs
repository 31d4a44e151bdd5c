mod money;
mod secret;

pub mod helpers;

pub use money::{Money, MoneyConversionError};
pub use secret::Secret;
