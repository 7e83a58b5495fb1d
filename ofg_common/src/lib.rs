//! Leaf types shared by the fulfillment engine and server.
mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyParseError, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
