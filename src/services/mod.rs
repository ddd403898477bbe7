// Services module - Business logic

pub mod accounts;
pub mod card_lifecycle;
pub mod catalog;
pub mod code_generator;
pub mod entitlements;
pub mod redemption;

#[cfg(test)]
pub(crate) mod testing;
