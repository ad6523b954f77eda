//! # Game Implementations
//!
//! Games implementing the `Game` trait. Rock-Paper-Scissors (single and repeated) is the reference game.

pub mod rps;

// Fixtures
#[cfg(test)]
pub(crate) mod deal;
