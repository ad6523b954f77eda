use thiserror::Error;
use crate::utils::Player;

/// Failures surfaced to whoever asked the solver for a move
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("no information set for {player:?} matches an observation sequence of length {depth}")]
    NoConsistentInfoSet { player: Player, depth: usize },

    #[error("{0:?} does not choose moves")]
    NotAPlayer(Player),
}
