#![allow(clippy::type_complexity)]

pub mod utils;
pub mod error;
pub mod policy;
pub mod history;
pub mod info;
pub mod tree;
pub mod subgame;
pub mod gt_cfr;
pub mod obscuro;
pub mod self_play;
pub mod games;
