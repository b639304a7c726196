//! Domain types for user replay.

pub mod commands;
pub mod replay;
