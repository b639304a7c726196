//! Userlog Core: shared event-sourcing abstractions.
//!
//! This crate defines the event and user types, the store and broker traits,
//! and the error taxonomy that every other crate depends on. It contains no
//! infrastructure code.

pub mod broker;
pub mod clock;
pub mod error;
pub mod event;
pub mod handler;
pub mod repository;
pub mod retry;
pub mod user;
