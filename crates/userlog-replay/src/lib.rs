//! Userlog: event-sourced user state.
//!
//! User mutations are published as events, consumed from the broker, recorded
//! in the event log and replayed into the relational user store. The store
//! can be rebuilt at any time from the ordered log.

pub mod application;
pub mod domain;
