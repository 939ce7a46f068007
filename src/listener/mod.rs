//! Per-session status listeners
//!
//! A `StatusListener` turns one bot's status reports into repository writes,
//! running the finalizer when the bot reports a clean completion. The
//! `ListenerRegistry` owns the background tasks and their cancellation.

mod listener;
mod registry;

pub use listener::{ListenOutcome, StatusListener};
pub use registry::ListenerRegistry;
