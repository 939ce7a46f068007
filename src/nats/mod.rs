//! Bot status channel
//!
//! Recording bots publish `StatusMessage`s on a subject derived from their
//! session token; the manager subscribes per session.

pub mod channel;
pub mod client;
pub mod memory;
pub mod messages;

pub use channel::{ChannelError, StatusChannel, StatusStream};
pub use client::NatsStatusChannel;
pub use memory::MemoryStatusChannel;
pub use messages::StatusMessage;
