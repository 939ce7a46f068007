//! Recording session domain model
//!
//! This module provides:
//! - `SessionStatus`, the lifecycle state machine
//! - `RecordingSession`, the entity whose status only moves through validated transitions
//! - `User` and the validated value objects (`Platform`, `MeetingUrl`, `Email`)

mod error;
mod session;
mod status;
mod user;
mod values;

pub use error::DomainError;
pub use session::{RecordingSession, SessionDraft, SessionId, SessionRecord};
pub use status::SessionStatus;
pub use user::{User, UserId, DEFAULT_MAX_CONCURRENT_BOTS, MAX_CONCURRENT_BOTS_LIMIT};
pub use values::{Email, MeetingUrl, Platform, DEFAULT_BOT_NAME};
