use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::DomainError;
use super::values::Email;

pub const DEFAULT_MAX_CONCURRENT_BOTS: u32 = 5;
pub const MAX_CONCURRENT_BOTS_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account that owns recording sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,

    /// Upper bound on sessions in an active status (1..=50)
    pub max_concurrent_bots: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a validated user. `None` for the bot limit selects the default of 5.
    pub fn new(
        id: UserId,
        email: &str,
        name: &str,
        max_concurrent_bots: Option<u32>,
    ) -> Result<Self, DomainError> {
        let email = Email::parse(email)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name", "name cannot be empty"));
        }

        let max_concurrent_bots = match max_concurrent_bots {
            None => DEFAULT_MAX_CONCURRENT_BOTS,
            Some(limit) => validate_bot_limit(limit)?,
        };

        let now = Utc::now();
        Ok(Self {
            id,
            email,
            name: name.to_string(),
            max_concurrent_bots,
            created_at: now,
            updated_at: now,
        })
    }

    /// Admission rule: strictly fewer active sessions than the limit.
    pub fn can_spawn_bot(&self, current_active: usize) -> bool {
        current_active < self.max_concurrent_bots as usize
    }

    pub fn update_max_concurrent_bots(&mut self, limit: u32) -> Result<(), DomainError> {
        self.max_concurrent_bots = validate_bot_limit(limit)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_bot_limit(limit: u32) -> Result<u32, DomainError> {
    if limit == 0 || limit > MAX_CONCURRENT_BOTS_LIMIT {
        return Err(DomainError::validation(
            "max_concurrent_bots",
            format!("must be between 1 and {}", MAX_CONCURRENT_BOTS_LIMIT),
        ));
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_defaults_bot_limit() {
        let user = User::new(UserId(1), "ops@newar.io", "Ops", None).unwrap();
        assert_eq!(user.max_concurrent_bots, DEFAULT_MAX_CONCURRENT_BOTS);
        assert_eq!(user.email.as_str(), "ops@newar.io");
    }

    #[test]
    fn test_user_rejects_out_of_range_limits() {
        assert!(User::new(UserId(1), "ops@newar.io", "Ops", Some(0)).is_err());
        assert!(User::new(UserId(1), "ops@newar.io", "Ops", Some(51)).is_err());
        assert!(User::new(UserId(1), "ops@newar.io", "Ops", Some(50)).is_ok());
        assert!(User::new(UserId(1), "ops@newar.io", " ", Some(2)).is_err());
        assert!(User::new(UserId(1), "ops", "Ops", Some(2)).is_err());
    }

    #[test]
    fn test_can_spawn_bot_is_strict() {
        let mut user = User::new(UserId(7), "a@b.co", "A", Some(2)).unwrap();
        assert!(user.can_spawn_bot(1));
        assert!(!user.can_spawn_bot(2));

        user.update_max_concurrent_bots(3).unwrap();
        assert!(user.can_spawn_bot(2));
        assert!(user.update_max_concurrent_bots(0).is_err());
    }
}
