use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::DomainError;

/// Lifecycle status of a recording session.
///
/// ```text
/// Requested  -> Joining, Failed
/// Joining    -> Active, Failed
/// Active     -> Recording, Failed
/// Recording  -> Finalizing, Failed
/// Finalizing -> Completed, Failed
/// ```
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Requested,
    Joining,
    Active,
    Recording,
    Finalizing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 7] = [
        Self::Requested,
        Self::Joining,
        Self::Active,
        Self::Recording,
        Self::Finalizing,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Joining => "joining",
            Self::Active => "active",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Statuses that count against a user's concurrent bot limit.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Requested | Self::Joining | Self::Active | Self::Recording
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is an edge of the transition table.
    ///
    /// The failure meta-rule (any non-terminal state may fail) is covered by
    /// the table since every non-terminal state lists `Failed`.
    pub fn can_transition(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;

        matches!(
            (*self, next),
            (Requested, Joining)
                | (Joining, Active)
                | (Active, Recording)
                | (Recording, Finalizing)
                | (Finalizing, Completed)
                | (Requested | Joining | Active | Recording | Finalizing, Failed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| DomainError::validation("status", format!("unknown status: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionStatus::*;

    const EDGES: [(SessionStatus, SessionStatus); 10] = [
        (Requested, Joining),
        (Requested, Failed),
        (Joining, Active),
        (Joining, Failed),
        (Active, Recording),
        (Active, Failed),
        (Recording, Finalizing),
        (Recording, Failed),
        (Finalizing, Completed),
        (Finalizing, Failed),
    ];

    #[test]
    fn test_transition_table_is_exact() {
        for from in SessionStatus::ALL {
            for to in SessionStatus::ALL {
                let expected = EDGES.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    expected,
                    "{} -> {} should be {}",
                    from,
                    to,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for to in SessionStatus::ALL {
            assert!(!Completed.can_transition(to));
            assert!(!Failed.can_transition(to));
        }
    }

    #[test]
    fn test_active_set_matches_quota_rules() {
        let active: Vec<_> = SessionStatus::ALL
            .into_iter()
            .filter(SessionStatus::is_active)
            .collect();
        assert_eq!(active, vec![Requested, Joining, Active, Recording]);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Finalizing).unwrap(), "\"finalizing\"");
        let parsed: SessionStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, Completed);
        assert_eq!(" Recording ".parse::<SessionStatus>().unwrap(), Recording);
        assert!("paused".parse::<SessionStatus>().is_err());
    }
}
