//! Validated value objects shared by sessions and users.

use axum::http::Uri;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use super::error::DomainError;

pub const DEFAULT_BOT_NAME: &str = "Newar Recorder";
pub const BOT_NAME_MAX_LEN: usize = 100;
pub const MEETING_ID_MIN_LEN: usize = 3;
pub const MEETING_ID_MAX_LEN: usize = 255;

/// Supported meeting platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleMeet,
    Teams,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleMeet => "google_meet",
            Self::Teams => "teams",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google_meet" | "googlemeet" => Ok(Self::GoogleMeet),
            "teams" => Ok(Self::Teams),
            "" => Err(DomainError::validation("platform", "platform cannot be empty")),
            other => Err(DomainError::validation(
                "platform",
                format!("unsupported platform: {} (supported: google_meet, teams)", other),
            )),
        }
    }
}

/// Absolute http(s) meeting URL with a non-empty host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeetingUrl(String);

impl MeetingUrl {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation(
                "meeting_url",
                "meeting URL cannot be empty",
            ));
        }

        let uri: Uri = trimmed.parse().map_err(|e| {
            DomainError::validation("meeting_url", format!("invalid URL format: {}", e))
        })?;

        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            _ => {
                return Err(DomainError::validation(
                    "meeting_url",
                    "URL must use http or https scheme",
                ))
            }
        }

        if uri.host().map_or(true, str::is_empty) {
            return Err(DomainError::validation(
                "meeting_url",
                "URL must have a valid host",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> Option<String> {
        self.0
            .parse::<Uri>()
            .ok()
            .and_then(|uri| uri.host().map(str::to_string))
    }

    pub fn is_google_meet(&self) -> bool {
        self.0.to_ascii_lowercase().contains("meet.google.com")
    }

    pub fn is_teams(&self) -> bool {
        self.0.to_ascii_lowercase().contains("teams.microsoft.com")
    }
}

impl fmt::Display for MeetingUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MeetingUrl {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MeetingUrl> for String {
    fn from(value: MeetingUrl) -> Self {
        value.0
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email regex is valid")
    })
}

/// Lowercased, trimmed email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("email", "email cannot be empty"));
        }
        if !email_regex().is_match(&normalized) {
            return Err(DomainError::validation(
                "email",
                format!("invalid email format: {}", normalized),
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or("")
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

/// Validate a platform-specific meeting identifier.
pub fn validate_external_meeting_id(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len < MEETING_ID_MIN_LEN || len > MEETING_ID_MAX_LEN {
        return Err(DomainError::validation(
            "external_meeting_id",
            format!(
                "meeting ID must be between {} and {} characters",
                MEETING_ID_MIN_LEN, MEETING_ID_MAX_LEN
            ),
        ));
    }
    Ok(trimmed.to_string())
}

/// Resolve the in-meeting display name, falling back to the default.
pub fn resolve_bot_name(raw: Option<&str>) -> Result<String, DomainError> {
    match raw.map(str::trim).filter(|name| !name.is_empty()) {
        None => Ok(DEFAULT_BOT_NAME.to_string()),
        Some(name) if name.chars().count() > BOT_NAME_MAX_LEN => Err(DomainError::validation(
            "bot_name",
            format!("bot name cannot exceed {} characters", BOT_NAME_MAX_LEN),
        )),
        Some(name) => Ok(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("google_meet".parse::<Platform>().unwrap(), Platform::GoogleMeet);
        assert_eq!(" GoogleMeet ".parse::<Platform>().unwrap(), Platform::GoogleMeet);
        assert_eq!("TEAMS".parse::<Platform>().unwrap(), Platform::Teams);
        assert!("zoom".parse::<Platform>().is_err());
        assert!("".parse::<Platform>().is_err());
        assert_eq!(serde_json::to_string(&Platform::GoogleMeet).unwrap(), "\"google_meet\"");
    }

    #[test]
    fn test_meeting_url_validation() {
        let url = MeetingUrl::parse("  https://meet.google.com/abc-defg-hij ").unwrap();
        assert_eq!(url.as_str(), "https://meet.google.com/abc-defg-hij");
        assert_eq!(url.host().as_deref(), Some("meet.google.com"));
        assert!(url.is_google_meet());
        assert!(!url.is_teams());

        assert!(MeetingUrl::parse("").is_err());
        assert!(MeetingUrl::parse("ftp://meet.google.com/abc").is_err());
        assert!(MeetingUrl::parse("meet.google.com/abc").is_err());
        assert!(MeetingUrl::parse("not a url").is_err());
    }

    #[test]
    fn test_meeting_url_deserialization_validates() {
        let ok: Result<MeetingUrl, _> = serde_json::from_str("\"https://teams.microsoft.com/l/x\"");
        assert!(ok.unwrap().is_teams());
        let bad: Result<MeetingUrl, _> = serde_json::from_str("\"mailto:someone\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_email_normalization() {
        let email = Email::parse("  Alice@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "alice@example.com");
        assert_eq!(email.domain(), "example.com");
        assert!(Email::parse("alice").is_err());
        assert!(Email::parse("alice@example").is_err());
        assert!(Email::parse("   ").is_err());
    }

    #[test]
    fn test_external_meeting_id_bounds() {
        assert_eq!(validate_external_meeting_id(" abc-defg-hij ").unwrap(), "abc-defg-hij");
        assert!(validate_external_meeting_id("ab").is_err());
        assert!(validate_external_meeting_id(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_bot_name_defaults() {
        assert_eq!(resolve_bot_name(None).unwrap(), DEFAULT_BOT_NAME);
        assert_eq!(resolve_bot_name(Some("  ")).unwrap(), DEFAULT_BOT_NAME);
        assert_eq!(resolve_bot_name(Some("Scribe")).unwrap(), "Scribe");
        assert!(resolve_bot_name(Some(&"b".repeat(101))).is_err());
    }
}
