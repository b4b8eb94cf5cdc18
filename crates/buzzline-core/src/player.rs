use serde::{Deserialize, Serialize};

use crate::error::RoomError;

/// Maximum length of a display name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// A participant in a room. Players survive disconnects; only an explicit
/// leave or a host destroy removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub joined_at: u64,
    pub score: u32,
    /// Set when this player wins a buzz; cleared whenever the question resets.
    pub buzzed_at: Option<u64>,
}

impl Player {
    pub fn new(id: String, name: String, joined_at: u64) -> Self {
        Self {
            id,
            name,
            joined_at,
            score: 0,
            buzzed_at: None,
        }
    }
}

/// Trim and validate a display name: 1–32 characters, no control characters.
pub fn validate_player_name(raw: &str) -> Result<String, RoomError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RoomError::Validation("Name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(RoomError::Validation(format!(
            "Name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(RoomError::Validation("Name contains invalid characters".into()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_accepts_valid_names() {
        assert_eq!(validate_player_name("  Alice  ").unwrap(), "Alice");
        assert_eq!(validate_player_name("Bob").unwrap(), "Bob");
    }

    #[test]
    fn rejects_empty_and_whitespace_names() {
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("   ").is_err());
    }

    #[test]
    fn rejects_overlong_names() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(validate_player_name(&long).is_err());
        let exact = "x".repeat(MAX_NAME_LEN);
        assert!(validate_player_name(&exact).is_ok());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_player_name("Al\x07ice").is_err());
    }
}
