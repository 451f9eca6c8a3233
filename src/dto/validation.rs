//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest display name accepted for sessions, players and teams.
pub const MAX_NAME_LEN: usize = 60;

/// Validates that a display name is non-blank once trimmed and not overly long.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Pelada de quinta") // Ok
/// validate_display_name("   ")              // Err - blank
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must not be blank".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_NAME_LEN {
        let mut err = ValidationError::new("name_length");
        err.message = Some(
            format!("Name must be at most {MAX_NAME_LEN} characters (got {length})").into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates every entry of a roster list with [`validate_display_name`].
pub fn validate_roster(names: &[String]) -> Result<(), ValidationError> {
    names.iter().try_for_each(|name| validate_display_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_regular_names() {
        assert!(validate_display_name("Pelada de quinta").is_ok());
        assert!(validate_display_name("  Zé  ").is_ok());
    }

    #[test]
    fn rejects_blank_names() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(" \t ").is_err());
    }

    #[test]
    fn rejects_long_names() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(validate_display_name(&long).is_err());
        assert!(validate_display_name(&"ç".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn roster_fails_on_any_blank_entry() {
        assert!(validate_roster(&["Ana".into(), "Bia".into()]).is_ok());
        assert!(validate_roster(&["Ana".into(), " ".into()]).is_err());
        assert!(validate_roster(&[]).is_ok());
    }
}
