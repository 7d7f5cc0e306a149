//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

use crate::state::game::is_session_code;

/// Validates that a session identifier has the join code shape.
///
/// # Examples
///
/// ```ignore
/// validate_session_code("GA7K2Q9X") // Ok
/// validate_session_code("ga7k2q9x") // Err - lowercase
/// validate_session_code("GA7K2Q9")  // Err - too short
/// ```
pub fn validate_session_code(code: &str) -> Result<(), ValidationError> {
    if is_session_code(code) {
        return Ok(());
    }
    let mut err = ValidationError::new("session_code_format");
    err.message = Some("Game code must be `GA` followed by 6 characters from A-Z and 0-9".into());
    Err(err)
}

/// Validates the team names declared when creating a team session.
pub fn validate_team_names(names: &[String]) -> Result<(), ValidationError> {
    if names.iter().any(|name| name.trim().is_empty()) {
        let mut err = ValidationError::new("team_name_empty");
        err.message = Some("Team names cannot be empty".into());
        return Err(err);
    }

    let mut seen = HashSet::new();
    if !names.iter().all(|name| seen.insert(name.trim())) {
        let mut err = ValidationError::new("team_name_duplicate");
        err.message = Some("Team names must be distinct".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_codes() {
        assert!(validate_session_code("GA7K2Q9X").is_ok());
        assert!(validate_session_code("GA000000").is_ok());
        assert!(validate_session_code("ga7k2q9x").is_err());
        assert!(validate_session_code("GA7K2Q9").is_err());
        assert!(validate_session_code("").is_err());
    }

    #[test]
    fn team_names_must_be_distinct_and_non_empty() {
        let names = |list: &[&str]| list.iter().map(|name| name.to_string()).collect::<Vec<_>>();
        assert!(validate_team_names(&names(&["Red", "Blue"])).is_ok());
        assert!(validate_team_names(&names(&["Red", " "])).is_err());
        assert!(validate_team_names(&names(&["Red", "Red "])).is_err());
    }
}
