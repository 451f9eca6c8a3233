use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a join code.
pub const SESSION_CODE_LEN: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Short human-shareable code naming a session and its fan-out group.
///
/// Always uppercase ASCII alphanumeric, exactly [`SESSION_CODE_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(String);

/// Reasons a raw string is not a valid session code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionCodeError {
    /// Wrong number of characters after trimming.
    #[error("session code must be {SESSION_CODE_LEN} characters (got {0})")]
    Length(usize),
    /// Contains something other than ASCII letters and digits.
    #[error("session code must be alphanumeric")]
    Charset,
}

impl SessionCode {
    /// Normalize `raw` (trim, uppercase) and validate it.
    pub fn parse(raw: &str) -> Result<Self, SessionCodeError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let length = normalized.chars().count();
        if length != SESSION_CODE_LEN {
            return Err(SessionCodeError::Length(length));
        }
        if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SessionCodeError::Charset);
        }
        Ok(Self(normalized))
    }

    /// Draw a fresh random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..SESSION_CODE_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Borrow the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionCode {
    type Error = SessionCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionCode> for String {
    fn from(value: SessionCode) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let code = SessionCode::parse("  ab12cd ").unwrap();
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(SessionCode::parse(""), Err(SessionCodeError::Length(0)));
        assert_eq!(SessionCode::parse("ABC12"), Err(SessionCodeError::Length(5)));
        assert_eq!(SessionCode::parse("ABC-12"), Err(SessionCodeError::Charset));
        assert_eq!(SessionCode::parse("ÁBC123"), Err(SessionCodeError::Charset));
    }

    #[test]
    fn generated_codes_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = SessionCode::generate(&mut rng);
            assert_eq!(SessionCode::parse(code.as_str()).as_ref(), Ok(&code));
        }
    }
}
