//! Room code parsing and mesh-network derivation
//!
//! Format: a 2-character prefix followed by an 18 or 19 character body of
//! ASCII alphanumerics and `-`, e.g. `U/ABCD-EFGH-JKLM-NPQR`. The first nine
//! body characters name the mesh network; the last nine are its secret.

use std::str::FromStr;

use rand::Rng;

use crate::error::RoomCodeError;

const PREFIX_LEN: usize = 2;
const MIN_BODY_LEN: usize = 18;
const MAX_BODY_LEN: usize = 19;
const HALF_LEN: usize = 9;

/// Prefix used by generated codes
const GENERATED_PREFIX: &str = "U/";

/// Characters used by generated codes (no I or O)
const ALPHABET: &[u8] = b"0123456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// A validated room code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate a room code string
    pub fn parse(s: &str) -> Result<Self, RoomCodeError> {
        let invalid = || RoomCodeError::InvalidRoomCode(s.to_string());

        if !s.is_ascii() {
            return Err(invalid());
        }
        let (prefix, body) = s.split_at_checked(PREFIX_LEN).ok_or_else(invalid)?;

        if !prefix.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(invalid());
        }
        if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&body.len()) {
            return Err(invalid());
        }
        if !body.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }

    /// Generate a fresh code of the form `U/XXXX-XXXX-XXXX-XXXX`
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let groups: Vec<String> = (0..4)
            .map(|_| {
                (0..4)
                    .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
                    .collect()
            })
            .collect();
        Self(format!("{}{}", GENERATED_PREFIX, groups.join("-")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn body(&self) -> &str {
        &self.0[PREFIX_LEN..]
    }

    /// Mesh network name, `scaffolding-mc-<first nine body chars>`
    pub fn network_name(&self) -> String {
        format!("scaffolding-mc-{}", &self.body()[..HALF_LEN])
    }

    /// Mesh network secret, the last nine body characters
    pub fn network_secret(&self) -> String {
        let body = self.body();
        body[body.len() - HALF_LEN..].to_string()
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(s: &str) -> Result<Self, RoomCodeError> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dashed_code() {
        let code = RoomCode::parse("U/ABCD-EFGH-JKLM-NPQR").unwrap();
        assert_eq!(code.network_name(), "scaffolding-mc-ABCD-EFGH");
        assert_eq!(code.network_secret(), "JKLM-NPQR");
    }

    #[test]
    fn test_parse_compact_code() {
        let code = RoomCode::parse("RMxxxxxxxxxyyyyyyyyy").unwrap();
        assert_eq!(code.network_name(), "scaffolding-mc-xxxxxxxxx");
        assert_eq!(code.network_secret(), "yyyyyyyyy");
        assert_eq!(code.to_string(), "RMxxxxxxxxxyyyyyyyyy");
    }

    #[test]
    fn test_parse_invalid() {
        // Too short
        assert!(RoomCode::parse("U/ABCD").is_err());
        assert!(RoomCode::parse("").is_err());

        // Too long
        assert!(RoomCode::parse("U/ABCD-EFGH-JKLM-NPQR-S").is_err());

        // Bad body characters
        assert!(RoomCode::parse("U/ABCD EFGH JKLM NPQR").is_err());
        assert!(RoomCode::parse("U/ABCD/EFGH/JKLM/NPQR").is_err());

        // Whitespace prefix
        assert!(RoomCode::parse(" /ABCD-EFGH-JKLM-NPQR").is_err());

        // Non-ASCII
        assert!(RoomCode::parse("U/ÄBCD-EFGH-JKLM-NPQ").is_err());
    }

    #[test]
    fn test_generated_codes_are_valid() {
        for _ in 0..32 {
            let code = RoomCode::generate();
            assert!(code.as_str().starts_with("U/"));
            assert_eq!(code.as_str().len(), 21);
            assert_eq!(RoomCode::parse(code.as_str()).unwrap(), code);
            assert!(!code.as_str().contains('I') && !code.as_str().contains('O'));
        }
    }
}
