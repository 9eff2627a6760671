use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrcidIdError {
    #[error("ORCID iD '{0}' must look like 0000-0000-0000-000X")]
    InvalidFormat(String),

    #[error("ORCID iD '{0}' has an invalid check digit")]
    InvalidChecksum(String),
}

/// A validated ORCID iD in its bare `0000-0000-0000-000X` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrcidId(String);

impl OrcidId {
    const URL_PREFIXES: &'static [&'static str] = &[
        "https://orcid.org/",
        "http://orcid.org/",
        "https://www.orcid.org/",
        "orcid.org/",
    ];

    pub fn parse(input: &str) -> Result<Self, OrcidIdError> {
        let trimmed = input.trim();
        let bare = Self::URL_PREFIXES
            .iter()
            .find_map(|p| trimmed.strip_prefix(p))
            .unwrap_or(trimmed);

        let bytes = bare.as_bytes();
        if bytes.len() != 19 {
            return Err(OrcidIdError::InvalidFormat(input.to_string()));
        }

        let mut digits = String::with_capacity(16);
        for (i, &b) in bytes.iter().enumerate() {
            match i {
                4 | 9 | 14 => {
                    if b != b'-' {
                        return Err(OrcidIdError::InvalidFormat(input.to_string()));
                    }
                }
                18 if b == b'X' || b == b'x' => digits.push('X'),
                _ if b.is_ascii_digit() => digits.push(b as char),
                _ => return Err(OrcidIdError::InvalidFormat(input.to_string())),
            }
        }

        let expected = check_character(&digits[..15]);
        if digits.as_bytes()[15] as char != expected {
            return Err(OrcidIdError::InvalidChecksum(input.to_string()));
        }

        Ok(Self(format!(
            "{}-{}-{}-{}",
            &digits[0..4],
            &digits[4..8],
            &digits[8..12],
            &digits[12..16]
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn uri(&self) -> String {
        format!("https://orcid.org/{}", self.0)
    }
}

/// ISO 7064 MOD 11-2 check character over the first 15 digits.
fn check_character(base_digits: &str) -> char {
    let total = base_digits
        .bytes()
        .map(|b| u32::from(b - b'0'))
        .fold(0u32, |acc, d| (acc + d) * 2);
    let result = (12 - total % 11) % 11;
    if result == 10 {
        'X'
    } else {
        char::from_digit(result, 10).unwrap_or('0')
    }
}

impl fmt::Display for OrcidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrcidId {
    type Err = OrcidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for OrcidId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for OrcidId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OrcidId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OrcidId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_identifiers() {
        // Josiah Carberry, ORCID's documentation example
        assert_eq!(OrcidId::parse("0000-0002-1825-0097").unwrap().as_str(), "0000-0002-1825-0097");
        // Check character X
        assert_eq!(OrcidId::parse("0000-0002-1694-233X").unwrap().as_str(), "0000-0002-1694-233X");
    }

    #[test]
    fn normalizes_urls_and_lowercase_x() {
        let id = OrcidId::parse("https://orcid.org/0000-0002-1694-233x").unwrap();
        assert_eq!(id.as_str(), "0000-0002-1694-233X");
        assert_eq!(id.uri(), "https://orcid.org/0000-0002-1694-233X");
        assert!(OrcidId::parse(" orcid.org/0000-0002-1825-0097 ").is_ok());
    }

    #[test]
    fn rejects_bad_format() {
        for bad in ["", "0000-0002-1825", "0000000218250097", "0000-0002-1825-009A", "000X-0002-1825-0097", "0000_0002_1825_0097"] {
            assert!(
                matches!(OrcidId::parse(bad), Err(OrcidIdError::InvalidFormat(_))),
                "expected format error for {bad:?}"
            );
        }
    }

    #[test]
    fn rejects_bad_checksum() {
        assert_eq!(
            OrcidId::parse("0000-0002-1825-0098"),
            Err(OrcidIdError::InvalidChecksum("0000-0002-1825-0098".to_string()))
        );
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: OrcidId = serde_json::from_str("\"0000-0002-1825-0097\"").unwrap();
        assert_eq!(ok.to_string(), "0000-0002-1825-0097");
        assert!(serde_json::from_str::<OrcidId>("\"nope\"").is_err());
    }
}
