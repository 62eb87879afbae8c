use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Format of date-scheme version tokens.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// How version tokens are interpreted.
///
/// - date: ISO `YYYY-MM-DD`, totally ordered, supports waterfall resolution
/// - opaque: arbitrary strings, ordered only by registration, exact match only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionScheme {
    #[default]
    Date,
    Opaque,
}

impl VersionScheme {
    /// Parse a raw token under this scheme.
    pub fn parse(self, token: &str) -> Result<VersionId, VersionParseError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(VersionParseError::Empty);
        }

        match self {
            VersionScheme::Date => NaiveDate::parse_from_str(token, DATE_FORMAT)
                .map(VersionId::Date)
                .map_err(|e| VersionParseError::InvalidDate {
                    token: token.to_string(),
                    message: e.to_string(),
                }),
            VersionScheme::Opaque => Ok(VersionId::Opaque(token.to_string())),
        }
    }

    /// Whether tokens of this scheme can be compared (and therefore waterfalled).
    pub fn is_ordered(self) -> bool {
        matches!(self, VersionScheme::Date)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VersionScheme::Date => "date",
            VersionScheme::Opaque => "opaque",
        }
    }
}

impl fmt::Display for VersionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a version marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionId {
    Date(NaiveDate),
    Opaque(String),
}

impl VersionId {
    pub fn scheme(&self) -> VersionScheme {
        match self {
            VersionId::Date(_) => VersionScheme::Date,
            VersionId::Opaque(_) => VersionScheme::Opaque,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            VersionId::Date(d) => Some(*d),
            VersionId::Opaque(_) => None,
        }
    }
}

/// Only date ids are comparable; opaque ids have no intrinsic order.
impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (VersionId::Date(a), VersionId::Date(b)) => Some(a.cmp(b)),
            (VersionId::Opaque(a), VersionId::Opaque(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionId::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            VersionId::Opaque(s) => f.write_str(s),
        }
    }
}

impl Serialize for VersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("empty version token")]
    Empty,

    #[error("invalid date version `{token}` (expected YYYY-MM-DD): {message}")]
    InvalidDate { token: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_tokens_parse_and_display_canonically() {
        let v = VersionScheme::Date.parse(" 2001-01-01 ").unwrap();
        assert_eq!(v.to_string(), "2001-01-01");
        assert_eq!(v.scheme(), VersionScheme::Date);
    }

    #[test]
    fn opaque_tokens_keep_their_text() {
        let v = VersionScheme::Opaque.parse("beta-2").unwrap();
        assert_eq!(v, VersionId::Opaque("beta-2".to_string()));
        assert!(v.as_date().is_none());
    }

    #[test]
    fn invalid_date_is_rejected() {
        let err = VersionScheme::Date.parse("yesterday").unwrap_err();
        assert!(matches!(err, VersionParseError::InvalidDate { .. }));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn empty_token_is_rejected() {
        assert_eq!(
            VersionScheme::Opaque.parse("   ").unwrap_err(),
            VersionParseError::Empty
        );
    }

    #[test]
    fn opaque_ids_are_not_ordered() {
        let a = VersionId::Opaque("a".into());
        let b = VersionId::Opaque("b".into());
        assert_eq!(a.partial_cmp(&b), None);
        assert_eq!(a.partial_cmp(&a), Some(Ordering::Equal));
    }
}
