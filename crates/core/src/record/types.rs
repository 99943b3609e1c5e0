//! Types for crawled records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Prefix every normalized external identifier carries.
pub const EXTERNAL_ID_PREFIX: &str = "tt";

/// Minimum number of digits in a normalized external identifier.
const EXTERNAL_ID_WIDTH: usize = 7;

/// Errors raised while constructing a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("kind must be 'anime', 'movies' or 'tv', got '{0}'")]
    InvalidKind(String),

    #[error("invalid external identifier: '{0}'")]
    InvalidExternalId(String),
}

/// Kind of media a record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Anime,
    Movies,
    Tv,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Anime => "anime",
            MediaKind::Movies => "movies",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anime" => Ok(MediaKind::Anime),
            "movies" => Ok(MediaKind::Movies),
            "tv" => Ok(MediaKind::Tv),
            other => Err(RecordError::InvalidKind(other.to_string())),
        }
    }
}

/// Normalized external identifier (`tt` followed by at least seven digits).
///
/// The source hands these out either as bare integers (`903747`), bare digit
/// strings (`"0903747"`) or already-prefixed strings (`"tt0903747"`); all of
/// them normalize to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId(String);

impl ExternalId {
    /// Build an identifier from its numeric part.
    pub fn from_number(n: u64) -> Self {
        Self(format!(
            "{}{:0width$}",
            EXTERNAL_ID_PREFIX,
            n,
            width = EXTERNAL_ID_WIDTH
        ))
    }

    /// Parse and normalize an identifier string.
    ///
    /// Prefixed values are kept as-is once their digits are validated.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let trimmed = raw.trim();
        if let Some(digits) = trimmed.strip_prefix(EXTERNAL_ID_PREFIX) {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(Self(trimmed.to_string()));
            }
            return Err(RecordError::InvalidExternalId(raw.to_string()));
        }

        trimmed
            .parse::<u64>()
            .map(Self::from_number)
            .map_err(|_| RecordError::InvalidExternalId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric part, as the payload API expects it.
    pub fn digits(&self) -> &str {
        &self.0[EXTERNAL_ID_PREFIX.len()..]
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExternalId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ExternalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(ExternalId::from_number(n)),
            Raw::Text(s) => ExternalId::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// One discovered item from the listing source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Stable identifier (the item's URL on the source).
    pub key: String,
    pub title: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub external_id: Option<ExternalId>,
    /// Free-text state from the source ("Airing: Monday", "Ended", ...).
    pub status: String,
    /// Set on every successful mutation through the cache.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Record {
    /// Build a record, validating the kind against the closed set.
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        kind: &str,
        status: impl Into<String>,
    ) -> Result<Self, RecordError> {
        Ok(Self {
            key: key.into(),
            title: title.into(),
            kind: kind.parse()?,
            external_id: None,
            status: status.into(),
            last_updated: None,
        })
    }

    pub fn with_external_id(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }

    /// Compare everything except `last_updated`.
    pub fn same_content(&self, other: &Record) -> bool {
        self.key == other.key
            && self.title == other.title
            && self.kind == other.kind
            && self.external_id == other.external_id
            && self.status == other.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> Record {
        Record::new(
            "/shows/575979/10-things-to-know-about/",
            "10 Things to Know About",
            "tv",
            "Airing: Monday",
        )
        .unwrap()
    }

    #[test]
    fn test_good_data() {
        let record = test_record().with_external_id(ExternalId::parse("tt12680866").unwrap());

        assert_eq!(record.key, "/shows/575979/10-things-to-know-about/");
        assert_eq!(record.title, "10 Things to Know About");
        assert_eq!(record.kind, MediaKind::Tv);
        assert_eq!(record.status, "Airing: Monday");
        assert_eq!(record.external_id.unwrap().as_str(), "tt12680866");
        assert!(record.last_updated.is_none());
    }

    #[test]
    fn test_external_id_prefix_added() {
        assert_eq!(ExternalId::parse("12680866").unwrap().as_str(), "tt12680866");
    }

    #[test]
    fn test_external_id_from_number() {
        assert_eq!(ExternalId::from_number(12680866).as_str(), "tt12680866");
        assert_eq!(ExternalId::from_number(903747).as_str(), "tt0903747");
    }

    #[test]
    fn test_external_id_prefixed_unchanged() {
        assert_eq!(ExternalId::parse("tt0903747").unwrap().as_str(), "tt0903747");
    }

    #[test]
    fn test_external_id_invalid() {
        assert!(matches!(
            ExternalId::parse("abc"),
            Err(RecordError::InvalidExternalId(_))
        ));
        assert!(ExternalId::parse("tt").is_err());
        assert!(ExternalId::parse("tt12ab").is_err());
    }

    #[test]
    fn test_external_id_digits() {
        let id = ExternalId::parse("tt0944947").unwrap();
        assert_eq!(id.digits(), "0944947");
    }

    #[test]
    fn test_deserialize_external_id_variants() {
        let from_int: Option<ExternalId> = serde_json::from_str("12680866").unwrap();
        assert_eq!(from_int.unwrap().as_str(), "tt12680866");

        let from_str: Option<ExternalId> = serde_json::from_str("\"tt12680866\"").unwrap();
        assert_eq!(from_str.unwrap().as_str(), "tt12680866");

        let from_null: Option<ExternalId> = serde_json::from_str("null").unwrap();
        assert!(from_null.is_none());
    }

    #[test]
    fn test_deserialize_external_id_float_fails() {
        let result: Result<ExternalId, _> = serde_json::from_str("1.0");
        assert!(result.is_err());
    }

    #[test]
    fn test_kind_must_be_in_closed_set() {
        let result = Record::new("/shows/1/x/", "X", "series", "Ended");
        let err = result.unwrap_err();
        assert_eq!(err, RecordError::InvalidKind("series".to_string()));
        assert!(err.to_string().contains("'anime', 'movies' or 'tv'"));
    }

    #[test]
    fn test_kind_round_trip_str() {
        for kind in [MediaKind::Anime, MediaKind::Movies, MediaKind::Tv] {
            assert_eq!(kind.as_str().parse::<MediaKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_same_content_ignores_last_updated() {
        let a = test_record();
        let mut b = a.clone();
        b.last_updated = Some(Utc::now());
        assert!(a.same_content(&b));

        b.status = "Ended".to_string();
        assert!(!a.same_content(&b));
    }
}
