//! Identifiers for run artifacts
//!
//! All identifiers are UUIDv7: chronologically sortable, so records created
//! later in a run sort after earlier ones without a separate sequence number.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a new time-ordered identifier
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// Parse an identifier from its hyphenated string form
            pub fn parse(s: &str) -> Result<Self, String> {
                uuid::Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| format!("Invalid {} '{}': {}", stringify!($name), s, e))
            }

            /// Last eight hex digits, for display in tables
            ///
            /// The leading digits encode the creation time and repeat across
            /// one run, so the random tail is used instead.
            pub fn short(&self) -> String {
                let simple = self.0.simple().to_string();
                simple[simple.len() - 8..].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_id!(
    /// Identifier of one extraction run
    RunId
);

uuid_id!(
    /// Identifier of a context unit
    ContextId
);

uuid_id!(
    /// Identifier of an extraction record
    RecordId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_display_and_parse() {
        let id = RecordId::new();
        let id_str = id.to_string();
        assert_eq!(id_str.len(), 36);
        assert_eq!(RecordId::parse(&id_str).unwrap(), id);
    }

    #[test]
    fn test_ids_are_chronological() {
        let first = ContextId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ContextId::new();
        assert!(first < second);
    }

    #[test]
    fn test_invalid_id() {
        assert!(RunId::parse("not-a-uuid").is_err());
        assert!(RunId::parse("").is_err());
    }

    #[test]
    fn test_short_form() {
        let id = RecordId::new();
        assert_eq!(id.short().len(), 8);
        assert!(id.to_string().replace('-', "").ends_with(&id.short()));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = RecordId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
