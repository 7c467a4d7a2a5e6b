use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building or parsing identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdError {
    #[error("failed to parse {kind} from string")]
    Parse { kind: &'static str },

    #[error("user id cannot be empty")]
    EmptyUserId,
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map($name::new)
                    .map_err(|_| IdError::Parse {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

numeric_id!(
    /// Store-assigned identifier of a subject.
    SubjectId
);
numeric_id!(
    /// Identifier of a chapter, stable within its subject across renames.
    ChapterId
);
numeric_id!(
    /// Store-assigned identifier of a history record.
    HistoryId
);

/// Opaque identifier handed out by the identity provider.
///
/// Every stored document is scoped under one of these.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// # Errors
    ///
    /// Returns `IdError::EmptyUserId` if the value is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into().trim().to_owned();
        if id.is_empty() {
            return Err(IdError::EmptyUserId);
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_id_display() {
        assert_eq!(SubjectId::new(42).to_string(), "42");
    }

    #[test]
    fn chapter_id_from_str() {
        let id: ChapterId = " 7 ".parse().unwrap();
        assert_eq!(id, ChapterId::new(7));
    }

    #[test]
    fn history_id_from_str_invalid() {
        let err = "abc".parse::<HistoryId>().unwrap_err();
        assert_eq!(err, IdError::Parse { kind: "HistoryId" });
    }

    #[test]
    fn user_id_rejects_blank() {
        assert_eq!(UserId::new("   ").unwrap_err(), IdError::EmptyUserId);
        assert_eq!(UserId::new(" reader-1 ").unwrap().as_str(), "reader-1");
    }

    #[test]
    fn user_id_deserialization_is_validated() {
        let id: UserId = serde_json::from_str("\"reader-1\"").unwrap();
        assert_eq!(id.as_str(), "reader-1");
        assert!(serde_json::from_str::<UserId>("\"  \"").is_err());
    }
}
