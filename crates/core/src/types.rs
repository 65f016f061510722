use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids;

macro_rules! newtype_string {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the inner string as a str slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(Namespace, "A logical namespace isolating one deployment's state.");
newtype_string!(SubjectId, "The platform identity of a recipient or requester.");
newtype_string!(LogicalId, "Externally shared opaque reference to a stored content item.");
newtype_string!(BatchId, "Groups content references that are delivered together.");

impl SubjectId {
    /// Build a subject from a numeric platform user id.
    #[must_use]
    pub fn from_user_id(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl LogicalId {
    /// Generate a fresh 128-bit random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(ids::random_hex_id())
    }
}

impl BatchId {
    /// Generate a fresh 128-bit random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(ids::random_hex_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_from_str() {
        let ns = Namespace::from("files");
        assert_eq!(ns.as_str(), "files");
        assert_eq!(&*ns, "files");
    }

    #[test]
    fn subject_from_user_id() {
        let subject = SubjectId::from_user_id(-1001);
        assert_eq!(subject.to_string(), "-1001");
    }

    #[test]
    fn newtype_serde_is_transparent() {
        let id = LogicalId::new("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn generated_ids_are_distinct_hex() {
        let a = LogicalId::generate();
        let b = LogicalId::generate();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(BatchId::generate().len(), 32);
    }
}
