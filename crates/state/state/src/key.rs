use serde::{Deserialize, Serialize};

use vaultgate_core::Namespace;

/// The kind of state being stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Current access token of a subject.
    Token,
    /// Logical id to physical location mapping.
    Content,
    /// Ordered batch member entry (`{batch}:{seq}`).
    BatchMember,
    /// Registered recipient record.
    Recipient,
    /// Pending deletion obligation, keyed by delivered location.
    Deletion,
    /// Short-lived processing claim.
    Claim,
    Counter,
    Custom(String),
}

impl KeyKind {
    /// Return a string representation of the key kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Token => "token",
            Self::Content => "content",
            Self::BatchMember => "batch_member",
            Self::Recipient => "recipient",
            Self::Deletion => "deletion",
            Self::Claim => "claim",
            Self::Counter => "counter",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Inverse of [`as_str`](Self::as_str). Unknown names become `Custom`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "token" => Self::Token,
            "content" => Self::Content,
            "batch_member" => Self::BatchMember,
            "recipient" => Self::Recipient,
            "deletion" => Self::Deletion,
            "claim" => Self::Claim,
            "counter" => Self::Counter,
            other => Self::Custom(other.to_owned()),
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key used to address state entries in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub namespace: Namespace,
    pub kind: KeyKind,
    pub id: String,
}

impl StateKey {
    /// Create a new state key.
    #[must_use]
    pub fn new(namespace: impl Into<Namespace>, kind: KeyKind, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            id: id.into(),
        }
    }

    /// Return a canonical string representation: `namespace:kind:id`
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.namespace, self.kind, self.id)
    }

    /// Prefix shared by every key of `kind` in `namespace` whose id starts
    /// with `id_prefix`.
    #[must_use]
    pub fn scan_prefix(namespace: &str, kind: &KeyKind, id_prefix: Option<&str>) -> String {
        format!("{namespace}:{kind}:{}", id_prefix.unwrap_or_default())
    }

    /// Parse a canonical key string back into a `StateKey`.
    ///
    /// The id may itself contain `:`; namespace and kind may not.
    #[must_use]
    pub fn parse_canonical(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let namespace = parts.next().filter(|p| !p.is_empty())?;
        let kind = parts.next().filter(|p| !p.is_empty())?;
        let id = parts.next()?;
        Some(Self::new(namespace, KeyKind::parse(kind), id))
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}
