use vaultgate_state::{KeyKind, StateKey};

/// Render a [`StateKey`] into a Redis key string with the given prefix.
///
/// The format is `prefix:namespace:kind:id`.
pub fn render_key(prefix: &str, key: &StateKey) -> String {
    format!("{prefix}:{}", key.canonical())
}

/// Strip the prefix from a rendered key, yielding the canonical form.
pub fn strip_prefix<'a>(prefix: &str, rendered: &'a str) -> &'a str {
    rendered
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(rendered)
}

/// Key of the sorted set holding due times for one kind.
pub fn timeout_index_key(prefix: &str, kind: &KeyKind) -> String {
    format!("{prefix}:timeout_index:{kind}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_standard_key() {
        let key = StateKey::new("files", KeyKind::Content, "abc123");
        let rendered = render_key("vaultgate", &key);
        assert_eq!(rendered, "vaultgate:files:content:abc123");
        assert_eq!(strip_prefix("vaultgate", &rendered), key.canonical());
    }

    #[test]
    fn renders_custom_kind() {
        let key = StateKey::new("ns", KeyKind::Custom("my_kind".into()), "id-1");
        assert_eq!(render_key("pfx", &key), "pfx:ns:my_kind:id-1");
    }

    #[test]
    fn timeout_index_is_scoped_by_kind() {
        assert_eq!(
            timeout_index_key("pfx", &KeyKind::Deletion),
            "pfx:timeout_index:deletion"
        );
        assert_ne!(
            timeout_index_key("pfx", &KeyKind::Token),
            timeout_index_key("pfx", &KeyKind::Deletion)
        );
    }

    #[test]
    fn strip_prefix_leaves_foreign_keys_alone() {
        assert_eq!(strip_prefix("pfx", "other:ns:token:1"), "other:ns:token:1");
    }
}
