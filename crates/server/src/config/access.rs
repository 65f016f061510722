use serde::Deserialize;
use vaultgate_core::DEFAULT_TOKEN_VALIDITY_HOURS;

/// Access control configuration.
#[derive(Debug, Deserialize)]
pub struct AccessConfig {
    /// How long an issued token stays valid.
    #[serde(default = "default_token_validity_hours")]
    pub token_validity_hours: i64,
    /// Subjects allowed to run administrative operations. The first entry
    /// is the identity the command-line subcommands act as.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Subjects that never need a token.
    #[serde(default)]
    pub exempt: Vec<String>,
    /// Delete delivered copies after this many minutes. Unset or zero
    /// disables auto-delete.
    pub auto_delete_minutes: Option<u64>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            token_validity_hours: default_token_validity_hours(),
            admins: Vec::new(),
            exempt: Vec::new(),
            auto_delete_minutes: None,
        }
    }
}

fn default_token_validity_hours() -> i64 {
    DEFAULT_TOKEN_VALIDITY_HOURS
}
