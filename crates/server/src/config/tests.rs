use super::*;

#[test]
fn empty_document_yields_defaults() {
    let config = ServerConfig::from_toml("").unwrap();
    assert_eq!(config.namespace, "vaultgate");
    assert_eq!(config.state.backend, "memory");
    assert!(config.state.url.is_none());
    assert_eq!(config.access.token_validity_hours, 24);
    assert!(config.access.admins.is_empty());
    assert!(config.access.auto_delete_minutes.is_none());
    assert_eq!(config.broadcast.wave_size, 25);
    assert_eq!(config.broadcast.wave_interval_ms, 1000);
    assert_eq!(config.background.deletion_poll_interval_seconds, 60);
    assert!(config.background.enable_deletions);
    assert!(!config.background.enable_token_sweep);
    assert_eq!(config.telemetry.filter, "info");
    assert!(!config.telegram.dry_run);
}

#[test]
fn full_document() {
    let toml = r#"
        namespace = "files"

        [state]
        backend = "redis"
        url = "redis://cache:6379"
        prefix = "vg"
        pool_size = 4

        [telegram]
        bot_token = "123:abc"
        bot_username = "files_bot"
        storage_chat = "-1009"
        request_timeout_seconds = 15

        [access]
        token_validity_hours = 6
        admins = ["100"]
        exempt = ["200", "300"]
        auto_delete_minutes = 30

        [broadcast]
        wave_size = 10
        wave_interval_ms = 500
        max_sends_per_window = 20
        max_rate_limit_retries = 5

        [background]
        deletion_poll_interval_seconds = 15
        enable_token_sweep = true

        [telemetry]
        filter = "debug"
    "#;

    let config = ServerConfig::from_toml(toml).unwrap();
    assert_eq!(config.namespace, "files");
    assert_eq!(config.state.backend, "redis");
    assert_eq!(config.state.url.as_deref(), Some("redis://cache:6379"));
    assert_eq!(config.state.pool_size, Some(4));
    assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
    assert_eq!(config.telegram.request_timeout_seconds, 15);
    assert_eq!(config.access.exempt, vec!["200", "300"]);
    assert_eq!(config.access.auto_delete_minutes, Some(30));
    assert_eq!(config.broadcast.wave_size, 10);
    assert_eq!(config.broadcast.max_sends_per_window, 20);
    assert_eq!(config.broadcast.max_rate_limit_retries, 5);
    // Unset fields in a present section still get defaults.
    assert_eq!(config.broadcast.max_transient_retries, 2);
    assert_eq!(config.background.deletion_poll_interval_seconds, 15);
    assert!(config.background.enable_token_sweep);
    assert_eq!(config.telemetry.filter, "debug");
}

#[test]
fn mistyped_value_is_a_config_error() {
    let err = ServerConfig::from_toml("[access]\ntoken_validity_hours = \"a day\"\n").unwrap_err();
    assert!(err.to_string().starts_with("configuration error"));
}

#[test]
fn env_token_overrides_file() {
    let mut config = ServerConfig::from_toml("[telegram]\nbot_token = \"file\"\n").unwrap();
    config.apply_env(Some("env".into()));
    assert_eq!(config.telegram.bot_token.as_deref(), Some("env"));

    config.apply_env(Some(String::new()));
    assert_eq!(config.telegram.bot_token.as_deref(), Some("env"));

    config.apply_env(None);
    assert_eq!(config.telegram.bot_token.as_deref(), Some("env"));
}

#[test]
fn bot_token_is_redacted_from_debug() {
    let config = ServerConfig::from_toml("[telegram]\nbot_token = \"123:secret\"\n").unwrap();
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("123:secret"));
    assert!(rendered.contains("[REDACTED]"));
}

#[test]
fn missing_file_yields_defaults() {
    let config = ServerConfig::load(std::path::Path::new("/nonexistent/vaultgate.toml")).unwrap();
    assert_eq!(config.namespace, "vaultgate");
}

#[test]
fn namespace_with_separator_is_rejected() {
    let err = ServerConfig::from_toml(r#"namespace = "tenant:prod""#).unwrap_err();
    assert!(matches!(err, ServerError::Config(ref m) if m.contains("tenant:prod")));
}

#[test]
fn empty_namespace_is_rejected() {
    let err = ServerConfig::from_toml(r#"namespace = """#).unwrap_err();
    assert!(matches!(err, ServerError::Config(_)));
}
