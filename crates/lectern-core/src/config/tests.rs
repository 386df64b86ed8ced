use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 13] = [
    "LECTERN_LLM_BASE_URL",
    "LECTERN_LLM_MODEL",
    "LECTERN_LLM_MAX_TOKENS",
    "LECTERN_LLM_TIMEOUT",
    "LECTERN_LLM_API_KEY",
    "DEEPSEEK_API_KEY",
    "LECTERN_SERVER_BIND",
    "LECTERN_SERVER_PORT",
    "LECTERN_SERVER_MAX_UPLOAD_BYTES",
    "LECTERN_UPLOAD_DIR",
    "LECTERN_SESSION_TTL",
    "LECTERN_CONTEXT_MAX_CHARS",
    "LECTERN_LOG_FILE",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.llm.base_url, "https://api.deepseek.com");
    assert_eq!(config.llm.model, "deepseek-chat");
    assert!(config.llm.max_tokens.is_none());
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
    assert_eq!(config.server.upload_dir, "uploads");
    assert_eq!(config.session.ttl_secs, 1800);
    assert_eq!(config.session.cookie_name, "lectern_session");
    assert!(config.context.max_context_chars.is_none());
    assert!(config.logging.file.is_none());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.llm.model, "deepseek-chat");
}

#[test]
#[serial]
fn parse_partial_toml() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[llm]
model = "deepseek-reasoner"
max_tokens = 2048

[server]
port = 8080

[context]
max_context_chars = 120000
system_prompt = "You are a patient tutor."
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.model, "deepseek-reasoner");
    assert_eq!(config.llm.max_tokens, Some(2048));
    assert_eq!(config.llm.base_url, "https://api.deepseek.com");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.context.policy().max_context_chars, Some(120_000));
    assert_eq!(config.context.persona(), "You are a patient tutor.");
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[server]\nport = \"not a number\"\n").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[server]\nport = 8080\n").unwrap();

    unsafe {
        std::env::set_var("LECTERN_SERVER_PORT", "9191");
        std::env::set_var("LECTERN_LLM_MODEL", "other-model");
        std::env::set_var("LECTERN_SESSION_TTL", "60");
        std::env::set_var("LECTERN_CONTEXT_MAX_CHARS", "5000");
        std::env::set_var("LECTERN_LOG_FILE", "/tmp/lectern.log");
    }
    let config = Config::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.server.port, 9191);
    assert_eq!(config.llm.model, "other-model");
    assert_eq!(config.session.ttl_secs, 60);
    assert_eq!(config.context.max_context_chars, Some(5000));
    assert_eq!(config.logging.file.as_deref(), Some("/tmp/lectern.log"));
}

#[test]
#[serial]
fn invalid_env_values_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("LECTERN_SERVER_PORT", "99999");
        std::env::set_var("LECTERN_LLM_MAX_TOKENS", "lots");
    }
    let mut config = Config::default();
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.server.port, 5000);
    assert!(config.llm.max_tokens.is_none());
}

#[test]
#[serial]
fn api_key_prefers_lectern_var() {
    clear_env();
    unsafe {
        std::env::set_var("DEEPSEEK_API_KEY", "fallback");
        std::env::set_var("LECTERN_LLM_API_KEY", "primary");
    }
    let mut config = Config::default();
    config.resolve_secrets();
    clear_env();

    assert_eq!(config.secrets.llm_api_key.unwrap().expose(), "primary");
}

#[test]
#[serial]
fn api_key_falls_back_to_deepseek_var() {
    clear_env();
    unsafe {
        std::env::set_var("LECTERN_LLM_API_KEY", "  ");
        std::env::set_var("DEEPSEEK_API_KEY", "fallback");
    }
    let mut config = Config::default();
    config.resolve_secrets();
    clear_env();

    assert_eq!(config.secrets.llm_api_key.unwrap().expose(), "fallback");
}

#[test]
#[serial]
fn api_key_absent() {
    clear_env();
    let mut config = Config::default();
    config.resolve_secrets();
    assert!(config.secrets.llm_api_key.is_none());
}

#[test]
fn validate_rejects_zero_port() {
    let mut config = Config::default();
    config.server.port = 0;
    assert!(config.validate().unwrap_err().to_string().contains("port"));
}

#[test]
fn validate_rejects_zero_ttl() {
    let mut config = Config::default();
    config.session.ttl_secs = 0;
    assert!(config.validate().unwrap_err().to_string().contains("ttl"));
}

#[test]
fn validate_rejects_empty_model() {
    let mut config = Config::default();
    config.llm.model = "  ".into();
    assert!(config.validate().unwrap_err().to_string().contains("model"));
}

#[test]
fn validate_rejects_cookie_name_with_separators() {
    let mut config = Config::default();
    config.session.cookie_name = "bad;name".into();
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_zero_context_budget() {
    let mut config = Config::default();
    config.context.max_context_chars = Some(0);
    assert!(config.validate().is_err());
}

#[test]
fn blank_system_prompt_uses_default_persona() {
    let mut config = Config::default();
    config.context.system_prompt = Some("   ".into());
    assert_eq!(config.context.persona(), crate::conversation::DEFAULT_PERSONA);
}

#[test]
fn secrets_not_serialized() {
    let mut config = Config::default();
    config.secrets.llm_api_key = Some(crate::secret::Secret::new("sk-hidden"));
    let rendered = toml::to_string(&config).unwrap();
    assert!(!rendered.contains("sk-hidden"));
    assert!(rendered.contains("[server]"));
}
