use creative_provisioner::load_config::{load_config, load_credentials, API_KEY_ENV, BASE_URL_ENV};
use serial_test::serial;
use std::env;
use std::fs::write;
use tempfile::NamedTempFile;

/// Without a file every setting falls back to its default.
#[test]
#[serial]
fn test_load_config_defaults_without_file() {
    env::remove_var(BASE_URL_ENV);
    let config = load_config(None).expect("defaults should load");
    assert_eq!(config.api_base_url, "https://api.system.netsalesmedia.pl");
    assert_eq!(config.max_entry_bytes, 250 * 1024);
    assert!(config.builtin_decorations);
}

#[test]
#[serial]
fn test_load_config_reads_folders_and_decorations() {
    env::remove_var(BASE_URL_ENV);
    let config_yaml = r#"
api_base_url: "https://staging.example"
timeout_secs: 5
folders:
  link:
    exact: "Link TXT"
  display:
    pattern: "^banners?$"
decorations:
  - advertiser_id: "42"
    query: "utm_source=feed"
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(Some(config_file.path())).expect("Config should load");
    assert_eq!(config.api_base_url, "https://staging.example");
    assert_eq!(config.timeout_secs, 5);

    let settings = config.provision_settings().expect("settings");
    assert!(settings.link_folder.matches("Link TXT"));
    assert!(!settings.link_folder.matches("Link TXT old"));
    assert!(settings.display_folder.matches("Banner"));

    let registry = config.decoration_registry();
    assert_eq!(
        registry.decorate("42", "https://shop.example/?a=1"),
        "https://shop.example/?a=1&utm_source=feed"
    );
    assert!(registry.contains("76829"));
}

#[test]
#[serial]
fn test_base_url_env_overrides_file() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "api_base_url: https://from-file.example\n").unwrap();
    env::set_var(BASE_URL_ENV, "http://127.0.0.1:9999");

    let config = load_config(Some(config_file.path())).expect("Config should load");
    env::remove_var(BASE_URL_ENV);
    assert_eq!(config.api_base_url, "http://127.0.0.1:9999");
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"not-yaml: [:::").unwrap();

    let err = load_config(Some(config_file.path())).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_missing_api_key_fails() {
    env::remove_var(API_KEY_ENV);
    let err = load_credentials(None).unwrap_err();
    assert!(err.to_string().contains(API_KEY_ENV));

    env::set_var(API_KEY_ENV, "  from-env  ");
    assert_eq!(load_credentials(None).unwrap().api_key, "from-env");
    assert_eq!(load_credentials(Some("explicit".into())).unwrap().api_key, "explicit");
    env::remove_var(API_KEY_ENV);
}
