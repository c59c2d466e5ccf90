use uag_domain::config::{Config, ConfigSeverity, ToolDecision};

#[test]
fn default_config_validates_clean() {
    let config = Config::default();
    let issues = config.validate();
    assert!(
        issues.iter().all(|i| i.severity != ConfigSeverity::Error),
        "default config should never fail validation: {issues:?}"
    );
}

#[test]
fn default_policy_denies_tools() {
    let config = Config::default();
    assert_eq!(config.policy.can_use_tool_default, ToolDecision::Deny);
    assert_eq!(config.policy.payload_cap_bytes, 512 * 1024);
    assert_eq!(config.policy.requests_per_minute, 240);
}

#[test]
fn zero_payload_cap_is_an_error() {
    let mut config = Config::default();
    config.policy.payload_cap_bytes = 0;
    let issues = config.validate();
    assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error));
}

#[test]
fn invalid_allowlist_regex_is_an_error() {
    let mut config = Config::default();
    config.policy.brain_url_allowlist.push("(unclosed".into());
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.field == "policy.brain_url_allowlist"));
}

#[test]
fn round_trips_through_toml() {
    let config = Config::default();
    let raw = toml::to_string(&config).expect("serialize");
    let parsed: Config = toml::from_str(&raw).expect("parse");
    assert_eq!(parsed.server.port, config.server.port);
    assert_eq!(
        parsed.workspace.data_dir,
        config.workspace.data_dir
    );
}
