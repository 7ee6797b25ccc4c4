// =====================================================================================
// Oracle Node Engine - Config Tests
//
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use oracle_node_engine::config::*;
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

fn minimal_toml() -> &'static str {
    r#"
[Node]
mnemonic = "abandon abandon abandon"
oracle_curr = "curr"
oracle_address = "addr_test1..."
c3_token_hash = "hash"
c3_token_name = "C3"

[ChainQuery]
network = "MAINNET"

[ChainQuery.ogmios]
ws_url = "ws://localhost:1337"
kupo_url = "http://localhost:1442"

[Rate]
general_base_symbol = "ADA"

[Rate.base_currency]

[[Rate.base_currency.dexes]]
name = "minswap"
sources = ["a", "b", "c"]

[Updater]
update_inter = 60
"#
}

#[test]
fn loads_a_minimal_valid_config_from_file() {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(minimal_toml().as_bytes()).expect("write config");

    let config = OracleConfig::from_file(file.path()).expect("config loads");

    assert_eq!(config.node.oracle_address, "addr_test1...");
    assert_eq!(config.chain_query.network, "MAINNET");
    assert_eq!(config.rate.general_base_symbol, "ADA");
    assert_eq!(config.updater.update_inter, 60);
    // Serde defaults fill in percent_resolution/precision_multiplier.
    assert_eq!(config.updater.percent_resolution, 10_000);
}

#[test]
fn missing_file_is_a_configuration_error() {
    let result = OracleConfig::from_file("/nonexistent/path/config.toml");
    assert!(result.is_err());
}

#[test]
fn malformed_toml_is_a_configuration_error() {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(b"[Node\noracle_address = \"broken\n").expect("write config");

    let result = OracleConfig::from_file(file.path());
    assert!(result.is_err());
}

#[test]
fn from_file_runs_validate_and_rejects_an_invalid_config() {
    // Fewer than 3 base sources, which `validate()` rejects when
    // `min_requirement` defaults to true.
    let toml_with_one_source = minimal_toml().replace(r#"sources = ["a", "b", "c"]"#, r#"sources = ["a"]"#);

    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(toml_with_one_source.as_bytes()).expect("write config");

    let result = OracleConfig::from_file(file.path());
    assert!(result.is_err());
}

#[test]
fn database_url_env_var_overrides_the_file() {
    let toml_with_db = format!(
        "{}\n[database]\nurl = \"postgresql://file-configured/db\"\n",
        minimal_toml()
    );
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(toml_with_db.as_bytes()).expect("write config");

    std::env::set_var("DATABASE_URL", "postgresql://env-configured/db");
    let config = OracleConfig::from_file(file.path()).expect("config loads");
    std::env::remove_var("DATABASE_URL");

    assert_eq!(
        config.database.expect("database section present").url,
        "postgresql://env-configured/db"
    );
}

#[test]
fn round_trips_source_spec_through_toml() {
    let spec = SourceSpec {
        name: "coingecko".into(),
        api_url: Some("https://api.coingecko.com/x".into()),
        json_path: Some(vec!["market_data".into(), "current_price".into()]),
        inverse: true,
        headers: HashMap::new(),
        bearer_token: Some("secret-token".into()),
    };
    let serialized = toml::to_string(&spec).expect("serialize");
    let parsed: SourceSpec = toml::from_str(&serialized).expect("parse");
    assert_eq!(parsed.name, spec.name);
    assert_eq!(parsed.bearer_token, spec.bearer_token);
    assert!(parsed.inverse);
}

#[test]
fn cex_source_config_defaults_concurrent_requests_to_twenty() {
    let toml_str = r#"
sources = ["binance", "kraken"]
"#;
    let parsed: CexSourceConfig = toml::from_str(toml_str).expect("parse");
    assert_eq!(parsed.concurrent_requests, 20);
}
