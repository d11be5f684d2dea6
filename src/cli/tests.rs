use super::*;
use std::fs;
use tempfile::TempDir;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }
}

use test_helpers::parse_args;

#[test]
fn no_subcommand_means_serve() {
    let args = parse_args(&["switchboard"]);
    assert_eq!(args.command, None);
    assert_eq!(args.command.unwrap_or(Commands::Serve), Commands::Serve);
}

#[test]
fn subcommands_parse() {
    assert_eq!(
        parse_args(&["switchboard", "init-config", "--force"]).command,
        Some(Commands::InitConfig { force: true })
    );
    assert_eq!(
        parse_args(&["switchboard", "list-operations"]).command,
        Some(Commands::ListOperations)
    );
}

#[test]
fn global_flags_parse_after_subcommand() {
    let args = parse_args(&[
        "switchboard",
        "serve",
        "--port",
        "8080",
        "--host",
        "0.0.0.0",
        "--json-response",
        "-l",
        "debug",
    ]);
    assert_eq!(args.port, Some(8080));
    assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
    assert!(args.json_response);
    assert_eq!(args.log_level.as_deref(), Some("debug"));
}

#[test]
fn flags_override_file_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "host = \"10.0.0.1\"\nport = 7000\n\n[transport]\njson_response = false\n",
    )
    .unwrap();
    let path_arg = path.to_string_lossy().to_string();

    let config = load_config(&parse_args(&["switchboard", "--config", &path_arg])).unwrap();
    assert_eq!(config.host, "10.0.0.1");
    assert_eq!(config.port, 7000);
    assert!(!config.transport.json_response);

    let config = load_config(&parse_args(&[
        "switchboard",
        "--config",
        &path_arg,
        "--port",
        "9000",
        "--json-response",
    ]))
    .unwrap();
    assert_eq!(config.host, "10.0.0.1");
    assert_eq!(config.port, 9000);
    assert!(config.transport.json_response);
}

#[test]
fn missing_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let path_arg = path.to_string_lossy().to_string();

    let config = load_config(&parse_args(&["switchboard", "-c", &path_arg])).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[transport]\nsse_path = \"no-slash\"\n").unwrap();
    let path_arg = path.to_string_lossy().to_string();

    let err = load_config(&parse_args(&["switchboard", "--config", &path_arg])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn builtin_catalog_lists_diagnostics() {
    let catalog = builtin_catalog().unwrap();
    let names: Vec<&str> = catalog.list().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec![ops::ECHO, ops::WHOAMI]);
}

#[test]
fn tracing_init_is_repeatable() {
    init_tracing(Some("warn"), None);
    init_tracing(None, Some("debug"));
}
