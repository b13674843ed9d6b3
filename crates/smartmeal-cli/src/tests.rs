use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};
use clap::Parser;
use pretty_assertions::assert_eq;
use smartmeal_core::auth::{BrowserLauncher, LaunchMode};
use smartmeal_core::{LinkStatus, Retailer, StoreLocation};

use crate::cli::{Cli, Commands, CompletionShell, ConfigCommands, KrogerCommands};
use crate::commands::common::{format_link_status, link_status_item};
use crate::commands::completions::run_completions;
use crate::commands::config::{missing_profile_fields, normalize_bootstrap_url, resolve_bootstrap_url};
use crate::config_profiles::CliProfile;
use crate::launcher::{normalize_pasted_line, TerminalLauncher};

#[test]
fn normalize_bootstrap_url_requires_http_scheme() {
    assert!(normalize_bootstrap_url("https://api.example.com/v1/bootstrap".to_string()).is_ok());
    assert!(normalize_bootstrap_url("api.example.com/v1/bootstrap".to_string()).is_err());
}

#[test]
fn resolve_bootstrap_url_prefers_explicit_manifest_url() {
    let resolved = resolve_bootstrap_url(
        Some("https://api.example.com/v1/bootstrap/".to_string()),
        Some("https://ignored.example.com".to_string()),
        Some("https://also-ignored.example.com/v1/bootstrap".to_string()),
    )
    .unwrap();
    assert_eq!(
        resolved.as_deref(),
        Some("https://api.example.com/v1/bootstrap")
    );
}

#[test]
fn resolve_bootstrap_url_derives_from_api_base() {
    let resolved =
        resolve_bootstrap_url(None, Some("https://api.example.com/".to_string()), None).unwrap();
    assert_eq!(
        resolved.as_deref(),
        Some("https://api.example.com/v1/bootstrap")
    );
}

#[test]
fn missing_profile_fields_lists_required_settings() {
    assert_eq!(
        missing_profile_fields(&CliProfile::default()),
        vec!["api_base_url", "kroger_client_id"]
    );

    let ready = CliProfile {
        api_base_url: Some("https://api.smartmeal.test".to_string()),
        kroger_client_id: Some("smartmeal-prod".to_string()),
        ..CliProfile::default()
    };
    assert!(missing_profile_fields(&ready).is_empty());
}

#[test]
fn kroger_login_parses_flags_and_global_profile() {
    let cli = Cli::try_parse_from([
        "smartmeal",
        "--profile",
        "work",
        "kroger",
        "login",
        "--no-browser",
        "--timeout",
        "60",
    ])
    .unwrap();

    assert_eq!(cli.profile.as_deref(), Some("work"));
    match cli.command {
        Commands::Kroger {
            command:
                KrogerCommands::Login {
                    profile,
                    no_browser,
                    timeout,
                },
        } => {
            assert_eq!(profile, None);
            assert!(no_browser);
            assert_eq!(timeout, Some(60));
        }
        _ => panic!("expected kroger login"),
    }
}

#[test]
fn config_init_parses_profile_fields() {
    let cli = Cli::try_parse_from([
        "smartmeal",
        "config",
        "init",
        "--api-base-url",
        "https://api.smartmeal.test",
        "--kroger-client-id",
        "smartmeal-prod",
        "--zip-code",
        "45202",
    ])
    .unwrap();

    match cli.command {
        Commands::Config {
            command:
                ConfigCommands::Init {
                    api_base_url,
                    kroger_client_id,
                    zip_code,
                    no_activate,
                    ..
                },
        } => {
            assert_eq!(api_base_url.as_deref(), Some("https://api.smartmeal.test"));
            assert_eq!(kroger_client_id.as_deref(), Some("smartmeal-prod"));
            assert_eq!(zip_code.as_deref(), Some("45202"));
            assert!(!no_activate);
        }
        _ => panic!("expected config init"),
    }
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["smartmeal"]).is_err());
}

#[test]
fn format_link_status_describes_link() {
    assert_eq!(
        format_link_status("default", Retailer::Kroger, &LinkStatus::NotLinked),
        "Profile 'default' has no linked Kroger account."
    );

    let linked = LinkStatus::Linked {
        verified: Some(true),
        connected_at: Utc::now(),
        store_location: Some(StoreLocation::new(Retailer::Kroger, "01400943")),
    };
    let rendered = format_link_status("default", Retailer::Kroger, &linked);
    assert!(rendered.contains("linked to Kroger"));
    assert!(rendered.contains("verified"));
    assert!(rendered.contains("store 01400943"));
}

#[test]
fn link_status_item_serializes_for_json_output() {
    let linked = LinkStatus::Linked {
        verified: None,
        connected_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        store_location: None,
    };

    let item = link_status_item("work", Retailer::Kroger, &linked);
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["profile"], "work");
    assert_eq!(value["retailer"], "kroger");
    assert_eq!(value["linked"], true);
    assert_eq!(value["verified"], serde_json::Value::Null);
    assert_eq!(value["connected_at"], "2025-03-01T12:00:00+00:00");
}

#[test]
fn normalize_pasted_line_strips_quotes_and_blanks() {
    assert_eq!(normalize_pasted_line("   "), None);
    assert_eq!(
        normalize_pasted_line(" \"smartmealplanner://kroger-auth?code=abc123def456\" "),
        Some("smartmealplanner://kroger-auth?code=abc123def456".to_string())
    );
}

#[test]
fn terminal_launcher_only_accepts_external_browser() {
    let launcher = TerminalLauncher::new(false);
    let url = "https://api.kroger.com/v1/connect/oauth2/authorize?client_id=test";

    assert!(launcher.launch(LaunchMode::DeepLink, url).is_err());
    assert!(launcher.launch(LaunchMode::EmbeddedBrowser, url).is_err());
    assert!(launcher.launch(LaunchMode::ExternalBrowser, url).is_ok());
}

#[test]
fn run_completions_writes_bash_script_file() {
    let output_path = std::env::temp_dir().join(format!(
        "smartmeal-completions-test-{}.bash",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos())
    ));

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_smartmeal()"));
    assert!(script.contains("complete -F _smartmeal"));

    let _ = std::fs::remove_file(output_path);
}
