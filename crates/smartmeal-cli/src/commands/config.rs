use std::env;

use smartmeal_core::config::{resolve_client_config, DEFAULT_REDIRECT_URI};
use smartmeal_core::util::{is_http_url, mask_secret, normalize_text_option};
use smartmeal_core::ClientConfig;

use crate::cli::ConfigCommands;
use crate::commands::common::resolve_profile;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub async fn run_config(
    command: ConfigCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_base_url,
            kroger_client_id,
            redirect_uri,
            zip_code,
            bootstrap_url,
            no_activate,
        } => {
            run_config_init(
                profile.as_deref().or(global_profile),
                ProfileInput {
                    api_base_url,
                    kroger_client_id,
                    redirect_uri,
                    zip_code,
                    bootstrap_url,
                },
                no_activate,
            )
            .await
        }
        ConfigCommands::Show { profile } => {
            run_config_show(profile.as_deref().or(global_profile)).await
        }
    }
}

/// Values passed explicitly on the command line.
#[derive(Debug, Default)]
pub struct ProfileInput {
    pub api_base_url: Option<String>,
    pub kroger_client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub zip_code: Option<String>,
    pub bootstrap_url: Option<String>,
}

pub async fn run_config_init(
    profile_name: Option<&str>,
    input: ProfileInput,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profiles.get(&profile_name).cloned().unwrap_or_default();

    let explicit_api_base_url = normalize_text_option(input.api_base_url);
    let explicit_client_id = normalize_text_option(input.kroger_client_id);
    let explicit_redirect_uri = normalize_text_option(input.redirect_uri);
    let explicit_zip_code = normalize_text_option(input.zip_code);
    let explicit_bootstrap_url = normalize_text_option(input.bootstrap_url);

    let bootstrap_url = resolve_bootstrap_url(
        explicit_bootstrap_url.clone(),
        explicit_api_base_url.clone(),
        existing_profile.bootstrap_manifest_url.clone(),
    )?;

    let should_fetch_bootstrap = explicit_bootstrap_url.is_some()
        || explicit_api_base_url.is_none()
        || explicit_client_id.is_none();
    let bootstrap = match bootstrap_url.clone().filter(|_| should_fetch_bootstrap) {
        Some(url) => match fetch_bootstrap(&url).await {
            Ok(config) => Some(config),
            Err(error) if explicit_bootstrap_url.is_none() => {
                tracing::warn!("{}", error);
                None
            }
            Err(error) => return Err(error),
        },
        None => None,
    };

    let merged_api_base_url = explicit_api_base_url
        .or_else(|| bootstrap.as_ref().and_then(|config| config.api_base_url.clone()))
        .or_else(|| normalize_text_option(env::var("SMARTMEAL_API_BASE_URL").ok()))
        .or_else(|| existing_profile.api_base_url.clone());
    let merged_client_id = explicit_client_id
        .or_else(|| {
            bootstrap
                .as_ref()
                .and_then(|config| config.kroger_client_id.clone())
        })
        .or_else(|| normalize_text_option(env::var("SMARTMEAL_KROGER_CLIENT_ID").ok()))
        .or_else(|| existing_profile.kroger_client_id.clone());
    let merged_redirect_uri = explicit_redirect_uri
        .or_else(|| {
            bootstrap
                .as_ref()
                .map(|config| config.redirect_uri.clone())
                .filter(|uri| uri != DEFAULT_REDIRECT_URI)
        })
        .or_else(|| existing_profile.redirect_uri.clone());
    let merged_zip_code = explicit_zip_code
        .or_else(|| normalize_text_option(env::var("SMARTMEAL_ZIP_CODE").ok()))
        .or_else(|| existing_profile.zip_code.clone());

    let profile = config.profiles.entry(profile_name.clone()).or_default();
    if let Some(value) = merged_api_base_url {
        profile.api_base_url = Some(value);
    }
    if let Some(value) = merged_client_id {
        profile.kroger_client_id = Some(value);
    }
    if let Some(value) = merged_redirect_uri {
        profile.redirect_uri = Some(value);
    }
    if let Some(value) = merged_zip_code {
        profile.zip_code = Some(value);
    }
    if explicit_bootstrap_url.is_some() {
        profile.bootstrap_manifest_url = bootstrap_url;
    }

    validate_profile_urls(profile)?;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profiles
        .get(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = missing_profile_fields(profile);
    if missing_fields.is_empty() {
        println!("Profile '{profile_name}' is ready. Run `smartmeal kroger login`.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

async fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let mut profile = resolve_profile(profile_name).await?;
    profile.config.api_token = profile.config.api_token.as_deref().map(mask_secret);
    println!("# profile: {}", profile.name);
    println!("{}", serde_json::to_string_pretty(&profile.config)?);
    Ok(())
}

async fn fetch_bootstrap(url: &str) -> Result<ClientConfig, CliError> {
    let seed = ClientConfig {
        bootstrap_manifest_url: Some(url.to_string()),
        ..ClientConfig::default()
    };
    let config = resolve_client_config(seed).await.map_err(|error| {
        CliError::Config(format!("Failed to load bootstrap manifest from {url}: {error}"))
    })?;
    println!("Loaded bootstrap manifest from {url}");
    Ok(config)
}

pub fn resolve_bootstrap_url(
    explicit_bootstrap_url: Option<String>,
    explicit_api_base_url: Option<String>,
    existing_bootstrap_url: Option<String>,
) -> Result<Option<String>, CliError> {
    if let Some(url) = explicit_bootstrap_url {
        return normalize_bootstrap_url(url).map(Some);
    }

    if let Some(url) = normalize_text_option(env::var("SMARTMEAL_BOOTSTRAP_URL").ok()) {
        return normalize_bootstrap_url(url).map(Some);
    }

    if let Some(url) = normalize_text_option(existing_bootstrap_url) {
        return normalize_bootstrap_url(url).map(Some);
    }

    Ok(explicit_api_base_url.map(|base| format!("{}/v1/bootstrap", base.trim_end_matches('/'))))
}

pub fn normalize_bootstrap_url(url: String) -> Result<String, CliError> {
    let normalized = normalize_text_option(Some(url))
        .ok_or_else(|| CliError::Config("bootstrap_url must not be empty".to_string()))?;
    if !is_http_url(&normalized) {
        return Err(CliError::Config(
            "bootstrap_url must include http:// or https://".to_string(),
        ));
    }
    Ok(normalized.trim_end_matches('/').to_string())
}

pub fn missing_profile_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if normalize_text_option(profile.api_base_url.clone()).is_none() {
        missing.push("api_base_url");
    }
    if normalize_text_option(profile.kroger_client_id.clone()).is_none() {
        missing.push("kroger_client_id");
    }
    missing
}

fn validate_profile_urls(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(profile.api_base_url.clone()) {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
    }
    if let Some(url) = normalize_text_option(profile.bootstrap_manifest_url.clone()) {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "bootstrap_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}
