use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use smartmeal_core::config::resolve_client_config;
use smartmeal_core::{ClientConfig, LinkStatus, Retailer, RetailerLinkService};

use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;
use crate::keychain::KeyringStore;

/// A profile resolved into library config, with env and bootstrap overlays applied.
pub struct ResolvedProfile {
    pub name: String,
    pub config: ClientConfig,
}

pub async fn resolve_profile(explicit: Option<&str>) -> Result<ResolvedProfile, CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let name = profiles.resolve_profile_name(explicit);
    let profile = profiles
        .profiles
        .get(&name)
        .ok_or_else(|| CliError::ProfileNotConfigured(name.clone()))?;

    let mut config = profile.to_client_config();
    config.apply_env()?;
    let config = resolve_client_config(config).await?;
    Ok(ResolvedProfile { name, config })
}

pub fn link_service(
    profile: &ResolvedProfile,
    retailer: Retailer,
) -> Result<RetailerLinkService<KeyringStore>, CliError> {
    Ok(RetailerLinkService::from_config(
        profile.config.clone(),
        KeyringStore::new(&profile.name),
        retailer,
    )?)
}

#[derive(Debug, Serialize)]
pub struct LinkStatusItem {
    pub profile: String,
    pub retailer: String,
    pub linked: bool,
    pub verified: Option<bool>,
    pub connected_at: Option<String>,
    pub store_location: Option<String>,
}

pub fn link_status_item(profile: &str, retailer: Retailer, status: &LinkStatus) -> LinkStatusItem {
    match status {
        LinkStatus::NotLinked => LinkStatusItem {
            profile: profile.to_string(),
            retailer: retailer.id().to_string(),
            linked: false,
            verified: None,
            connected_at: None,
            store_location: None,
        },
        LinkStatus::Linked {
            verified,
            connected_at,
            store_location,
        } => LinkStatusItem {
            profile: profile.to_string(),
            retailer: retailer.id().to_string(),
            linked: true,
            verified: *verified,
            connected_at: Some(connected_at.to_rfc3339()),
            store_location: store_location
                .as_ref()
                .map(|location| location.location_id.clone()),
        },
    }
}

pub fn format_link_status(profile: &str, retailer: Retailer, status: &LinkStatus) -> String {
    match status {
        LinkStatus::NotLinked => {
            format!(
                "Profile '{profile}' has no linked {} account.",
                retailer.display_name()
            )
        }
        LinkStatus::Linked {
            verified,
            connected_at,
            store_location,
        } => {
            let verified = match verified {
                Some(true) => "verified",
                Some(false) => "rejected by backend",
                None => "not verified",
            };
            let store = store_location.as_ref().map_or_else(
                || "no default store".to_string(),
                |location| {
                    location.name.as_ref().map_or_else(
                        || format!("store {}", location.location_id),
                        |name| format!("store {} ({name})", location.location_id),
                    )
                },
            );
            format!(
                "Profile '{profile}' is linked to {} since {} ({verified}, {store})",
                retailer.display_name(),
                format_timestamp(connected_at)
            )
        }
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
