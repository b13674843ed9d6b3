use std::sync::Arc;

use smartmeal_core::auth::{parse_callback, BrowserLauncher};
use smartmeal_core::util::mask_secret;
use smartmeal_core::{LifecycleHub, Retailer};

use crate::cli::KrogerCommands;
use crate::commands::common::{
    format_link_status, link_service, link_status_item, resolve_profile,
};
use crate::error::CliError;
use crate::launcher::{forward_ctrl_c, forward_stdin, TerminalLauncher};

const RETAILER: Retailer = Retailer::Kroger;

pub async fn run_kroger(
    command: KrogerCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        KrogerCommands::Login {
            profile,
            no_browser,
            timeout,
        } => run_login(profile.as_deref().or(global_profile), no_browser, timeout).await,
        KrogerCommands::Status {
            profile,
            verify,
            json,
        } => run_status(profile.as_deref().or(global_profile), verify, json).await,
        KrogerCommands::Logout { profile } => {
            run_logout(profile.as_deref().or(global_profile)).await
        }
        KrogerCommands::Callback { input } => run_callback(&input),
    }
}

async fn run_login(
    profile_name: Option<&str>,
    no_browser: bool,
    timeout: Option<u64>,
) -> Result<(), CliError> {
    let mut profile = resolve_profile(profile_name).await?;
    if let Some(secs) = timeout {
        profile.config.flow_timeout_secs = secs;
    }
    let service = link_service(&profile, RETAILER)?;

    let hub = LifecycleHub::default();
    forward_stdin(hub.clone());
    forward_ctrl_c(hub.clone());
    let launcher: Arc<dyn BrowserLauncher> = Arc::new(TerminalLauncher::new(!no_browser));

    let session = service.link(&hub, launcher).await?;
    println!(
        "Linked {} account for profile '{}' (token {})",
        RETAILER.display_name(),
        profile.name,
        mask_secret(&session.access_token)
    );
    if let Some(location) = service.store().load_store_location().ok().flatten() {
        println!("Default store: {}", location.location_id);
    }
    Ok(())
}

async fn run_status(profile_name: Option<&str>, verify: bool, json: bool) -> Result<(), CliError> {
    let profile = resolve_profile(profile_name).await?;
    let service = link_service(&profile, RETAILER)?;
    let status = service.status(verify).await?;

    if json {
        let item = link_status_item(&profile.name, RETAILER, &status);
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("{}", format_link_status(&profile.name, RETAILER, &status));
    }
    Ok(())
}

async fn run_logout(profile_name: Option<&str>) -> Result<(), CliError> {
    let profile = resolve_profile(profile_name).await?;
    let service = link_service(&profile, RETAILER)?;
    service.disconnect().await?;
    println!(
        "Unlinked {} account for profile '{}'",
        RETAILER.display_name(),
        profile.name
    );
    Ok(())
}

fn run_callback(input: &str) -> Result<(), CliError> {
    let code = parse_callback(input)?;
    println!("code:   {}", mask_secret(code.as_str()));
    println!("source: {}", code.source());
    if let Some(state) = code.state() {
        println!("state:  {state}");
    }
    Ok(())
}
