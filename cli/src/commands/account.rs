use std::sync::Arc;

use anyhow::{Result, bail};

use nosh_core::catalog::Slot;
use nosh_core::store::SqliteStore;
use nosh_core::sync::{SignInOutcome, SyncEngine};

use crate::config::{Account, Config};

use super::helpers::format_ago;

pub(crate) async fn cmd_login(
    config: &Config,
    store: &Arc<SqliteStore>,
    user_id: &str,
    server: &str,
    api_key: Option<String>,
    json: bool,
) -> Result<()> {
    if user_id.trim().is_empty() {
        bail!("User id must not be empty");
    }
    if !server.starts_with("http://") && !server.starts_with("https://") {
        bail!("Server URL must start with http:// or https://");
    }

    let account = Account {
        user_id: user_id.trim().to_string(),
        server_url: server.trim_end_matches('/').to_string(),
        api_key,
    };

    let remote = Arc::new(crate::cloud::CloudClient::new(
        &account.server_url,
        account.api_key.clone(),
    ));
    let engine = SyncEngine::new(Some(remote), store.clone(), store.clone());

    // Reconcile before persisting the account: a failed probe leaves the
    // device signed out so the next attempt starts clean.
    let outcome = engine.sync_on_sign_in(&account.user_id).await?;
    config.save_account(&account)?;

    if json {
        let outcome_str = match outcome {
            SignInOutcome::Disabled => "disabled",
            SignInOutcome::Downloaded => "downloaded",
            SignInOutcome::Uploaded => "uploaded",
            SignInOutcome::FreshAccount => "fresh",
        };
        println!(
            "{}",
            serde_json::json!({ "user_id": account.user_id, "outcome": outcome_str })
        );
        return Ok(());
    }

    println!("Signed in as {}.", account.user_id);
    match outcome {
        SignInOutcome::Downloaded => println!("Pulled your data down from the cloud."),
        SignInOutcome::Uploaded => println!("Migrated this device's data to the cloud."),
        SignInOutcome::FreshAccount => println!("Nothing to sync yet — log something!"),
        SignInOutcome::Disabled => {}
    }
    Ok(())
}

pub(crate) fn cmd_logout(config: &Config, json: bool) -> Result<()> {
    let had_account = config.clear_account()?;
    if json {
        println!("{}", serde_json::json!({ "signed_out": had_account }));
    } else if had_account {
        println!("Signed out. Local data stays on this device.");
    } else {
        eprintln!("Not signed in.");
    }
    Ok(())
}

pub(crate) fn cmd_account_status(
    config: &Config,
    store: &SqliteStore,
    json: bool,
) -> Result<()> {
    use nosh_core::store::LocalStore;

    let account = config.load_account()?;
    let last_synced = store.get(Slot::LastSyncedAt);

    if json {
        println!(
            "{}",
            serde_json::json!({ "account": account, "last_synced_at": last_synced })
        );
        return Ok(());
    }

    match account {
        Some(account) => {
            println!("Signed in as {} ({})", account.user_id, account.server_url);
            match last_synced.as_str() {
                Some(at) => println!("Last synced {}", format_ago(at)),
                None => println!("Never synced"),
            }
        }
        None => println!("Not signed in. Local-only mode."),
    }
    Ok(())
}

pub(crate) async fn cmd_account_delete(
    config: &Config,
    engine: &SyncEngine,
    yes: bool,
    json: bool,
) -> Result<()> {
    let Some(account) = config.load_account()? else {
        bail!("Not signed in");
    };
    if !yes {
        bail!(
            "This deletes all cloud data for {}. Re-run with --yes to confirm",
            account.user_id
        );
    }

    engine.delete_user_cloud_data(&account.user_id).await;
    config.clear_account()?;

    if json {
        println!("{}", serde_json::json!({ "deleted": account.user_id }));
    } else {
        println!("Cloud data for {} deleted. Signed out.", account.user_id);
        println!("Local data stays on this device.");
    }
    Ok(())
}
