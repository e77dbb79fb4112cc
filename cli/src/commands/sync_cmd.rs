use anyhow::{Result, bail};

use nosh_core::catalog::Slot;
use nosh_core::store::{LocalStore, SqliteStore};
use nosh_core::sync::SyncEngine;

use crate::config::Config;

use super::helpers::format_ago;

/// Manual retry for a failed upload: pushes the whole local snapshot again.
pub(crate) async fn cmd_sync_push(
    config: &Config,
    engine: &SyncEngine,
    json: bool,
) -> Result<()> {
    let Some(account) = config.load_account()? else {
        bail!("Not signed in. Use `nosh account login` first");
    };

    engine.upload_local_to_cloud(&account.user_id).await?;

    if json {
        println!("{}", serde_json::json!({ "pushed": true }));
    } else {
        println!("Pushed local data to the cloud.");
    }
    Ok(())
}

pub(crate) async fn cmd_sync_pull(
    config: &Config,
    store: &SqliteStore,
    engine: &SyncEngine,
    json: bool,
) -> Result<()> {
    let Some(account) = config.load_account()? else {
        bail!("Not signed in. Use `nosh account login` first");
    };

    let stamp_before = store.get(Slot::LastSyncedAt);
    engine.download_cloud_to_local(&account.user_id).await;
    let stamp_after = store.get(Slot::LastSyncedAt);

    // The download never throws; the stamp moving is the success signal.
    let pulled = stamp_after != stamp_before && !stamp_after.is_null();
    if json {
        println!("{}", serde_json::json!({ "pulled": pulled }));
    } else if pulled {
        println!("Pulled cloud data onto this device.");
    } else {
        bail!("Sync pull failed; try again later");
    }
    Ok(())
}

pub(crate) fn cmd_sync_status(config: &Config, store: &SqliteStore, json: bool) -> Result<()> {
    let account = config.load_account()?;
    let last_synced = store.get(Slot::LastSyncedAt);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "enabled": account.is_some(),
                "last_synced_at": last_synced,
            })
        );
        return Ok(());
    }

    if account.is_none() {
        println!("Sync off (not signed in). Data lives only on this device.");
        return Ok(());
    }
    match last_synced.as_str() {
        Some(at) => println!("Sync on. Last synced {}", format_ago(at)),
        None => println!("Sync on. Never synced — run `nosh sync push`"),
    }
    Ok(())
}
