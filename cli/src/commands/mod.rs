mod account;
mod favorite;
mod goal;
mod helpers;
mod log;
mod recipe;
mod summary;
mod sync_cmd;
mod weight;

use serde_json::Value;

use nosh_core::session::SyncSession;

pub(crate) use account::{cmd_account_delete, cmd_account_status, cmd_login, cmd_logout};
pub(crate) use favorite::{cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove};
pub(crate) use goal::{cmd_goal_set, cmd_goal_show, cmd_profile_set, cmd_profile_show};
pub(crate) use log::{cmd_exercise, cmd_log, cmd_water};
pub(crate) use recipe::{
    cmd_recipe_add, cmd_recipe_list, cmd_recipe_log, cmd_recipe_remove, cmd_template_list,
    cmd_template_log, cmd_template_remove, cmd_template_save,
};
pub(crate) use summary::{cmd_history, cmd_summary};
pub(crate) use sync_cmd::{cmd_sync_pull, cmd_sync_push, cmd_sync_status};
pub(crate) use weight::{cmd_weight_history, cmd_weight_log, cmd_weight_show};

/// Route changed records through the session, one push per record. Local
/// state is already saved by the time this runs, so a push failure is
/// reported with the retry hint and swallowed; the command itself has
/// succeeded.
pub(super) async fn push_changes(session: Option<&SyncSession>, records: Vec<(&str, Value)>) {
    let Some(session) = session else {
        return;
    };
    for (tag, payload) in records {
        if let Err(e) = session.record_changed(tag, payload).await {
            eprintln!("Sync failed: {e:#}");
            eprintln!("Your data is saved locally. Run `nosh sync push` to retry.");
            return;
        }
    }
}

/// Push the composite profile document (the five goal/profile slots).
pub(super) async fn push_profile(session: Option<&SyncSession>) {
    let Some(session) = session else {
        return;
    };
    let payload = session.engine().profile_payload();
    if let Err(e) = session.record_changed("profile", payload).await {
        eprintln!("Sync failed: {e:#}");
        eprintln!("Your data is saved locally. Run `nosh sync push` to retry.");
    }
}

/// Best-effort recipe collection sync; failures are logged, never fatal.
pub(super) async fn push_recipes(session: Option<&SyncSession>) {
    let Some(session) = session else {
        return;
    };
    if let Err(e) = session
        .engine()
        .sync_recipes_to_cloud(session.user_id())
        .await
    {
        tracing::warn!(error = %format!("{e:#}"), "recipe sync failed");
        eprintln!("Recipes will sync on the next push.");
    }
}

/// Best-effort template collection sync; failures are logged, never fatal.
pub(super) async fn push_templates(session: Option<&SyncSession>) {
    let Some(session) = session else {
        return;
    };
    if let Err(e) = session
        .engine()
        .sync_templates_to_cloud(session.user_id())
        .await
    {
        tracing::warn!(error = %format!("{e:#}"), "template sync failed");
        eprintln!("Templates will sync on the next push.");
    }
}
