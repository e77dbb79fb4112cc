use anyhow::{Result, bail};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use nosh_core::catalog::Slot;
use nosh_core::models::{
    ExerciseEntry, FoodEntry, FoodHistory, Preferences, StreakData, advance_streak,
    note_food_logged, note_recent_food, validate_food_entry, validate_meal_type,
};
use nosh_core::session::SyncSession;
use nosh_core::store::{SqliteStore, get_as, set_json};

use super::helpers::current_day_log;
use super::push_changes;

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_log(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    calories: f64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    serving: Option<f64>,
    meal: &str,
    json: bool,
) -> Result<()> {
    let meal_type = validate_meal_type(meal)?;
    let entry = FoodEntry {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        calories,
        protein_g: protein,
        carbs_g: carbs,
        fat_g: fat,
        serving_g: serving,
        meal_type,
        logged_at: Utc::now().to_rfc3339(),
    };
    validate_food_entry(&entry)?;

    let mut log = current_day_log(store);
    log.entries.push(entry.clone());
    set_json(store, Slot::TodayLog, &log);

    let mut foods: FoodHistory = get_as(store, Slot::FoodHistory);
    note_food_logged(&mut foods, &entry, &log.date);
    set_json(store, Slot::FoodHistory, &foods);

    let mut recents = get_as(store, Slot::RecentFoods);
    note_recent_food(&mut recents, &entry);
    set_json(store, Slot::RecentFoods, &recents);

    let mut streak: StreakData = get_as(store, Slot::StreakData);
    advance_streak(&mut streak, &log.date);
    set_json(store, Slot::StreakData, &streak);

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let total = log.totals().calories;
        println!(
            "Logged {} ({:.0} kcal, {}) — {:.0} kcal today",
            entry.name, entry.calories, entry.meal_type, total
        );
        if streak.current > 1 {
            println!("  Streak: {} days", streak.current);
        }
    }

    push_changes(
        session,
        vec![
            ("foodLog", serde_json::to_value(&log)?),
            ("foodHistory", serde_json::to_value(&foods)?),
            ("recentFoods", serde_json::to_value(&recents)?),
            ("streakData", serde_json::to_value(&streak)?),
        ],
    )
    .await;

    Ok(())
}

pub(crate) async fn cmd_water(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    ml: i64,
    json: bool,
) -> Result<()> {
    if ml <= 0 {
        bail!("Water amount must be greater than 0 ml");
    }

    let mut log = current_day_log(store);
    log.water += ml;
    set_json(store, Slot::TodayLog, &log);

    let prefs: Preferences = get_as(store, Slot::Preferences);

    if json {
        println!(
            "{}",
            json!({ "water": log.water, "goal": prefs.water_goal_ml })
        );
    } else if prefs.water_goal_ml > 0 {
        println!("Water: {} / {} ml", log.water, prefs.water_goal_ml);
    } else {
        println!("Water: {} ml", log.water);
    }

    push_changes(session, vec![("foodLog", serde_json::to_value(&log)?)]).await;
    Ok(())
}

pub(crate) async fn cmd_exercise(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    calories: f64,
    duration: Option<f64>,
    json: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Exercise name must not be empty");
    }
    if calories <= 0.0 {
        bail!("Calories burned must be greater than 0");
    }

    let entry = ExerciseEntry {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        calories,
        duration_min: duration,
        logged_at: Utc::now().to_rfc3339(),
    };

    let mut log = current_day_log(store);
    log.exercise.push(entry.clone());
    set_json(store, Slot::TodayLog, &log);

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let burned = log.totals().exercise_calories;
        println!(
            "Logged {} (-{:.0} kcal) — {:.0} kcal burned today",
            entry.name, entry.calories, burned
        );
    }

    push_changes(session, vec![("foodLog", serde_json::to_value(&log)?)]).await;
    Ok(())
}
