use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nosh_core::catalog::Slot;
use nosh_core::models::{
    DailyTarget, History, MacroGoals, Preferences, StreakData,
};
use nosh_core::store::{SqliteStore, get_as};

use super::helpers::current_day_log;

pub(crate) fn cmd_summary(store: &SqliteStore, json: bool) -> Result<()> {
    let log = current_day_log(store);
    let totals = log.totals();
    let target: DailyTarget = get_as(store, Slot::DailyTarget);
    let macros: MacroGoals = get_as(store, Slot::MacroGoals);
    let prefs: Preferences = get_as(store, Slot::Preferences);
    let streak: StreakData = get_as(store, Slot::StreakData);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "date": log.date,
                "log": log,
                "totals": totals,
                "target": target,
                "macro_goals": macros,
                "streak": streak,
            }))?
        );
        return Ok(());
    }

    if log.is_empty() && log.water == 0 {
        eprintln!("Nothing logged today. Use `nosh log` to get started.");
        process::exit(2);
    }

    println!("=== {} ===\n", log.date);

    for meal in nosh_core::models::MEAL_TYPES {
        let entries: Vec<_> = log.entries.iter().filter(|e| e.meal_type == *meal).collect();
        if entries.is_empty() {
            continue;
        }
        let subtotal: f64 = entries.iter().map(|e| e.calories).sum();
        println!("  {} ({subtotal:.0} kcal)", meal.to_uppercase());
        for e in &entries {
            let serving = e
                .serving_g
                .map(|g| format!(" — {g:.0}g"))
                .unwrap_or_default();
            println!("    {}{serving} — {:.0} kcal", e.name, e.calories);
        }
        println!();
    }

    if !log.exercise.is_empty() {
        let burned: f64 = log.exercise.iter().map(|x| x.calories).sum();
        println!("  EXERCISE (-{burned:.0} kcal)");
        for x in &log.exercise {
            let mins = x
                .duration_min
                .map(|m| format!(" — {m:.0} min"))
                .unwrap_or_default();
            println!("    {}{mins} — -{:.0} kcal", x.name, x.calories);
        }
        println!();
    }

    println!(
        "  TOTAL: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        totals.calories, totals.protein_g, totals.carbs_g, totals.fat_g
    );
    if target.calories > 0 {
        #[allow(clippy::cast_precision_loss)]
        let remaining = target.calories as f64 - totals.calories + totals.exercise_calories;
        println!(
            "  TARGET: {} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
            target.calories, macros.protein_g, macros.carbs_g, macros.fat_g
        );
        println!("  REMAINING: {remaining:.0} kcal");
    }
    if prefs.water_goal_ml > 0 || log.water > 0 {
        println!("  WATER: {} / {} ml", log.water, prefs.water_goal_ml);
    }
    if streak.current > 0 {
        println!("  STREAK: {} days (best {})", streak.current, streak.longest);
    }

    Ok(())
}

pub(crate) fn cmd_history(store: &SqliteStore, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Water")]
        water: String,
    }

    // The map holds closed-out days; today comes from the live log.
    let log = current_day_log(store);
    let history: History = get_as(store, Slot::History);

    let today = chrono::Local::now().date_naive();
    let mut rows = Vec::new();
    let mut json_days = serde_json::Map::new();
    for i in 0..days {
        let date = (today - chrono::Duration::days(i64::from(i)))
            .format("%Y-%m-%d")
            .to_string();
        let summary = if date == log.date {
            let t = log.totals();
            nosh_core::models::DaySummary {
                calories: t.calories,
                protein_g: t.protein_g,
                carbs_g: t.carbs_g,
                fat_g: t.fat_g,
                exercise_calories: t.exercise_calories,
                water: log.water,
            }
        } else if let Some(s) = history.get(&date) {
            *s
        } else {
            continue;
        };
        json_days.insert(date.clone(), serde_json::to_value(summary)?);
        rows.push(HistoryRow {
            date,
            calories: format!("{:.0}", summary.calories),
            protein: format!("{:.0}g", summary.protein_g),
            carbs: format!("{:.0}g", summary.carbs_g),
            fat: format!("{:.0}g", summary.fat_g),
            water: format!("{}ml", summary.water),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&json_days)?);
        return Ok(());
    }

    if rows.iter().all(|r| r.calories == "0") {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
