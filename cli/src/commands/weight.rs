use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nosh_core::catalog::Slot;
use nosh_core::models::{WeightEntry, validate_weight_entry};
use nosh_core::session::SyncSession;
use nosh_core::store::{SqliteStore, get_as, set_json};

use super::helpers::parse_date;
use super::push_changes;

const LBS_PER_KG: f64 = 2.20462;
const KG_PER_LB: f64 = 0.453_592;

pub(crate) async fn cmd_weight_log(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    value: f64,
    unit: &str,
    date: Option<String>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let weight_kg = match unit.to_lowercase().as_str() {
        "kg" => value,
        "lbs" | "lb" => value * KG_PER_LB,
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    };

    let date = parse_date(date)?.format("%Y-%m-%d").to_string();
    let entry = WeightEntry {
        date: date.clone(),
        weight_kg,
        notes,
    };
    validate_weight_entry(&entry)?;

    // One entry per date: re-logging a day replaces it
    let mut entries: Vec<WeightEntry> = get_as(store, Slot::WeightLog);
    entries.retain(|e| e.date != date);
    entries.push(entry.clone());
    entries.sort_by(|a, b| a.date.cmp(&b.date));
    set_json(store, Slot::WeightLog, &entries);

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged {:.1} kg ({:.1} lbs) for {}",
            entry.weight_kg,
            entry.weight_kg * LBS_PER_KG,
            entry.date
        );
    }

    push_changes(session, vec![("weightLog", serde_json::to_value(&entries)?)]).await;
    Ok(())
}

pub(crate) fn cmd_weight_show(store: &SqliteStore, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?.format("%Y-%m-%d").to_string();
    let entries: Vec<WeightEntry> = get_as(store, Slot::WeightLog);
    let entry = entries.iter().find(|e| e.date == date);

    match entry {
        Some(e) => {
            if json {
                println!("{}", serde_json::to_string_pretty(e)?);
            } else {
                println!("{}: {:.1} kg ({:.1} lbs)", e.date, e.weight_kg, e.weight_kg * LBS_PER_KG);
                if let Some(ref n) = e.notes {
                    println!("  Notes: {n}");
                }
            }
        }
        None => {
            if json {
                println!("{}", serde_json::json!({ "error": format!("No weight entry for {date}") }));
            } else {
                eprintln!("No weight entry for {date}");
            }
        }
    }

    Ok(())
}

pub(crate) fn cmd_weight_history(store: &SqliteStore, days: Option<u32>, json: bool) -> Result<()> {
    let mut entries: Vec<WeightEntry> = get_as(store, Slot::WeightLog);
    if let Some(days) = days {
        let cutoff = (chrono::Local::now().date_naive()
            - chrono::Duration::days(i64::from(days)))
        .format("%Y-%m-%d")
        .to_string();
        entries.retain(|e| e.date >= cutoff);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No weight entries found. Use `nosh weight log` to record your weight.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct WeightRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        kg: String,
        #[tabled(rename = "Weight (lbs)")]
        lbs: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<WeightRow> = entries
        .iter()
        .map(|e| WeightRow {
            date: e.date.clone(),
            kg: format!("{:.1}", e.weight_kg),
            lbs: format!("{:.1}", e.weight_kg * LBS_PER_KG),
            notes: e.notes.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
