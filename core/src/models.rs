use std::collections::BTreeMap;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Profile entered during onboarding; everything the target calculator needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub age: i64,
    pub sex: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: String,
    pub goal: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DailyTarget {
    pub calories: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MacroGoals {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MicronutrientGoals {
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub sodium_mg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub unit_system: String,
    pub water_goal_ml: i64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            unit_system: "metric".to_string(),
            water_goal_ml: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodEntry {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub calories: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protein_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fat_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serving_g: Option<f64>,
    pub meal_type: String,
    #[serde(default)]
    pub logged_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseEntry {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub calories: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_min: Option<f64>,
    #[serde(default)]
    pub logged_at: String,
}

/// The current day's log. The app only models "today" locally; past days are
/// folded into [`History`]/[`FoodHistory`] at rollover and kept whole in the
/// cloud's date-keyed food-log document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayLog {
    pub date: String,
    #[serde(default)]
    pub entries: Vec<FoodEntry>,
    #[serde(default)]
    pub exercise: Vec<ExerciseEntry>,
    /// Milliliters drunk today.
    #[serde(default)]
    pub water: i64,
}

impl DayLog {
    #[must_use]
    pub fn new(date: &str) -> Self {
        Self {
            date: date.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.exercise.is_empty()
    }

    #[must_use]
    pub fn totals(&self) -> DayTotals {
        let mut t = DayTotals::default();
        for e in &self.entries {
            t.calories += e.calories;
            t.protein_g += e.protein_g.unwrap_or(0.0);
            t.carbs_g += e.carbs_g.unwrap_or(0.0);
            t.fat_g += e.fat_g.unwrap_or(0.0);
        }
        for x in &self.exercise {
            t.exercise_calories += x.calories;
        }
        t
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DayTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub exercise_calories: f64,
}

/// One closed-out day, as kept in the history map.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DaySummary {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub exercise_calories: f64,
    pub water: i64,
}

pub type History = BTreeMap<String, DaySummary>;

/// Per-food aggregate used for quick re-logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodHistoryEntry {
    pub count: i64,
    pub last_logged: String,
    pub calories: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protein_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fat_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serving_g: Option<f64>,
}

pub type FoodHistory = BTreeMap<String, FoodHistoryEntry>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteFood {
    pub name: String,
    pub calories: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protein_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fat_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serving_g: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentFood {
    pub name: String,
    pub calories: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protein_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fat_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serving_g: Option<f64>,
    pub meal_type: String,
    pub logged_at: String,
}

/// Most recent first, deduplicated by name.
pub const RECENT_FOODS_CAP: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightEntry {
    pub date: String,
    pub weight_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreakData {
    pub current: i64,
    pub longest: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_log_date: Option<String>,
}

// --- Collection types (recipes and templates live outside the flat slots) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    pub quantity_g: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub portions: f64,
    pub calories_per_portion: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protein_per_portion: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub carbs_per_portion: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fat_per_portion: Option<f64>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub updated_at: String,
}

/// A named group of food entries logged as one unit (e.g. "usual breakfast").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealTemplate {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub entries: Vec<FoodEntry>,
    #[serde(default)]
    pub updated_at: String,
}

// --- Validation ---

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

pub const ACTIVITY_LEVELS: &[&str] =
    &["sedentary", "light", "moderate", "active", "very_active"];

pub const GOALS: &[&str] = &["lose", "maintain", "gain"];

pub fn validate_meal_type(meal: &str) -> Result<String> {
    let lower = meal.to_lowercase();
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )
    }
}

pub fn validate_activity_level(level: &str) -> Result<String> {
    let lower = level.to_lowercase();
    if ACTIVITY_LEVELS.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!(
            "Invalid activity level '{level}'. Must be one of: {}",
            ACTIVITY_LEVELS.join(", ")
        )
    }
}

pub fn validate_goal(goal: &str) -> Result<String> {
    let lower = goal.to_lowercase();
    if GOALS.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!("Invalid goal '{goal}'. Must be one of: {}", GOALS.join(", "))
    }
}

pub fn validate_sex(sex: &str) -> Result<String> {
    let lower = sex.to_lowercase();
    match lower.as_str() {
        "male" | "female" => Ok(lower),
        _ => bail!("Invalid sex '{sex}'. Must be 'male' or 'female'"),
    }
}

/// Validate a food entry before it is logged: name must not be empty,
/// calories and macros must not be negative.
pub fn validate_food_entry(entry: &FoodEntry) -> Result<()> {
    if entry.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    if entry.calories < 0.0 {
        bail!("calories must not be negative");
    }
    if entry.protein_g.is_some_and(|v| v < 0.0) {
        bail!("protein_g must not be negative");
    }
    if entry.carbs_g.is_some_and(|v| v < 0.0) {
        bail!("carbs_g must not be negative");
    }
    if entry.fat_g.is_some_and(|v| v < 0.0) {
        bail!("fat_g must not be negative");
    }
    validate_meal_type(&entry.meal_type)?;
    Ok(())
}

/// Validate a weight entry: weight > 0, valid ISO date.
pub fn validate_weight_entry(entry: &WeightEntry) -> Result<()> {
    if entry.weight_kg <= 0.0 {
        bail!("weight_kg must be greater than 0");
    }
    NaiveDate::parse_from_str(&entry.date, "%Y-%m-%d").map_err(|_| {
        anyhow::anyhow!(
            "Invalid weight entry date '{}'. Must be YYYY-MM-DD",
            entry.date
        )
    })?;
    Ok(())
}

pub fn validate_recipe(recipe: &Recipe) -> Result<()> {
    if recipe.name.trim().is_empty() {
        bail!("Recipe name must not be empty");
    }
    if recipe.portions <= 0.0 {
        bail!("Recipe portions must be greater than 0");
    }
    if recipe.calories_per_portion < 0.0 {
        bail!("calories_per_portion must not be negative");
    }
    for ing in &recipe.ingredients {
        if ing.quantity_g <= 0.0 {
            bail!("Ingredient '{}' quantity_g must be greater than 0", ing.name);
        }
    }
    Ok(())
}

// --- Day rollover ---

/// Fold a finished day into the history map. Replaces any existing summary
/// for that date.
pub fn fold_day_into_history(log: &DayLog, history: &mut History) {
    let t = log.totals();
    history.insert(
        log.date.clone(),
        DaySummary {
            calories: t.calories,
            protein_g: t.protein_g,
            carbs_g: t.carbs_g,
            fat_g: t.fat_g,
            exercise_calories: t.exercise_calories,
            water: log.water,
        },
    );
}

/// Record one logged food in the per-food aggregates, keeping the latest
/// nutrition values as the canonical ones for quick re-logging.
pub fn note_food_logged(foods: &mut FoodHistory, entry: &FoodEntry, date: &str) {
    foods
        .entry(entry.name.clone())
        .and_modify(|agg| {
            agg.count += 1;
            agg.last_logged = date.to_string();
            agg.calories = entry.calories;
            agg.protein_g = entry.protein_g;
            agg.carbs_g = entry.carbs_g;
            agg.fat_g = entry.fat_g;
            agg.serving_g = entry.serving_g;
        })
        .or_insert_with(|| FoodHistoryEntry {
            count: 1,
            last_logged: date.to_string(),
            calories: entry.calories,
            protein_g: entry.protein_g,
            carbs_g: entry.carbs_g,
            fat_g: entry.fat_g,
            serving_g: entry.serving_g,
        });
}

/// Record one logged food at the front of the recent list, deduplicated by
/// name and capped at [`RECENT_FOODS_CAP`].
pub fn note_recent_food(recents: &mut Vec<RecentFood>, entry: &FoodEntry) {
    recents.retain(|r| !r.name.eq_ignore_ascii_case(&entry.name));
    recents.insert(
        0,
        RecentFood {
            name: entry.name.clone(),
            calories: entry.calories,
            protein_g: entry.protein_g,
            carbs_g: entry.carbs_g,
            fat_g: entry.fat_g,
            serving_g: entry.serving_g,
            meal_type: entry.meal_type.clone(),
            logged_at: entry.logged_at.clone(),
        },
    );
    recents.truncate(RECENT_FOODS_CAP);
}

/// Advance the logging streak for a day that received its first entry.
/// Consecutive calendar days extend the streak; a gap resets it to 1.
/// Logging twice on the same day is a no-op.
pub fn advance_streak(streak: &mut StreakData, date: &str) {
    if streak.last_log_date.as_deref() == Some(date) {
        return;
    }
    let consecutive = match (
        streak
            .last_log_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
    ) {
        (Some(prev), Some(cur)) => prev.succ_opt() == Some(cur),
        _ => false,
    };
    streak.current = if consecutive { streak.current + 1 } else { 1 };
    streak.longest = streak.longest.max(streak.current);
    streak.last_log_date = Some(date.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, calories: f64) -> FoodEntry {
        FoodEntry {
            id: String::new(),
            name: name.to_string(),
            calories,
            protein_g: Some(10.0),
            carbs_g: Some(20.0),
            fat_g: Some(5.0),
            serving_g: Some(100.0),
            meal_type: "lunch".to_string(),
            logged_at: String::new(),
        }
    }

    #[test]
    fn test_valid_meal_types() {
        assert_eq!(validate_meal_type("breakfast").unwrap(), "breakfast");
        assert_eq!(validate_meal_type("Lunch").unwrap(), "lunch");
        assert!(validate_meal_type("brunch").is_err());
        assert!(validate_meal_type("").is_err());
    }

    #[test]
    fn test_validate_activity_level() {
        assert_eq!(validate_activity_level("Moderate").unwrap(), "moderate");
        assert!(validate_activity_level("couch").is_err());
    }

    #[test]
    fn test_validate_goal_and_sex() {
        assert_eq!(validate_goal("LOSE").unwrap(), "lose");
        assert!(validate_goal("bulk").is_err());
        assert_eq!(validate_sex("Female").unwrap(), "female");
        assert!(validate_sex("x").is_err());
    }

    #[test]
    fn test_validate_food_entry() {
        assert!(validate_food_entry(&entry("Apple", 95.0)).is_ok());
        assert!(validate_food_entry(&entry("  ", 95.0)).is_err());
        assert!(validate_food_entry(&entry("Apple", -1.0)).is_err());

        let mut bad_meal = entry("Apple", 95.0);
        bad_meal.meal_type = "brunch".to_string();
        assert!(validate_food_entry(&bad_meal).is_err());

        let mut neg_macro = entry("Apple", 95.0);
        neg_macro.fat_g = Some(-0.5);
        assert!(validate_food_entry(&neg_macro).is_err());
    }

    #[test]
    fn test_validate_weight_entry() {
        let ok = WeightEntry {
            date: "2025-06-15".to_string(),
            weight_kg: 75.0,
            notes: None,
        };
        assert!(validate_weight_entry(&ok).is_ok());

        let zero = WeightEntry {
            weight_kg: 0.0,
            ..ok.clone()
        };
        assert!(validate_weight_entry(&zero).is_err());

        let bad_date = WeightEntry {
            date: "junk".to_string(),
            ..ok
        };
        assert!(validate_weight_entry(&bad_date).is_err());
    }

    #[test]
    fn test_validate_recipe() {
        let mut r = Recipe {
            id: String::new(),
            name: "Chili".to_string(),
            portions: 4.0,
            calories_per_portion: 350.0,
            protein_per_portion: Some(25.0),
            carbs_per_portion: None,
            fat_per_portion: None,
            ingredients: vec![RecipeIngredient {
                name: "Beans".to_string(),
                quantity_g: 400.0,
            }],
            updated_at: String::new(),
        };
        assert!(validate_recipe(&r).is_ok());

        r.portions = 0.0;
        assert!(validate_recipe(&r).is_err());
        r.portions = 4.0;
        r.ingredients[0].quantity_g = 0.0;
        assert!(validate_recipe(&r).is_err());
    }

    #[test]
    fn test_day_totals() {
        let mut log = DayLog::new("2025-06-15");
        log.entries.push(entry("Oats", 150.0));
        log.entries.push(entry("Milk", 100.0));
        log.exercise.push(ExerciseEntry {
            id: String::new(),
            name: "Run".to_string(),
            calories: 300.0,
            duration_min: Some(30.0),
            logged_at: String::new(),
        });
        let t = log.totals();
        assert!((t.calories - 250.0).abs() < 0.01);
        assert!((t.protein_g - 20.0).abs() < 0.01);
        assert!((t.exercise_calories - 300.0).abs() < 0.01);
    }

    #[test]
    fn test_day_log_is_empty() {
        let mut log = DayLog::new("2025-06-15");
        assert!(log.is_empty());
        log.water = 500;
        assert!(log.is_empty());
        log.entries.push(entry("Apple", 95.0));
        assert!(!log.is_empty());
    }

    #[test]
    fn test_fold_day_into_history() {
        let mut log = DayLog::new("2025-06-15");
        log.entries.push(entry("Oats", 150.0));
        log.water = 1500;

        let mut history = History::new();
        fold_day_into_history(&log, &mut history);
        let day = &history["2025-06-15"];
        assert!((day.calories - 150.0).abs() < 0.01);
        assert_eq!(day.water, 1500);

        // Re-folding the same date replaces, not accumulates
        fold_day_into_history(&log, &mut history);
        assert!((history["2025-06-15"].calories - 150.0).abs() < 0.01);
    }

    #[test]
    fn test_note_food_logged_counts_and_updates() {
        let mut foods = FoodHistory::new();
        note_food_logged(&mut foods, &entry("Oats", 150.0), "2025-06-15");
        note_food_logged(&mut foods, &entry("Oats", 160.0), "2025-06-16");
        note_food_logged(&mut foods, &entry("Milk", 100.0), "2025-06-16");

        assert_eq!(foods["Oats"].count, 2);
        assert_eq!(foods["Oats"].last_logged, "2025-06-16");
        assert!((foods["Oats"].calories - 160.0).abs() < 0.01);
        assert_eq!(foods["Milk"].count, 1);
    }

    #[test]
    fn test_note_recent_food_dedups_and_caps() {
        let mut recents = Vec::new();
        for i in 0..25 {
            note_recent_food(&mut recents, &entry(&format!("Food {i}"), 100.0));
        }
        assert_eq!(recents.len(), RECENT_FOODS_CAP);
        assert_eq!(recents[0].name, "Food 24");

        // Re-logging an existing food moves it to the front without a dup
        note_recent_food(&mut recents, &entry("Food 10", 100.0));
        assert_eq!(recents.len(), RECENT_FOODS_CAP);
        assert_eq!(recents[0].name, "Food 10");
        assert_eq!(
            recents.iter().filter(|r| r.name == "Food 10").count(),
            1
        );
    }

    #[test]
    fn test_advance_streak_consecutive() {
        let mut s = StreakData::default();
        advance_streak(&mut s, "2025-06-15");
        assert_eq!(s.current, 1);
        advance_streak(&mut s, "2025-06-16");
        assert_eq!(s.current, 2);
        assert_eq!(s.longest, 2);
    }

    #[test]
    fn test_advance_streak_gap_resets() {
        let mut s = StreakData::default();
        advance_streak(&mut s, "2025-06-15");
        advance_streak(&mut s, "2025-06-16");
        advance_streak(&mut s, "2025-06-20");
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 2);
    }

    #[test]
    fn test_advance_streak_same_day_noop() {
        let mut s = StreakData::default();
        advance_streak(&mut s, "2025-06-15");
        advance_streak(&mut s, "2025-06-15");
        assert_eq!(s.current, 1);
    }
}
