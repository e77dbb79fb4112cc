use anyhow::{Context, Result, bail};
use chrono::Utc;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use uuid::Uuid;

use nosh_core::catalog::Slot;
use nosh_core::models::{
    FoodEntry, FoodHistory, MealTemplate, Recipe, RecipeIngredient, StreakData, advance_streak,
    note_food_logged, validate_meal_type, validate_recipe,
};
use nosh_core::session::SyncSession;
use nosh_core::store::{CollectionStore, SqliteStore, get_as, set_json};

use super::helpers::current_day_log;
use super::{push_changes, push_recipes, push_templates};

/// Parse an `--ingredient` argument of the form `Name:grams`.
fn parse_ingredient(raw: &str) -> Result<RecipeIngredient> {
    let (name, grams) = raw
        .rsplit_once(':')
        .with_context(|| format!("Invalid ingredient '{raw}'. Use 'Name:grams'"))?;
    let quantity_g: f64 = grams
        .trim()
        .parse()
        .with_context(|| format!("Invalid ingredient quantity in '{raw}'"))?;
    Ok(RecipeIngredient {
        name: name.trim().to_string(),
        quantity_g,
    })
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_recipe_add(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    portions: f64,
    calories: f64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    ingredients: Vec<String>,
    json: bool,
) -> Result<()> {
    let ingredients = ingredients
        .iter()
        .map(|raw| parse_ingredient(raw))
        .collect::<Result<Vec<_>>>()?;

    // Re-adding a name updates the same recipe id so devices converge
    let id = store
        .find_recipe_by_name(name)?
        .map_or_else(|| Uuid::new_v4().to_string(), |existing| existing.id);

    let recipe = Recipe {
        id,
        name: name.trim().to_string(),
        portions,
        calories_per_portion: calories,
        protein_per_portion: protein,
        carbs_per_portion: carbs,
        fat_per_portion: fat,
        ingredients,
        updated_at: Utc::now().to_rfc3339(),
    };
    validate_recipe(&recipe)?;
    store.upsert_recipe(&recipe).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        println!(
            "Saved recipe {} ({} portions, {:.0} kcal/portion)",
            recipe.name, recipe.portions, recipe.calories_per_portion
        );
    }

    push_recipes(session).await;
    Ok(())
}

pub(crate) async fn cmd_recipe_list(store: &SqliteStore, json: bool) -> Result<()> {
    let recipes = store.list_recipes().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }
    if recipes.is_empty() {
        eprintln!("No recipes yet. Use `nosh recipe add`.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Portions")]
        portions: String,
        #[tabled(rename = "Cal/portion")]
        calories: String,
        #[tabled(rename = "Ingredients")]
        ingredients: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            name: r.name.clone(),
            portions: format!("{:.1}", r.portions),
            calories: format!("{:.0}", r.calories_per_portion),
            ingredients: format!("{}", r.ingredients.len()),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) async fn cmd_recipe_remove(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    json: bool,
) -> Result<()> {
    let Some(recipe) = store.find_recipe_by_name(name)? else {
        bail!("No recipe named '{name}'");
    };
    store.delete_recipe(&recipe.id)?;

    if json {
        println!("{}", serde_json::json!({ "removed": recipe.name }));
    } else {
        println!("Removed recipe {}", recipe.name);
    }

    push_recipes(session).await;
    Ok(())
}

pub(crate) async fn cmd_recipe_log(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    portions: f64,
    meal: &str,
    json: bool,
) -> Result<()> {
    if portions <= 0.0 {
        bail!("Portions must be greater than 0");
    }
    let meal_type = validate_meal_type(meal)?;
    let Some(recipe) = store.find_recipe_by_name(name)? else {
        bail!("No recipe named '{name}'");
    };

    let entry = FoodEntry {
        id: Uuid::new_v4().to_string(),
        name: recipe.name.clone(),
        calories: recipe.calories_per_portion * portions,
        protein_g: recipe.protein_per_portion.map(|v| v * portions),
        carbs_g: recipe.carbs_per_portion.map(|v| v * portions),
        fat_g: recipe.fat_per_portion.map(|v| v * portions),
        serving_g: None,
        meal_type,
        logged_at: Utc::now().to_rfc3339(),
    };

    let mut log = current_day_log(store);
    log.entries.push(entry.clone());
    set_json(store, Slot::TodayLog, &log);

    let mut foods: FoodHistory = get_as(store, Slot::FoodHistory);
    note_food_logged(&mut foods, &entry, &log.date);
    set_json(store, Slot::FoodHistory, &foods);

    let mut streak: StreakData = get_as(store, Slot::StreakData);
    advance_streak(&mut streak, &log.date);
    set_json(store, Slot::StreakData, &streak);

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged {portions} portion(s) of {} ({:.0} kcal)",
            recipe.name, entry.calories
        );
    }

    push_changes(
        session,
        vec![
            ("foodLog", serde_json::to_value(&log)?),
            ("foodHistory", serde_json::to_value(&foods)?),
            ("streakData", serde_json::to_value(&streak)?),
        ],
    )
    .await;
    Ok(())
}

// --- Templates ---

pub(crate) async fn cmd_template_save(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    meal: Option<String>,
    json: bool,
) -> Result<()> {
    let log = current_day_log(store);
    let meal_filter = meal.map(|m| validate_meal_type(&m)).transpose()?;

    let entries: Vec<FoodEntry> = log
        .entries
        .iter()
        .filter(|e| meal_filter.as_deref().is_none_or(|m| e.meal_type == m))
        .cloned()
        .collect();
    if entries.is_empty() {
        bail!("Nothing logged today to save as a template");
    }

    let id = store
        .find_template_by_name(name)?
        .map_or_else(|| Uuid::new_v4().to_string(), |existing| existing.id);
    let template = MealTemplate {
        id,
        name: name.trim().to_string(),
        entries,
        updated_at: Utc::now().to_rfc3339(),
    };
    store.upsert_template(&template).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&template)?);
    } else {
        println!(
            "Saved template {} ({} items)",
            template.name,
            template.entries.len()
        );
    }

    push_templates(session).await;
    Ok(())
}

pub(crate) async fn cmd_template_list(store: &SqliteStore, json: bool) -> Result<()> {
    let templates = store.list_templates().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }
    if templates.is_empty() {
        eprintln!("No templates yet. Use `nosh template save`.");
        return Ok(());
    }
    for t in &templates {
        let calories: f64 = t.entries.iter().map(|e| e.calories).sum();
        println!("  {} — {} items, {calories:.0} kcal", t.name, t.entries.len());
    }
    Ok(())
}

pub(crate) async fn cmd_template_log(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    json: bool,
) -> Result<()> {
    let Some(template) = store.find_template_by_name(name)? else {
        bail!("No template named '{name}'");
    };

    let mut log = current_day_log(store);
    let mut foods: FoodHistory = get_as(store, Slot::FoodHistory);
    let mut logged = Vec::new();
    for saved in &template.entries {
        let entry = FoodEntry {
            id: Uuid::new_v4().to_string(),
            logged_at: Utc::now().to_rfc3339(),
            ..saved.clone()
        };
        note_food_logged(&mut foods, &entry, &log.date);
        log.entries.push(entry.clone());
        logged.push(entry);
    }
    set_json(store, Slot::TodayLog, &log);
    set_json(store, Slot::FoodHistory, &foods);

    let mut streak: StreakData = get_as(store, Slot::StreakData);
    advance_streak(&mut streak, &log.date);
    set_json(store, Slot::StreakData, &streak);

    if json {
        println!("{}", serde_json::to_string_pretty(&logged)?);
    } else {
        let calories: f64 = logged.iter().map(|e| e.calories).sum();
        println!(
            "Logged template {} ({} items, {calories:.0} kcal)",
            template.name,
            logged.len()
        );
    }

    push_changes(
        session,
        vec![
            ("foodLog", serde_json::to_value(&log)?),
            ("foodHistory", serde_json::to_value(&foods)?),
            ("streakData", serde_json::to_value(&streak)?),
        ],
    )
    .await;
    Ok(())
}

pub(crate) async fn cmd_template_remove(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    json: bool,
) -> Result<()> {
    let Some(template) = store.find_template_by_name(name)? else {
        bail!("No template named '{name}'");
    };
    store.delete_template(&template.id)?;

    if json {
        println!("{}", serde_json::json!({ "removed": template.name }));
    } else {
        println!("Removed template {}", template.name);
    }

    push_templates(session).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ingredient() {
        let ing = parse_ingredient("Rolled oats:80").unwrap();
        assert_eq!(ing.name, "Rolled oats");
        assert!((ing.quantity_g - 80.0).abs() < f64::EPSILON);

        let ing = parse_ingredient("Milk: 250.5").unwrap();
        assert!((ing.quantity_g - 250.5).abs() < f64::EPSILON);

        assert!(parse_ingredient("no-grams").is_err());
        assert!(parse_ingredient("x:abc").is_err());
    }
}
