use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nosh_core::catalog::Slot;
use nosh_core::models::FavoriteFood;
use nosh_core::session::SyncSession;
use nosh_core::store::{SqliteStore, get_as, set_json};

use super::push_changes;

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_favorite_add(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    calories: f64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    serving: Option<f64>,
    json: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    if calories < 0.0 {
        bail!("calories must not be negative");
    }

    let favorite = FavoriteFood {
        name: name.trim().to_string(),
        calories,
        protein_g: protein,
        carbs_g: carbs,
        fat_g: fat,
        serving_g: serving,
    };

    let mut favorites: Vec<FavoriteFood> = get_as(store, Slot::Favorites);
    favorites.retain(|f| !f.name.eq_ignore_ascii_case(&favorite.name));
    favorites.push(favorite.clone());
    favorites.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    set_json(store, Slot::Favorites, &favorites);

    if json {
        println!("{}", serde_json::to_string_pretty(&favorite)?);
    } else {
        println!("Saved {} to favorites ({:.0} kcal)", favorite.name, favorite.calories);
    }

    push_changes(session, vec![("favorites", serde_json::to_value(&favorites)?)]).await;
    Ok(())
}

pub(crate) fn cmd_favorite_list(store: &SqliteStore, json: bool) -> Result<()> {
    let favorites: Vec<FavoriteFood> = get_as(store, Slot::Favorites);

    if json {
        println!("{}", serde_json::to_string_pretty(&favorites)?);
        return Ok(());
    }
    if favorites.is_empty() {
        eprintln!("No favorites yet. Use `nosh favorite add`.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct FavoriteRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Serving")]
        serving: String,
    }

    let rows: Vec<FavoriteRow> = favorites
        .iter()
        .map(|f| FavoriteRow {
            name: f.name.clone(),
            calories: format!("{:.0}", f.calories),
            protein: f.protein_g.map_or("-".into(), |v| format!("{v:.1}g")),
            serving: f.serving_g.map_or("-".into(), |v| format!("{v:.0}g")),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) async fn cmd_favorite_remove(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: &str,
    json: bool,
) -> Result<()> {
    let mut favorites: Vec<FavoriteFood> = get_as(store, Slot::Favorites);
    let before = favorites.len();
    favorites.retain(|f| !f.name.eq_ignore_ascii_case(name));
    if favorites.len() == before {
        bail!("No favorite named '{name}'");
    }
    set_json(store, Slot::Favorites, &favorites);

    if json {
        println!("{}", serde_json::json!({ "removed": name }));
    } else {
        println!("Removed {name} from favorites");
    }

    push_changes(session, vec![("favorites", serde_json::to_value(&favorites)?)]).await;
    Ok(())
}
