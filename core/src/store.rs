use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::catalog::Slot;
use crate::models::{MealTemplate, Recipe};

/// Synchronous slot persistence. Reads return `Value::Null` when a slot is
/// absent and never fail: storage trouble on the read path is logged and
/// surfaces as the default value, so callers treat local state as always
/// available.
pub trait LocalStore: Send + Sync {
    fn get(&self, slot: Slot) -> Value;
    fn set(&self, slot: Slot, value: &Value);
}

/// Typed read of a slot; absent or malformed values become `T::default()`.
pub fn get_as<T>(store: &dyn LocalStore, slot: Slot) -> T
where
    T: DeserializeOwned + Default,
{
    serde_json::from_value(store.get(slot)).unwrap_or_default()
}

/// Typed write of a slot.
pub fn set_json<T: Serialize>(store: &dyn LocalStore, slot: Slot, value: &T) {
    match serde_json::to_value(value) {
        Ok(v) => store.set(slot, &v),
        Err(e) => warn!(slot = slot.key(), error = %e, "failed to serialize slot value"),
    }
}

/// Async accessors for the recipe/template collections. Unlike the flat
/// slots these are keyed rows merged item-by-item during sync.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn list_recipes(&self) -> Result<Vec<Recipe>>;
    async fn upsert_recipe(&self, recipe: &Recipe) -> Result<()>;
    async fn list_templates(&self) -> Result<Vec<MealTemplate>>;
    async fn upsert_template(&self, template: &MealTemplate) -> Result<()>;
}

/// SQLite-backed implementation of both stores: one `slots` key-value table
/// plus `recipes`/`templates` tables.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS slots (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    portions REAL NOT NULL,
                    calories_per_portion REAL NOT NULL,
                    protein_per_portion REAL,
                    carbs_per_portion REAL,
                    fat_per_portion REAL,
                    ingredients TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS templates (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    entries TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_recipes_name ON recipes(name);
                CREATE INDEX IF NOT EXISTS idx_templates_name ON templates(name);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn delete_recipe(&self, id: &str) -> Result<bool> {
        let n = self
            .lock()
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    pub fn find_recipe_by_name(&self, name: &str) -> Result<Option<Recipe>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, name, portions, calories_per_portion, protein_per_portion,
                        carbs_per_portion, fat_per_portion, ingredients, updated_at
                 FROM recipes WHERE name = ?1 COLLATE NOCASE",
                params![name],
                row_to_recipe,
            )
            .optional()?;
        Ok(row)
    }

    pub fn delete_template(&self, id: &str) -> Result<bool> {
        let n = self
            .lock()
            .execute("DELETE FROM templates WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    pub fn find_template_by_name(&self, name: &str) -> Result<Option<MealTemplate>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, name, entries, updated_at
                 FROM templates WHERE name = ?1 COLLATE NOCASE",
                params![name],
                row_to_template,
            )
            .optional()?;
        Ok(row)
    }
}

fn row_to_recipe(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recipe> {
    let ingredients: String = row.get(7)?;
    Ok(Recipe {
        id: row.get(0)?,
        name: row.get(1)?,
        portions: row.get(2)?,
        calories_per_portion: row.get(3)?,
        protein_per_portion: row.get(4)?,
        carbs_per_portion: row.get(5)?,
        fat_per_portion: row.get(6)?,
        ingredients: serde_json::from_str(&ingredients).unwrap_or_default(),
        updated_at: row.get(8)?,
    })
}

fn row_to_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<MealTemplate> {
    let entries: String = row.get(2)?;
    Ok(MealTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        entries: serde_json::from_str(&entries).unwrap_or_default(),
        updated_at: row.get(3)?,
    })
}

impl LocalStore for SqliteStore {
    fn get(&self, slot: Slot) -> Value {
        let conn = self.lock();
        let raw: Option<String> = match conn
            .query_row(
                "SELECT value FROM slots WHERE key = ?1",
                params![slot.key()],
                |row| row.get(0),
            )
            .optional()
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(slot = slot.key(), error = %e, "slot read failed");
                return Value::Null;
            }
        };
        match raw {
            Some(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(slot = slot.key(), error = %e, "slot holds malformed JSON");
                Value::Null
            }),
            None => Value::Null,
        }
    }

    fn set(&self, slot: Slot, value: &Value) {
        let text = value.to_string();
        let result = self.lock().execute(
            "INSERT INTO slots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![slot.key(), text],
        );
        if let Err(e) = result {
            warn!(slot = slot.key(), error = %e, "slot write failed");
        }
    }
}

#[async_trait]
impl CollectionStore for SqliteStore {
    async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, portions, calories_per_portion, protein_per_portion,
                    carbs_per_portion, fat_per_portion, ingredients, updated_at
             FROM recipes ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], row_to_recipe)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn upsert_recipe(&self, recipe: &Recipe) -> Result<()> {
        let ingredients = serde_json::to_string(&recipe.ingredients)?;
        let updated_at = if recipe.updated_at.is_empty() {
            Utc::now().to_rfc3339()
        } else {
            recipe.updated_at.clone()
        };
        self.lock().execute(
            "INSERT INTO recipes (id, name, portions, calories_per_portion,
                                  protein_per_portion, carbs_per_portion,
                                  fat_per_portion, ingredients, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 portions = excluded.portions,
                 calories_per_portion = excluded.calories_per_portion,
                 protein_per_portion = excluded.protein_per_portion,
                 carbs_per_portion = excluded.carbs_per_portion,
                 fat_per_portion = excluded.fat_per_portion,
                 ingredients = excluded.ingredients,
                 updated_at = excluded.updated_at",
            params![
                recipe.id,
                recipe.name,
                recipe.portions,
                recipe.calories_per_portion,
                recipe.protein_per_portion,
                recipe.carbs_per_portion,
                recipe.fat_per_portion,
                ingredients,
                updated_at,
            ],
        )?;
        Ok(())
    }

    async fn list_templates(&self) -> Result<Vec<MealTemplate>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, entries, updated_at FROM templates ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], row_to_template)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn upsert_template(&self, template: &MealTemplate) -> Result<()> {
        let entries = serde_json::to_string(&template.entries)?;
        let updated_at = if template.updated_at.is_empty() {
            Utc::now().to_rfc3339()
        } else {
            template.updated_at.clone()
        };
        self.lock().execute(
            "INSERT INTO templates (id, name, entries, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 entries = excluded.entries,
                 updated_at = excluded.updated_at",
            params![template.id, template.name, entries, updated_at],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayLog, RecipeIngredient};
    use serde_json::json;

    fn sample_recipe(id: &str, name: &str) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: name.to_string(),
            portions: 4.0,
            calories_per_portion: 350.0,
            protein_per_portion: Some(25.0),
            carbs_per_portion: Some(30.0),
            fat_per_portion: Some(12.0),
            ingredients: vec![RecipeIngredient {
                name: "Beans".to_string(),
                quantity_g: 400.0,
            }],
            updated_at: "2025-06-15T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_slot_absent_is_null() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get(Slot::UserProfile).is_null());
    }

    #[test]
    fn test_slot_set_get_overwrite() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set(Slot::DailyTarget, &json!({ "calories": 2000 }));
        assert_eq!(store.get(Slot::DailyTarget)["calories"], 2000);

        store.set(Slot::DailyTarget, &json!({ "calories": 1800 }));
        assert_eq!(store.get(Slot::DailyTarget)["calories"], 1800);
    }

    #[test]
    fn test_typed_helpers_default_on_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let log: DayLog = get_as(&store, Slot::TodayLog);
        assert!(log.date.is_empty());
        assert!(log.is_empty());

        let mut log = DayLog::new("2025-06-15");
        log.water = 750;
        set_json(&store, Slot::TodayLog, &log);
        let back: DayLog = get_as(&store, Slot::TodayLog);
        assert_eq!(back.date, "2025-06-15");
        assert_eq!(back.water, 750);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nosh.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set(Slot::OnboardingComplete, &json!(true));
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(Slot::OnboardingComplete), json!(true));
    }

    #[tokio::test]
    async fn test_recipe_upsert_by_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_recipe(&sample_recipe("r1", "Chili")).await.unwrap();
        store.upsert_recipe(&sample_recipe("r2", "Stew")).await.unwrap();

        // Same id updates in place
        let mut renamed = sample_recipe("r1", "Chili con carne");
        renamed.portions = 6.0;
        store.upsert_recipe(&renamed).await.unwrap();

        let all = store.list_recipes().await.unwrap();
        assert_eq!(all.len(), 2);
        let chili = all.iter().find(|r| r.id == "r1").unwrap();
        assert_eq!(chili.name, "Chili con carne");
        assert!((chili.portions - 6.0).abs() < f64::EPSILON);
        assert_eq!(chili.ingredients.len(), 1);
    }

    #[test]
    fn test_find_recipe_by_name_case_insensitive() {
        let store = SqliteStore::open_in_memory().unwrap();
        tokio_block_on(store.upsert_recipe(&sample_recipe("r1", "Chili"))).unwrap();
        assert!(store.find_recipe_by_name("chili").unwrap().is_some());
        assert!(store.find_recipe_by_name("stew").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_template_round_trip_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tpl = MealTemplate {
            id: "t1".to_string(),
            name: "Usual breakfast".to_string(),
            entries: vec![],
            updated_at: String::new(),
        };
        store.upsert_template(&tpl).await.unwrap();
        assert_eq!(store.list_templates().await.unwrap().len(), 1);
        // Empty updated_at gets stamped on insert
        assert!(!store.list_templates().await.unwrap()[0].updated_at.is_empty());

        assert!(store.delete_template("t1").unwrap());
        assert!(!store.delete_template("t1").unwrap());
        assert!(store.list_templates().await.unwrap().is_empty());
    }

    fn tokio_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }
}
