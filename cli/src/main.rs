mod cloud;
mod commands;
mod config;
mod server;

use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nosh_core::remote::RemoteStore;
use nosh_core::session::SyncSession;
use nosh_core::store::SqliteStore;
use nosh_core::sync::SyncEngine;

use crate::commands::{
    cmd_account_delete, cmd_account_status, cmd_exercise, cmd_favorite_add, cmd_favorite_list,
    cmd_favorite_remove, cmd_goal_set, cmd_goal_show, cmd_history, cmd_log, cmd_login, cmd_logout,
    cmd_profile_set, cmd_profile_show, cmd_recipe_add, cmd_recipe_list, cmd_recipe_log,
    cmd_recipe_remove, cmd_summary, cmd_sync_pull, cmd_sync_push, cmd_sync_status,
    cmd_template_list, cmd_template_log, cmd_template_remove, cmd_template_save, cmd_water,
    cmd_weight_history, cmd_weight_log, cmd_weight_show,
};
use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "nosh",
    version,
    about = "A local-first nutrition tracker",
    long_about = "Track food, water, exercise, and weight. Everything is stored on this \
                  device; sign in to mirror it to a cloud document store and share it \
                  across devices."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a food to today's journal
    Log {
        /// Food name
        food: String,
        /// Calories for this serving
        calories: f64,
        /// Protein grams
        #[arg(long)]
        protein: Option<f64>,
        /// Carb grams
        #[arg(long)]
        carbs: Option<f64>,
        /// Fat grams
        #[arg(long)]
        fat: Option<f64>,
        /// Serving size in grams
        #[arg(long)]
        serving: Option<f64>,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log water in milliliters
    Water {
        /// Milliliters to add
        ml: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log an exercise session
    Exercise {
        /// Exercise name
        name: String,
        /// Calories burned
        calories: f64,
        /// Duration in minutes
        #[arg(long)]
        duration: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show today's journal and targets
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily totals for the last N days
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Manage your profile (drives the calorie/macro targets)
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Manage calorie, macro, and water goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Manage favorite foods
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage meal templates (groups of foods logged together)
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Sign in/out and manage the cloud account
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Cloud sync operations
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Host the cloud document store for your devices
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry (one per day)
    Log {
        /// Weight value
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight for a date (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history
    History {
        /// Limit to the last N days
        #[arg(short, long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Save your profile and recompute targets
    Set {
        /// Your name
        #[arg(long)]
        name: String,
        /// Age in years
        #[arg(long)]
        age: i64,
        /// Sex: male or female (used by the BMR formula)
        #[arg(long)]
        sex: String,
        /// Height in cm
        #[arg(long)]
        height: f64,
        /// Weight in kg
        #[arg(long)]
        weight: f64,
        /// Activity: sedentary, light, moderate, active, very_active
        #[arg(long, default_value = "sedentary")]
        activity: String,
        /// Goal: lose, maintain, gain
        #[arg(long, default_value = "maintain")]
        goal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the saved profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set calorie/macro/water goals directly
    Set {
        /// Daily calorie target
        #[arg(long)]
        calories: Option<i64>,
        /// Protein percentage (requires --carbs and --fat, must sum to 100)
        #[arg(long)]
        protein: Option<i64>,
        /// Carbs percentage
        #[arg(long)]
        carbs: Option<i64>,
        /// Fat percentage
        #[arg(long)]
        fat: Option<i64>,
        /// Daily water goal in ml
        #[arg(long)]
        water: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Save a food to favorites
    Add {
        /// Food name
        name: String,
        /// Calories per serving
        calories: f64,
        /// Protein grams
        #[arg(long)]
        protein: Option<f64>,
        /// Carb grams
        #[arg(long)]
        carbs: Option<f64>,
        /// Fat grams
        #[arg(long)]
        fat: Option<f64>,
        /// Serving size in grams
        #[arg(long)]
        serving: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List favorites
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a favorite by name
    Remove {
        /// Food name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Save a recipe (per-portion nutrition plus ingredients)
    Add {
        /// Recipe name
        name: String,
        /// Number of portions the recipe makes
        #[arg(short, long, default_value = "1")]
        portions: f64,
        /// Calories per portion
        #[arg(long)]
        calories: f64,
        /// Protein grams per portion
        #[arg(long)]
        protein: Option<f64>,
        /// Carb grams per portion
        #[arg(long)]
        carbs: Option<f64>,
        /// Fat grams per portion
        #[arg(long)]
        fat: Option<f64>,
        /// Ingredient as 'Name:grams' (repeatable)
        #[arg(long = "ingredient")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a recipe by name
    Remove {
        /// Recipe name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log portions of a recipe to today's journal
    Log {
        /// Recipe name
        name: String,
        /// Portions eaten
        #[arg(short, long, default_value = "1")]
        portions: f64,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "dinner")]
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Save today's entries (optionally one meal) as a template
    Save {
        /// Template name
        name: String,
        /// Only capture one meal: breakfast, lunch, dinner, snack
        #[arg(short, long)]
        meal: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List templates
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a template's entries to today's journal
    Log {
        /// Template name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a template by name
    Remove {
        /// Template name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Sign in and reconcile with the cloud
    Login {
        /// Your user id on the sync server
        user_id: String,
        /// Sync server URL (e.g. http://localhost:8080)
        #[arg(long)]
        server: String,
        /// Server API key, if it requires one
        #[arg(long)]
        api_key: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign out (local data stays)
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sign-in state and last sync time
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all cloud data and sign out
    Delete {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Push the whole local snapshot to the cloud (manual retry)
    Push {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pull cloud data onto this device
    Pull {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    // `serve` is the cloud side; it does not touch the tracker database.
    if let Commands::Serve { port, bind, no_auth } = &cli.command {
        let api_key = if *no_auth {
            None
        } else {
            let (key, new) = config.load_or_create_api_key()?;
            if new {
                eprintln!("Generated new API key: {key}");
                eprintln!("Clients sign in with: nosh account login <user> --server <url> --api-key {key}");
            }
            Some(key)
        };
        let db = server::DocDb::open(&config.cloud_db_path())?;
        return server::start_server(db, *port, bind, api_key).await;
    }

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let account = config.load_account()?;
    let remote: Option<Arc<dyn RemoteStore>> = account.as_ref().map(|a| {
        Arc::new(cloud::CloudClient::new(&a.server_url, a.api_key.clone()))
            as Arc<dyn RemoteStore>
    });
    let engine = Arc::new(SyncEngine::new(remote, store.clone(), store.clone()));
    let session = account
        .as_ref()
        .map(|a| SyncSession::new(engine.clone(), a.user_id.clone()));
    let session = session.as_ref();

    match cli.command {
        Commands::Log {
            food,
            calories,
            protein,
            carbs,
            fat,
            serving,
            meal,
            json,
        } => {
            cmd_log(
                &store, session, &food, calories, protein, carbs, fat, serving, &meal, json,
            )
            .await
        }
        Commands::Water { ml, json } => cmd_water(&store, session, ml, json).await,
        Commands::Exercise {
            name,
            calories,
            duration,
            json,
        } => cmd_exercise(&store, session, &name, calories, duration, json).await,
        Commands::Summary { json } => cmd_summary(&store, json),
        Commands::History { days, json } => cmd_history(&store, days, json),
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                date,
                notes,
                json,
            } => cmd_weight_log(&store, session, value, &unit, date, notes, json).await,
            WeightCommands::Show { date, json } => cmd_weight_show(&store, date, json),
            WeightCommands::History { days, json } => cmd_weight_history(&store, days, json),
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Set {
                name,
                age,
                sex,
                height,
                weight,
                activity,
                goal,
                json,
            } => {
                cmd_profile_set(
                    &store, session, name, age, &sex, height, weight, &activity, &goal, json,
                )
                .await
            }
            ProfileCommands::Show { json } => cmd_profile_show(&store, json),
        },
        Commands::Goal { command } => match command {
            GoalCommands::Set {
                calories,
                protein,
                carbs,
                fat,
                water,
                json,
            } => cmd_goal_set(&store, session, calories, protein, carbs, fat, water, json).await,
            GoalCommands::Show { json } => cmd_goal_show(&store, json),
        },
        Commands::Favorite { command } => match command {
            FavoriteCommands::Add {
                name,
                calories,
                protein,
                carbs,
                fat,
                serving,
                json,
            } => {
                cmd_favorite_add(
                    &store, session, &name, calories, protein, carbs, fat, serving, json,
                )
                .await
            }
            FavoriteCommands::List { json } => cmd_favorite_list(&store, json),
            FavoriteCommands::Remove { name, json } => {
                cmd_favorite_remove(&store, session, &name, json).await
            }
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Add {
                name,
                portions,
                calories,
                protein,
                carbs,
                fat,
                ingredients,
                json,
            } => {
                cmd_recipe_add(
                    &store, session, &name, portions, calories, protein, carbs, fat, ingredients,
                    json,
                )
                .await
            }
            RecipeCommands::List { json } => cmd_recipe_list(&store, json).await,
            RecipeCommands::Remove { name, json } => {
                cmd_recipe_remove(&store, session, &name, json).await
            }
            RecipeCommands::Log {
                name,
                portions,
                meal,
                json,
            } => cmd_recipe_log(&store, session, &name, portions, &meal, json).await,
        },
        Commands::Template { command } => match command {
            TemplateCommands::Save { name, meal, json } => {
                cmd_template_save(&store, session, &name, meal, json).await
            }
            TemplateCommands::List { json } => cmd_template_list(&store, json).await,
            TemplateCommands::Log { name, json } => {
                cmd_template_log(&store, session, &name, json).await
            }
            TemplateCommands::Remove { name, json } => {
                cmd_template_remove(&store, session, &name, json).await
            }
        },
        Commands::Account { command } => match command {
            AccountCommands::Login {
                user_id,
                server,
                api_key,
                json,
            } => cmd_login(&config, &store, &user_id, &server, api_key, json).await,
            AccountCommands::Logout { json } => cmd_logout(&config, json),
            AccountCommands::Status { json } => cmd_account_status(&config, &store, json),
            AccountCommands::Delete { yes, json } => {
                cmd_account_delete(&config, &engine, yes, json).await
            }
        },
        Commands::Sync { command } => match command {
            SyncCommands::Push { json } => cmd_sync_push(&config, &engine, json).await,
            SyncCommands::Pull { json } => cmd_sync_pull(&config, &store, &engine, json).await,
            SyncCommands::Status { json } => cmd_sync_status(&config, &store, json),
        },
        // Handled before the tracker database was opened
        Commands::Serve { .. } => Ok(()),
    }
}
