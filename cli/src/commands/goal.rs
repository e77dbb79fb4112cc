use anyhow::{Result, bail};
use serde_json::json;

use nosh_core::calc;
use nosh_core::catalog::Slot;
use nosh_core::models::{
    DailyTarget, MacroGoals, MicronutrientGoals, Preferences, UserProfile,
    validate_activity_level, validate_goal, validate_sex,
};
use nosh_core::session::SyncSession;
use nosh_core::store::{LocalStore, SqliteStore, get_as, set_json};

use super::push_profile;

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_profile_set(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    name: String,
    age: i64,
    sex: &str,
    height_cm: f64,
    weight_kg: f64,
    activity: &str,
    goal: &str,
    json: bool,
) -> Result<()> {
    if !(1..=120).contains(&age) {
        bail!("Age must be between 1 and 120");
    }
    if height_cm <= 0.0 || weight_kg <= 0.0 {
        bail!("Height and weight must be greater than 0");
    }

    let profile = UserProfile {
        name,
        age,
        sex: validate_sex(sex)?,
        height_cm,
        weight_kg,
        activity_level: validate_activity_level(activity)?,
        goal: validate_goal(goal)?,
    };

    let calories = calc::daily_calorie_target(&profile);
    let (p, c, f) = calc::DEFAULT_MACRO_SPLIT;
    let macros = calc::macro_goals(calories, p, c, f);

    set_json(store, Slot::UserProfile, &profile);
    set_json(store, Slot::DailyTarget, &DailyTarget { calories });
    set_json(store, Slot::MacroGoals, &macros);
    if store.get(Slot::MicronutrientGoals).is_null() {
        set_json(
            store,
            Slot::MicronutrientGoals,
            &MicronutrientGoals {
                fiber_g: 30.0,
                sugar_g: 50.0,
                sodium_mg: 2300.0,
            },
        );
    }
    if store.get(Slot::Preferences).is_null() {
        set_json(store, Slot::Preferences, &Preferences::default());
    }
    store.set(Slot::OnboardingComplete, &json!(true));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "profile": profile,
                "daily_target": calories,
                "macro_goals": macros,
            }))?
        );
    } else {
        println!("Profile saved for {}.", profile.name);
        println!(
            "Daily target: {calories} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
            macros.protein_g, macros.carbs_g, macros.fat_g
        );
    }

    push_profile(session).await;
    Ok(())
}

pub(crate) fn cmd_profile_show(store: &SqliteStore, json: bool) -> Result<()> {
    let raw = store.get(Slot::UserProfile);
    if raw.is_null() {
        eprintln!("No profile yet. Use `nosh profile set` to create one.");
        return Ok(());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&raw)?);
        return Ok(());
    }
    let profile: UserProfile = serde_json::from_value(raw)?;
    println!("{} — {} y, {}", profile.name, profile.age, profile.sex);
    println!(
        "  {:.0} cm, {:.1} kg, {} activity, goal: {}",
        profile.height_cm, profile.weight_kg, profile.activity_level, profile.goal
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_goal_set(
    store: &SqliteStore,
    session: Option<&SyncSession>,
    calories: Option<i64>,
    protein: Option<i64>,
    carbs: Option<i64>,
    fat: Option<i64>,
    water_ml: Option<i64>,
    json: bool,
) -> Result<()> {
    if calories.is_none() && protein.is_none() && water_ml.is_none() {
        bail!("Nothing to set. Pass --calories, a macro split, or --water");
    }

    let mut target: DailyTarget = get_as(store, Slot::DailyTarget);
    if let Some(calories) = calories {
        if calories <= 0 {
            bail!("Calorie target must be greater than 0");
        }
        target.calories = calories;
        set_json(store, Slot::DailyTarget, &target);
    }

    match (protein, carbs, fat) {
        (None, None, None) => {}
        (Some(p), Some(c), Some(f)) => {
            calc::validate_macro_split(p, c, f)?;
            if target.calories <= 0 {
                bail!("Set a calorie target before a macro split");
            }
            let macros = calc::macro_goals(target.calories, p, c, f);
            set_json(store, Slot::MacroGoals, &macros);
        }
        _ => bail!(
            "If setting macro percentages, all three (--protein, --carbs, --fat) must be provided"
        ),
    }

    if let Some(ml) = water_ml {
        if ml <= 0 {
            bail!("Water goal must be greater than 0 ml");
        }
        let mut prefs: Preferences = get_as(store, Slot::Preferences);
        prefs.water_goal_ml = ml;
        set_json(store, Slot::Preferences, &prefs);
    }

    if json {
        let macros: MacroGoals = get_as(store, Slot::MacroGoals);
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "target": target, "macro_goals": macros }))?
        );
    } else {
        println!("Goals updated.");
    }

    push_profile(session).await;
    Ok(())
}

pub(crate) fn cmd_goal_show(store: &SqliteStore, json: bool) -> Result<()> {
    let target: DailyTarget = get_as(store, Slot::DailyTarget);
    let macros: MacroGoals = get_as(store, Slot::MacroGoals);
    let prefs: Preferences = get_as(store, Slot::Preferences);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "target": target,
                "macro_goals": macros,
                "preferences": prefs,
            }))?
        );
        return Ok(());
    }

    if target.calories == 0 {
        eprintln!("No goals yet. Use `nosh profile set` or `nosh goal set`.");
        return Ok(());
    }
    println!("Daily target: {} kcal", target.calories);
    println!(
        "Macros: P:{:.0}g C:{:.0}g F:{:.0}g",
        macros.protein_g, macros.carbs_g, macros.fat_g
    );
    println!("Water goal: {} ml", prefs.water_goal_ml);
    Ok(())
}
