//! Calorie/macro target math, applied when a profile is saved.

use anyhow::{Result, bail};

use crate::models::{MacroGoals, UserProfile};

/// Floor below which a computed calorie target is never pushed.
pub const MIN_CALORIE_TARGET: i64 = 1200;

/// Default macro split (protein/carbs/fat percent) when the user has not
/// chosen one.
pub const DEFAULT_MACRO_SPLIT: (i64, i64, i64) = (30, 40, 30);

/// Basal metabolic rate, Mifflin-St Jeor.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bmr(sex: &str, weight_kg: f64, height_cm: f64, age: i64) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * age as f64;
    if sex == "female" { base - 161.0 } else { base + 5.0 }
}

/// Total daily energy expenditure multiplier per activity level.
#[must_use]
pub fn activity_multiplier(level: &str) -> f64 {
    match level {
        "light" => 1.375,
        "moderate" => 1.55,
        "active" => 1.725,
        "very_active" => 1.9,
        _ => 1.2, // sedentary
    }
}

/// Daily calorie target for a profile: TDEE adjusted for the goal
/// (lose -500, gain +300), floored at [`MIN_CALORIE_TARGET`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn daily_calorie_target(profile: &UserProfile) -> i64 {
    let tdee = bmr(&profile.sex, profile.weight_kg, profile.height_cm, profile.age)
        * activity_multiplier(&profile.activity_level);
    let adjusted = match profile.goal.as_str() {
        "lose" => tdee - 500.0,
        "gain" => tdee + 300.0,
        _ => tdee,
    };
    (adjusted.round() as i64).max(MIN_CALORIE_TARGET)
}

pub fn validate_macro_split(protein: i64, carbs: i64, fat: i64) -> Result<()> {
    if protein < 0 || carbs < 0 || fat < 0 {
        bail!("Macro percentages must be non-negative");
    }
    let sum = protein + carbs + fat;
    if sum != 100 {
        bail!("Macro percentages must sum to 100 (got {sum})");
    }
    Ok(())
}

/// Gram targets from a calorie target and a percentage split
/// (4 kcal/g protein and carbs, 9 kcal/g fat).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn macro_goals(calories: i64, protein_pct: i64, carbs_pct: i64, fat_pct: i64) -> MacroGoals {
    let cal = calories as f64;
    MacroGoals {
        protein_g: cal * protein_pct as f64 / 100.0 / 4.0,
        carbs_g: cal * carbs_pct as f64 / 100.0 / 4.0,
        fat_g: cal * fat_pct as f64 / 100.0 / 9.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(sex: &str, goal: &str, activity: &str) -> UserProfile {
        UserProfile {
            name: "Test".to_string(),
            age: 30,
            sex: sex.to_string(),
            height_cm: 175.0,
            weight_kg: 70.0,
            activity_level: activity.to_string(),
            goal: goal.to_string(),
        }
    }

    #[test]
    fn test_bmr_male_female_offset() {
        let m = bmr("male", 70.0, 175.0, 30);
        let f = bmr("female", 70.0, 175.0, 30);
        // 10*70 + 6.25*175 - 5*30 = 1643.75
        assert!((m - 1648.75).abs() < 0.01);
        assert!((f - 1482.75).abs() < 0.01);
    }

    #[test]
    fn test_daily_target_maintain() {
        let mut p = profile("male", "maintain", "sedentary");
        p.height_cm = 180.0;
        // bmr = 700 + 1125 - 150 + 5 = 1680; * 1.2 = 2016
        assert_eq!(daily_calorie_target(&p), 2016);
    }

    #[test]
    fn test_daily_target_goal_adjustment() {
        let maintain = daily_calorie_target(&profile("male", "maintain", "moderate"));
        let lose = daily_calorie_target(&profile("male", "lose", "moderate"));
        let gain = daily_calorie_target(&profile("male", "gain", "moderate"));
        assert_eq!(maintain - lose, 500);
        assert_eq!(gain - maintain, 300);
    }

    #[test]
    fn test_daily_target_floor() {
        let mut p = profile("female", "lose", "sedentary");
        p.age = 80;
        p.weight_kg = 40.0;
        p.height_cm = 150.0;
        assert_eq!(daily_calorie_target(&p), MIN_CALORIE_TARGET);
    }

    #[test]
    fn test_validate_macro_split() {
        assert!(validate_macro_split(30, 40, 30).is_ok());
        assert!(validate_macro_split(100, 0, 0).is_ok());
        assert!(validate_macro_split(40, 30, 20).is_err());
        assert!(validate_macro_split(-10, 60, 50).is_err());
    }

    #[test]
    fn test_macro_goals_grams() {
        let g = macro_goals(2000, 30, 40, 30);
        assert!((g.protein_g - 150.0).abs() < 0.01);
        assert!((g.carbs_g - 200.0).abs() < 0.01);
        assert!((g.fat_g - 66.666).abs() < 0.01);
    }
}
