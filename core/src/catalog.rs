//! The fixed mapping between logical record types, their cloud document
//! locations, and the local slots they are built from.

use std::fmt;

/// One logical category of synced data. Every variant maps to exactly one
/// cloud document per user; most map to exactly one local slot (`Profile` is
/// a composite of five, `Recipes`/`Templates` live in their own collections).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Profile,
    FoodLog,
    History,
    FoodHistory,
    Favorites,
    RecentFoods,
    WeightLog,
    StreakData,
    Recipes,
    Templates,
}

/// Wire shape of a record type's cloud document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocShape {
    /// `{ ...fields, updatedAt }`
    Scalar,
    /// `{ items: [...], updatedAt }`
    List,
    /// `{ [isoDate]: { entries, exercise, water }, updatedAt }`
    DateKeyed,
}

impl RecordType {
    pub const ALL: [RecordType; 10] = [
        RecordType::Profile,
        RecordType::FoodLog,
        RecordType::History,
        RecordType::FoodHistory,
        RecordType::Favorites,
        RecordType::RecentFoods,
        RecordType::WeightLog,
        RecordType::StreakData,
        RecordType::Recipes,
        RecordType::Templates,
    ];

    /// The record types written in one atomic batch by a bulk upload.
    /// Recipes and templates are excluded: they live in separate local
    /// collections and sync best-effort on their own path.
    pub const BATCHED: [RecordType; 8] = [
        RecordType::Profile,
        RecordType::FoodLog,
        RecordType::History,
        RecordType::FoodHistory,
        RecordType::Favorites,
        RecordType::RecentFoods,
        RecordType::WeightLog,
        RecordType::StreakData,
    ];

    /// Cloud document id, also the tag used by single-record pushes.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            RecordType::Profile => "profile",
            RecordType::FoodLog => "foodLog",
            RecordType::History => "history",
            RecordType::FoodHistory => "foodHistory",
            RecordType::Favorites => "favorites",
            RecordType::RecentFoods => "recentFoods",
            RecordType::WeightLog => "weightLog",
            RecordType::StreakData => "streakData",
            RecordType::Recipes => "recipes",
            RecordType::Templates => "templates",
        }
    }

    /// Inverse of [`tag`](Self::tag). Tags not in the catalog return `None`;
    /// callers treat that as "not synced" rather than an error.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.tag() == tag)
    }

    #[must_use]
    pub fn shape(self) -> DocShape {
        match self {
            RecordType::Profile
            | RecordType::History
            | RecordType::FoodHistory
            | RecordType::StreakData => DocShape::Scalar,
            RecordType::FoodLog => DocShape::DateKeyed,
            RecordType::Favorites
            | RecordType::RecentFoods
            | RecordType::WeightLog
            | RecordType::Recipes
            | RecordType::Templates => DocShape::List,
        }
    }

    /// The single local slot backing this record type, when there is one.
    #[must_use]
    pub fn slot(self) -> Option<Slot> {
        match self {
            RecordType::FoodLog => Some(Slot::TodayLog),
            RecordType::History => Some(Slot::History),
            RecordType::FoodHistory => Some(Slot::FoodHistory),
            RecordType::Favorites => Some(Slot::Favorites),
            RecordType::RecentFoods => Some(Slot::RecentFoods),
            RecordType::WeightLog => Some(Slot::WeightLog),
            RecordType::StreakData => Some(Slot::StreakData),
            RecordType::Profile | RecordType::Recipes | RecordType::Templates => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Named local-store slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    UserProfile,
    DailyTarget,
    MacroGoals,
    MicronutrientGoals,
    Preferences,
    OnboardingComplete,
    TodayLog,
    History,
    FoodHistory,
    Favorites,
    RecentFoods,
    WeightLog,
    StreakData,
    LastSyncedAt,
}

impl Slot {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Slot::UserProfile => "userProfile",
            Slot::DailyTarget => "dailyTarget",
            Slot::MacroGoals => "macroGoals",
            Slot::MicronutrientGoals => "micronutrientGoals",
            Slot::Preferences => "preferences",
            Slot::OnboardingComplete => "onboardingComplete",
            Slot::TodayLog => "todayLog",
            Slot::History => "history",
            Slot::FoodHistory => "foodHistory",
            Slot::Favorites => "favorites",
            Slot::RecentFoods => "recentFoods",
            Slot::WeightLog => "weightLog",
            Slot::StreakData => "streakData",
            Slot::LastSyncedAt => "lastSyncedAt",
        }
    }
}

/// The five slots merged into the cloud `profile` document. Slot key doubles
/// as the field name inside the document.
pub const PROFILE_SLOTS: [Slot; 5] = [
    Slot::UserProfile,
    Slot::DailyTarget,
    Slot::MacroGoals,
    Slot::MicronutrientGoals,
    Slot::Preferences,
];

/// Address of one cloud document: `users/{userId}/{collection}/{docId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub user_id: String,
    pub collection: String,
    pub doc_id: String,
}

impl DocPath {
    /// The document for a record type under the user's `data` collection.
    #[must_use]
    pub fn record(user_id: &str, ty: RecordType) -> Self {
        Self {
            user_id: user_id.to_string(),
            collection: "data".to_string(),
            doc_id: ty.tag().to_string(),
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        format!("users/{}/{}/{}", self.user_id, self.collection, self.doc_id)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for ty in RecordType::ALL {
            assert_eq!(RecordType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(RecordType::from_tag("waterIntake"), None);
        assert_eq!(RecordType::from_tag(""), None);
    }

    #[test]
    fn test_batched_excludes_collections() {
        assert!(!RecordType::BATCHED.contains(&RecordType::Recipes));
        assert!(!RecordType::BATCHED.contains(&RecordType::Templates));
        assert_eq!(RecordType::BATCHED.len(), RecordType::ALL.len() - 2);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(RecordType::Profile.shape(), DocShape::Scalar);
        assert_eq!(RecordType::FoodLog.shape(), DocShape::DateKeyed);
        assert_eq!(RecordType::WeightLog.shape(), DocShape::List);
        assert_eq!(RecordType::Recipes.shape(), DocShape::List);
    }

    #[test]
    fn test_doc_path_layout() {
        let path = DocPath::record("u1", RecordType::FoodLog);
        assert_eq!(path.path(), "users/u1/data/foodLog");
        assert_eq!(path.to_string(), "users/u1/data/foodLog");
    }

    #[test]
    fn test_composite_and_collection_types_have_no_slot() {
        assert!(RecordType::Profile.slot().is_none());
        assert!(RecordType::Recipes.slot().is_none());
        assert!(RecordType::Templates.slot().is_none());
        assert_eq!(RecordType::History.slot(), Some(Slot::History));
    }
}
