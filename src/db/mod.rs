//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const PROVIDER_TOKENS: &str = "provider_tokens";
    /// Mission catalog (admin-managed templates).
    pub const MISSIONS: &str = "missions";
    /// One marker document per user per day; guards daily selection.
    pub const MISSION_DAYS: &str = "mission_days";
    pub const MISSION_ASSIGNMENTS: &str = "mission_assignments";
    pub const COOLDOWNS: &str = "cooldowns";
    /// Append-only reward history (keyed for chronological ordering).
    pub const REWARD_LOG: &str = "reward_log";
    pub const SHOP_ITEMS: &str = "shop_items";
    pub const INVENTORY: &str = "inventory";
    pub const ACHIEVEMENTS: &str = "achievements";
    pub const USER_ACHIEVEMENTS: &str = "user_achievements";
}
