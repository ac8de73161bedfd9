/// Progress record definitions and field bounds.
use serde::{Deserialize, Serialize};

/// Ceiling for accumulated points.
pub const MAX_DIVINE_POINTS: f64 = 999_999_999.0;
/// Ceiling for the passive earning rate.
pub const MAX_POINTS_PER_SECOND: f64 = 1_000_000.0;
/// Smallest `max_energy` that is considered sane.
pub const MIN_MAX_ENERGY: f64 = 100.0;
/// `max_energy` below [`MIN_MAX_ENERGY`] resets to this, not to the nearest bound.
pub const ENERGY_FALLBACK: f64 = 1000.0;
pub const MIN_MINING_LEVEL: i32 = 1;
pub const MAX_MINING_LEVEL: i32 = 100;
pub const MAX_MINING_EXPERIENCE: f64 = 999_999_999.0;
pub const MIN_MINING_COMBO: f64 = 1.0;
/// Smallest experience-to-next-level that is considered sane.
pub const MIN_XP_TO_NEXT: f64 = 100.0;
/// `experience_to_next` below [`MIN_XP_TO_NEXT`] resets to this.
pub const XP_TO_NEXT_FALLBACK: f64 = 1000.0;

/// Gem counts above this are flagged as anomalous but never clamped.
pub const GEM_ANOMALY_LIMIT: i64 = 1_000_000;
/// Base storage key of the gem counter (kept outside the progress record).
pub const GEMS_BASE_KEY: &str = "gems";

/// The nine persisted progress fields, in validation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressField {
    DivinePoints,
    PointsPerSecond,
    CurrentEnergy,
    MaxEnergy,
    MiningLevel,
    MiningExperience,
    MiningCombo,
    MiningStreak,
    ExperienceToNext,
}

impl ProgressField {
    /// All fields in validation (and storage) order.
    pub fn all() -> &'static [ProgressField] {
        &[
            ProgressField::DivinePoints,
            ProgressField::PointsPerSecond,
            ProgressField::CurrentEnergy,
            ProgressField::MaxEnergy,
            ProgressField::MiningLevel,
            ProgressField::MiningExperience,
            ProgressField::MiningCombo,
            ProgressField::MiningStreak,
            ProgressField::ExperienceToNext,
        ]
    }

    /// Base storage key. The per-user key is `"<base>_<userId>"`.
    pub fn base_key(&self) -> &'static str {
        match self {
            ProgressField::DivinePoints => "divinePoints",
            ProgressField::PointsPerSecond => "pointsPerSecond",
            ProgressField::CurrentEnergy => "currentEnergy",
            ProgressField::MaxEnergy => "maxEnergy",
            ProgressField::MiningLevel => "miningLevel",
            ProgressField::MiningExperience => "miningExperience",
            ProgressField::MiningCombo => "miningCombo",
            ProgressField::MiningStreak => "miningStreak",
            ProgressField::ExperienceToNext => "miningExperienceToNext",
        }
    }

    /// Whether the field is integral (encoded without a fractional part).
    pub fn is_integral(&self) -> bool {
        matches!(self, ProgressField::MiningLevel | ProgressField::MiningStreak)
    }
}

/// One user's locally cached game progress.
///
/// Integral fields are signed so that out-of-range stored values survive
/// decoding and reach the validator instead of being lost in a cast.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressRecord {
    pub divine_points: f64,
    pub points_per_second: f64,
    pub current_energy: f64,
    pub max_energy: f64,
    pub mining_level: i32,
    pub mining_experience: f64,
    pub mining_combo: f64,
    pub mining_streak: i32,
    pub experience_to_next: f64,
}

impl Default for ProgressRecord {
    /// First-session defaults.
    fn default() -> Self {
        Self {
            divine_points: 0.0,
            points_per_second: 0.0,
            current_energy: ENERGY_FALLBACK,
            max_energy: ENERGY_FALLBACK,
            mining_level: MIN_MINING_LEVEL,
            mining_experience: 0.0,
            mining_combo: MIN_MINING_COMBO,
            mining_streak: 0,
            experience_to_next: XP_TO_NEXT_FALLBACK,
        }
    }
}

impl ProgressRecord {
    /// Read a field as `f64` (integral fields widen losslessly).
    pub fn get(&self, field: ProgressField) -> f64 {
        match field {
            ProgressField::DivinePoints => self.divine_points,
            ProgressField::PointsPerSecond => self.points_per_second,
            ProgressField::CurrentEnergy => self.current_energy,
            ProgressField::MaxEnergy => self.max_energy,
            ProgressField::MiningLevel => self.mining_level as f64,
            ProgressField::MiningExperience => self.mining_experience,
            ProgressField::MiningCombo => self.mining_combo,
            ProgressField::MiningStreak => self.mining_streak as f64,
            ProgressField::ExperienceToNext => self.experience_to_next,
        }
    }

    /// Write a field from `f64`. Integral fields truncate toward zero; the
    /// `as` cast saturates at the `i32` range, so extreme inputs stay
    /// extreme rather than wrapping.
    pub fn set(&mut self, field: ProgressField, value: f64) {
        match field {
            ProgressField::DivinePoints => self.divine_points = value,
            ProgressField::PointsPerSecond => self.points_per_second = value,
            ProgressField::CurrentEnergy => self.current_energy = value,
            ProgressField::MaxEnergy => self.max_energy = value,
            ProgressField::MiningLevel => self.mining_level = value as i32,
            ProgressField::MiningExperience => self.mining_experience = value,
            ProgressField::MiningCombo => self.mining_combo = value,
            ProgressField::MiningStreak => self.mining_streak = value as i32,
            ProgressField::ExperienceToNext => self.experience_to_next = value,
        }
    }
}
