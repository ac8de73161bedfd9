//! Pure repair pass over a progress record.
//!
//! Validation never fails: every out-of-bound field is clamped to its
//! nearest bound (or reset to a fixed fallback, for `max_energy` and
//! `experience_to_next`) and each correction is reported as an [`Issue`]
//! tag. Running the pass twice yields the same record and no issues;
//! that idempotence is what lets two tabs converge after racing writes
//! without any locking.

use std::fmt;

use crate::progress::{
    ProgressRecord, ENERGY_FALLBACK, GEM_ANOMALY_LIMIT, MAX_DIVINE_POINTS, MAX_MINING_EXPERIENCE,
    MAX_MINING_LEVEL, MAX_POINTS_PER_SECOND, MIN_MAX_ENERGY, MIN_MINING_COMBO, MIN_MINING_LEVEL,
    MIN_XP_TO_NEXT, XP_TO_NEXT_FALLBACK,
};

/// A single field-rule violation, named `<field>_<violation>`.
///
/// The order of appearance in the issue list follows the fixed field order:
/// points → pointsPerSecond → currentEnergy → maxEnergy → miningLevel →
/// miningExperience → miningCombo → miningStreak → experienceToNext.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Issue {
    DivinePointsNegative,
    DivinePointsTooHigh,
    PointsPerSecondNegative,
    PointsPerSecondTooHigh,
    CurrentEnergyNegative,
    CurrentEnergyExceedsMax,
    MaxEnergyTooLow,
    MiningLevelTooLow,
    MiningLevelTooHigh,
    MiningExperienceNegative,
    MiningExperienceTooHigh,
    MiningComboTooLow,
    MiningStreakNegative,
    ExperienceToNextTooLow,
}

impl Issue {
    /// Stable diagnostic tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Issue::DivinePointsNegative => "divinePoints_negative",
            Issue::DivinePointsTooHigh => "divinePoints_too_high",
            Issue::PointsPerSecondNegative => "pointsPerSecond_negative",
            Issue::PointsPerSecondTooHigh => "pointsPerSecond_too_high",
            Issue::CurrentEnergyNegative => "currentEnergy_negative",
            Issue::CurrentEnergyExceedsMax => "currentEnergy_exceeds_max",
            Issue::MaxEnergyTooLow => "maxEnergy_too_low",
            Issue::MiningLevelTooLow => "miningLevel_too_low",
            Issue::MiningLevelTooHigh => "miningLevel_too_high",
            Issue::MiningExperienceNegative => "miningExperience_negative",
            Issue::MiningExperienceTooHigh => "miningExperience_too_high",
            Issue::MiningComboTooLow => "miningCombo_too_low",
            Issue::MiningStreakNegative => "miningStreak_negative",
            Issue::ExperienceToNextTooLow => "experienceToNext_too_low",
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Inspect `record` and return a fully-bounded copy plus the violations
/// found, in field order.
///
/// The corrected record is always finite in every float field, so it
/// survives a storage round trip unchanged. The energy cap is checked
/// against the *corrected* `max_energy`, but the energy issue is still
/// reported in the energy slot of the order above.
pub fn validate(record: &ProgressRecord) -> (ProgressRecord, Vec<Issue>) {
    let mut fixed = record.clone();
    let mut issues = Vec::new();

    // max_energy is corrected up front so the energy cap below reflects the
    // corrected ceiling. Non-finite values count as corrupt and reset too.
    let max_energy_ok = record.max_energy.is_finite() && record.max_energy >= MIN_MAX_ENERGY;
    if !max_energy_ok {
        fixed.max_energy = ENERGY_FALLBACK;
    }

    // divinePoints
    if !(record.divine_points >= 0.0) {
        // negated comparison also catches NaN
        fixed.divine_points = 0.0;
        issues.push(Issue::DivinePointsNegative);
    } else if record.divine_points > MAX_DIVINE_POINTS {
        fixed.divine_points = MAX_DIVINE_POINTS;
        issues.push(Issue::DivinePointsTooHigh);
    }

    // pointsPerSecond
    if !(record.points_per_second >= 0.0) {
        fixed.points_per_second = 0.0;
        issues.push(Issue::PointsPerSecondNegative);
    } else if record.points_per_second > MAX_POINTS_PER_SECOND {
        fixed.points_per_second = MAX_POINTS_PER_SECOND;
        issues.push(Issue::PointsPerSecondTooHigh);
    }

    // currentEnergy, against the corrected ceiling
    if !(record.current_energy >= 0.0) {
        fixed.current_energy = 0.0;
        issues.push(Issue::CurrentEnergyNegative);
    } else if record.current_energy > fixed.max_energy {
        fixed.current_energy = fixed.max_energy;
        issues.push(Issue::CurrentEnergyExceedsMax);
    }

    // maxEnergy issue reported here, in field order
    if !max_energy_ok {
        issues.push(Issue::MaxEnergyTooLow);
    }

    // miningLevel
    if record.mining_level < MIN_MINING_LEVEL {
        fixed.mining_level = MIN_MINING_LEVEL;
        issues.push(Issue::MiningLevelTooLow);
    } else if record.mining_level > MAX_MINING_LEVEL {
        fixed.mining_level = MAX_MINING_LEVEL;
        issues.push(Issue::MiningLevelTooHigh);
    }

    // miningExperience
    if !(record.mining_experience >= 0.0) {
        fixed.mining_experience = 0.0;
        issues.push(Issue::MiningExperienceNegative);
    } else if record.mining_experience > MAX_MINING_EXPERIENCE {
        fixed.mining_experience = MAX_MINING_EXPERIENCE;
        issues.push(Issue::MiningExperienceTooHigh);
    }

    // miningCombo: lower bound only, but +inf must not leak into storage
    if !(record.mining_combo >= MIN_MINING_COMBO) || !record.mining_combo.is_finite() {
        fixed.mining_combo = MIN_MINING_COMBO;
        issues.push(Issue::MiningComboTooLow);
    }

    // miningStreak
    if record.mining_streak < 0 {
        fixed.mining_streak = 0;
        issues.push(Issue::MiningStreakNegative);
    }

    // experienceToNext: resets to the fallback, same policy as maxEnergy
    if !record.experience_to_next.is_finite() || record.experience_to_next < MIN_XP_TO_NEXT {
        fixed.experience_to_next = XP_TO_NEXT_FALLBACK;
        issues.push(Issue::ExperienceToNextTooLow);
    }

    (fixed, issues)
}

/// Flag raised by the gem-counter check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GemFlag {
    Negative,
    Anomalous,
}

impl GemFlag {
    pub fn tag(&self) -> &'static str {
        match self {
            GemFlag::Negative => "gems_negative",
            GemFlag::Anomalous => "gems_anomalous",
        }
    }
}

impl fmt::Display for GemFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Repair/flag pass for the gem counter.
///
/// Negative counts floor to zero. Counts above [`GEM_ANOMALY_LIMIT`] are
/// flagged but kept as-is — never clamped, unlike the progress fields.
pub fn check_gems(gems: i64) -> (i64, Vec<GemFlag>) {
    let mut flags = Vec::new();
    let mut fixed = gems;
    if gems < 0 {
        fixed = 0;
        flags.push(GemFlag::Negative);
    } else if gems > GEM_ANOMALY_LIMIT {
        flags.push(GemFlag::Anomalous);
    }
    (fixed, flags)
}
