//! Discrete quality tiers and the day thresholds that grade aged products.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Quality grade of a product, from worst to best.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum QualityCategory {
    Awful = 0,
    Poor = 1,
    #[default]
    Normal = 2,
    Good = 3,
    Excellent = 4,
    Masterwork = 5,
    Legendary = 6,
}

impl QualityCategory {
    /// All tiers in ascending order.
    pub const ALL: [QualityCategory; 7] = [
        QualityCategory::Awful,
        QualityCategory::Poor,
        QualityCategory::Normal,
        QualityCategory::Good,
        QualityCategory::Excellent,
        QualityCategory::Masterwork,
        QualityCategory::Legendary,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Decode a persisted ordinal. Unknown values fall back to `Normal`.
    pub fn from_ordinal(v: u8) -> Self {
        match Self::ALL.get(v as usize) {
            Some(q) => *q,
            None => {
                tracing::warn!(ordinal = v, "unknown quality ordinal, using Normal");
                QualityCategory::Normal
            }
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityCategory::Awful => "awful",
            QualityCategory::Poor => "poor",
            QualityCategory::Normal => "normal",
            QualityCategory::Good => "good",
            QualityCategory::Excellent => "excellent",
            QualityCategory::Masterwork => "masterwork",
            QualityCategory::Legendary => "legendary",
        }
    }
}

/// Days of aging needed for each quality tier, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityThresholds {
    days: [Fixed64; 7],
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self::new([
            Fixed64::ONE,
            Fixed64::ZERO,
            Fixed64::ZERO,
            Fixed64::ZERO,
            Fixed64::ZERO,
            Fixed64::ZERO,
            Fixed64::ZERO,
        ])
    }
}

impl QualityThresholds {
    pub fn new(days: [Fixed64; 7]) -> Self {
        Self { days }
    }

    /// Day threshold for a single tier.
    pub fn days_for(&self, quality: QualityCategory) -> Fixed64 {
        self.days[quality.index()]
    }

    pub fn as_array(&self) -> [Fixed64; 7] {
        self.days
    }

    /// Whether each threshold is at least the one before it.
    pub fn is_non_decreasing(&self) -> bool {
        self.days.windows(2).all(|w| w[0] <= w[1])
    }

    /// The highest tier whose threshold has been reached after `days` of
    /// aging, or `None` while still below the lowest threshold.
    ///
    /// A tier counts as reached only once every lower threshold has been
    /// passed too, so the result never decreases as `days` grows even when
    /// thresholds are misconfigured.
    pub fn quality_for_days(&self, days: Fixed64) -> Option<QualityCategory> {
        let reached = self.days.iter().take_while(|d| **d <= days).count();
        reached
            .checked_sub(1)
            .map(|i| QualityCategory::ALL[i])
    }
}
