//! A single in-flight batch and its per-tick advancement.

use crate::config::WeatherDomains;
use crate::environment::{EnvironmentSample, OperationalGates};
use crate::fixed::{Fixed64, Ticks, round_to_ticks, ticks_to_fixed64};
use crate::id::ProcessId;
use crate::item::{HeldItems, Thing};
use crate::process::{ProcessDefinition, SpeedFactors};
use crate::quality::QualityCategory;
use crate::sim::{TICKS_PER_DAY, TICKS_PER_HOUR};

/// Spoilage divisor in raw fixed-point units: a degree-hour at a rate of
/// one percent, scaled by the 32 fractional bits of one operand.
const RUIN_DIVISOR: u128 = (TICKS_PER_HOUR as u128) * 100 * (1u128 << 32);

/// What changed for one record during an advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStep {
    pub elapsed_added: Ticks,
    pub became_finished: bool,
    pub became_ruined: bool,
}

/// One batch of ingredients fermenting together toward one output.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    process: ProcessId,
    elapsed_ticks: Ticks,
    ruined_percent: Fixed64,
    target_quality: QualityCategory,
    held: HeldItems,
    /// Factors from the most recent advance. Not persisted.
    last_factors: SpeedFactors,
    /// Spoilage below one fixed-point bit, in units of `1 / RUIN_DIVISOR`.
    /// Carried so the total does not depend on how time is sliced.
    ruin_carry: u128,
}

impl ProgressRecord {
    pub fn new(process: ProcessId, target_quality: QualityCategory, item: Thing) -> Self {
        let mut held = HeldItems::new();
        held.push(item);
        Self::from_parts(process, 0, Fixed64::ZERO, target_quality, held)
    }

    /// Rebuild a record from persisted fields.
    pub fn from_parts(
        process: ProcessId,
        elapsed_ticks: Ticks,
        ruined_percent: Fixed64,
        target_quality: QualityCategory,
        held: HeldItems,
    ) -> Self {
        Self {
            process,
            elapsed_ticks,
            ruined_percent: ruined_percent.clamp(Fixed64::ZERO, Fixed64::ONE),
            target_quality,
            held,
            last_factors: SpeedFactors::neutral(),
            ruin_carry: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn process(&self) -> ProcessId {
        self.process
    }

    pub fn elapsed_ticks(&self) -> Ticks {
        self.elapsed_ticks
    }

    pub fn ruined_percent(&self) -> Fixed64 {
        self.ruined_percent
    }

    pub fn held(&self) -> &HeldItems {
        &self.held
    }

    pub fn ingredient_count(&self) -> u32 {
        self.held.total()
    }

    pub fn speed_factors(&self) -> SpeedFactors {
        self.last_factors
    }

    pub fn speed_factor(&self) -> Fixed64 {
        self.last_factors.combined()
    }

    /// Stored target, reported as `Normal` for processes without quality.
    pub fn target_quality(&self, def: &ProcessDefinition) -> QualityCategory {
        if def.uses_quality {
            self.target_quality
        } else {
            QualityCategory::Normal
        }
    }

    /// The raw stored target, as persisted.
    pub fn stored_target_quality(&self) -> QualityCategory {
        self.target_quality
    }

    /// Change the target. Ignored for processes without quality. Returns
    /// whether the target changed.
    pub fn set_target_quality(&mut self, def: &ProcessDefinition, q: QualityCategory) -> bool {
        if !def.uses_quality || self.target_quality == q {
            return false;
        }
        self.target_quality = q;
        true
    }

    // -----------------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------------

    /// Elapsed time in days, exact to the tick for any elapsed count.
    pub fn elapsed_days(&self) -> Fixed64 {
        let whole = Fixed64::saturating_from_num(self.elapsed_ticks / TICKS_PER_DAY);
        let part = Fixed64::from_num(self.elapsed_ticks % TICKS_PER_DAY)
            / Fixed64::from_num(TICKS_PER_DAY);
        whole.saturating_add(part)
    }

    /// Ticks needed to reach the target at full speed.
    pub fn target_ticks(&self, def: &ProcessDefinition) -> Ticks {
        let days = def.target_duration_days(self.target_quality(def));
        round_to_ticks(days.saturating_mul(Fixed64::from_num(TICKS_PER_DAY)))
    }

    /// Completed share of the target duration in `[0, 1]`.
    pub fn progress_fraction(&self, def: &ProcessDefinition) -> Fixed64 {
        let target = self.target_ticks(def);
        if target == 0 {
            return Fixed64::ONE;
        }
        let mut num = self.elapsed_ticks.min(target);
        let mut den = target;
        while den > i32::MAX as u64 {
            num >>= 1;
            den >>= 1;
        }
        Fixed64::from_num(num) / Fixed64::from_num(den)
    }

    pub fn is_finished(&self, def: &ProcessDefinition) -> bool {
        self.elapsed_ticks >= self.target_ticks(def)
    }

    pub fn is_ruined(&self) -> bool {
        self.ruined_percent >= Fixed64::ONE
    }

    /// Highest tier reached so far, `None` below the lowest threshold or
    /// without quality.
    pub fn current_quality(&self, def: &ProcessDefinition) -> Option<QualityCategory> {
        def.quality_for_days(self.elapsed_days())
    }

    pub fn quality_target_reached(&self, def: &ProcessDefinition) -> bool {
        def.uses_quality && self.current_quality(def) >= Some(self.target_quality(def))
    }

    /// Whether the batch may be taken out now.
    pub fn is_extractable(&self, def: &ProcessDefinition) -> bool {
        self.is_finished(def) || self.is_ruined() || self.quality_target_reached(def)
    }

    /// Ticks left at the current target, or -1 while stalled.
    pub fn estimated_ticks_remaining(&self, def: &ProcessDefinition) -> i64 {
        if self.speed_factor() <= Fixed64::ZERO {
            return -1;
        }
        let left = self.target_ticks(def).saturating_sub(self.elapsed_ticks);
        i64::try_from(left).unwrap_or(i64::MAX)
    }

    /// Still heading toward completion at the last sampled speed.
    pub fn running(&self, def: &ProcessDefinition) -> bool {
        !self.is_ruined() && !self.is_finished(def) && self.speed_factor() > Fixed64::ZERO
    }

    pub fn is_slow(&self, threshold: Fixed64) -> bool {
        self.speed_factor() < threshold
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Advance by `ticks` under `sample`.
    ///
    /// Ruined batches are frozen. Closed gates stop elapsed time but not
    /// spoilage.
    pub fn advance(
        &mut self,
        def: &ProcessDefinition,
        ticks: Ticks,
        sample: &EnvironmentSample,
        gates: OperationalGates,
        domains: &WeatherDomains,
    ) -> RecordStep {
        self.last_factors = def.speed_factors(sample, domains);
        let mut step = RecordStep::default();
        if self.is_ruined() || ticks == 0 {
            return step;
        }

        let was_finished = self.is_finished(def);
        let speed = self.last_factors.combined();
        tracing::trace!(
            process = %def.name,
            speed = %speed,
            temperature = %self.last_factors.temperature,
            sun = %self.last_factors.sun,
            rain = %self.last_factors.rain,
            snow = %self.last_factors.snow,
            wind = %self.last_factors.wind,
            "advancing batch"
        );

        if gates.all_open() {
            let added = round_to_ticks(ticks_to_fixed64(ticks).saturating_mul(speed));
            self.elapsed_ticks = self.elapsed_ticks.saturating_add(added);
            step.elapsed_added = added;
        }

        let excess = def.temperature_excess(sample.temperature);
        if excess > Fixed64::ZERO && def.ruined_per_degree_per_hour > Fixed64::ZERO {
            self.accrue_ruin(excess, def.ruined_per_degree_per_hour, ticks);
            if self.is_ruined() {
                step.became_ruined = true;
                tracing::debug!(process = %def.name, "batch ruined by temperature");
            }
        }

        if !was_finished && !step.became_ruined && self.is_finished(def) {
            step.became_finished = true;
            tracing::debug!(process = %def.name, "batch finished");
        }
        step
    }

    /// Add `excess x rate x ticks / (TICKS_PER_HOUR x 100)` to the ruined
    /// fraction in exact integer arithmetic, clamped at one.
    fn accrue_ruin(&mut self, excess: Fixed64, rate: Fixed64, ticks: Ticks) {
        let one = u128::from(Fixed64::ONE.to_bits().unsigned_abs());
        let numerator = u128::from(excess.to_bits().unsigned_abs())
            * u128::from(rate.to_bits().unsigned_abs());
        let total = numerator
            .checked_mul(u128::from(ticks))
            .and_then(|n| n.checked_add(self.ruin_carry));
        let Some(total) = total else {
            self.ruined_percent = Fixed64::ONE;
            self.ruin_carry = 0;
            return;
        };
        let bits = u128::from(self.ruined_percent.to_bits().unsigned_abs())
            .saturating_add(total / RUIN_DIVISOR);
        if bits >= one {
            self.ruined_percent = Fixed64::ONE;
            self.ruin_carry = 0;
        } else {
            // bits < ONE, so it fits the integer part of the raw value.
            self.ruined_percent = Fixed64::from_bits(bits as i64);
            self.ruin_carry = total % RUIN_DIVISOR;
        }
    }

    /// Add units to this batch, diluting elapsed time by the count-weighted
    /// mean of the existing progress and zero for the newcomers.
    pub fn merge(&mut self, item: Thing) {
        let n = u128::from(self.held.total());
        let c = u128::from(item.stack_count);
        let total = n + c;
        if total > 0 {
            let weighted = u128::from(self.elapsed_ticks) * n;
            // Half away from zero on a non-negative quotient.
            let averaged = (2 * weighted + total) / (2 * total);
            self.elapsed_ticks = Ticks::try_from(averaged).unwrap_or(Ticks::MAX);
        }
        self.held.push(item);
    }

    /// Jump to the target duration.
    pub fn force_finish(&mut self, def: &ProcessDefinition) {
        self.elapsed_ticks = self.elapsed_ticks.max(self.target_ticks(def));
    }

    /// Add elapsed ticks directly, bypassing speed and spoilage.
    pub fn add_elapsed(&mut self, ticks: Ticks) {
        if !self.is_ruined() {
            self.elapsed_ticks = self.elapsed_ticks.saturating_add(ticks);
        }
    }

    #[cfg(test)]
    pub(crate) fn set_ruined_percent(&mut self, v: Fixed64) {
        self.ruined_percent = v.clamp(Fixed64::ZERO, Fixed64::ONE);
    }

    pub(crate) fn take_held(&mut self) -> Vec<Thing> {
        self.held.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;
    use crate::id::{ItemKindId, ThingId};
    use crate::process::TemperatureRange;
    use crate::quality::QualityThresholds;

    fn fx(v: f64) -> Fixed64 {
        f64_to_fixed64(v)
    }

    fn wine() -> ProcessDefinition {
        let mut p = ProcessDefinition::new("wine", ItemKindId(1), [ItemKindId(0)].into_iter().collect());
        p.temperature_safe = TemperatureRange::new(fx(0.0), fx(30.0));
        p.temperature_ideal = TemperatureRange::new(fx(10.0), fx(20.0));
        p.ruined_per_degree_per_hour = fx(5.0);
        p
    }

    fn record(count: u32) -> ProgressRecord {
        ProgressRecord::new(
            ProcessId(0),
            QualityCategory::Normal,
            Thing::new(ThingId(1), ItemKindId(0), count),
        )
    }

    fn ideal() -> EnvironmentSample {
        EnvironmentSample::indoors(fx(15.0))
    }

    fn step(r: &mut ProgressRecord, def: &ProcessDefinition, ticks: Ticks, s: EnvironmentSample) -> RecordStep {
        r.advance(def, ticks, &s, OperationalGates::default(), &WeatherDomains::default())
    }

    #[test]
    fn advances_at_full_speed() {
        let def = wine();
        let mut r = record(10);
        let s = step(&mut r, &def, 2_000, ideal());
        assert_eq!(s.elapsed_added, 2_000);
        assert_eq!(r.elapsed_ticks(), 2_000);
        assert!(!r.is_finished(&def));
    }

    #[test]
    fn finishes_after_total_days() {
        let def = wine();
        let mut r = record(10);
        let s = step(&mut r, &def, 6 * TICKS_PER_DAY, ideal());
        assert!(s.became_finished);
        assert!(r.is_finished(&def));
        assert_eq!(r.progress_fraction(&def), Fixed64::ONE);
        assert_eq!(r.estimated_ticks_remaining(&def), 0);
    }

    #[test]
    fn closed_gate_stops_time_not_ruin() {
        let def = wine();
        let mut r = record(10);
        let hot = EnvironmentSample::indoors(fx(40.0));
        let gates = OperationalGates {
            fueled: false,
            ..Default::default()
        };
        r.advance(&def, TICKS_PER_HOUR, &hot, gates, &WeatherDomains::default());
        assert_eq!(r.elapsed_ticks(), 0);
        // 10 degrees over for an hour at 5 %/degree/hour.
        assert_eq!(r.ruined_percent(), fx(0.5));
    }

    #[test]
    fn ruin_is_exact_and_freezes_the_batch() {
        let def = wine();
        let mut r = record(10);
        let s = step(&mut r, &def, TICKS_PER_HOUR, EnvironmentSample::indoors(fx(50.0)));
        assert!(s.became_ruined);
        assert_eq!(r.ruined_percent(), Fixed64::ONE);

        let frozen = r.elapsed_ticks();
        let s = step(&mut r, &def, TICKS_PER_DAY, ideal());
        assert_eq!(s, RecordStep::default());
        assert_eq!(r.elapsed_ticks(), frozen);
    }

    #[test]
    fn ruin_does_not_depend_on_slicing() {
        let def = wine();
        let hot = EnvironmentSample::indoors(fx(40.0));
        for slice in [1, 7, 250, 2000] {
            let mut r = record(10);
            let mut left = TICKS_PER_HOUR;
            while left > 0 {
                let t = left.min(slice);
                step(&mut r, &def, t, hot);
                left -= t;
            }
            assert_eq!(r.ruined_percent(), fx(0.5), "slice {slice}");
        }
    }

    #[test]
    fn cold_also_ruins() {
        let def = wine();
        let mut r = record(10);
        step(&mut r, &def, TICKS_PER_HOUR, EnvironmentSample::indoors(fx(-4.0)));
        assert_eq!(r.ruined_percent(), fx(0.2));
    }

    #[test]
    fn ruin_clamps_at_one() {
        let def = wine();
        let mut r = record(10);
        r.set_ruined_percent(fx(0.98));
        step(&mut r, &def, 1, EnvironmentSample::indoors(fx(100_000.0)));
        assert_eq!(r.ruined_percent(), Fixed64::ONE);
    }

    #[test]
    fn no_ruin_without_temperature() {
        let mut def = wine();
        def.uses_temperature = false;
        let mut r = record(10);
        step(&mut r, &def, TICKS_PER_DAY, EnvironmentSample::indoors(fx(90.0)));
        assert_eq!(r.ruined_percent(), Fixed64::ZERO);
        assert_eq!(r.elapsed_ticks(), TICKS_PER_DAY);
    }

    #[test]
    fn zero_speed_still_spoils() {
        let mut def = wine();
        def.speed_above_safe = Fixed64::ZERO;
        let mut r = record(10);
        step(&mut r, &def, TICKS_PER_HOUR, EnvironmentSample::indoors(fx(35.0)));
        assert_eq!(r.elapsed_ticks(), 0);
        assert_eq!(r.ruined_percent(), fx(0.25));
        assert_eq!(r.estimated_ticks_remaining(&def), -1);
        assert!(!r.running(&def));
    }

    #[test]
    fn weighted_merge_dilutes_progress() {
        let mut r = record(10);
        r.add_elapsed(1_000);
        r.merge(Thing::new(ThingId(2), ItemKindId(0), 10));
        assert_eq!(r.elapsed_ticks(), 500);
        assert_eq!(r.ingredient_count(), 20);
    }

    #[test]
    fn merge_rounds_half_away_from_zero() {
        let mut r = record(1);
        r.add_elapsed(3);
        r.merge(Thing::new(ThingId(2), ItemKindId(0), 1));
        assert_eq!(r.elapsed_ticks(), 2);
    }

    #[test]
    fn quality_target_reached_allows_extraction() {
        let mut def = wine();
        def.uses_quality = true;
        def.quality_thresholds = QualityThresholds::new([
            fx(1.0), fx(2.0), fx(3.0), fx(4.0), fx(5.0), fx(6.0), fx(7.0),
        ]);
        let mut r = record(5);
        assert!(r.set_target_quality(&def, QualityCategory::Good));
        r.add_elapsed(3 * TICKS_PER_DAY);
        assert_eq!(r.current_quality(&def), Some(QualityCategory::Normal));
        assert!(!r.is_extractable(&def));
        r.add_elapsed(TICKS_PER_DAY);
        assert!(r.quality_target_reached(&def));
        assert!(r.is_finished(&def));
    }

    #[test]
    fn target_quality_ignored_without_quality() {
        let def = wine();
        let mut r = record(5);
        assert!(!r.set_target_quality(&def, QualityCategory::Legendary));
        assert_eq!(r.target_quality(&def), QualityCategory::Normal);
        assert_eq!(r.current_quality(&def), None);
    }

    #[test]
    fn slow_below_threshold() {
        let mut def = wine();
        def.speed_below_safe = fx(0.5);
        let mut r = record(5);
        step(&mut r, &def, 1, EnvironmentSample::indoors(fx(2.0)));
        assert!(r.is_slow(fx(0.75)));
        assert!(r.running(&def));
    }

    #[test]
    fn elapsed_days_beyond_fixed_range() {
        let mut r = record(1);
        r.add_elapsed(TICKS_PER_DAY * 40_000 + TICKS_PER_DAY / 2);
        assert_eq!(r.elapsed_days(), fx(40_000.5));
    }
}
