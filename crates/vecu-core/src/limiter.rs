//! Threshold-based speed/RPM limiting and the engine temperature model.
//!
//! Everything here is a pure function of its inputs so the control loop
//! can run it outside the sync gate.

use serde::Serialize;

/// Named policy constants for one limiter configuration.
///
/// The deployed variants only ever differed in these values, so they
/// live in one table instead of per-variant copies of the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterPolicy {
    /// Above this, speed is trimmed (strict `>`).
    pub high_speed_kmh: f64,
    /// Below this (and above zero), speed is boosted (strict `<`).
    pub low_speed_kmh: f64,
    /// Multiplier applied on an over-speed cycle.
    pub speed_trim: f64,
    /// Multiplier applied on an under-speed cycle.
    pub speed_boost: f64,
    /// Above this, rpm is trimmed (strict `>`).
    pub high_rpm: f64,
    /// Below this the engine counts as stalled (strict `<`).
    pub idle_rpm: f64,
    /// Multiplier applied on an over-rpm cycle.
    pub rpm_trim: f64,
    /// Temperature ceiling; reaching it (`>=`) raises the overheat alert.
    pub max_temp_c: f64,
    /// Temperature with the engine off and the car parked.
    pub base_temp_c: f64,
    /// Degrees of rise per 10 rpm.
    pub rpm_heat_factor: f64,
    /// Degrees of airflow cooling per km/h.
    pub speed_cooling_factor: f64,
}

impl Default for LimiterPolicy {
    fn default() -> Self {
        Self {
            high_speed_kmh: 200.0,
            low_speed_kmh: 20.0,
            speed_trim: 0.9,
            speed_boost: 1.1,
            high_rpm: 7000.0,
            idle_rpm: 800.0,
            rpm_trim: 0.9,
            max_temp_c: 140.0,
            base_temp_c: 80.0,
            rpm_heat_factor: 0.1,
            speed_cooling_factor: 0.05,
        }
    }
}

/// How many times each limiter rule has fired. Incremented only by
/// [`limit_cycle`]; flushed to the report collaborator at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LimiterCounters {
    pub speed_high: u64,
    pub speed_low: u64,
    pub rpm_high: u64,
    pub rpm_stall: u64,
    pub overheat: u64,
}

impl LimiterCounters {
    pub fn total(&self) -> u64 {
        self.speed_high + self.speed_low + self.rpm_high + self.rpm_stall + self.overheat
    }
}

/// Result of one limiter pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitOutcome {
    pub speed_kmh: f64,
    pub engine_rpm: f64,
    /// rpm fell below idle: fatal, the caller must begin shutdown.
    pub stalled: bool,
    /// Temperature at or over the ceiling: alert, not fatal.
    pub overheating: bool,
}

/// Apply one cycle of the limiter policy to a sensor snapshot.
///
/// The high and low branches for a given quantity are mutually
/// exclusive within a cycle. Boundary values do not fire: speed exactly
/// at `high_speed_kmh` or `low_speed_kmh` passes through untouched.
/// The overheat check alone is inclusive (`>=`).
pub fn limit_cycle(
    policy: &LimiterPolicy,
    speed_kmh: f64,
    engine_rpm: f64,
    engine_temp_c: f64,
    counters: &mut LimiterCounters,
) -> LimitOutcome {
    let mut speed = speed_kmh;
    let mut rpm = engine_rpm;
    let mut stalled = false;

    if speed > policy.high_speed_kmh {
        speed *= policy.speed_trim;
        counters.speed_high += 1;
    } else if speed > 0.0 && speed < policy.low_speed_kmh {
        speed *= policy.speed_boost;
        counters.speed_low += 1;
    }

    if rpm > policy.high_rpm {
        rpm *= policy.rpm_trim;
        counters.rpm_high += 1;
    } else if rpm < policy.idle_rpm {
        rpm = 0.0;
        stalled = true;
        counters.rpm_stall += 1;
    }

    let overheating = engine_temp_c >= policy.max_temp_c;
    if overheating {
        counters.overheat += 1;
    }

    LimitOutcome {
        speed_kmh: speed,
        engine_rpm: rpm,
        stalled,
        overheating,
    }
}

/// Engine temperature as a function of the current cycle's (limited)
/// speed and rpm: base heat plus rpm-driven rise minus airflow cooling,
/// capped at the policy ceiling.
pub fn engine_temp(policy: &LimiterPolicy, speed_kmh: f64, engine_rpm: f64) -> f64 {
    let rise = (engine_rpm / 10.0) * policy.rpm_heat_factor;
    let cooling = speed_kmh * policy.speed_cooling_factor;
    (policy.base_temp_c + rise - cooling).min(policy.max_temp_c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LimiterPolicy {
        LimiterPolicy::default()
    }

    #[test]
    fn overspeed_is_trimmed_and_counted() {
        let mut counters = LimiterCounters::default();
        let out = limit_cycle(&policy(), 250.0, 3000.0, 95.0, &mut counters);
        assert_eq!(out.speed_kmh, 225.0);
        assert_eq!(counters.speed_high, 1);
        assert_eq!(counters.speed_low, 0);
        assert!(!out.stalled);
    }

    #[test]
    fn underspeed_is_boosted_and_counted() {
        let mut counters = LimiterCounters::default();
        let out = limit_cycle(&policy(), 10.0, 3000.0, 95.0, &mut counters);
        assert!((out.speed_kmh - 11.0).abs() < 1e-9);
        assert_eq!(counters.speed_low, 1);
    }

    #[test]
    fn speed_thresholds_are_strict() {
        let mut counters = LimiterCounters::default();
        // Exactly at the high threshold: no trim.
        let out = limit_cycle(&policy(), 200.0, 3000.0, 95.0, &mut counters);
        assert_eq!(out.speed_kmh, 200.0);
        // Exactly at the low threshold: no boost.
        let out = limit_cycle(&policy(), 20.0, 3000.0, 95.0, &mut counters);
        assert_eq!(out.speed_kmh, 20.0);
        // Standing still is not "under speed".
        let out = limit_cycle(&policy(), 0.0, 3000.0, 95.0, &mut counters);
        assert_eq!(out.speed_kmh, 0.0);
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn high_rpm_is_trimmed() {
        let mut counters = LimiterCounters::default();
        let out = limit_cycle(&policy(), 100.0, 8000.0, 95.0, &mut counters);
        assert_eq!(out.engine_rpm, 7200.0);
        assert_eq!(counters.rpm_high, 1);
        assert!(!out.stalled);
    }

    #[test]
    fn below_idle_stalls_the_engine() {
        let mut counters = LimiterCounters::default();
        let out = limit_cycle(&policy(), 100.0, 750.0, 95.0, &mut counters);
        assert_eq!(out.engine_rpm, 0.0);
        assert!(out.stalled);
        assert_eq!(counters.rpm_stall, 1);
    }

    #[test]
    fn rpm_exactly_at_idle_is_fine() {
        let mut counters = LimiterCounters::default();
        let out = limit_cycle(&policy(), 100.0, 800.0, 95.0, &mut counters);
        assert_eq!(out.engine_rpm, 800.0);
        assert!(!out.stalled);
        assert_eq!(counters.rpm_stall, 0);
    }

    #[test]
    fn overheat_uses_inclusive_threshold() {
        let mut counters = LimiterCounters::default();
        let out = limit_cycle(&policy(), 100.0, 3000.0, 140.0, &mut counters);
        assert!(out.overheating);
        assert_eq!(counters.overheat, 1);

        let out = limit_cycle(&policy(), 100.0, 3000.0, 139.9, &mut counters);
        assert!(!out.overheating);
        assert_eq!(counters.overheat, 1);
    }

    #[test]
    fn temperature_model_matches_reference_points() {
        let policy = policy();
        // Parked at idle.
        assert_eq!(engine_temp(&policy, 0.0, 800.0), 88.0);
        // Cruising.
        assert_eq!(engine_temp(&policy, 100.0, 3000.0), 105.0);
        // Redline is capped.
        assert_eq!(engine_temp(&policy, 0.0, 12000.0), 140.0);
    }
}
