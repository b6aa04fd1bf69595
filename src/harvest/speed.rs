//! Scroll-speed adaptation. Pure functions over [`ScrollState`].

use std::fmt;

use super::run::ScrollState;
use crate::core::config::ScrollTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedChange {
    /// Yield hit the target; speed is frozen from now on.
    OptimalFound(u32),
    Increased { from: u32, to: u32 },
    /// Saturated at the ceiling without reaching target; dropped to the fallback speed.
    FellBack { from: u32, to: u32 },
    Decreased { from: u32, to: u32 },
    Unchanged(u32),
}

impl fmt::Display for SpeedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedChange::OptimalFound(speed) => write!(f, "Optimal scroll speed found: {}px", speed),
            SpeedChange::Increased { to, .. } => write!(f, "Increasing scroll speed to {}px", to),
            SpeedChange::FellBack { to, .. } => {
                write!(f, "Scroll speed at ceiling, falling back to {}px", to)
            }
            SpeedChange::Decreased { to, .. } => write!(f, "Decreasing scroll speed to {}px", to),
            SpeedChange::Unchanged(speed) => write!(f, "Scroll speed unchanged at {}px", speed),
        }
    }
}

fn decrease(scroll: &mut ScrollState, by: u32, floor: u32) -> SpeedChange {
    let from = scroll.current_speed;
    let to = from.saturating_sub(by).max(floor);
    if to == from {
        return SpeedChange::Unchanged(from);
    }
    scroll.current_speed = to;
    SpeedChange::Decreased { from, to }
}

/// Adjust speed after an extraction pass that accepted `yielded` new contacts.
///
/// No-op once the optimal speed has been found.
pub fn adapt_speed(scroll: &mut ScrollState, yielded: usize, tuning: &ScrollTuning) -> SpeedChange {
    let from = scroll.current_speed;
    if scroll.optimal_speed_found {
        return SpeedChange::Unchanged(from);
    }

    if yielded >= tuning.target_contacts_per_scroll {
        scroll.optimal_speed_found = true;
        return SpeedChange::OptimalFound(from);
    }

    if yielded == 0 {
        return decrease(scroll, tuning.speed_decrement, tuning.min_speed);
    }

    // An inverted range collapses to min_speed.
    let ceiling = tuning.max_speed.max(tuning.min_speed);
    if from >= ceiling {
        let to = tuning.fallback_speed.clamp(tuning.min_speed, ceiling);
        scroll.current_speed = to;
        return SpeedChange::FellBack { from, to };
    }

    let step = tuning.speed_increment_floor.max(from / 2);
    let to = from.saturating_add(step).min(ceiling);
    scroll.current_speed = to;
    SpeedChange::Increased { from, to }
}

/// Extra slow-down when the container refuses to move while nothing new shows up.
///
/// Applies only after a failed scroll with `consecutive_no_yield` above the stall threshold,
/// and never to a frozen (optimal) speed.
pub fn apply_stall_backoff(scroll: &mut ScrollState, tuning: &ScrollTuning) -> Option<SpeedChange> {
    if scroll.optimal_speed_found || scroll.consecutive_no_yield <= tuning.stall_no_yield_threshold {
        return None;
    }
    match decrease(scroll, tuning.stall_decrement, tuning.min_speed) {
        SpeedChange::Unchanged(_) => None,
        change => Some(change),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tuning: &ScrollTuning) -> ScrollState {
        ScrollState::new(tuning)
    }

    #[test]
    fn test_target_yield_freezes_speed() {
        let tuning = ScrollTuning::default();
        let mut s = state(&tuning);
        assert_eq!(adapt_speed(&mut s, 14, &tuning), SpeedChange::OptimalFound(5_000));
        assert!(s.optimal_speed_found);

        // Frozen: neither zero nor partial yield moves it any more.
        assert_eq!(adapt_speed(&mut s, 0, &tuning), SpeedChange::Unchanged(5_000));
        assert_eq!(adapt_speed(&mut s, 3, &tuning), SpeedChange::Unchanged(5_000));
        assert_eq!(s.current_speed, 5_000);
    }

    #[test]
    fn test_zero_yield_steps_down_to_floor() {
        let tuning = ScrollTuning::default();
        let mut s = state(&tuning);
        let mut seen = vec![s.current_speed];
        for _ in 0..4 {
            adapt_speed(&mut s, 0, &tuning);
            seen.push(s.current_speed);
        }
        assert_eq!(seen, vec![5_000, 3_000, 2_000, 2_000, 2_000]);
        assert!(!s.optimal_speed_found);
    }

    #[test]
    fn test_partial_yield_accelerates_then_falls_back() {
        let tuning = ScrollTuning::default();
        let mut s = state(&tuning);
        let mut seen = Vec::new();
        for _ in 0..7 {
            adapt_speed(&mut s, 5, &tuning);
            assert!(s.current_speed <= tuning.max_speed);
            seen.push(s.current_speed);
        }
        assert_eq!(seen, vec![7_500, 11_250, 16_875, 20_000, 10_000, 15_000, 20_000]);
    }

    #[test]
    fn test_inverted_speed_range_does_not_panic() {
        let tuning = ScrollTuning {
            min_speed: 25_000,
            ..ScrollTuning::default()
        };
        let mut s = state(&tuning);
        assert_eq!(s.current_speed, 25_000);
        assert_eq!(
            adapt_speed(&mut s, 5, &tuning),
            SpeedChange::FellBack { from: 25_000, to: 25_000 }
        );
        assert_eq!(
            adapt_speed(&mut s, 0, &tuning),
            SpeedChange::Unchanged(25_000)
        );
    }

    #[test]
    fn test_increment_has_a_floor() {
        let tuning = ScrollTuning::default();
        let mut s = state(&tuning);
        s.current_speed = 2_000;
        assert_eq!(
            adapt_speed(&mut s, 1, &tuning),
            SpeedChange::Increased { from: 2_000, to: 4_000 }
        );
    }

    #[test]
    fn test_stall_backoff_needs_sustained_no_yield() {
        let tuning = ScrollTuning::default();
        let mut s = state(&tuning);
        s.current_speed = 12_000;
        s.consecutive_no_yield = 2;
        assert_eq!(apply_stall_backoff(&mut s, &tuning), None);

        s.consecutive_no_yield = 3;
        assert_eq!(
            apply_stall_backoff(&mut s, &tuning),
            Some(SpeedChange::Decreased { from: 12_000, to: 8_000 })
        );

        s.current_speed = 2_000;
        assert_eq!(apply_stall_backoff(&mut s, &tuning), None);

        s.current_speed = 9_000;
        s.optimal_speed_found = true;
        assert_eq!(apply_stall_backoff(&mut s, &tuning), None);
    }
}
