//! Time windows and time-varying resource capacity.
//!
//! A resource has a base capacity (units usable simultaneously). A
//! [`CapacityProfile`] overrides that base inside explicit windows, e.g.
//! a crane that is only on site for part of the project, or a crew that
//! doubles during a summer push.
//!
//! # Time Model
//! All times are integer time units relative to the project epoch (t=0).
//! A time slice is the half-open unit interval `[t, t + 1)`.
//!
//! # Precedence
//! Windows must not overlap (checked at load time). Outside every window
//! the base capacity applies.

use serde::{Deserialize, Serialize};

/// A time interval [start, end).
///
/// Half-open interval: includes start, excludes end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    /// Interval start (inclusive).
    pub start: i64,
    /// Interval end (exclusive).
    pub end: i64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Length of this window in time units.
    #[inline]
    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    /// Whether the window covers no time.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether a time point falls within this window.
    #[inline]
    pub fn contains(&self, t: i64) -> bool {
        t >= self.start && t < self.end
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Capacity override inside a time window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityWindow {
    /// Interval the override applies to.
    pub window: TimeWindow,
    /// Units available during the window.
    pub capacity: i64,
}

/// Piecewise-constant capacity over time.
///
/// Empty profile = base capacity everywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CapacityProfile {
    /// Non-overlapping override windows.
    pub windows: Vec<CapacityWindow>,
}

impl CapacityProfile {
    /// Creates an empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override window.
    pub fn with_window(mut self, start: i64, end: i64, capacity: i64) -> Self {
        self.push(start, end, capacity);
        self
    }

    /// Adds an override window in place.
    pub fn push(&mut self, start: i64, end: i64, capacity: i64) {
        self.windows.push(CapacityWindow {
            window: TimeWindow::new(start, end),
            capacity,
        });
    }

    /// Capacity at time `t`, falling back to `base` outside every window.
    pub fn capacity_at(&self, base: i64, t: i64) -> i64 {
        self.windows
            .iter()
            .find(|w| w.window.contains(t))
            .map(|w| w.capacity)
            .unwrap_or(base)
    }

    /// Every time point at which capacity may change.
    pub fn boundaries(&self) -> impl Iterator<Item = i64> + '_ {
        self.windows
            .iter()
            .flat_map(|w| [w.window.start, w.window.end])
    }

    /// Largest capacity reachable at or after `from`.
    ///
    /// Past the last window the base applies, so this bounds every slot
    /// search starting at `from`.
    pub fn max_capacity_from(&self, base: i64, from: i64) -> i64 {
        self.windows
            .iter()
            .filter(|w| w.window.end > from)
            .map(|w| w.capacity)
            .fold(base, i64::max)
    }

    /// Returns the first pair of overlapping windows, if any.
    pub fn find_overlap(&self) -> Option<(TimeWindow, TimeWindow)> {
        for (i, a) in self.windows.iter().enumerate() {
            for b in &self.windows[i + 1..] {
                if a.window.overlaps(&b.window) {
                    return Some((a.window, b.window));
                }
            }
        }
        None
    }
}
