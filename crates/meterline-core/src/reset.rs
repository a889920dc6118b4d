//! Counter-reset detection.
//!
//! The monitored meter resets its energy counters (power loss, firmware
//! restart), which would otherwise publish a huge negative step. A reset
//! is declared only when a quorum of independent counter sensors drop
//! below half of their previous reading in the same record: one sensor
//! halving can be noise or a legitimate low-load reading, three agreeing
//! almost never is. Detection is debounced to once per calendar day.

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDate};
use tracing::{debug, info};

/// Votes required before a reset is declared.
pub const RESET_QUORUM: usize = 3;

/// A counter votes "reset" when its reading drops below this fraction of
/// the previous one. Post-reset readings are near zero; normal load
/// rarely halves between two records.
pub const RESET_DROP_RATIO: f64 = 0.5;

/// Daily debounce state.
#[derive(Debug, Default, Clone)]
pub struct ResetState {
    /// A reset has already been declared today (DEBOUNCED).
    pub detected_today: bool,
    /// Timestamp of the last declared reset.
    pub last_reset_time: Option<DateTime<Local>>,
    /// Date on which `detected_today` was last cleared. Guards against
    /// clearing more than once per calendar date.
    pub last_cleared_date: Option<NaiveDate>,
}

/// Tracks counter readings across records and votes on resets.
#[derive(Debug, Default)]
pub struct ResetDetector {
    state: ResetState,
    /// Last observed value per counter field index, used for voting.
    last_values: HashMap<usize, f64>,
    /// Last raw reading per counter field index. Never reset-corrected;
    /// the value held here just before a detected reset is the
    /// carry-over amount for the accumulator.
    last_raw_values: HashMap<usize, f64>,
}

impl ResetDetector {
    /// Re-arm detection once the calendar date has advanced past the
    /// date of the last declared reset. Fires at most once per new date
    /// even when called on every record before midnight rolls over
    /// again.
    pub fn rearm_if_new_day(&mut self, now: DateTime<Local>) {
        let today = now.date_naive();
        if let Some(last_reset) = self.state.last_reset_time {
            if today > last_reset.date_naive() && self.state.last_cleared_date != Some(today) {
                self.state.detected_today = false;
                self.state.last_cleared_date = Some(today);
                info!("new day detected, reset detection flag cleared");
            }
        }
    }

    /// Vote on the current counter readings. Returns `true` when this
    /// record confirms a reset (quorum reached while still armed).
    ///
    /// Does not update the stored values; call [`Self::commit`] after
    /// the carry-over has been taken.
    pub fn observe(&mut self, current: &HashMap<usize, f64>, now: DateTime<Local>) -> bool {
        let mut votes = 0;
        for (&index, &value) in current {
            if let Some(&prior) = self.last_values.get(&index) {
                if value < prior * RESET_DROP_RATIO {
                    votes += 1;
                    debug!("reset vote from sensor {index}: {prior} -> {value}");
                }
            }
        }

        if votes >= RESET_QUORUM && !self.state.detected_today {
            self.state.detected_today = true;
            self.state.last_reset_time = Some(now);
            info!(
                "RESET DETECTED at {} - {votes} sensors voted for reset",
                now.to_rfc3339()
            );
            return true;
        }
        false
    }

    /// Record the current raw readings as the new comparison baseline.
    pub fn commit(&mut self, current: &HashMap<usize, f64>) {
        for (&index, &value) in current {
            self.last_values.insert(index, value);
            self.last_raw_values.insert(index, value);
        }
    }

    /// Raw reading of a counter as of the previous record, i.e. the
    /// pre-reset value while a reset is being handled.
    pub fn last_raw(&self, field_index: usize) -> Option<f64> {
        self.last_raw_values.get(&field_index).copied()
    }

    /// Current debounce state.
    pub fn state(&self) -> &ResetState {
        &self.state
    }
}
