//! Per-record orchestration: parse, vote, accumulate, map.
//!
//! All mutable bridge state lives in [`BridgeState`], owned by the
//! single processing task and threaded through here by `&mut`. The
//! clock is passed in explicitly so the calendar-day debounce logic is
//! testable.

use std::collections::HashMap;

use chrono::{DateTime, Local};

use crate::config::BridgeConfig;
use crate::mapper::{self, Publication};
use crate::record;
use crate::reset::ResetDetector;
use crate::totals::CumulativeTotals;

/// Mutable state of the bridge, exclusively owned by the bridge loop.
#[derive(Debug)]
pub struct BridgeState {
    pub detector: ResetDetector,
    pub totals: CumulativeTotals,
}

impl BridgeState {
    pub fn new(totals: CumulativeTotals) -> Self {
        Self {
            detector: ResetDetector::default(),
            totals,
        }
    }
}

/// Result of processing one serial line.
#[derive(Debug)]
pub struct ProcessOutcome {
    /// Publications in ascending field-index order.
    pub publications: Vec<Publication>,
    /// Whether this record confirmed a counter reset.
    pub reset_detected: bool,
}

impl ProcessOutcome {
    fn empty() -> Self {
        Self {
            publications: Vec::new(),
            reset_detected: false,
        }
    }
}

/// Process one decoded serial line end to end.
///
/// Order matters: reset voting sees the record before the detector's
/// baseline is updated, and the accumulator folds the pre-reset raw
/// value in before the mapper computes the published cumulative value,
/// so the first post-reset publication already reads
/// `total + current_raw`.
pub fn process_line(
    config: &BridgeConfig,
    state: &mut BridgeState,
    line: &str,
    now: DateTime<Local>,
) -> ProcessOutcome {
    let Some(fields) = record::parse_line(line, config.expected_fields()) else {
        return ProcessOutcome::empty();
    };

    state.detector.rearm_if_new_day(now);

    // Raw readings of every counter-class sensor in this record.
    let mut current: HashMap<usize, f64> = HashMap::new();
    for spec in config.sensors().iter().filter(|s| s.is_counter()) {
        if let Some(value) = fields
            .get(spec.field_index)
            .and_then(|f| f.parse::<f64>().ok())
        {
            current.insert(spec.field_index, value);
        }
    }

    let reset_detected = state.detector.observe(&current, now);
    if reset_detected {
        for spec in config.sensors().iter().filter(|s| s.is_cumulative()) {
            if let Some(pre_reset_raw) = state.detector.last_raw(spec.field_index) {
                state.totals.accumulate(spec.field_index, pre_reset_raw);
            }
        }
    }
    state.detector.commit(&current);

    let publications = mapper::map_record(
        config.sensors(),
        &fields,
        &state.totals,
        &config.mqtt.state_prefix,
    );

    ProcessOutcome {
        publications,
        reset_detected,
    }
}
