//! Sensor mapper: turns one parsed record into outbound publications.
//!
//! Specs are walked in ascending field-index order so publish order (and
//! with it discovery order downstream) is deterministic.

use tracing::warn;

use crate::config::{SensorSpec, Transform};
use crate::totals::CumulativeTotals;

/// One outbound MQTT publication.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// State topic of one sensor.
pub fn state_topic(state_prefix: &str, field_index: usize) -> String {
    format!("{state_prefix}/{field_index}/state")
}

/// Map a validated record onto its per-sensor publications.
///
/// Unnamed specs are disabled fields and skipped. An out-of-range index
/// skips only that sensor. A non-numeric field aborts the remainder of
/// the record: publications for lower indices stand, everything after is
/// dropped. (Deliberate fail-fast policy; a skip-only alternative would
/// replace the `break` below.)
pub fn map_record(
    specs: &[SensorSpec],
    fields: &[String],
    totals: &CumulativeTotals,
    state_prefix: &str,
) -> Vec<Publication> {
    let mut publications = Vec::new();

    for spec in specs {
        if spec.name.is_none() {
            continue;
        }

        let Some(raw) = fields.get(spec.field_index) else {
            warn!(
                "field index {} not found in data: {:?}",
                spec.field_index, fields
            );
            continue;
        };

        let Ok(value) = raw.parse::<f64>() else {
            warn!(
                "field {} ({:?}) in the serial data is not a number",
                spec.field_index, raw
            );
            break;
        };

        let payload = match spec.transform {
            Transform::Cumulative => format!("{}", totals.get(spec.field_index) + value),
            transform => transform.apply(value),
        };

        publications.push(Publication {
            topic: state_topic(state_prefix, spec.field_index),
            payload,
            retain: false,
        });
    }

    publications
}
