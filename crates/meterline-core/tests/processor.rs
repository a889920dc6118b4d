//! End-to-end record processing tests: parse -> vote -> accumulate ->
//! map, including reset carry-over and restart behavior.

use chrono::{DateTime, Local, TimeZone};
use meterline_core::{process_line, BridgeConfig, BridgeState, CumulativeTotals};

fn config(totals_path: &std::path::Path) -> BridgeConfig {
    BridgeConfig::from_toml_str(&format!(
        r#"
[mqtt]
state_prefix = "home/p"

[persistence]
totals_path = {totals_path:?}

[sensors.0]
name = "Voltage"
device_class = "voltage"

[sensors.1]
name = "Energy total"
device_class = "energy"
transform = "cumulative"

[sensors.2]
name = "Energy phase A"
device_class = "energy"

[sensors.3]
name = "Energy phase B"
device_class = "energy"

[sensors.4]
name = "Battery current"
transform = "negate"

[sensors.5]
name = "Charge"
transform = {{ scale = {{ factor = 0.39215686274509803 }} }}
"#
    ))
    .unwrap()
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

#[test]
fn well_formed_record_publishes_every_named_sensor_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir.path().join("totals.json"));
    let mut state = BridgeState::new(CumulativeTotals::load(&config.persistence.totals_path));

    let outcome = process_line(
        &config,
        &mut state,
        "230.1,1000,800,900,100,128\n",
        at(2026, 3, 1, 8),
    );

    let topics: Vec<&str> = outcome
        .publications
        .iter()
        .map(|p| p.topic.as_str())
        .collect();
    assert_eq!(
        topics,
        vec![
            "home/p/0/state",
            "home/p/1/state",
            "home/p/2/state",
            "home/p/3/state",
            "home/p/4/state",
            "home/p/5/state",
        ]
    );
    assert!(!outcome.reset_detected);

    // Transform table.
    assert_eq!(outcome.publications[4].payload, "-100");
    assert_eq!(outcome.publications[5].payload, "50.20");
}

#[test]
fn wrong_field_count_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir.path().join("totals.json"));
    let mut state = BridgeState::new(CumulativeTotals::load(&config.persistence.totals_path));

    let outcome = process_line(&config, &mut state, "230.1,1000,800\n", at(2026, 3, 1, 8));
    assert!(outcome.publications.is_empty());

    let outcome = process_line(
        &config,
        &mut state,
        "230.1,1000,800,900,100,128,7\n",
        at(2026, 3, 1, 8),
    );
    assert!(outcome.publications.is_empty());
}

#[test]
fn non_numeric_field_publishes_only_lower_indices() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir.path().join("totals.json"));
    let mut state = BridgeState::new(CumulativeTotals::load(&config.persistence.totals_path));

    let outcome = process_line(
        &config,
        &mut state,
        "230.1,1000,garbage,900,100,128\n",
        at(2026, 3, 1, 8),
    );
    let topics: Vec<&str> = outcome
        .publications
        .iter()
        .map(|p| p.topic.as_str())
        .collect();
    assert_eq!(topics, vec!["home/p/0/state", "home/p/1/state"]);
}

#[test]
fn quorum_reset_flags_once_and_carries_over() {
    let dir = tempfile::tempdir().unwrap();
    let totals_path = dir.path().join("totals.json");
    let config = config(&totals_path);
    let mut state = BridgeState::new(CumulativeTotals::load(&totals_path));

    // Baseline record.
    let outcome = process_line(
        &config,
        &mut state,
        "230,1000,800,900,0,0\n",
        at(2026, 3, 1, 8),
    );
    assert!(!outcome.reset_detected);

    // All three counters collapse: reset.
    let outcome = process_line(&config, &mut state, "230,3,2,1,0,0\n", at(2026, 3, 1, 9));
    assert!(outcome.reset_detected);
    assert_eq!(state.totals.get(1), 1000.0);
    // First post-reset publication already includes the carry-over.
    assert_eq!(outcome.publications[1].payload, "1003");

    // Another collapse the same day is debounced.
    let outcome = process_line(
        &config,
        &mut state,
        "230,0.5,0.5,0.4,0,0\n",
        at(2026, 3, 1, 20),
    );
    assert!(!outcome.reset_detected);
    assert_eq!(state.totals.get(1), 1000.0);
}

#[test]
fn subsequent_cumulative_values_are_total_plus_raw() {
    let dir = tempfile::tempdir().unwrap();
    let totals_path = dir.path().join("totals.json");
    let config = config(&totals_path);
    let mut state = BridgeState::new(CumulativeTotals::load(&totals_path));

    process_line(
        &config,
        &mut state,
        "230,1000,800,900,0,0\n",
        at(2026, 3, 1, 8),
    );
    process_line(&config, &mut state, "230,3,2,1,0,0\n", at(2026, 3, 1, 9));

    let outcome = process_line(
        &config,
        &mut state,
        "230,40.5,30,20,0,0\n",
        at(2026, 3, 1, 10),
    );
    assert_eq!(outcome.publications[1].payload, "1040.5");
}

#[test]
fn detector_rearms_exactly_once_on_the_next_day() {
    let dir = tempfile::tempdir().unwrap();
    let totals_path = dir.path().join("totals.json");
    let config = config(&totals_path);
    let mut state = BridgeState::new(CumulativeTotals::load(&totals_path));

    process_line(
        &config,
        &mut state,
        "230,1000,800,900,0,0\n",
        at(2026, 3, 1, 8),
    );
    let outcome = process_line(&config, &mut state, "230,3,2,1,0,0\n", at(2026, 3, 1, 9));
    assert!(outcome.reset_detected);

    // Day D+1, first record: re-armed, new reset possible.
    let outcome = process_line(
        &config,
        &mut state,
        "230,0.5,0.5,0.4,0,0\n",
        at(2026, 3, 2, 1),
    );
    assert!(outcome.reset_detected);
    assert_eq!(state.totals.get(1), 1003.0);

    // Day D+1, further records: debounced again, no double re-arm.
    let outcome = process_line(
        &config,
        &mut state,
        "230,0.1,0.1,0.1,0,0\n",
        at(2026, 3, 2, 2),
    );
    assert!(!outcome.reset_detected);
    assert_eq!(state.totals.get(1), 1003.0);
}

#[test]
fn restart_reload_yields_identical_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let totals_path = dir.path().join("totals.json");
    let config = config(&totals_path);

    let mut state = BridgeState::new(CumulativeTotals::load(&totals_path));
    process_line(
        &config,
        &mut state,
        "230,1000,800,900,0,0\n",
        at(2026, 3, 1, 8),
    );
    process_line(&config, &mut state, "230,3,2,1,0,0\n", at(2026, 3, 1, 9));
    assert_eq!(state.totals.get(1), 1000.0);

    // Simulated restart: fresh state, totals reloaded from disk.
    let mut restarted = BridgeState::new(CumulativeTotals::load(&totals_path));
    assert_eq!(restarted.totals.get(1), 1000.0);

    let next = "230,40.5,30,20,0,0\n";
    let live = process_line(&config, &mut state, next, at(2026, 3, 1, 10));
    let reloaded = process_line(&config, &mut restarted, next, at(2026, 3, 1, 10));
    assert_eq!(live.publications, reloaded.publications);
}

#[test]
fn blank_lines_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir.path().join("totals.json"));
    let mut state = BridgeState::new(CumulativeTotals::load(&config.persistence.totals_path));

    let outcome = process_line(&config, &mut state, "\r\n", at(2026, 3, 1, 8));
    assert!(outcome.publications.is_empty());
    assert!(!outcome.reset_detected);
}
