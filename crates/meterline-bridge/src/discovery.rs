//! Home Assistant MQTT discovery announcements.
//!
//! One retained config payload per named sensor, published once at
//! startup so the platform auto-registers the device and its entities.

use serde_json::json;

use meterline_core::mapper::state_topic;
use meterline_core::{BridgeConfig, Publication};

/// Discovery topic of one sensor.
fn discovery_topic(discovery_prefix: &str, device_id: &str, field_index: usize) -> String {
    format!("{discovery_prefix}/sensor/{device_id}/{field_index}/config")
}

/// Build the retained discovery publications for every named sensor, in
/// ascending field-index order.
pub fn discovery_publications(config: &BridgeConfig) -> Vec<Publication> {
    let mqtt = &config.mqtt;
    let device = &config.device;

    let mut publications = Vec::new();
    for spec in config.sensors() {
        let Some(name) = &spec.name else {
            continue;
        };

        let mut payload = json!({
            "state_topic": state_topic(&mqtt.state_prefix, spec.field_index),
            "unique_id": format!("{}_{}", mqtt.device_id, spec.field_index),
            "name": name,
            "device": {
                "identifiers": [&mqtt.device_id],
                "name": &device.name,
                "model": &device.model,
                "manufacturer": &device.manufacturer,
            },
        });

        let object = payload.as_object_mut().unwrap();
        if let Some(device_class) = spec.device_class {
            object.insert("device_class".into(), json!(device_class));
        }
        if let Some(unit) = &spec.unit_of_measurement {
            object.insert("unit_of_measurement".into(), json!(unit));
        }
        for (key, value) in &spec.extra {
            object.insert(key.clone(), value.clone());
        }

        publications.push(Publication {
            topic: discovery_topic(&mqtt.discovery_prefix, &mqtt.device_id, spec.field_index),
            payload: payload.to_string(),
            retain: true,
        });
    }
    publications
}
