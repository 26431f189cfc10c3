//! Human-readable alarm messages

use std::sync::OnceLock;

use guard_core::EntityId;
use indexmap::IndexMap;
use regex::Regex;

use crate::alerts::Alerts;
use crate::classify::SemanticType;
use crate::sensor::Sensor;
use crate::translations::Translator;

/// Decorative device words stripped from display names, longest first
const NAME_NOISE: &[&str] = &[
    "motion detector",
    "window sensor",
    "door sensor",
    "bewegungsmelder",
    "fenstersensor",
    "türsensor",
    "rauchmelder",
    "manipulation",
    "sensor",
    "radar",
];

fn noise_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternatives: Vec<String> = NAME_NOISE.iter().map(|w| regex::escape(w)).collect();
        Regex::new(&format!("(?i){}", alternatives.join("|"))).expect("static pattern")
    })
}

/// Strip separators and device words from a friendly name
pub fn clean_sensor_name(name: &str) -> String {
    let spaced = name.replace(['/', '_'], " ");
    let stripped = noise_regex().replace_all(&spaced, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "A", "A and B", "A, B and C"
pub fn join_names(names: &[String], and: &str) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} {and} {last}", init.join(", ")),
    }
}

fn sentence(text: &str) -> String {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out: String = first.to_uppercase().collect();
    out.push_str(chars.as_str());
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

/// Compose the message for `alerts`
///
/// For each category its alert header, then one sentence per sensor type
/// naming the affected sensors. `lookup` resolves a sensor id to its current
/// reading; unknown sensors fall back to their id.
pub fn compose_alarm_message<F>(alerts: &Alerts, translator: &Translator, lookup: F) -> String
where
    F: Fn(&EntityId) -> Option<Sensor>,
{
    let and = translator.translate("and");
    let mut parts = Vec::new();

    for (category, sensors) in alerts.iter() {
        parts.push(translator.translate(category.alert_key()));

        let mut by_type: IndexMap<SemanticType, Vec<String>> = IndexMap::new();
        for id in sensors {
            let (name, semantic_type) = match lookup(id) {
                Some(sensor) => (clean_sensor_name(&sensor.name), sensor.semantic_type()),
                None => (id.fallback_name(), None),
            };
            let names = by_type
                .entry(semantic_type.unwrap_or(SemanticType::Environmental))
                .or_default();
            if !names.contains(&name) {
                names.push(name);
            }
        }

        for (semantic_type, names) in by_type {
            let plurality = if names.len() > 1 { "multi" } else { "single" };
            let key = format!("sensor_info_{semantic_type}_{plurality}");
            let joined = join_names(&names, &and);
            let text = translator.format(&key, &[joined.as_str()]);
            parts.push(sentence(&text));
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::AlarmCategory;
    use chrono::Utc;
    use guard_config::Language;
    use std::collections::HashMap;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_clean_sensor_name() {
        assert_eq!(clean_sensor_name("Front Door"), "Front Door");
        assert_eq!(clean_sensor_name("Hallway Motion Detector"), "Hallway");
        assert_eq!(clean_sensor_name("kitchen_window_sensor"), "kitchen");
        assert_eq!(clean_sensor_name("Bewegungsmelder Flur"), "Flur");
        assert_eq!(clean_sensor_name("Garage/Radar Sensor"), "Garage");
        assert_eq!(clean_sensor_name("Türsensor Keller"), "Keller");
    }

    #[test]
    fn test_join_names() {
        assert_eq!(join_names(&[], "and"), "");
        assert_eq!(join_names(&names(&["A"]), "and"), "A");
        assert_eq!(join_names(&names(&["A", "B"]), "and"), "A and B");
        assert_eq!(join_names(&names(&["A", "B", "C"]), "und"), "A, B und C");
    }

    #[test]
    fn test_sentence() {
        assert_eq!(sentence("front door was opened"), "Front door was opened.");
        assert_eq!(sentence("Done!"), "Done!");
        assert_eq!(sentence(""), "");
    }

    fn lookup(id: &EntityId) -> Option<Sensor> {
        let catalog: HashMap<&str, (&str, &str)> = HashMap::from([
            ("binary_sensor.front_door", ("door", "Front Door")),
            ("binary_sensor.back_door", ("door", "Back Door")),
            ("binary_sensor.hall_motion", ("motion", "Hall Motion Detector")),
            ("binary_sensor.kitchen_smoke", ("smoke", "Kitchen Rauchmelder")),
        ]);
        let (class, name) = catalog.get(id.to_string().as_str())?;
        Some(Sensor {
            id: id.clone(),
            device_class: Some(class.to_string()),
            current_state: "on".to_string(),
            last_changed: Utc::now(),
            name: name.to_string(),
        })
    }

    #[test]
    fn test_compose_groups_by_type() {
        let mut alerts = Alerts::new();
        alerts.insert(AlarmCategory::Burglar, "binary_sensor.front_door".parse().unwrap());
        alerts.insert(AlarmCategory::Burglar, "binary_sensor.hall_motion".parse().unwrap());
        alerts.insert(AlarmCategory::Burglar, "binary_sensor.back_door".parse().unwrap());

        let message = compose_alarm_message(&alerts, &Translator::new(Language::English), lookup);
        assert_eq!(
            message,
            "Attention burglar alarm! \
             The following doors were opened: Front Door and Back Door. \
             Hall motion detector was activated."
        );
    }

    #[test]
    fn test_compose_category_then_subtype() {
        let mut alerts = Alerts::new();
        alerts.insert(AlarmCategory::Fire, "binary_sensor.kitchen_smoke".parse().unwrap());
        alerts.insert(AlarmCategory::Burglar, "binary_sensor.front_door".parse().unwrap());

        let message = compose_alarm_message(&alerts, &Translator::new(Language::German), lookup);
        assert_eq!(
            message,
            "Achtung! Feueralarm! Kitchen Sensor wurde ausgelöst. \
             Achtung! Einbruchsalarm! Front Door Tür wurde geöffnet."
        );
    }

    #[test]
    fn test_compose_unknown_sensor_uses_id() {
        let mut alerts = Alerts::new();
        alerts.insert(AlarmCategory::Water, "binary_sensor.basement_leak".parse().unwrap());
        let message = compose_alarm_message(&alerts, &Translator::new(Language::English), lookup);
        assert_eq!(
            message,
            "Attention water leak! Basement leak sensor was activated."
        );
    }
}
