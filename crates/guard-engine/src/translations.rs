//! Message tables for notifications and spoken warnings

use guard_config::Language;

/// Looks up message templates in the configured language
///
/// Templates use `{}` placeholders filled in order. Unknown keys render as a
/// visible placeholder instead of failing.
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    language: Language,
}

impl Translator {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn translate(&self, key: &str) -> String {
        self.template(key)
            .map(str::to_string)
            .unwrap_or_else(|| missing(key))
    }

    /// Translate and substitute `args` for the `{}` placeholders
    pub fn format(&self, key: &str, args: &[&str]) -> String {
        match self.template(key) {
            Some(template) => fill(template, args),
            None => missing(key),
        }
    }

    /// BCP 47 tag for text-to-speech
    pub fn speech_language(&self) -> &'static str {
        match self.language {
            Language::English => "en-US",
            Language::German => "de-DE",
        }
    }

    fn template(&self, key: &str) -> Option<&'static str> {
        match self.language {
            Language::English => english(key),
            Language::German => german(key),
        }
    }
}

fn missing(key: &str) -> String {
    format!("Missing translation: {key}")
}

fn fill(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        out.push_str(args.next().copied().unwrap_or(""));
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

fn english(key: &str) -> Option<&'static str> {
    Some(match key {
        "and" => "and",

        "burglar_alert" => "Attention burglar alarm!",
        "fire_alert" => "Attention fire alarm!",
        "water_alert" => "Attention water leak!",
        "safety_alert" => "Attention security alarm!",

        "sensor_info_door_multi" => "The following doors were opened: {}",
        "sensor_info_window_multi" => "The following windows were opened: {}",
        "sensor_info_motion_multi" => "The following motion detectors were activated: {}",
        "sensor_info_tamper_multi" => "The following sensors were tampered with: {}",
        "sensor_info_environmental_multi" => "The following sensors were activated: {}",

        "sensor_info_door_single" => "{} door was opened",
        "sensor_info_window_single" => "{} window was opened",
        "sensor_info_motion_single" => "{} motion detector was activated",
        "sensor_info_tamper_single" => "{} sensor was tampered with",
        "sensor_info_environmental_single" => "{} sensor was activated",

        "system_start" => "Home security system started",
        "button_disarm" => "Attention, switch {} pressed, alarm system will be disarmed",
        "button_arm_home" => "Attention, switch {} pressed, alarm system will be armed in home mode",
        "button_arm_away" => "Attention, switch {} pressed, alarm system will be armed in away mode",
        "button_arm_vacation" => {
            "Attention, switch {} pressed, alarm system will be armed in vacation mode"
        }
        "button_trigger" => "Attention, switch {} pressed, security alarm will be triggered",

        "auto_arm_home_schedule" => "Attention alarm system in home mode will be automatically armed",
        "auto_arm_night_schedule" => {
            "Attention alarm system in night mode will be automatically armed according to schedule"
        }
        "auto_arm_night_person" => {
            "Attention alarm system in night mode will be automatically armed, {} has entered the house"
        }
        "auto_arm_away_schedule" => "Attention alarm system in away mode will be automatically armed",
        "auto_arm_away_person" => {
            "Attention alarm system in away mode will be automatically armed, {} has left the house"
        }
        "auto_arm_vacation_schedule" => {
            "Attention alarm system in vacation mode will be automatically armed"
        }
        "auto_arm_vacation_person" => {
            "Attention alarm system in vacation mode will be automatically armed, {} has left the house"
        }
        "auto_disarm_person" => {
            "Attention alarm system will be automatically disarmed, {} has entered the house"
        }
        "auto_disarm_schedule" => {
            "Attention alarm system will be automatically disarmed according to schedule"
        }

        "alarm_system_arming" => "Attention: Alarm system is being armed.",
        "alarm_system_pending" => "Attention: Alarm system is about to be triggered.",
        "alarm_system_triggered" => "Attention Alarm system was triggered",
        "alarm_system_armed" => "Attention Alarm system is armed",
        "alarm_system_disarmed" => "Attention Alarm system is disarmed",
        "alarm_system_armed_home" => "Attention Alarm system in home mode is armed",
        "alarm_system_armed_away" => "Attention Alarm system in away mode is armed",
        "alarm_system_armed_night" => "Attention Alarm system in night mode is armed",
        "alarm_system_armed_vacation" => "Attention Alarm system in vacation mode is armed",
        _ => return None,
    })
}

fn german(key: &str) -> Option<&'static str> {
    Some(match key {
        "and" => "und",

        "burglar_alert" => "Achtung! Einbruchsalarm!",
        "fire_alert" => "Achtung! Feueralarm!",
        "water_alert" => "Achtung! Wasserleck!",
        "safety_alert" => "Achtung! Sicherheitsalarm!",

        "sensor_info_door_multi" => "Folgende Türen wurden geöffnet: {}",
        "sensor_info_window_multi" => "Folgende Fenster wurden geöffnet: {}",
        "sensor_info_motion_multi" => "Folgende Bewegungsmelder wurden aktiviert: {}",
        "sensor_info_tamper_multi" => "Folgende Sensoren wurden manipuliert: {}",
        "sensor_info_environmental_multi" => "Folgende Sensoren wurden ausgelöst: {}",

        "sensor_info_door_single" => "{} Tür wurde geöffnet",
        "sensor_info_window_single" => "{} Fenster wurde geöffnet",
        "sensor_info_motion_single" => "{} Bewegungsmelder wurde aktiviert",
        "sensor_info_tamper_single" => "{} Sensor wurde manipuliert",
        "sensor_info_environmental_single" => "{} Sensor wurde ausgelöst",

        "system_start" => "Alarmanlage gestartet.",
        "button_disarm" => "Achtung, Schalter {} gedrückt. Alarmanlage wird ausgeschaltet.",
        "button_arm_home" => {
            "Achtung, Schalter {} gedrückt. Alarmanlage im Modus 'Zuhause' wird aktiviert."
        }
        "button_arm_away" => {
            "Achtung, Schalter {} gedrückt. Alarmanlage im Modus 'Abwesend' wird aktiviert."
        }
        "button_arm_vacation" => {
            "Achtung, Schalter {} gedrückt. Alarmanlage im Modus 'Urlaub' wird aktiviert."
        }
        "button_trigger" => "Achtung, Schalter {} gedrückt. Sicherheitsalarm wird ausgelöst.",

        "auto_arm_home_schedule" => {
            "Achtung: Alarmanlage im Modus 'Zuhause' wird automatisch aktiviert."
        }
        "auto_arm_night_schedule" => {
            "Achtung: Alarmanlage im Modus 'Nacht' wird nach Zeitplan automatisch aktiviert."
        }
        "auto_arm_night_person" => {
            "Achtung: Alarmanlage im Modus 'Nacht' wird automatisch scharf geschaltet. {} hat das Haus betreten."
        }
        "auto_arm_away_schedule" => {
            "Achtung: Alarmanlage im Modus 'Abwesend' wird nach Zeitplan automatisch aktiviert."
        }
        "auto_arm_away_person" => {
            "Achtung: Alarmanlage im Modus 'Abwesend' wird automatisch scharf geschaltet. {} hat das Haus verlassen."
        }
        "auto_arm_vacation_schedule" => {
            "Achtung: Alarmanlage im Modus 'Urlaub' wird nach Zeitplan automatisch aktiviert."
        }
        "auto_arm_vacation_person" => {
            "Achtung: Alarmanlage im Modus 'Urlaub' wird automatisch scharf geschaltet. {} hat das Haus verlassen."
        }
        "auto_disarm_person" => {
            "Achtung: Alarmanlage wird automatisch ausgeschaltet. {} hat das Haus betreten."
        }
        "auto_disarm_schedule" => "Achtung: Alarmanlage wird nach Zeitplan automatisch ausgeschaltet.",

        "alarm_system_arming" => "Achtung: Die Alarmanlage wird scharf geschaltet.",
        "alarm_system_pending" => "Achtung: Die Alarmanlage wird ausgelöst.",
        "alarm_system_triggered" => "Achtung: Die Alarmanlage wurde ausgelöst.",
        "alarm_system_armed" => "Achtung: Die Alarmanlage ist scharf geschaltet.",
        "alarm_system_disarmed" => "Achtung: Die Alarmanlage ist ausgeschaltet.",
        "alarm_system_armed_home" => {
            "Achtung: Die Alarmanlage im Modus 'Zuhause' ist scharf geschaltet."
        }
        "alarm_system_armed_away" => {
            "Achtung: Die Alarmanlage im Modus 'Abwesend' ist scharf geschaltet."
        }
        "alarm_system_armed_night" => {
            "Achtung: Die Alarmanlage im Modus 'Nacht' ist scharf geschaltet."
        }
        "alarm_system_armed_vacation" => {
            "Achtung: Die Alarmanlage im Modus 'Urlaub' ist scharf geschaltet."
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fills_placeholders() {
        let en = Translator::new(Language::English);
        assert_eq!(
            en.format("sensor_info_door_single", &["Front"]),
            "Front door was opened"
        );
        assert_eq!(
            en.format("button_arm_home", &["Hall Button"]),
            "Attention, switch Hall Button pressed, alarm system will be armed in home mode"
        );
    }

    #[test]
    fn test_german() {
        let de = Translator::new(Language::German);
        assert_eq!(de.translate("burglar_alert"), "Achtung! Einbruchsalarm!");
        assert_eq!(
            de.format("sensor_info_door_multi", &["Haustür und Kellertür"]),
            "Folgende Türen wurden geöffnet: Haustür und Kellertür"
        );
        assert_eq!(de.speech_language(), "de-DE");
    }

    #[test]
    fn test_missing_key_is_visible() {
        let en = Translator::new(Language::English);
        assert_eq!(en.translate("alarm_system_banana"), "Missing translation: alarm_system_banana");
        assert_eq!(en.format("nope", &["x"]), "Missing translation: nope");
    }

    #[test]
    fn test_both_languages_cover_the_same_keys() {
        let keys = [
            "and",
            "burglar_alert",
            "safety_alert",
            "sensor_info_environmental_single",
            "button_arm_vacation",
            "button_trigger",
            "auto_arm_home_schedule",
            "auto_arm_vacation_schedule",
            "auto_disarm_person",
            "alarm_system_armed_vacation",
            "alarm_system_pending",
            "system_start",
        ];
        for key in keys {
            assert!(english(key).is_some(), "{key}");
            assert!(german(key).is_some(), "{key}");
        }
    }

    #[test]
    fn test_extra_placeholders_are_blank() {
        assert_eq!(fill("{} and {}", &["a"]), "a and ");
        assert_eq!(fill("none", &["a"]), "none");
    }
}
