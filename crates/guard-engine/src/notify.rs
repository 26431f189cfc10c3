//! Notification fan-out
//!
//! Push notifications go to every configured `notify` service. Spoken
//! messages go to the media players unless the house is in quiet hours or
//! silent mode. Urgent messages are also kept as a persistent notification.

use guard_config::NotifySettings;
use guard_core::{EntityId, Host};
use serde_json::json;
use tracing::{debug, info};

use crate::actuate;
use crate::translations::Translator;

const TITLE: &str = "Homeguard";
const TTS_VOLUME: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Delivered everywhere, even at night
    Urgent,
    Normal,
    /// Logged only
    Debug,
}

/// Conditions that mute part of the delivery
#[derive(Debug, Clone, Copy, Default)]
pub struct Quiet {
    /// Inside the notification night window
    pub night: bool,
    /// Silent mode: no speech and no sirens
    pub silent: bool,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    services: Vec<String>,
    media_players: Vec<EntityId>,
    speech_language: &'static str,
}

impl Notifier {
    pub fn new(settings: &NotifySettings, translator: &Translator) -> Self {
        Self {
            services: settings.services.clone(),
            media_players: settings.media_players.clone(),
            speech_language: translator.speech_language(),
        }
    }

    pub fn notify<H: Host + ?Sized>(&self, host: &H, message: &str, priority: Priority, quiet: Quiet) {
        if priority == Priority::Debug {
            debug!(%message, "Debug notification");
            return;
        }
        info!(%message, ?priority, "Notifying");

        if quiet.night && priority != Priority::Urgent {
            debug!("Not speaking during quiet hours");
        } else {
            self.speak(host, message, quiet.silent);
        }

        for service in &self.services {
            actuate::call(
                host,
                "notify",
                service,
                json!({ "title": TITLE, "message": message }),
            );
        }

        if priority == Priority::Urgent {
            actuate::call(
                host,
                "persistent_notification",
                "create",
                json!({ "title": TITLE, "message": message }),
            );
        }
    }

    /// Speak `message` on every media player
    pub fn speak<H: Host + ?Sized>(&self, host: &H, message: &str, silent: bool) {
        if silent {
            debug!("No speech in silent mode");
            return;
        }
        if message.is_empty() {
            return;
        }
        for player in &self.media_players {
            actuate::call(
                host,
                "media_player",
                "volume_set",
                json!({ "entity_id": player.to_string(), "volume_level": TTS_VOLUME }),
            );
            actuate::call(
                host,
                "tts",
                "speak",
                json!({
                    "media_player_entity_id": player.to_string(),
                    "message": message,
                    "language": self.speech_language,
                    "cache": true,
                }),
            );
        }
    }
}
