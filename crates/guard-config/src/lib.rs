//! Configuration for homeguard
//!
//! `homeguard.yaml` is read from a config directory with these custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_merge_named dir` - Merge mappings from all YAML files in a directory
//! - `!secret key` - Substitute from secrets.yaml (e.g. the panel PIN)
//! - `!env_var VAR` - Environment variable substitution
//!
//! The processed document is then deserialized into [`GuardConfig`].
//!
//! ```ignore
//! use guard_config::GuardConfig;
//!
//! let config = GuardConfig::load("/etc/homeguard")?;
//! println!("panel: {}", config.alarm.panel);
//! ```

mod error;
mod loader;
mod secrets;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};
pub use secrets::Secrets;
pub use settings::{
    AlarmSettings, ArmingProfile, AutoArmSettings, ChangeSettings, GuardConfig, Language,
    NightSettings, NotifySettings, PresenceSettings, ProfileGroups, SimulatedEntity,
    CONFIG_FILE,
};

pub use serde_yaml::Value;
