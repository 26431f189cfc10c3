//! YAML loader resolving `!include`, `!include_dir_merge_named`, `!secret`
//! and `!env_var` tags

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub struct YamlLoader {
    /// Base directory for relative paths
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, for cycle detection
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: HashSet::new(),
        }
    }

    /// Load a file relative to the config directory and resolve its tags
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!(path = %path.display(), "Loading YAML file");

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Parse `content` and resolve its tags; `source_path` anchors relative includes
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.resolve(value, source_path)
    }

    fn resolve(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.resolve_tag(*tagged, source_path),
            Value::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(self.resolve(k, source_path)?, self.resolve(v, source_path)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.resolve(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn resolve_tag(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(%tag, value = ?tagged.value, "Resolving tag");

        match tag.as_str() {
            "!include" => {
                let path = self.tag_path(&tagged.value, source_path)?;
                self.load_file(path)
            }
            "!include_dir_merge_named" => {
                let dir = self.tag_path(&tagged.value, source_path)?;
                self.merge_named_dir(&dir)
            }
            "!secret" => {
                let key = tag_string(&tagged.value, "!secret")?;
                let secret = self.secrets.get(key)?;
                debug!(key, "Substituted secret");
                Ok(Value::String(secret.to_string()))
            }
            "!env_var" => {
                let var = tag_string(&tagged.value, "!env_var")?;
                let value = std::env::var(var).map_err(|_| ConfigError::EnvVarNotFound {
                    var: var.to_string(),
                })?;
                Ok(Value::String(value))
            }
            _ => {
                // Unknown tags survive untouched for serde to reject or accept
                let value = self.resolve(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(TaggedValue {
                    tag: tagged.tag,
                    value,
                })))
            }
        }
    }

    /// Merge the top-level mappings of every `.yaml`/`.yml` file in `dir`,
    /// in file-name order; later files win on duplicate keys
    fn merge_named_dir(&mut self, dir: &Path) -> ConfigResult<Value> {
        if !dir.is_dir() {
            return Err(ConfigError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| ConfigError::ReadFile {
                path: dir.to_path_buf(),
                source: e,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")))
            .collect();
        files.sort();

        let mut merged = Mapping::new();
        for file in files {
            match self.load_file(&file)? {
                Value::Mapping(map) => merged.extend(map),
                Value::Null => {}
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: file.display().to_string(),
                        reason: "merged file must contain a mapping".to_string(),
                    })
                }
            }
        }

        Ok(Value::Mapping(merged))
    }

    /// Include paths are relative to the including file
    fn tag_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let raw = value
            .as_str()
            .ok_or_else(|| ConfigError::InvalidIncludePath {
                path: format!("{value:?}"),
                reason: "path must be a string".to_string(),
            })?;

        let raw = Path::new(raw);
        if raw.is_absolute() {
            return Ok(raw.to_path_buf());
        }
        let base = source_path.parent().unwrap_or(&self.config_dir);
        Ok(base.join(raw))
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn tag_string<'a>(value: &'a Value, tag: &str) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: tag.to_string(),
        reason: "argument must be a string".to_string(),
    })
}

/// Load `file` from `config_dir` with full tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir)?;
    loader.load_file(file)
}

/// Process an in-memory document; relative includes resolve against `config_dir`
pub fn load_yaml_string(config_dir: impl Into<PathBuf>, content: &str) -> ConfigResult<Value> {
    let config_dir = config_dir.into();
    let source = config_dir.join("inline.yaml");
    let mut loader = YamlLoader::new(config_dir)?;
    loader.load_string(content, &source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn key(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn test_include_sensor_list() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "sensors/doors.yaml",
            "- binary_sensor.front_door\n- binary_sensor.back_door\n",
        );
        write_file(
            dir.path(),
            "homeguard.yaml",
            "alarm:\n  doors: !include sensors/doors.yaml\n",
        );

        let value = load_yaml(dir.path(), "homeguard.yaml").unwrap();
        let doors = &value["alarm"]["doors"];
        assert_eq!(doors.as_sequence().unwrap().len(), 2);
        assert_eq!(doors[0], key("binary_sensor.front_door"));
    }

    #[test]
    fn test_nested_include_is_relative_to_includer() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "parts/alarm.yaml", "lights: !include lights.yaml\n");
        write_file(dir.path(), "parts/lights.yaml", "- light.hall\n");
        write_file(dir.path(), "homeguard.yaml", "alarm: !include parts/alarm.yaml\n");

        let value = load_yaml(dir.path(), "homeguard.yaml").unwrap();
        assert_eq!(value["alarm"]["lights"][0], key("light.hall"));
    }

    #[test]
    fn test_secret_pin() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "secrets.yaml", "alarm_pin: 4711\n");
        write_file(dir.path(), "homeguard.yaml", "alarm:\n  pin: !secret alarm_pin\n");

        let value = load_yaml(dir.path(), "homeguard.yaml").unwrap();
        assert_eq!(value["alarm"]["pin"], key("4711"));
    }

    #[test]
    fn test_missing_secret() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "homeguard.yaml", "pin: !secret alarm_pin\n");

        let result = load_yaml(dir.path(), "homeguard.yaml");
        assert!(matches!(result, Err(ConfigError::SecretNotFound { .. })));
    }

    #[test]
    fn test_env_var() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("HOMEGUARD_TEST_LANGUAGE", "german");
        write_file(
            dir.path(),
            "homeguard.yaml",
            "notify:\n  language: !env_var HOMEGUARD_TEST_LANGUAGE\n",
        );

        let value = load_yaml(dir.path(), "homeguard.yaml").unwrap();
        assert_eq!(value["notify"]["language"], key("german"));
        std::env::remove_var("HOMEGUARD_TEST_LANGUAGE");

        write_file(dir.path(), "other.yaml", "x: !env_var HOMEGUARD_TEST_UNSET_VAR\n");
        assert!(matches!(
            load_yaml(dir.path(), "other.yaml"),
            Err(ConfigError::EnvVarNotFound { .. })
        ));
    }

    #[test]
    fn test_merge_named_dir() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "profiles/10-home.yaml",
            "armed_home:\n  doors: [binary_sensor.front_door]\n",
        );
        write_file(
            dir.path(),
            "profiles/20-always.yml",
            "always:\n  water: [binary_sensor.basement_leak]\n",
        );
        write_file(dir.path(), "profiles/notes.txt", "ignored");
        write_file(
            dir.path(),
            "homeguard.yaml",
            "profiles: !include_dir_merge_named profiles\n",
        );

        let value = load_yaml(dir.path(), "homeguard.yaml").unwrap();
        let profiles = value["profiles"].as_mapping().unwrap();
        assert_eq!(profiles.len(), 2);
        assert!(profiles.contains_key(&key("armed_home")));
        assert!(profiles.contains_key(&key("always")));
    }

    #[test]
    fn test_merge_named_missing_dir() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "homeguard.yaml", "p: !include_dir_merge_named nope\n");
        assert!(matches!(
            load_yaml(dir.path(), "homeguard.yaml"),
            Err(ConfigError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_circular_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "a: !include a.yaml\n");

        let result = load_yaml(dir.path(), "a.yaml");
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_load_yaml_string_resolves_against_config_dir() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "lights.yaml", "- light.porch\n");

        let value = load_yaml_string(dir.path(), "lights: !include lights.yaml\n").unwrap();
        assert_eq!(value["lights"][0], key("light.porch"));
    }
}
