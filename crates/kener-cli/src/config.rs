//! Named connection profiles, stored as YAML.
//!
//! Example file (`~/.config/kener-agent/config.yml`):
//!
//! ```yaml
//! default: prod
//! instances:
//!   prod:
//!     host: 10.10.3.1
//!     port: 3000
//!     token: <bearer token>
//!     folder: /srv/monitors
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config found at {0}, run `login` first")]
    NotFound(PathBuf),
    #[error("no instances defined, run `login` first")]
    NoInstances,
    #[error("instance '{0}' not found in config")]
    UnknownInstance(String),
    #[error("no default instance set, choose one with `set-default`")]
    NoDefault,
    #[error("'{0}' is the default instance, pass --new-default to remove it")]
    DefaultRemoval(String),
    #[error("could not determine the user config directory")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub token: String,
    pub folder: PathBuf,
}

pub fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub instances: BTreeMap<String, Instance>,
    #[serde(default)]
    pub default: Option<String>,
}

/// Reads and writes [`AgentConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct InstanceStore {
    path: PathBuf,
}

impl InstanceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<user config dir>/kener-agent/config.yml`.
    pub fn default_location() -> Result<Self, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(dir.join("kener-agent").join("config.yml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<AgentConfig, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::NotFound(self.path.clone()));
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(AgentConfig::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn read_or_default(&self) -> Result<AgentConfig, ConfigError> {
        match self.read() {
            Err(ConfigError::NotFound(_)) => Ok(AgentConfig::default()),
            other => other,
        }
    }

    fn write(&self, config: &AgentConfig) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_yaml::to_string(config).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, content).map_err(io_err)?;
        debug!(path = %self.path.display(), "Wrote agent config");
        Ok(())
    }

    /// Add or overwrite an instance. The first instance saved becomes the
    /// default even without `make_default`.
    pub fn save_instance(
        &self,
        name: &str,
        instance: Instance,
        make_default: bool,
    ) -> Result<(), ConfigError> {
        let mut config = self.read_or_default()?;
        config.instances.insert(name.to_string(), instance);
        if make_default || config.default.is_none() {
            config.default = Some(name.to_string());
        }
        self.write(&config)?;
        info!(instance = name, path = %self.path.display(), "Instance saved");
        Ok(())
    }

    /// Load `name`, or the default instance when `name` is `None`.
    /// Returns the resolved instance name together with its settings.
    pub fn load_instance(&self, name: Option<&str>) -> Result<(String, Instance), ConfigError> {
        let config = self.read()?;
        if config.instances.is_empty() {
            return Err(ConfigError::NoInstances);
        }
        let name = match name {
            Some(n) => n.to_string(),
            None => config.default.clone().ok_or(ConfigError::NoDefault)?,
        };
        match config.instances.get(&name) {
            Some(instance) => Ok((name, instance.clone())),
            None if config.default.as_deref() == Some(name.as_str()) => Err(ConfigError::NoDefault),
            None => Err(ConfigError::UnknownInstance(name)),
        }
    }

    pub fn set_default(&self, name: &str) -> Result<(), ConfigError> {
        let mut config = self.read()?;
        if !config.instances.contains_key(name) {
            return Err(ConfigError::UnknownInstance(name.to_string()));
        }
        config.default = Some(name.to_string());
        self.write(&config)?;
        info!(instance = name, "Default instance set");
        Ok(())
    }

    pub fn list(&self) -> Result<AgentConfig, ConfigError> {
        self.read()
    }

    /// Remove an instance. The current default can only be removed when a
    /// replacement default is given; removing the last instance clears it.
    pub fn remove(&self, name: &str, new_default: Option<&str>) -> Result<(), ConfigError> {
        let mut config = self.read()?;
        if !config.instances.contains_key(name) {
            return Err(ConfigError::UnknownInstance(name.to_string()));
        }
        if let Some(replacement) = new_default {
            if replacement == name || !config.instances.contains_key(replacement) {
                return Err(ConfigError::UnknownInstance(replacement.to_string()));
            }
        }

        let is_default = config.default.as_deref() == Some(name);
        let is_last = config.instances.len() == 1;
        match (is_default, new_default) {
            (true, Some(replacement)) => config.default = Some(replacement.to_string()),
            (true, None) if is_last => config.default = None,
            (true, None) => return Err(ConfigError::DefaultRemoval(name.to_string())),
            (false, Some(replacement)) => config.default = Some(replacement.to_string()),
            (false, None) => {}
        }

        config.instances.remove(name);
        self.write(&config)?;
        info!(instance = name, "Instance removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> InstanceStore {
        InstanceStore::new(dir.path().join("nested").join("config.yml"))
    }

    fn instance(host: &str) -> Instance {
        Instance {
            host: host.into(),
            port: 3000,
            token: "t".into(),
            folder: PathBuf::from("/srv/monitors"),
        }
    }

    #[test]
    fn first_saved_instance_becomes_default() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_instance("dev", instance("dev.local"), false).unwrap();
        store.save_instance("prod", instance("prod.local"), false).unwrap();

        let (name, loaded) = store.load_instance(None).unwrap();
        assert_eq!(name, "dev");
        assert_eq!(loaded.host, "dev.local");
        assert_eq!(store.load_instance(Some("prod")).unwrap().1.host, "prod.local");
    }

    #[test]
    fn save_with_default_flag_switches_default() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_instance("dev", instance("dev.local"), false).unwrap();
        store.save_instance("prod", instance("prod.local"), true).unwrap();
        assert_eq!(store.list().unwrap().default.as_deref(), Some("prod"));
    }

    #[test]
    fn load_without_file_asks_for_login() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(store(&dir).load_instance(None), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn load_unknown_instance_fails() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_instance("dev", instance("dev.local"), false).unwrap();
        assert!(matches!(
            store.load_instance(Some("qa")),
            Err(ConfigError::UnknownInstance(n)) if n == "qa"
        ));
    }

    #[test]
    fn load_without_usable_default_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let store = InstanceStore::new(&path);

        std::fs::write(&path, "instances:\n  dev:\n    host: h\n    token: t\n    folder: /m\n").unwrap();
        assert!(matches!(store.load_instance(None), Err(ConfigError::NoDefault)));

        std::fs::write(
            &path,
            "default: prod\ninstances:\n  dev:\n    host: h\n    token: t\n    folder: /m\n",
        )
        .unwrap();
        assert!(matches!(store.load_instance(None), Err(ConfigError::NoDefault)));
        assert_eq!(store.load_instance(Some("dev")).unwrap().0, "dev");
    }

    #[test]
    fn reads_hand_written_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "default: prod\ninstances:\n  prod:\n    host: 10.10.3.1\n    token: abc\n    folder: /srv/m\n",
        )
        .unwrap();
        let (_, prod) = InstanceStore::new(path).load_instance(None).unwrap();
        assert_eq!(prod.port, 3000);
        assert_eq!(prod.folder, PathBuf::from("/srv/m"));
    }

    #[test]
    fn set_default_requires_known_instance() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_instance("dev", instance("dev.local"), false).unwrap();
        assert!(store.set_default("qa").is_err());
        store.save_instance("qa", instance("qa.local"), false).unwrap();
        store.set_default("qa").unwrap();
        assert_eq!(store.load_instance(None).unwrap().0, "qa");
    }

    #[test]
    fn remove_refuses_default_without_replacement() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_instance("dev", instance("dev.local"), false).unwrap();
        store.save_instance("prod", instance("prod.local"), false).unwrap();

        assert!(matches!(
            store.remove("dev", None),
            Err(ConfigError::DefaultRemoval(_))
        ));
        store.remove("dev", Some("prod")).unwrap();

        let config = store.list().unwrap();
        assert_eq!(config.default.as_deref(), Some("prod"));
        assert!(!config.instances.contains_key("dev"));
    }

    #[test]
    fn remove_last_instance_clears_default() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_instance("dev", instance("dev.local"), false).unwrap();
        store.remove("dev", None).unwrap();

        let config = store.list().unwrap();
        assert!(config.instances.is_empty());
        assert_eq!(config.default, None);
        assert!(matches!(store.load_instance(None), Err(ConfigError::NoInstances)));
    }

    #[test]
    fn remove_non_default_keeps_default() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_instance("dev", instance("dev.local"), false).unwrap();
        store.save_instance("qa", instance("qa.local"), false).unwrap();
        store.remove("qa", None).unwrap();
        assert_eq!(store.list().unwrap().default.as_deref(), Some("dev"));
    }
}
