//! INI file configuration adapter.

use crate::domain::error::UnumError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, UnumError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| UnumError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, UnumError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| UnumError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_float(&self, section: &str, key: &str) -> Result<Option<f64>, String> {
        self.get_string(section, key)
            .map(|v| v.parse::<f64>().map_err(|_| v))
            .transpose()
    }

    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, String> {
        self.get_string(section, key)
            .map(|v| Self::parse_bool(&v).ok_or(v))
            .transpose()
    }
}
