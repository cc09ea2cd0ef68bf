use crate::bg3;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub const APP_DIR_NAME: &str = "sigilsmith-slots";
const DEFAULT_SLOT_COUNT: u32 = 10;

/// User-assigned slot names.
pub trait SlotNames {
    fn slot_name(&self, index: u32) -> Option<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub larian_dir: Option<PathBuf>,
    #[serde(default)]
    pub slot_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync_mode: bool,
    #[serde(default = "default_slot_count")]
    pub slot_count: u32,
    #[serde(default)]
    pub slot_names: BTreeMap<u32, String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(skip)]
    data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            larian_dir: None,
            slot_dir: None,
            sync_mode: false,
            slot_count: DEFAULT_SLOT_COUNT,
            slot_names: BTreeMap::new(),
            log_level: default_log_level(),
            data_dir: PathBuf::new(),
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            config.data_dir = data_dir.to_path_buf();
            if config.slot_count == 0 {
                config.slot_count = DEFAULT_SLOT_COUNT;
                config.save()?;
            }
            return Ok(config);
        }

        let config = AppConfig {
            data_dir: data_dir.to_path_buf(),
            ..AppConfig::default()
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).context("create app data dir")?;
        let path = self.data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(format!("{APP_DIR_NAME}.log"))
    }

    pub fn slot_dir(&self) -> PathBuf {
        self.slot_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("slots"))
    }

    pub fn modsettings_path(&self) -> Result<PathBuf> {
        let paths = bg3::detect_paths(self.larian_dir.as_deref())?;
        Ok(paths.modsettings_path)
    }

    pub fn set_slot_name(&mut self, index: u32, name: &str) {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            self.slot_names.remove(&index);
        } else {
            self.slot_names.insert(index, trimmed.to_string());
        }
    }
}

impl SlotNames for AppConfig {
    fn slot_name(&self, index: u32) -> Option<String> {
        self.slot_names.get(&index).cloned()
    }
}

fn default_slot_count() -> u32 {
    DEFAULT_SLOT_COUNT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join(APP_DIR_NAME))
}
