use crate::snapshot::Snapshot;
use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const SLOT_EXTENSION: &str = "xml";
pub const SYNC_SUFFIX: &str = ".steamsync";
pub const HOST_BACKUP_NAME: &str = "modsettings.lsx.backup";

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot index must be 1 or higher")]
    InvalidIndex,
    #[error("slot {0} is not set")]
    SlotNotFound(u32),
    #[error("slot file {} is missing or corrupt: {reason}", path.display())]
    CorruptOrMissingSlot { path: PathBuf, reason: String },
    #[error("{action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialize snapshot: {0}")]
    Serialize(String),
    #[error("mod activation failed: {0:#}")]
    Activation(anyhow::Error),
}

impl SlotError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        SlotError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSummary {
    pub index: u32,
    pub set: bool,
    pub build_number: Option<i64>,
    pub mod_count: Option<usize>,
    pub path: PathBuf,
}

/// Numbered snapshot files plus the fixed copy of the host's modsettings.
#[derive(Debug, Clone)]
pub struct SlotStore {
    dir: PathBuf,
    sync_mode: bool,
    host_config: PathBuf,
    host_backup: PathBuf,
}

impl SlotStore {
    pub fn new(dir: impl Into<PathBuf>, host_config: impl Into<PathBuf>, sync_mode: bool) -> Self {
        let dir = dir.into();
        let host_backup = dir.join(HOST_BACKUP_NAME);
        Self {
            dir,
            sync_mode,
            host_config: host_config.into(),
            host_backup,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sync_mode(&self) -> bool {
        self.sync_mode
    }

    pub fn host_config_path(&self) -> &Path {
        &self.host_config
    }

    pub fn host_backup_path(&self) -> &Path {
        &self.host_backup
    }

    pub fn slot_path(&self, index: u32) -> PathBuf {
        let mut name = format!("{index}.{SLOT_EXTENSION}");
        if self.sync_mode {
            name.push_str(SYNC_SUFFIX);
        }
        self.dir.join(name)
    }

    pub fn slot_exists(&self, index: u32) -> bool {
        index > 0 && self.slot_path(index).is_file()
    }

    pub fn read_slot(&self, index: u32) -> Result<Snapshot, SlotError> {
        check_index(index)?;
        let path = self.slot_path(index);
        let raw = fs::read_to_string(&path).map_err(|err| SlotError::CorruptOrMissingSlot {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        Snapshot::from_xml(&raw).map_err(|err| SlotError::CorruptOrMissingSlot {
            path,
            reason: err.to_string(),
        })
    }

    pub fn write_snapshot(&self, snapshot: &Snapshot, index: u32) -> Result<(), SlotError> {
        check_index(index)?;
        let xml = snapshot
            .to_xml()
            .map_err(|err| SlotError::Serialize(err.to_string()))?;
        fs::create_dir_all(&self.dir).map_err(|err| SlotError::io("create slot dir", &self.dir, err))?;
        write_atomic_text(&self.slot_path(index), &xml)
    }

    pub fn delete_slot(&self, index: u32) -> Result<(), SlotError> {
        check_index(index)?;
        let path = self.slot_path(index);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SlotError::io("delete slot", &path, err)),
        }
    }

    pub fn list_slots(&self, count: u32) -> Vec<SlotSummary> {
        (1..=count)
            .map(|index| {
                let path = self.slot_path(index);
                if !self.slot_exists(index) {
                    return SlotSummary {
                        index,
                        set: false,
                        build_number: None,
                        mod_count: None,
                        path,
                    };
                }
                let snapshot = self.read_slot(index).ok();
                SlotSummary {
                    index,
                    set: true,
                    build_number: snapshot.as_ref().map(|s| s.build_number),
                    mod_count: snapshot.as_ref().map(|s| s.active_mods.len()),
                    path,
                }
            })
            .collect()
    }

    pub fn backup_host_config(&self) -> Result<(), SlotError> {
        fs::create_dir_all(&self.dir).map_err(|err| SlotError::io("create slot dir", &self.dir, err))?;
        fs::copy(&self.host_config, &self.host_backup)
            .map_err(|err| SlotError::io("back up host config", &self.host_config, err))?;
        Ok(())
    }

    pub fn restore_host_config(&self) -> Result<(), SlotError> {
        if let Some(parent) = self.host_config.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| SlotError::io("create host config dir", parent, err))?;
        }
        fs::copy(&self.host_backup, &self.host_config)
            .map_err(|err| SlotError::io("restore host config", &self.host_backup, err))?;
        Ok(())
    }
}

fn check_index(index: u32) -> Result<(), SlotError> {
    if index == 0 {
        return Err(SlotError::InvalidIndex);
    }
    Ok(())
}

fn write_atomic_text(path: &Path, contents: &str) -> Result<(), SlotError> {
    let mut temp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    fs::write(&temp_path, contents).map_err(|err| SlotError::io("write slot temp", &temp_path, err))?;
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(SlotError::io("finalize slot", path, err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> SlotStore {
        SlotStore::new(dir.join("slots"), dir.join("modsettings.lsx"), false)
    }

    #[test]
    fn slot_path_depends_on_index_and_sync_mode() {
        let plain = SlotStore::new("/data/slots", "/host/modsettings.lsx", false);
        let synced = SlotStore::new("/data/slots", "/host/modsettings.lsx", true);
        assert_eq!(plain.slot_path(3), PathBuf::from("/data/slots/3.xml"));
        assert_eq!(synced.slot_path(3), PathBuf::from("/data/slots/3.xml.steamsync"));
        assert_eq!(plain.slot_path(3), plain.slot_path(3));
    }

    #[test]
    fn write_then_read_keeps_build_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let snapshot = Snapshot::new(42, ["base", "b", "a"]);
        store.write_snapshot(&snapshot, 1).unwrap();
        let read = store.read_slot(1).unwrap();
        assert_eq!(read.build_number, 42);
        assert_eq!(read.active_mods, vec!["base", "b", "a"]);
    }

    #[test]
    fn whitespace_in_ids_survives_the_slot_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let snapshot = Snapshot::new(3, [" spaced ", "a&b<c>", "", "x"]);
        store.write_snapshot(&snapshot, 1).unwrap();
        assert_eq!(store.read_slot(1).unwrap(), snapshot);
    }

    #[test]
    fn existence_follows_write_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(!store.slot_exists(2));
        store.write_snapshot(&Snapshot::new(1, ["x"]), 2).unwrap();
        assert!(store.slot_exists(2));
        store.delete_slot(2).unwrap();
        assert!(!store.slot_exists(2));
        store.delete_slot(2).unwrap();
    }

    #[test]
    fn write_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.write_snapshot(&Snapshot::new(1, ["old"]), 4).unwrap();
        store.write_snapshot(&Snapshot::new(2, ["new", "mods"]), 4).unwrap();
        assert_eq!(store.read_slot(4).unwrap(), Snapshot::new(2, ["new", "mods"]));
        assert!(!store.dir().join("4.xml.tmp").exists());
    }

    #[test]
    fn sync_mode_slots_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let plain = store(dir.path());
        let synced = SlotStore::new(dir.path().join("slots"), dir.path().join("modsettings.lsx"), true);
        plain.write_snapshot(&Snapshot::new(1, ["a"]), 1).unwrap();
        assert!(plain.slot_exists(1));
        assert!(!synced.slot_exists(1));
    }

    #[test]
    fn corrupt_and_missing_slots_report_corrupt_or_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(
            store.read_slot(5),
            Err(SlotError::CorruptOrMissingSlot { .. })
        ));

        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.slot_path(5), "<ModListSnapshot><buildNumber>").unwrap();
        assert!(matches!(
            store.read_slot(5),
            Err(SlotError::CorruptOrMissingSlot { .. })
        ));
    }

    #[test]
    fn index_zero_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(!store.slot_exists(0));
        assert!(matches!(
            store.write_snapshot(&Snapshot::default(), 0),
            Err(SlotError::InvalidIndex)
        ));
    }

    #[test]
    fn list_reports_set_and_unset_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.write_snapshot(&Snapshot::new(9, ["a", "b"]), 2).unwrap();
        let slots = store.list_slots(3);
        assert_eq!(slots.len(), 3);
        assert!(!slots[0].set);
        assert!(slots[1].set);
        assert_eq!(slots[1].build_number, Some(9));
        assert_eq!(slots[1].mod_count, Some(2));
        assert!(!slots[2].set);
    }

    #[test]
    fn host_config_backup_round_trips_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::write(store.host_config_path(), "original").unwrap();
        store.backup_host_config().unwrap();
        fs::write(store.host_config_path(), "changed").unwrap();
        store.restore_host_config().unwrap();
        assert_eq!(fs::read_to_string(store.host_config_path()).unwrap(), "original");
    }

    #[test]
    fn host_config_backup_fails_without_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(store.backup_host_config(), Err(SlotError::Io { .. })));
    }
}
