use crate::{
    activation::ModActivation,
    config::SlotNames,
    slots::{SlotError, SlotStore},
    snapshot::Snapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Saving,
    Loading,
}

/// The one action that `undo_last_action` can reverse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingUndo {
    #[default]
    None,
    /// A load replaced the active mods; `previous` is what was active before it.
    Restore { slot: u32, previous: Snapshot },
    /// A save replaced the slot; `prior` is its old content, `None` if it was unset.
    Backup { slot: u32, prior: Option<Snapshot> },
}

pub struct SlotEngine<A: ModActivation> {
    store: SlotStore,
    activation: A,
    mode: Mode,
    current: Option<Snapshot>,
    pending: PendingUndo,
}

impl<A: ModActivation> SlotEngine<A> {
    pub fn new(store: SlotStore, activation: A) -> Self {
        Self {
            store,
            activation,
            mode: Mode::Idle,
            current: None,
            pending: PendingUndo::None,
        }
    }

    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    pub fn activation(&self) -> &A {
        &self.activation
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> &PendingUndo {
        &self.pending
    }

    pub fn can_undo(&self) -> bool {
        !matches!(self.pending, PendingUndo::None)
    }

    pub fn capture_current(&self) -> Snapshot {
        Snapshot::new(
            self.activation.build_number(),
            self.activation.active_mods_in_load_order(),
        )
    }

    pub fn state_is_set(&self, index: u32) -> bool {
        self.store.slot_exists(index)
    }

    pub fn display_name(&self, index: u32, names: &dyn SlotNames) -> String {
        slot_display_name(index, names)
    }

    /// Writes the live mod list into `index`. On failure the slot is left as it
    /// was and the live list falls back to the base module.
    pub fn save_state(&mut self, index: u32) -> Result<(), SlotError> {
        check_index(index)?;
        self.mode = Mode::Saving;
        let result = self.try_save(index);
        if let Err(err) = &result {
            self.recover("save", index, err);
        }
        result
    }

    pub fn load_state(&mut self, index: u32) -> Result<(), SlotError> {
        check_index(index)?;
        self.mode = Mode::Loading;
        let result = self.try_load(index);
        if let Err(err) = &result {
            self.recover("load", index, err);
        }
        result
    }

    /// Clears every active mod, base included, then activates `ids` in order.
    pub fn set_active_mods(&mut self, ids: &[String]) -> Result<(), SlotError> {
        self.activation.clear_all();
        for id in ids {
            self.activation.set_active(id, true);
        }
        self.activation.save().map_err(SlotError::Activation)?;
        self.current = Some(self.capture_current());
        Ok(())
    }

    /// Replays the reversal for the most recent save or load. The descriptor
    /// stays in place, so calling this again replays the same reversal.
    pub fn undo_last_action(&mut self) -> bool {
        let result = match self.pending.clone() {
            PendingUndo::None => {
                log::warn!("Nothing to undo");
                return false;
            }
            PendingUndo::Restore { slot, previous } => {
                log::info!(
                    "Undo load of slot {slot}: restoring {} mod(s)",
                    previous.active_mods.len()
                );
                self.set_active_mods(&previous.active_mods)
            }
            PendingUndo::Backup {
                slot,
                prior: Some(prior),
            } => {
                log::info!("Undo save to slot {slot}: rewriting previous content");
                self.store.write_snapshot(&prior, slot)
            }
            PendingUndo::Backup { slot, prior: None } => {
                log::info!("Undo save to slot {slot}: slot was unset, deleting");
                self.store.delete_slot(slot)
            }
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                log::error!("Undo failed: {err}");
                false
            }
        }
    }

    fn try_save(&mut self, index: u32) -> Result<(), SlotError> {
        let prior = if self.store.slot_exists(index) {
            match self.store.read_slot(index) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    self.pending = PendingUndo::None;
                    return Err(err);
                }
            }
        } else {
            None
        };
        self.pending = PendingUndo::Backup { slot: index, prior };

        let snapshot = self.capture_current();
        self.store.write_snapshot(&snapshot, index)?;
        log::info!(
            "Saved {} mod(s) to slot {index} (build {})",
            snapshot.active_mods.len(),
            snapshot.build_number
        );
        self.current = Some(snapshot);
        Ok(())
    }

    fn try_load(&mut self, index: u32) -> Result<(), SlotError> {
        self.pending = PendingUndo::Restore {
            slot: index,
            previous: self.capture_current(),
        };

        if !self.store.slot_exists(index) {
            return Err(SlotError::SlotNotFound(index));
        }
        let snapshot = self.store.read_slot(index)?;
        self.set_active_mods(&snapshot.active_mods)?;
        log::info!(
            "Loaded {} mod(s) from slot {index} (build {})",
            snapshot.active_mods.len(),
            snapshot.build_number
        );
        Ok(())
    }

    fn recover(&mut self, action: &str, index: u32, err: &SlotError) {
        log::error!("Failed to {action} slot {index}: {err}");
        self.activation.reset();
        if let Err(save_err) = self.activation.save() {
            log::error!("Failed to persist baseline mod list: {save_err:#}");
        }
        self.current = Some(self.capture_current());
    }
}

pub fn slot_display_name(index: u32, names: &dyn SlotNames) -> String {
    names
        .slot_name(index)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| default_slot_name(index))
}

fn check_index(index: u32) -> Result<(), SlotError> {
    if index == 0 {
        return Err(SlotError::InvalidIndex);
    }
    Ok(())
}

fn default_slot_name(index: u32) -> String {
    format!("Slot {index}")
}
