//! Settings persistence, profiles, imports and exports.
//!
//! [`SettingsStore`] owns everything that survives a restart:
//!
//! | Key | Contents | Written |
//! |-----|----------|---------|
//! | `headshot-studio.settings.v1` | [`SettingsSnapshot`] | trailing debounce after each edit |
//! | `headshot-studio.profiles.v1` | `[Profile]` | once per save, delete or merge |
//!
//! Persistence failures never reach the caller: they are logged and the
//! in-memory state carries on. Import failures do reach the caller as
//! [`ImportError`], and leave every piece of state as it was.

pub mod export;
pub mod persist;
pub mod profiles;
pub mod sanitize;

pub use export::{ClipboardSink, DirectorySink, ExportOutcome, ExportSink, deliver};
pub use persist::{FileStore, KeyValueStore, MemoryStore};
pub use profiles::{BundleEntry, MergeSummary, Profile, ProfileBook};
pub use sanitize::{Restored, SettingsSnapshot, restore, sanitize_imported};

use crate::catalog::Catalog;
use crate::config::ClientConfig;
use crate::naming::{clean_profile_name, default_profile_name};
use crate::scheduler::Debounce;
use crate::settings::{Adjustments, Settings, SettingsPatch};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SETTINGS_KEY: &str = "headshot-studio.settings.v1";
pub const PROFILES_KEY: &str = "headshot-studio.profiles.v1";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a JSON object")]
    NotAnObject,
    #[error("Bundle was exported by another app ({0})")]
    AppMismatch(String),
    #[error("Bundle version must be a number, got {0}")]
    BadVersion(String),
    #[error("Bundle contains no profiles")]
    EmptyBundle,
    #[error("Bundle has {count} profiles; at most {max} can be imported at once")]
    TooManyEntries { count: usize, max: usize },
    #[error("Bundle has no profiles list")]
    MissingEntries,
    #[error("Profile #{index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

/// Parse import text. Shared by every import path.
pub fn parse_json(text: &str) -> Result<Value, ImportError> {
    Ok(serde_json::from_str(text.trim_start_matches('\u{feff}'))?)
}

pub struct SettingsStore {
    backend: Box<dyn KeyValueStore>,
    save_timer: Debounce,
    pending: Option<String>,
    book: ProfileBook,
    max_bundle_entries: usize,
}

impl SettingsStore {
    /// Wrap a backend and load the stored profiles.
    pub fn new(backend: Box<dyn KeyValueStore>, config: &ClientConfig) -> Self {
        let stored = backend.get(PROFILES_KEY);
        let book = ProfileBook::from_json(stored.as_deref(), config.profiles.max_profiles);
        debug!(profiles = book.len(), "profiles loaded");
        Self {
            backend,
            save_timer: Debounce::new(config.timing.persist_debounce_ms),
            pending: None,
            book,
            max_bundle_entries: config.profiles.max_bundle_entries,
        }
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.backend.as_ref()
    }

    // -------------------------------------------------------------------------
    // Live settings
    // -------------------------------------------------------------------------

    /// Restore the persisted snapshot over `prior`.
    pub fn load_settings(&self, prior: &Settings, catalog: &Catalog) -> Restored {
        match self.backend.get(SETTINGS_KEY) {
            Some(text) => restore(&text, prior, catalog),
            None => Restored {
                settings: prior.clone(),
                manual_stash: None,
            },
        }
    }

    pub fn serialize(settings: &Settings, manual_stash: Option<&Adjustments>) -> SettingsSnapshot {
        SettingsSnapshot::capture(settings, manual_stash)
    }

    /// Capture now, write after the quiet window.
    pub fn schedule_save(&mut self, now: u64, settings: &Settings, manual_stash: Option<&Adjustments>) {
        match serde_json::to_string(&Self::serialize(settings, manual_stash)) {
            Ok(text) => {
                self.pending = Some(text);
                self.save_timer.arm(now);
            }
            Err(err) => warn!(error = %err, "failed to serialize settings"),
        }
    }

    /// Write the pending snapshot if its window has elapsed.
    pub fn poll(&mut self, now: u64) -> bool {
        if self.save_timer.fire(now) {
            return self.write_pending();
        }
        false
    }

    /// Write any pending snapshot immediately.
    pub fn flush(&mut self) -> bool {
        self.save_timer.cancel();
        self.write_pending()
    }

    fn write_pending(&mut self) -> bool {
        let Some(text) = self.pending.take() else {
            return false;
        };
        let ok = self.backend.set(SETTINGS_KEY, &text);
        if ok {
            debug!("settings persisted");
        }
        ok
    }

    pub fn has_pending_save(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.save_timer.deadline()
    }

    // -------------------------------------------------------------------------
    // Profiles
    // -------------------------------------------------------------------------

    pub fn profiles(&self) -> &[Profile] {
        self.book.profiles()
    }

    pub fn find_profile(&self, name: &str) -> Option<&Profile> {
        self.book.find(name)
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.book.get(id)
    }

    fn persist_profiles(&mut self) -> bool {
        let ok = self.backend.set(PROFILES_KEY, &self.book.to_json());
        if !ok {
            warn!("profiles kept in memory only");
        }
        ok
    }

    /// Save the current settings as a new profile.
    ///
    /// A blank name falls back to [`default_profile_name`]. The stored name is
    /// made unique.
    pub fn save_profile(&mut self, name: &str, settings: &Settings, catalog: &Catalog, now: u64) -> Profile {
        let name = clean_profile_name(name)
            .or_else(|| clean_profile_name(&default_profile_name(settings, catalog)))
            .unwrap_or_else(|| "Profile".to_string());
        let profile = self.book.insert(&name, SettingsPatch::from_settings(settings), now);
        info!(id = %profile.id, name = %profile.name, "profile saved");
        self.persist_profiles();
        profile
    }

    /// Delete by id. Deleting an unknown id is a no-op.
    pub fn delete_profile(&mut self, id: &str) -> bool {
        if !self.book.remove(id) {
            return false;
        }
        self.persist_profiles();
        true
    }

    /// Validate and merge a bundle. On error nothing changes.
    pub fn merge_bundle(
        &mut self,
        raw: &Value,
        overwrite: bool,
        defaults: &Settings,
        catalog: &Catalog,
        now: u64,
    ) -> Result<MergeSummary, ImportError> {
        let entries = profiles::parse_bundle(raw, defaults, catalog, self.max_bundle_entries)?;
        let summary = self.book.merge(entries, overwrite, now);
        info!(
            added = summary.added,
            overwritten = summary.overwritten,
            renamed = summary.renamed,
            "bundle merged"
        );
        self.persist_profiles();
        Ok(summary)
    }

    /// Decode a single preset: a bare settings object or a one-entry bundle.
    ///
    /// Returns the entry's name when the document carried one.
    pub fn import_preset(
        raw: &Value,
        defaults: &Settings,
        catalog: &Catalog,
    ) -> Result<(Option<String>, SettingsPatch), ImportError> {
        let is_bundle = raw.get("profiles").is_some_and(Value::is_array);
        if !is_bundle {
            return Ok((None, sanitize_imported(raw, defaults, catalog)?));
        }
        let mut entries = profiles::parse_bundle(raw, defaults, catalog, 1)?;
        let entry = entries.remove(0);
        Ok((Some(entry.name), entry.settings))
    }

    // -------------------------------------------------------------------------
    // Exports
    // -------------------------------------------------------------------------

    pub fn export_preset(name: &str, settings: &Settings) -> String {
        export::preset_document(name, &SettingsPatch::from_settings(settings))
    }

    pub fn export_bundle(&self) -> String {
        export::bundle_document(self.book.profiles())
    }
}
