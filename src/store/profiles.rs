//! Saved profiles and bundle merging.
//!
//! The collection is ordered newest first and capped. Every mutation builds
//! the new list completely before swapping it in, so a rejected bundle leaves
//! the collection exactly as it was.

use super::ImportError;
use super::sanitize::sanitize_imported;
use crate::catalog::Catalog;
use crate::naming::{clean_profile_name, disambiguate, same_name};
use crate::settings::{Settings, SettingsPatch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Application tag written into exported documents.
pub const APP_TAG: &str = "headshot-studio";
/// Current bundle format version.
pub const BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    pub settings: SettingsPatch,
}

impl Profile {
    pub fn new(name: String, settings: SettingsPatch, now: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            created_at: now,
            settings,
        }
    }
}

/// Counts reported after a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub added: usize,
    pub overwritten: usize,
    pub renamed: usize,
}

/// One validated bundle entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleEntry {
    pub name: String,
    pub settings: SettingsPatch,
}

/// Validate a bundle document and sanitize every entry.
///
/// All-or-nothing: the first bad entry fails the whole bundle.
pub fn parse_bundle(
    raw: &Value,
    defaults: &Settings,
    catalog: &Catalog,
    max_entries: usize,
) -> Result<Vec<BundleEntry>, ImportError> {
    let obj = raw.as_object().ok_or(ImportError::NotAnObject)?;

    if let Some(app) = obj.get("app") {
        match app.as_str() {
            Some(tag) if tag == APP_TAG => {}
            _ => return Err(ImportError::AppMismatch(app.to_string())),
        }
    }
    if let Some(version) = obj.get("version")
        && !version.is_number()
    {
        return Err(ImportError::BadVersion(version.to_string()));
    }

    let entries = obj
        .get("profiles")
        .and_then(Value::as_array)
        .ok_or(ImportError::MissingEntries)?;
    if entries.is_empty() {
        return Err(ImportError::EmptyBundle);
    }
    if entries.len() > max_entries {
        return Err(ImportError::TooManyEntries {
            count: entries.len(),
            max: max_entries,
        });
    }

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let invalid = |reason: &str| ImportError::InvalidEntry {
                index: index + 1,
                reason: reason.to_string(),
            };
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .and_then(clean_profile_name)
                .ok_or_else(|| invalid("missing or blank name"))?;
            let settings = entry
                .get("settings")
                .ok_or_else(|| invalid("missing settings"))
                .and_then(|s| sanitize_imported(s, defaults, catalog).map_err(|_| invalid("settings must be an object")))?;
            Ok(BundleEntry { name, settings })
        })
        .collect()
}

/// The persisted profile collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileBook {
    profiles: Vec<Profile>,
    max_profiles: usize,
}

impl ProfileBook {
    pub fn new(max_profiles: usize) -> Self {
        Self {
            profiles: Vec::new(),
            max_profiles: max_profiles.max(1),
        }
    }

    /// Load from persisted JSON. Corrupt data yields an empty book; individual
    /// malformed records are skipped.
    pub fn from_json(text: Option<&str>, max_profiles: usize) -> Self {
        let mut book = Self::new(max_profiles);
        let Some(Value::Array(items)) = text.and_then(|t| serde_json::from_str::<Value>(t).ok()) else {
            return book;
        };
        for item in items {
            match serde_json::from_value::<Profile>(item) {
                Ok(mut profile) => {
                    let Some(name) = clean_profile_name(&profile.name) else {
                        continue;
                    };
                    if book.find(&name).is_some() {
                        continue;
                    }
                    profile.name = name;
                    book.profiles.push(profile);
                }
                Err(err) => debug!(error = %err, "skipping malformed stored profile"),
            }
        }
        book.profiles.truncate(book.max_profiles);
        book
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.profiles).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Case-insensitive lookup by name.
    pub fn find(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| same_name(&p.name, name))
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    fn is_taken(profiles: &[Profile], name: &str) -> bool {
        profiles.iter().any(|p| same_name(&p.name, name))
    }

    /// Add a profile at the front under a unique name.
    pub fn insert(&mut self, name: &str, settings: SettingsPatch, now: u64) -> Profile {
        let (name, _) = disambiguate(name, |n| Self::is_taken(&self.profiles, n), now);
        let profile = Profile::new(name, settings, now);
        self.profiles.insert(0, profile.clone());
        self.profiles.truncate(self.max_profiles);
        profile
    }

    /// Remove by id. Returns true if something was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.id != id);
        self.profiles.len() != before
    }

    /// Merge validated bundle entries.
    ///
    /// With `overwrite`, a colliding profile keeps its id, takes the new
    /// settings and moves to the front. Without it, the entry is added under a
    /// suffixed name.
    pub fn merge(&mut self, entries: Vec<BundleEntry>, overwrite: bool, now: u64) -> MergeSummary {
        let mut next = self.profiles.clone();
        let mut summary = MergeSummary::default();

        for entry in entries {
            let existing = next.iter().position(|p| same_name(&p.name, &entry.name));
            match existing {
                Some(index) if overwrite => {
                    let mut profile = next.remove(index);
                    profile.settings = entry.settings;
                    next.insert(0, profile);
                    summary.overwritten += 1;
                }
                Some(_) => {
                    let (name, _) = disambiguate(&entry.name, |n| Self::is_taken(&next, n), now);
                    next.insert(0, Profile::new(name, entry.settings, now));
                    summary.renamed += 1;
                    summary.added += 1;
                }
                None => {
                    next.insert(0, Profile::new(entry.name, entry.settings, now));
                    summary.added += 1;
                }
            }
        }

        next.truncate(self.max_profiles);
        self.profiles = next;
        summary
    }
}
