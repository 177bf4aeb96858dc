//! Matched-versus-drifted style bookkeeping.
//!
//! A named style is "matched" while the live adjustment tuple equals the
//! style's tuple within [`STYLE_TOLERANCE`] per field. The first edit that
//! moves any field further than that flips the style key to `manual`. While
//! manual, the live tuple is remembered as the manual stash so that choosing
//! "manual" again after trying a named style restores the user's own values.

use crate::catalog::Catalog;
use crate::settings::{Adjustments, Settings, SettingsPatch, StyleKey};
use tracing::debug;

/// Per-field tolerance for considering a tuple equal to a style.
pub const STYLE_TOLERANCE: f64 = 0.005;

/// Outcome of a reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleState {
    /// The live tuple matches the named style.
    Matched,
    /// The style key is `manual`.
    Manual,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleReconciler {
    manual_stash: Option<Adjustments>,
}

impl StyleReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a stash restored from persisted state.
    pub fn with_stash(manual_stash: Option<Adjustments>) -> Self {
        Self { manual_stash }
    }

    pub fn manual_stash(&self) -> Option<&Adjustments> {
        self.manual_stash.as_ref()
    }

    /// Select a style.
    ///
    /// A known style copies its tuple into the settings exactly. `manual`
    /// restores the stash when one exists. Unknown keys fall back to manual.
    pub fn apply_style(
        &mut self,
        settings: &mut Settings,
        catalog: &Catalog,
        key: &StyleKey,
    ) -> StyleState {
        if settings.style.is_manual() {
            self.manual_stash = Some(settings.adjustments);
        }
        match catalog.style_for(key) {
            Some(style) => {
                settings.adjustments = style.adjustments;
                settings.style = StyleKey::Named(style.key.clone());
                StyleState::Matched
            }
            None => {
                if !key.is_manual() {
                    debug!(style = %key, "unknown style, switching to manual");
                }
                settings.style = StyleKey::Manual;
                if let Some(stash) = self.manual_stash {
                    settings.adjustments = stash;
                }
                StyleState::Manual
            }
        }
    }

    /// Classify the tuple after a slider edit.
    pub fn on_adjustment_edited(&mut self, settings: &mut Settings, catalog: &Catalog) -> StyleState {
        let state = self.reconcile(settings, catalog);
        if state == StyleState::Manual {
            self.manual_stash = Some(settings.adjustments);
        }
        state
    }

    /// Re-derive the style invariant: a named key survives only if the style
    /// is known and the tuple still matches it.
    pub fn reconcile(&mut self, settings: &mut Settings, catalog: &Catalog) -> StyleState {
        let matched = catalog
            .style_for(&settings.style)
            .is_some_and(|style| style.adjustments.matches(&settings.adjustments, STYLE_TOLERANCE));
        if matched {
            return StyleState::Matched;
        }
        if !settings.style.is_manual() {
            debug!(style = %settings.style, "adjustments drifted from style");
            settings.style = StyleKey::Manual;
        }
        StyleState::Manual
    }

    /// Apply a use-case: its overrides, then its style, then the indicator.
    ///
    /// Returns false (and changes nothing) for an unknown use-case key.
    pub fn apply_use_case(&mut self, settings: &mut Settings, catalog: &Catalog, key: &str) -> bool {
        let Some(use_case) = catalog.use_case(key) else {
            return false;
        };
        let style = use_case.style.clone();
        let name = use_case.key.clone();
        settings.apply_patch(&use_case.overrides, catalog);
        self.apply_style(settings, catalog, &style);
        settings.use_case = Some(name);
        true
    }

    /// Apply a saved or imported patch, honoring its style key.
    ///
    /// A patch carrying a known style adopts it only if the patch's tuple still
    /// matches; otherwise the imported tuple is kept and the style is manual.
    pub fn apply_patch(&mut self, settings: &mut Settings, catalog: &Catalog, patch: &SettingsPatch) {
        if settings.style.is_manual() {
            self.manual_stash = Some(settings.adjustments);
        }
        settings.apply_patch(patch, catalog);
        settings.use_case = None;
        if let Some(style) = &patch.style {
            settings.style = style.clone();
            if patch.adjustments.is_none()
                && let Some(known) = catalog.style_for(style)
            {
                settings.adjustments = known.adjustments;
            }
        }
        if self.reconcile(settings, catalog) == StyleState::Manual {
            self.manual_stash = Some(settings.adjustments);
        }
    }
}
