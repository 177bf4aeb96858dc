//! The live editing session.
//!
//! A [`Session`] owns the one authoritative [`Settings`] value and routes
//! every event through the components in a fixed order:
//!
//! ```text
//! edit ──► StyleReconciler ──► SettingsStore::schedule_save
//!                          └─► RequestScheduler (process + estimate)
//! poll ──► due work as [`Effect`]s ──► host executes ──► complete_*
//! ```
//!
//! The session never performs I/O itself. A host (a GUI loop, the CLI, a
//! test) feeds it time and events, executes the returned effects, and reports
//! outcomes back. [`Session::run_until_idle`] is a synchronous host for
//! callers that just want the final result.

use crate::batch::{self, BatchLimits};
use crate::catalog::Catalog;
use crate::config::ClientConfig;
use crate::geometry::PreviewEstimate;
use crate::notice::Notifier;
use crate::remote::{BatchArchive, ProcessedImage, ProcessingService, ServiceError, ServiceHealth, SourceImage};
use crate::scheduler::{
    BatchRequest, Completion, Dispatch, EstimateRequest, HistoryEntry, PreviewHandle,
    PreviewHistory, PreviewPool, ProcessRequest, RequestScheduler, ScheduledWork, StampedEstimate,
};
use crate::settings::{DEFAULT_PRESET, Edit, EditError, Settings};
use crate::store::{self, ImportError, MergeSummary, Profile, SettingsStore};
use crate::style::{StyleReconciler, StyleState};
use std::sync::Arc;
use tracing::{debug, info};

pub const NO_SOURCE_MESSAGE: &str = "Choose a photo first.";
pub const NO_BATCH_MESSAGE: &str = "No images to process.";

/// Work the host must carry out.
#[derive(Debug, Clone)]
pub enum Effect {
    Process(Dispatch<ProcessRequest>),
    Estimate(StampedEstimate),
    Batch(Dispatch<BatchRequest>),
}

pub struct Session {
    settings: Settings,
    catalog: Catalog,
    limits: BatchLimits,
    reconciler: StyleReconciler,
    scheduler: RequestScheduler,
    store: SettingsStore,
    notifier: Notifier,
    pool: PreviewPool,
    history: PreviewHistory,
    preview: Option<Arc<PreviewHandle>>,
    estimate: Option<PreviewEstimate>,
    source: Option<Arc<SourceImage>>,
    /// Settings snapshot of the active processing dispatch, by token id.
    in_flight: Option<(u64, Settings)>,
    last_batch: Option<BatchArchive>,
}

impl Session {
    /// Start a session, restoring persisted settings from `store`.
    pub fn new(config: &ClientConfig, catalog: Catalog, store: SettingsStore) -> Self {
        let restored = store.load_settings(&Settings::default(), &catalog);
        let mut reconciler = StyleReconciler::with_stash(restored.manual_stash);
        let mut settings = restored.settings;
        reconciler.reconcile(&mut settings, &catalog);
        debug!(preset = %settings.preset, style = %settings.style, "session started");

        Self {
            settings,
            catalog,
            limits: BatchLimits::from(&config.limits),
            reconciler,
            scheduler: RequestScheduler::new(&config.timing),
            store,
            notifier: Notifier::new(config.timing.notice_ms),
            pool: PreviewPool::new(),
            history: PreviewHistory::new(config.history.max_entries),
            preview: None,
            estimate: None,
            source: None,
            in_flight: None,
            last_batch: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    pub fn style_state(&self) -> StyleState {
        if self.settings.style.is_manual() {
            StyleState::Manual
        } else {
            StyleState::Matched
        }
    }

    pub fn manual_stash(&self) -> Option<&crate::settings::Adjustments> {
        self.reconciler.manual_stash()
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_deref()
    }

    pub fn preview(&self) -> Option<&Arc<PreviewHandle>> {
        self.preview.as_ref()
    }

    /// Processed results, newest first.
    pub fn history(&self) -> &PreviewHistory {
        &self.history
    }

    pub fn estimate(&self) -> Option<&PreviewEstimate> {
        self.estimate.as_ref()
    }

    pub fn last_batch(&self) -> Option<&BatchArchive> {
        self.last_batch.as_ref()
    }

    pub fn notice(&self, now: u64) -> Option<&str> {
        self.notifier.current(now)
    }

    pub fn is_processing(&self) -> bool {
        self.scheduler.processing.is_loading()
    }

    pub fn is_batch_running(&self) -> bool {
        self.scheduler.batch.is_loading()
    }

    /// Preview handles not yet released.
    pub fn live_previews(&self) -> usize {
        self.pool.live_count()
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn profiles(&self) -> &[Profile] {
        self.store.profiles()
    }

    // -------------------------------------------------------------------------
    // Edits
    // -------------------------------------------------------------------------

    /// Apply one user edit and schedule the follow-up work.
    ///
    /// Every direct edit clears the active use-case; selecting a use-case sets
    /// it.
    pub fn edit(&mut self, now: u64, edit: Edit) -> Result<(), EditError> {
        match edit {
            Edit::UseCase(key) => {
                if !self.reconciler.apply_use_case(&mut self.settings, &self.catalog, &key) {
                    return Err(EditError::InvalidValue {
                        field: "useCase",
                        value: key,
                    });
                }
                info!(use_case = %key, "use-case applied");
            }
            Edit::Style(key) => {
                self.settings.use_case = None;
                self.reconciler.apply_style(&mut self.settings, &self.catalog, &key);
            }
            Edit::Adjustment(field, value) => {
                self.settings.use_case = None;
                self.settings.adjustments.set(field, field.clamp(value));
                self.reconciler.on_adjustment_edited(&mut self.settings, &self.catalog);
            }
            Edit::Preset(key) if self.catalog.preset(&key).is_none() => {
                return Err(EditError::InvalidValue {
                    field: "preset",
                    value: key,
                });
            }
            other => {
                self.settings.use_case = None;
                self.settings.apply_field_edit(&other);
            }
        }
        self.after_change(now);
        Ok(())
    }

    fn after_change(&mut self, now: u64) {
        self.store
            .schedule_save(now, &self.settings, self.reconciler.manual_stash());
        self.queue_process(now, false);
        self.queue_estimate(now);
    }

    fn process_request(&self) -> Option<ProcessRequest> {
        self.source.as_ref().map(|image| ProcessRequest {
            image: Arc::clone(image),
            settings: self.settings.clone(),
        })
    }

    fn queue_process(&mut self, now: u64, force: bool) {
        if let Some(request) = self.process_request() {
            self.scheduler.processing.request(now, request, force);
        }
    }

    fn queue_estimate(&mut self, now: u64) {
        let Some(source) = self.source.as_ref().and_then(|s| s.dimensions) else {
            return;
        };
        let Some(preset) = self.catalog.preset(&self.settings.preset) else {
            return;
        };
        self.scheduler.estimate.request(
            now,
            EstimateRequest {
                source,
                preset: preset.clone(),
                top_bias: self.settings.top_bias,
                format: self.settings.format,
            },
        );
    }

    /// Select a new source photo. Processing is queued even with auto-update
    /// off.
    pub fn set_source(&mut self, now: u64, image: SourceImage) {
        info!(file = %image.file_name, dimensions = ?image.dimensions, "source selected");
        self.source = Some(Arc::new(image));
        self.estimate = None;
        self.notifier.dismiss();
        self.queue_process(now, true);
        self.queue_estimate(now);
    }

    /// Dispatch processing immediately, skipping the debounce window.
    pub fn process_now(&mut self, now: u64) -> Option<Effect> {
        let Some(request) = self.process_request() else {
            self.notifier.show(now, NO_SOURCE_MESSAGE);
            return None;
        };
        let dispatch = self.scheduler.processing.dispatch_now(request);
        self.track(&dispatch);
        Some(Effect::Process(dispatch))
    }

    fn track(&mut self, dispatch: &Dispatch<ProcessRequest>) {
        self.in_flight = Some((dispatch.token.id(), dispatch.request.settings.clone()));
    }

    pub fn cancel_processing(&mut self) {
        self.scheduler.processing.cancel();
        self.in_flight = None;
    }

    /// Validate a batch selection and dispatch the accepted files.
    ///
    /// Anything left out is reported through one notice.
    pub fn start_batch(&mut self, now: u64, images: Vec<SourceImage>) -> Option<Effect> {
        let selection = batch::validate(images.into_iter().map(Arc::new), &self.limits);
        let summary = selection.summary(&self.limits);
        if selection.accepted.is_empty() {
            self.notifier
                .show(now, summary.unwrap_or_else(|| NO_BATCH_MESSAGE.to_string()));
            return None;
        }
        match summary {
            Some(message) => self.notifier.show(now, message),
            None => self.notifier.dismiss(),
        }
        let dispatch = self.scheduler.batch.start(BatchRequest {
            images: selection.accepted,
            settings: self.settings.clone(),
        });
        Some(Effect::Batch(dispatch))
    }

    pub fn cancel_batch(&mut self) {
        self.scheduler.batch.cancel();
    }

    // -------------------------------------------------------------------------
    // Completions
    // -------------------------------------------------------------------------

    /// Report the outcome of a processing dispatch.
    pub fn complete_process(
        &mut self,
        now: u64,
        token_id: u64,
        outcome: Result<ProcessedImage, ServiceError>,
    ) -> Completion<Arc<PreviewHandle>> {
        match self.scheduler.processing.complete(token_id, outcome) {
            Completion::Applied(image) => {
                let settings = match self.in_flight.take() {
                    Some((id, settings)) if id == token_id => settings,
                    _ => self.settings.clone(),
                };
                let handle = self.pool.acquire(image);
                self.preview = Some(Arc::clone(&handle));
                self.history.push(HistoryEntry {
                    preview: Arc::clone(&handle),
                    settings,
                    completed_at: now,
                });
                Completion::Applied(handle)
            }
            Completion::Failed(message) => {
                self.in_flight = None;
                self.notifier.show(now, message.clone());
                Completion::Failed(message)
            }
            Completion::Cancelled => {
                if self.in_flight.as_ref().is_some_and(|(id, _)| *id == token_id) {
                    self.in_flight = None;
                }
                Completion::Cancelled
            }
            Completion::Stale => Completion::Stale,
        }
    }

    /// Report a computed estimate. Returns true if it was accepted.
    pub fn complete_estimate(&mut self, seq: u64, estimate: PreviewEstimate) -> bool {
        match self.scheduler.estimate.complete(seq, estimate) {
            Some(estimate) => {
                self.estimate = Some(estimate);
                true
            }
            None => false,
        }
    }

    pub fn complete_batch(
        &mut self,
        now: u64,
        token_id: u64,
        outcome: Result<BatchArchive, ServiceError>,
    ) -> Completion<BatchArchive> {
        let completion = self.scheduler.batch.complete(token_id, outcome);
        match &completion {
            Completion::Applied(archive) => {
                if archive.failed > 0 {
                    let total = archive.succeeded + archive.failed;
                    self.notifier.show(
                        now,
                        format!("{} of {} images could not be processed.", archive.failed, total),
                    );
                }
                self.last_batch = Some(archive.clone());
            }
            Completion::Failed(message) => self.notifier.show(now, message.clone()),
            Completion::Cancelled | Completion::Stale => {}
        }
        completion
    }

    // -------------------------------------------------------------------------
    // Time
    // -------------------------------------------------------------------------

    /// Advance to `now`: flush due saves, expire notices, collect due work.
    pub fn poll(&mut self, now: u64) -> Vec<Effect> {
        self.store.poll(now);
        self.notifier.poll(now);
        let mut effects = Vec::new();
        for work in self.scheduler.poll(now) {
            match work {
                ScheduledWork::Process(dispatch) => {
                    self.track(&dispatch);
                    effects.push(Effect::Process(dispatch));
                }
                ScheduledWork::Estimate(stamped) => effects.push(Effect::Estimate(stamped)),
            }
        }
        effects
    }

    /// Earliest time at which [`Session::poll`] has something to do.
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.work_deadline(),
            self.notifier.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn work_deadline(&self) -> Option<u64> {
        [self.scheduler.next_deadline(), self.store.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Carry out one effect synchronously against `service`.
    pub fn execute(&mut self, now: u64, effect: Effect, service: &dyn ProcessingService) {
        match effect {
            Effect::Process(dispatch) => {
                let outcome = if dispatch.is_cancelled() {
                    Err(ServiceError::Cancelled)
                } else {
                    service.process(&dispatch.request, &dispatch.token)
                };
                self.complete_process(now, dispatch.token.id(), outcome);
            }
            Effect::Estimate(stamped) => {
                let estimate = stamped.request.compute();
                self.complete_estimate(stamped.seq, estimate);
            }
            Effect::Batch(dispatch) => {
                let outcome = if dispatch.is_cancelled() {
                    Err(ServiceError::Cancelled)
                } else {
                    service.process_batch(&dispatch.request, &dispatch.token)
                };
                self.complete_batch(now, dispatch.token.id(), outcome);
            }
        }
    }

    /// Jump time forward through every pending timer, executing what fires.
    ///
    /// Returns the time reached. Notice expiry does not count as work.
    pub fn run_until_idle(&mut self, mut now: u64, service: &dyn ProcessingService) -> u64 {
        while let Some(deadline) = self.work_deadline() {
            now = now.max(deadline);
            for effect in self.poll(now) {
                self.execute(now, effect, service);
            }
        }
        now
    }

    // -------------------------------------------------------------------------
    // Profiles and imports
    // -------------------------------------------------------------------------

    pub fn save_profile(&mut self, now: u64, name: &str) -> Profile {
        self.store.save_profile(name, &self.settings, &self.catalog, now)
    }

    pub fn delete_profile(&mut self, id: &str) -> bool {
        self.store.delete_profile(id)
    }

    /// Load a saved profile into the live settings.
    pub fn apply_profile(&mut self, now: u64, id: &str) -> bool {
        let Some(patch) = self.store.profile(id).map(|p| p.settings.clone()) else {
            return false;
        };
        self.reconciler
            .apply_patch(&mut self.settings, &self.catalog, &patch);
        self.after_change(now);
        true
    }

    /// Import a preset document and apply it. Returns the preset's name when
    /// it had one. On error the settings are unchanged.
    ///
    /// Fields the document leaves out keep their live values.
    pub fn import_preset(&mut self, now: u64, text: &str) -> Result<Option<String>, ImportError> {
        let raw = store::parse_json(text)?;
        let (name, patch) = SettingsStore::import_preset(&raw, &self.settings, &self.catalog)?;
        self.reconciler
            .apply_patch(&mut self.settings, &self.catalog, &patch);
        self.after_change(now);
        Ok(name)
    }

    /// Merge a profile bundle. Profiles stand alone, so fields an entry
    /// leaves out take the stock defaults rather than the live settings.
    pub fn merge_bundle(&mut self, now: u64, text: &str, overwrite: bool) -> Result<MergeSummary, ImportError> {
        let raw = store::parse_json(text)?;
        self.store
            .merge_bundle(&raw, overwrite, &Settings::default(), &self.catalog, now)
    }

    pub fn export_preset(&self, name: &str) -> String {
        SettingsStore::export_preset(name, &self.settings)
    }

    pub fn export_bundle(&self) -> String {
        self.store.export_bundle()
    }

    // -------------------------------------------------------------------------
    // Service metadata
    // -------------------------------------------------------------------------

    /// Adopt the limits the service advertises. Missing or zero values keep
    /// the local defaults.
    pub fn apply_health(&mut self, health: &ServiceHealth) {
        let limits = &health.limits;
        if let Some(bytes) = limits.max_upload_bytes.filter(|v| *v > 0) {
            self.limits.max_file_bytes = bytes;
        }
        if let Some(count) = limits.max_batch_images.filter(|v| *v > 0) {
            self.limits.max_images = count;
        }
        if let Some(bytes) = limits.max_batch_total_bytes.filter(|v| *v > 0) {
            self.limits.max_total_bytes = bytes;
        }
        debug!(limits = ?self.limits, "service limits applied");
    }

    /// Swap in a new catalog and re-derive everything that depends on it.
    pub fn set_catalog(&mut self, now: u64, catalog: Catalog) {
        self.catalog = catalog;
        if self.catalog.preset(&self.settings.preset).is_none() {
            self.settings.preset = DEFAULT_PRESET.to_string();
        }
        self.reconciler.reconcile(&mut self.settings, &self.catalog);
        self.queue_estimate(now);
    }

    /// Cancel all work, write pending settings and release every preview.
    pub fn teardown(&mut self) {
        self.scheduler.cancel_all();
        self.in_flight = None;
        self.store.flush();
        self.preview = None;
        self.history.clear();
        debug!(live = self.pool.live_count(), "session torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::tests::{MockService, RecordedCall};
    use crate::settings::{AdjustmentField, BackgroundMode, OutputFormat, StyleKey};
    use crate::store::{KeyValueStore, MemoryStore, SETTINGS_KEY};
    use crate::test_helpers::{processed, source_image};

    fn session() -> Session {
        session_with(MemoryStore::new())
    }

    fn session_with(backend: MemoryStore) -> Session {
        let config = ClientConfig::default();
        let store = SettingsStore::new(Box::new(backend), &config);
        Session::new(&config, Catalog::builtin(), store)
    }

    fn dispatch_of(effects: Vec<Effect>) -> Dispatch<ProcessRequest> {
        effects
            .into_iter()
            .find_map(|e| match e {
                Effect::Process(d) => Some(d),
                _ => None,
            })
            .expect("no process effect")
    }

    // =========================================================================
    // Startup
    // =========================================================================

    #[test]
    fn restores_persisted_settings() {
        let snapshot = r#"{"preset": "square", "format": "jpeg", "brightness": 1.4, "style": "classic"}"#;
        let session = session_with(MemoryStore::new().with_value(SETTINGS_KEY, snapshot));
        assert_eq!(session.settings().preset, "square");
        assert_eq!(session.settings().format, OutputFormat::Jpeg);
        // brightness drifted from classic
        assert_eq!(session.style_state(), StyleState::Manual);
    }

    #[test]
    fn default_session_is_matched() {
        let session = session();
        assert_eq!(session.style_state(), StyleState::Matched);
        assert!(session.preview().is_none());
    }

    // =========================================================================
    // Edits
    // =========================================================================

    #[test]
    fn burst_of_edits_dispatches_once_with_last_snapshot() {
        let mut s = session();
        s.set_source(0, source_image("me.jpg", 800, 1000));
        for (i, bias) in [0.1, 0.2, 0.3, 0.4, 0.5].into_iter().enumerate() {
            s.edit(10 + i as u64 * 50, Edit::TopBias(bias)).unwrap();
        }
        assert!(s.poll(300).iter().all(|e| !matches!(e, Effect::Process(_))));
        let dispatch = dispatch_of(s.poll(510));
        assert_eq!(dispatch.request.settings.top_bias, 0.5);
        assert!(s.is_processing());
    }

    #[test]
    fn adjustment_drift_goes_manual_and_clears_use_case() {
        let mut s = session();
        s.edit(0, Edit::UseCase("linkedin".into())).unwrap();
        assert_eq!(s.settings().use_case.as_deref(), Some("linkedin"));
        assert_eq!(s.settings().style, StyleKey::named("studio"));

        s.edit(1, Edit::Adjustment(AdjustmentField::Contrast, 1.3)).unwrap();
        assert_eq!(s.style_state(), StyleState::Manual);
        assert_eq!(s.settings().use_case, None);
        assert_eq!(s.manual_stash().unwrap().contrast, 1.3);
    }

    #[test]
    fn small_adjustment_keeps_style() {
        let mut s = session();
        let brightness = s.settings().adjustments.brightness;
        s.edit(0, Edit::Adjustment(AdjustmentField::Brightness, brightness + 0.004))
            .unwrap();
        assert_eq!(s.style_state(), StyleState::Matched);
    }

    #[test]
    fn style_click_clears_use_case_and_manual_restores_stash() {
        let mut s = session();
        s.edit(0, Edit::Adjustment(AdjustmentField::Soften, 0.6)).unwrap();
        s.edit(1, Edit::UseCase("resume".into())).unwrap();
        s.edit(2, Edit::Style(StyleKey::named("warm"))).unwrap();
        assert_eq!(s.settings().use_case, None);

        s.edit(3, Edit::Style(StyleKey::Manual)).unwrap();
        assert_eq!(s.settings().adjustments.soften, 0.6);
    }

    #[test]
    fn unknown_use_case_and_preset_are_rejected() {
        let mut s = session();
        let before = s.settings().clone();
        assert!(matches!(
            s.edit(0, Edit::UseCase("wedding".into())),
            Err(EditError::InvalidValue { field: "useCase", .. })
        ));
        assert!(matches!(
            s.edit(0, Edit::Preset("billboard".into())),
            Err(EditError::InvalidValue { field: "preset", .. })
        ));
        assert_eq!(s.settings(), &before);
    }

    #[test]
    fn transparent_background_forces_png() {
        let mut s = session();
        s.edit(0, Edit::Format(OutputFormat::Jpeg)).unwrap();
        s.edit(1, Edit::Background(BackgroundMode::Transparent)).unwrap();
        assert!(s.settings().remove_bg);
        assert_eq!(s.settings().format, OutputFormat::Png);
    }

    #[test]
    fn edits_are_persisted_after_quiet_window() {
        let mut s = session();
        s.edit(0, Edit::Preset("square".into())).unwrap();
        s.poll(100);
        assert!(s.store().backend().get(SETTINGS_KEY).is_none());
        s.poll(250);
        assert!(s.store().backend().get(SETTINGS_KEY).unwrap().contains("square"));
    }

    #[test]
    fn auto_update_off_skips_processing_until_forced() {
        let mut s = session();
        s.edit(0, Edit::AutoUpdate(false)).unwrap();
        s.set_source(0, source_image("me.png", 400, 400));
        // a new source is processed regardless
        assert!(matches!(s.poll(300).as_slice(), [.., Effect::Process(_)]));

        s.edit(400, Edit::TopBias(0.9)).unwrap();
        assert!(s.poll(1_000).iter().all(|e| !matches!(e, Effect::Process(_))));
        assert!(s.process_now(1_000).is_some());
    }

    #[test]
    fn process_without_source_shows_notice() {
        let mut s = session();
        assert!(s.process_now(5).is_none());
        assert_eq!(s.notice(5), Some(NO_SOURCE_MESSAGE));
    }

    // =========================================================================
    // Completions
    // =========================================================================

    #[test]
    fn only_newest_result_is_applied() {
        let mut s = session();
        s.set_source(0, source_image("me.png", 100, 100));
        let Some(Effect::Process(first)) = s.process_now(0) else {
            panic!("expected dispatch");
        };
        let Some(Effect::Process(second)) = s.process_now(10) else {
            panic!("expected dispatch");
        };
        assert!(first.is_cancelled());

        let late = s.complete_process(20, first.token.id(), Ok(processed(1)));
        assert_eq!(late, Completion::Stale);
        assert!(s.preview().is_none());

        let fresh = s.complete_process(30, second.token.id(), Ok(processed(2)));
        assert!(matches!(fresh, Completion::Applied(_)));
        assert_eq!(s.preview().unwrap().bytes.len(), 2);
        assert!(!s.is_processing());
    }

    #[test]
    fn history_is_bounded_and_releases_evicted_previews() {
        let mut s = session();
        s.set_source(0, source_image("me.png", 100, 100));
        for i in 0..5u64 {
            let Some(Effect::Process(d)) = s.process_now(i) else {
                panic!("expected dispatch");
            };
            s.complete_process(i, d.token.id(), Ok(processed(i as usize + 1)));
        }
        assert_eq!(s.history().len(), 3);
        assert_eq!(s.history().get(0).unwrap().preview.bytes.len(), 5);
        assert_eq!(s.live_previews(), 3);

        s.teardown();
        assert_eq!(s.live_previews(), 0);
    }

    #[test]
    fn history_keeps_dispatch_settings() {
        let mut s = session();
        s.set_source(0, source_image("me.png", 100, 100));
        let Some(Effect::Process(d)) = s.process_now(0) else {
            panic!("expected dispatch");
        };
        s.edit(1, Edit::TopBias(0.8)).unwrap();
        s.complete_process(2, d.token.id(), Ok(processed(3)));
        assert_eq!(s.history().get(0).unwrap().settings.top_bias, 0.2);
    }

    #[test]
    fn failure_shows_detail_and_cancel_is_silent() {
        let mut s = session();
        s.set_source(0, source_image("me.png", 100, 100));
        let Some(Effect::Process(d)) = s.process_now(0) else {
            panic!("expected dispatch");
        };
        let failed = s.complete_process(
            5,
            d.token.id(),
            Err(ServiceError::Rejected {
                status: 422,
                message: Some("Unknown crop preset.".into()),
            }),
        );
        assert_eq!(failed, Completion::Failed("Unknown crop preset.".into()));
        assert_eq!(s.notice(5), Some("Unknown crop preset."));

        let Some(Effect::Process(d)) = s.process_now(10) else {
            panic!("expected dispatch");
        };
        s.notifier.dismiss();
        s.cancel_processing();
        assert_eq!(
            s.complete_process(11, d.token.id(), Err(ServiceError::Cancelled)),
            Completion::Cancelled
        );
        assert_eq!(s.notice(11), None);
    }

    #[test]
    fn estimate_out_of_order_is_ignored() {
        let mut s = session();
        s.set_source(0, source_image("me.png", 1000, 1000));
        let Some(Effect::Estimate(old)) = s.poll(200).into_iter().find(|e| matches!(e, Effect::Estimate(_))) else {
            panic!("expected estimate");
        };
        s.edit(210, Edit::Preset("square".into())).unwrap();
        let Some(Effect::Estimate(new)) = s.poll(410).into_iter().find(|e| matches!(e, Effect::Estimate(_))) else {
            panic!("expected estimate");
        };
        assert!(s.complete_estimate(new.seq, new.request.compute()));
        assert!(!s.complete_estimate(old.seq, old.request.compute()));
        assert!(s.estimate().unwrap().is_uncropped());
    }

    // =========================================================================
    // Synchronous driver
    // =========================================================================

    #[test]
    fn run_until_idle_processes_and_persists() {
        let service = MockService::new();
        let mut s = session();
        s.set_source(0, source_image("me.jpg", 800, 1000));
        s.edit(20, Edit::Style(StyleKey::Manual)).unwrap();
        let reached = s.run_until_idle(20, &service);
        assert!(reached >= 320);
        assert!(s.preview().is_some());
        assert!(s.estimate().is_some());
        assert!(s.store().backend().get(SETTINGS_KEY).is_some());

        let ops = service.get_operations();
        assert_eq!(ops.len(), 1);
        let RecordedCall::Process { file, fields } = &ops[0] else {
            panic!("expected process call");
        };
        assert_eq!(file, "me.jpg");
        assert!(!fields.iter().any(|(k, _)| *k == "style"));
    }

    #[test]
    fn batch_reports_skipped_files_in_one_notice() {
        let service = MockService::new();
        let mut s = session();
        let mut big = source_image("big.png", 10, 10);
        big.bytes = vec![0; 13 * 1024 * 1024];
        let mut text = source_image("notes.txt", 0, 0);
        text.content_type = Some("text/plain".into());
        let images = vec![source_image("a.png", 10, 10), big, text];

        let effect = s.start_batch(0, images).expect("batch dispatched");
        assert_eq!(
            s.notice(0),
            Some("Skipped 1 file over 12 MB, 1 non-image file.")
        );
        s.execute(1, effect, &service);
        assert_eq!(s.last_batch().unwrap().succeeded, 1);
        assert_eq!(
            service.get_operations(),
            vec![RecordedCall::Batch {
                files: vec!["a.png".into()]
            }]
        );
    }

    #[test]
    fn empty_batch_is_not_dispatched() {
        let mut s = session();
        assert!(s.start_batch(0, Vec::new()).is_none());
        assert_eq!(s.notice(0), Some(NO_BATCH_MESSAGE));
    }

    #[test]
    fn health_limits_override_defaults() {
        let mut s = session();
        let health: ServiceHealth = serde_json::from_str(
            r#"{"status": "ok", "limits": {"max_upload_bytes": 1024, "max_batch_images": 0}}"#,
        )
        .unwrap();
        s.apply_health(&health);
        assert_eq!(s.limits().max_file_bytes, 1024);
        assert_eq!(s.limits().max_images, 24);
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    #[test]
    fn profile_roundtrip_restores_settings() {
        let mut s = session();
        s.edit(0, Edit::UseCase("passport".into())).unwrap();
        let profile = s.save_profile(1, "");
        assert_eq!(profile.name, "Passport");

        s.edit(2, Edit::Preset("square".into())).unwrap();
        assert!(s.apply_profile(3, &profile.id));
        assert_eq!(s.settings().preset, "passport-2x2");
        assert_eq!(s.settings().style, StyleKey::named("crisp"));
        assert!(!s.apply_profile(4, "missing"));
    }

    #[test]
    fn bad_import_leaves_settings_untouched() {
        let mut s = session();
        let before = s.settings().clone();
        assert!(s.import_preset(0, "[1, 2]").is_err());
        assert!(s.import_preset(0, "{nope").is_err());
        assert_eq!(s.settings(), &before);

        let name = s.import_preset(1, r#"{"format": "jpeg", "jpegQuality": 999}"#).unwrap();
        assert_eq!(name, None);
        assert_eq!(s.settings().jpeg_quality, 100);
    }

    #[test]
    fn partial_import_keeps_live_values() {
        let mut s = session();
        s.edit(0, Edit::TopBias(0.6)).unwrap();
        s.import_preset(1, r#"{"format": "jpeg"}"#).unwrap();
        assert_eq!(s.settings().top_bias, 0.6);
        assert_eq!(s.settings().format, OutputFormat::Jpeg);
    }

    #[test]
    fn cancelled_active_call_clears_in_flight() {
        let mut s = session();
        s.set_source(0, source_image("me.png", 100, 100));
        let Some(Effect::Process(d)) = s.process_now(0) else {
            panic!("expected dispatch");
        };
        assert!(s.in_flight.is_some());
        assert_eq!(
            s.complete_process(3, d.token.id(), Err(ServiceError::Cancelled)),
            Completion::Cancelled
        );
        assert!(s.in_flight.is_none());
        assert!(!s.is_processing());
    }
}
