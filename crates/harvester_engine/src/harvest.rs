use std::collections::VecDeque;

use engine_logging::{
    engine_debug, engine_error, engine_info, engine_trace, engine_warn, set_step,
};
use harvester_core::{update, Effect, HarvestState, Limits, Msg, StepOutcome, StopReason};

use crate::checkpoint::CheckpointStore;
use crate::extract::Extractor;
use crate::pacing::Pacing;
use crate::record_store::{RecordStore, StoreError};
use crate::{HarvestError, HarvestReport, PageSource, Snapshot, SourceError, StepFault};

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    /// Feed address handed to the page source.
    pub target: String,
    pub limits: Limits,
    pub pacing: Pacing,
}

/// What one extraction pass observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PassOutcome {
    visible: usize,
    new_records: usize,
}

/// Executes the effects of the harvest state machine against a page source
/// and the two stores.
pub struct HarvestLoop {
    source: Box<dyn PageSource>,
    extractor: Box<dyn Extractor>,
    store: Box<dyn RecordStore>,
    checkpoint: Box<dyn CheckpointStore>,
    settings: HarvestSettings,
    state: HarvestState,
    shut_down: bool,
    cleanup_completed: bool,
}

impl HarvestLoop {
    pub fn new(
        source: Box<dyn PageSource>,
        extractor: Box<dyn Extractor>,
        store: Box<dyn RecordStore>,
        checkpoint: Box<dyn CheckpointStore>,
        settings: HarvestSettings,
    ) -> Self {
        let state = HarvestState::new(settings.limits);
        Self {
            source,
            extractor,
            store,
            checkpoint,
            settings,
            state,
            shut_down: false,
            cleanup_completed: false,
        }
    }

    pub fn state(&self) -> &HarvestState {
        &self.state
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Runs the harvest to termination and always cleans up afterwards.
    pub async fn run(&mut self) -> Result<HarvestReport, HarvestError> {
        let result = self.drive().await;
        let cleanup_completed = self.shutdown().await;
        let reason = result?;
        let report = self.report(reason, cleanup_completed);
        engine_info!(
            "Harvest finished ({}): {} new records, cursor {}, {} steps",
            report.reason,
            report.new_records,
            report.final_cursor,
            report.steps_run
        );
        Ok(report)
    }

    /// Closes the page source and the record store; the checkpoint is left as
    /// it is. Safe to call repeatedly. Returns whether cleanup completed.
    pub async fn shutdown(&mut self) -> bool {
        if self.shut_down {
            return self.cleanup_completed;
        }
        self.shut_down = true;
        self.source.close().await;
        self.cleanup_completed = match self.store.close() {
            Ok(()) => true,
            Err(err) => {
                engine_error!("Could not close record store: {}", err);
                false
            }
        };
        set_step(0);
        self.cleanup_completed
    }

    /// Snapshot of the run's counters as a report.
    pub fn report(&self, reason: StopReason, cleanup_completed: bool) -> HarvestReport {
        HarvestReport {
            new_records: self.store.appended(),
            final_cursor: self.state.cursor(),
            steps_run: self.state.steps_run(),
            reason,
            cleanup_completed,
        }
    }

    async fn drive(&mut self) -> Result<StopReason, HarvestError> {
        set_step(0);
        self.open_feed().await.map_err(HarvestError::Navigation)?;

        match self.store.load_seen_identities() {
            Ok(_) => {}
            Err(err @ StoreError::Unreadable { .. }) => {
                engine_warn!("{}; continuing without known records", err);
            }
            Err(err) => return Err(err.into()),
        }

        let cursor = self.checkpoint.load();
        if cursor > 0 {
            engine_info!("Resuming after step {}", cursor);
        } else {
            engine_info!("Starting a fresh harvest");
        }

        let mut effects = VecDeque::new();
        self.dispatch(Msg::Started { cursor }, &mut effects);

        while let Some(effect) = effects.pop_front() {
            let msg = match effect {
                Effect::ExtractInitial => {
                    set_step(1);
                    match self.extract_pass(1).await? {
                        Ok(pass) => Msg::InitialExtracted {
                            visible: pass.visible,
                            new_records: pass.new_records,
                        },
                        Err(msg) => msg,
                    }
                }
                Effect::MeasureBaseline => {
                    set_step(cursor);
                    match self.extract_pass(cursor).await? {
                        Ok(pass) => {
                            engine_info!("Baseline: {} listings visible", pass.visible);
                            Msg::BaselineMeasured {
                                visible: pass.visible,
                                new_records: pass.new_records,
                            }
                        }
                        Err(msg) => msg,
                    }
                }
                Effect::Advance { step } => {
                    self.settings.pacing.between_steps.pause().await;
                    set_step(step);
                    self.run_step(step).await?
                }
                Effect::Checkpoint { cursor } => {
                    self.save_checkpoint(cursor);
                    continue;
                }
                Effect::Terminate { reason } => {
                    if reason.is_abort() {
                        engine_error!("Harvest aborted: {}", reason);
                    } else {
                        engine_info!("Harvest complete: {}", reason);
                    }
                    return Ok(reason);
                }
            };
            self.dispatch(msg, &mut effects);
        }

        // The state machine always ends with a Terminate effect.
        Ok(self.state.stop_reason().unwrap_or(StopReason::Stalled))
    }

    fn dispatch(&mut self, msg: Msg, effects: &mut VecDeque<Effect>) {
        let state = std::mem::take(&mut self.state);
        let (next, new_effects) = update(state, msg);
        self.state = next;
        effects.extend(new_effects);
    }

    async fn open_feed(&mut self) -> Result<(), SourceError> {
        let attempts = self.settings.pacing.navigate_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.source.navigate(&self.settings.target).await {
                Ok(()) => break,
                Err(err) if err.is_fatal() || attempt >= attempts => {
                    engine_error!("Could not open {}: {}", self.settings.target, err);
                    return Err(err);
                }
                Err(err) => {
                    engine_warn!("Navigation attempt {} failed: {}", attempt, err);
                    attempt += 1;
                    self.settings.pacing.retry_pause.pause().await;
                }
            }
        }
        self.settings.pacing.after_navigate.pause().await;
        Ok(())
    }

    /// ADVANCE followed by EXTRACT for one pagination step.
    async fn run_step(&mut self, step: u64) -> Result<Msg, HarvestError> {
        match self.source.advance().await {
            Ok(advance) => engine_debug!("Advanced; content grew: {}", advance.grew),
            Err(err) if err.is_fatal() => return Ok(self.fault(err)),
            Err(err) => engine_warn!("{}: {}", StepFault::AdvanceUnavailable, err),
        }
        self.settings.pacing.after_advance.pause().await;

        let revealed = match self.source.try_reveal_more().await {
            Ok(true) => {
                engine_info!("Actioned the load-more control");
                self.settings.pacing.after_reveal.pause().await;
                true
            }
            Ok(false) => false,
            Err(err) if err.is_fatal() => return Ok(self.fault(err)),
            Err(err) => {
                engine_debug!("Load-more control not available: {}", err);
                false
            }
        };

        Ok(match self.extract_pass(step).await? {
            Ok(pass) => Msg::StepCompleted(StepOutcome {
                step,
                visible: pass.visible,
                new_records: pass.new_records,
                revealed,
            }),
            Err(msg) => msg,
        })
    }

    /// Snapshot, extract and persist. The inner `Err` carries the message to
    /// dispatch when no snapshot could be used.
    async fn extract_pass(&mut self, step: u64) -> Result<Result<PassOutcome, Msg>, HarvestError> {
        let snapshot = match self.snapshot_with_retries().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(Err(Msg::StepUnavailable { step })),
            Err(err) => return Ok(Err(self.fault(err))),
        };
        Ok(Ok(self.persist_new(&snapshot)?))
    }

    async fn snapshot_with_retries(&mut self) -> Result<Option<Snapshot>, SourceError> {
        let attempts = self.settings.pacing.snapshot_attempts.max(1);
        for attempt in 1..=attempts {
            match self.source.current_snapshot().await {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    engine_warn!(
                        "{} (attempt {}/{}): {}",
                        StepFault::SourceUnavailable,
                        attempt,
                        attempts,
                        err
                    );
                    if attempt < attempts {
                        self.settings.pacing.retry_pause.pause().await;
                    }
                }
            }
        }
        Ok(None)
    }

    fn persist_new(&mut self, snapshot: &Snapshot) -> Result<PassOutcome, StoreError> {
        let extraction = self.extractor.extract(snapshot);
        if !extraction.container_found {
            engine_warn!(
                "{}: no results container in a {} byte snapshot",
                StepFault::ContainerNotFound,
                snapshot.size()
            );
        }

        let mut new_records = 0;
        for record in &extraction.records {
            let Some(identity) = record.identity() else {
                engine_debug!("Skipping listing with no link: {:?}", record.title());
                continue;
            };
            if self.store.has(identity) {
                engine_trace!("Skipping known listing {:?}", record.title());
                continue;
            }
            if self.store.append(record)? {
                new_records += 1;
                engine_debug!("New listing: {:?} ({})", record.title(), record.published());
            }
        }
        self.store.flush()?;

        engine_info!(
            "{} listings visible, {} new",
            extraction.visible(),
            new_records
        );
        Ok(PassOutcome {
            visible: extraction.visible(),
            new_records,
        })
    }

    fn save_checkpoint(&mut self, cursor: u64) {
        if let Err(err) = self.checkpoint.save(cursor) {
            engine_error!("Could not save progress at step {}: {}", cursor, err);
        }
    }

    fn fault(&self, err: SourceError) -> Msg {
        engine_error!("Page source failed: {}", err);
        Msg::SourceFault
    }
}
