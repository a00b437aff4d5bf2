//! Click-to-viewshed interaction.
//!
//! The controller owns the three single-feature layers of a session (observer
//! point, distance ring, viewshed polygon), the job orchestrator and the
//! display bus. Each arm or disarm starts a new session generation; work
//! started under an older generation may still finish, but it is never
//! allowed to touch the layers or the display again.

use std::ops::ControlFlow;
use std::sync::Arc;

use foundation::{geodesic_buffer, Point, DEFAULT_BUFFER_SEGMENTS};
use geoprocessing::{
    describe_viewshed, render, render_errors, AnalysisRequest, DemResolution, DisplayText,
    FeatureInfo, JobError, JobMessage, JobOrchestrator, JobOutcome, JobStatus,
};
use layers::{
    Feature, FeatureStore, LayerKind, MemoryFeatureStore, ReplaceOutcome, SingleFeatureSlot,
    StoreError,
};
use parking_lot::Mutex;
use runtime::{ClickGate, EventBus, GateState};
use tracing::{debug, info, warn};

/// Something the UI should show.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Status(DisplayText),
    /// Info panel for the current viewshed, `None` to hide it.
    FeatureInfo(Option<FeatureInfo>),
}

/// User-adjustable analysis parameters, in meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AnalysisInputs {
    pub max_distance: f64,
    pub observer_offset: f64,
}

impl Default for AnalysisInputs {
    fn default() -> Self {
        Self {
            max_distance: 5000.0,
            observer_offset: 2.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The tool was disarmed or another analysis was running.
    Ignored,
    Completed,
    Failed,
    /// Superseded by an arm or disarm before it finished.
    Abandoned,
}

/// The graphics layers one analysis writes to.
pub struct AnalysisSession {
    observer: SingleFeatureSlot,
    distance: SingleFeatureSlot,
    result: SingleFeatureSlot,
}

impl AnalysisSession {
    pub fn new(
        observer: Arc<dyn FeatureStore>,
        distance: Arc<dyn FeatureStore>,
        result: Arc<dyn FeatureStore>,
    ) -> Self {
        Self {
            observer: SingleFeatureSlot::new(observer),
            distance: SingleFeatureSlot::new(distance),
            result: SingleFeatureSlot::new(result),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryFeatureStore::new(LayerKind::Observer)),
            Arc::new(MemoryFeatureStore::new(LayerKind::Distance)),
            Arc::new(MemoryFeatureStore::new(LayerKind::Result)),
        )
    }

    pub fn slot(&self, kind: LayerKind) -> &SingleFeatureSlot {
        match kind {
            LayerKind::Observer => &self.observer,
            LayerKind::Distance => &self.distance,
            LayerKind::Result => &self.result,
        }
    }

    /// Empties all three layers. Each clear queues behind pending edits on
    /// its own layer.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let (observer, distance, result) = tokio::join!(
            self.observer.clear(),
            self.distance.clear(),
            self.result.clear()
        );
        observer.and(distance).and(result)
    }
}

pub struct InteractionController {
    session: AnalysisSession,
    orchestrator: JobOrchestrator,
    dem_resolution: DemResolution,
    gate: ClickGate,
    inputs: Mutex<AnalysisInputs>,
    shown_status: Mutex<JobStatus>,
    display: EventBus<DisplayEvent>,
}

impl InteractionController {
    pub fn new(
        session: AnalysisSession,
        orchestrator: JobOrchestrator,
        inputs: AnalysisInputs,
        dem_resolution: DemResolution,
    ) -> Self {
        Self {
            session,
            orchestrator,
            dem_resolution,
            gate: ClickGate::new(),
            inputs: Mutex::new(inputs),
            shown_status: Mutex::new(JobStatus::None),
            display: EventBus::new(),
        }
    }

    pub fn display(&self) -> &EventBus<DisplayEvent> {
        &self.display
    }

    pub fn session(&self) -> &AnalysisSession {
        &self.session
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn is_armed(&self) -> bool {
        self.gate.state() != GateState::Disarmed
    }

    /// Status of the current session as last shown.
    pub fn job_status(&self) -> JobStatus {
        *self.shown_status.lock()
    }

    pub fn inputs(&self) -> AnalysisInputs {
        *self.inputs.lock()
    }

    /// Applies to the next click; a running analysis keeps its values.
    pub fn set_max_distance(&self, meters: f64) -> Result<(), String> {
        if !meters.is_finite() || meters <= 0.0 {
            return Err(format!("distance must be a positive number of meters, got {meters}"));
        }
        self.inputs.lock().max_distance = meters;
        Ok(())
    }

    pub fn set_observer_offset(&self, meters: f64) -> Result<(), String> {
        if !meters.is_finite() {
            return Err(format!("offset must be finite, got {meters}"));
        }
        self.inputs.lock().observer_offset = meters;
        Ok(())
    }

    /// Starts a fresh session and begins accepting clicks.
    pub async fn arm(&self) -> Result<(), StoreError> {
        let generation = self.gate.disarm();
        let cleared = self.session.clear_all().await;
        if !self.is_current(generation) {
            debug!("arm superseded while clearing layers");
            return cleared;
        }
        self.set_shown(JobStatus::None, &[]);
        self.display.emit(&DisplayEvent::FeatureInfo(None));
        if self.gate.arm(generation) {
            info!("viewshed tool armed");
        }
        cleared
    }

    /// Stops accepting clicks and clears every layer, whatever the job is doing.
    pub async fn disarm(&self) -> Result<(), StoreError> {
        self.gate.disarm();
        let cleared = self.session.clear_all().await;
        self.set_shown(JobStatus::Cleared, &[]);
        self.display.emit(&DisplayEvent::FeatureInfo(None));
        info!("viewshed tool disarmed");
        cleared
    }

    /// Returns whether the tool is armed afterwards.
    pub async fn toggle(&self) -> Result<bool, StoreError> {
        if self.is_armed() {
            self.disarm().await.map(|_| false)
        } else {
            self.arm().await.map(|_| true)
        }
    }

    /// Places the observer at `location` and runs one viewshed analysis.
    ///
    /// Clicks arriving while disarmed or while an analysis is running are
    /// ignored.
    pub async fn handle_click(&self, location: Point) -> ClickOutcome {
        let Some(generation) = self.gate.try_pause() else {
            return ClickOutcome::Ignored;
        };
        let inputs = self.inputs();
        info!(
            x = location.x,
            y = location.y,
            wkid = location.spatial_reference.wkid,
            max_distance = inputs.max_distance,
            "observer placed"
        );

        let outcome = self.analyze(location, inputs, generation).await;

        self.gate.resume(generation);
        debug!(?outcome, "analysis finished");
        outcome
    }

    async fn analyze(&self, location: Point, inputs: AnalysisInputs, generation: u64) -> ClickOutcome {
        // Nothing is placed for a point the ring cannot be built around.
        let ring = match geodesic_buffer(
            &location.flattened(),
            inputs.max_distance,
            DEFAULT_BUFFER_SEGMENTS,
        ) {
            Ok(ring) => ring,
            Err(e) => {
                return self.fail(generation, vec![JobMessage::new("GeometryError", e.to_string())])
            }
        };

        let observer = Feature::new(location.raised(inputs.observer_offset))
            .with_attribute("offset", inputs.observer_offset);
        match self
            .session
            .observer
            .replace_if(Some(observer), || self.is_current(generation))
            .await
        {
            Ok(ReplaceOutcome::Replaced(_)) => {}
            Ok(ReplaceOutcome::Skipped) => return ClickOutcome::Abandoned,
            Err(e) => return self.fail(generation, store_messages(&e)),
        }

        match self
            .session
            .distance
            .replace_if(Some(Feature::new(ring)), || self.is_current(generation))
            .await
        {
            Ok(ReplaceOutcome::Replaced(_)) => {}
            Ok(ReplaceOutcome::Skipped) => return ClickOutcome::Abandoned,
            Err(e) => return self.fail(generation, store_messages(&e)),
        }

        if !self.show(generation, JobStatus::New, &[]) {
            return ClickOutcome::Abandoned;
        }

        let request = AnalysisRequest {
            location,
            max_distance: inputs.max_distance,
            dem_resolution: self.dem_resolution,
            observer_height: inputs.observer_offset,
            surface_offset: 0.0,
        };
        let result = self
            .orchestrator
            .run(&request, |job| {
                if self.show(generation, job.status, &job.messages) {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            })
            .await;

        match result {
            Ok(JobOutcome::Succeeded { job_id, feature }) => {
                let info = describe_viewshed(&feature.attributes);
                match self
                    .session
                    .result
                    .replace_if(Some(feature.into_feature()), || self.is_current(generation))
                    .await
                {
                    Ok(ReplaceOutcome::Replaced(_)) if self.is_current(generation) => {
                        self.display.emit(&DisplayEvent::FeatureInfo(Some(info)));
                        info!(%job_id, "viewshed displayed");
                        ClickOutcome::Completed
                    }
                    Ok(_) => {
                        debug!(%job_id, "viewshed arrived after the session ended");
                        ClickOutcome::Abandoned
                    }
                    Err(e) => self.fail(generation, store_messages(&e)),
                }
            }
            Ok(JobOutcome::Abandoned {
                job_id,
                last_status,
            }) => {
                debug!(%job_id, %last_status, "stopped following job");
                ClickOutcome::Abandoned
            }
            // The terminal tick already put the messages on screen.
            Err(JobError::Terminal { .. }) if self.is_current(generation) => ClickOutcome::Failed,
            Err(err) => {
                warn!(error = %err, "viewshed analysis failed");
                self.fail(generation, err.messages())
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.gate.is_current(generation)
    }

    /// Shows `status` if `generation` is still live; returns whether it was.
    fn show(&self, generation: u64, status: JobStatus, messages: &[JobMessage]) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.set_shown(status, messages);
        true
    }

    fn set_shown(&self, status: JobStatus, messages: &[JobMessage]) {
        *self.shown_status.lock() = status;
        self.display
            .emit(&DisplayEvent::Status(render(status, messages)));
    }

    fn fail(&self, generation: u64, messages: Vec<JobMessage>) -> ClickOutcome {
        if !self.is_current(generation) {
            return ClickOutcome::Abandoned;
        }
        self.display
            .emit(&DisplayEvent::Status(render_errors(&messages)));
        ClickOutcome::Failed
    }
}

fn store_messages(err: &StoreError) -> Vec<JobMessage> {
    warn!(error = %err, "layer edit failed");
    vec![JobMessage::new("StoreError", err.to_string())]
}
