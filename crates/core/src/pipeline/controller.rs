//! The pipeline state machine.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::engine::LoadProgress;
use crate::formats::OutputFormat;
use crate::probe::ProbeReport;
use crate::progress::{ProgressEvent, ProgressOperation, ProgressReporter};
use crate::source::SourceFile;

use super::error::PipelineError;
use super::session::Session;
use super::types::{
    loading_steps, step, ConversionResult, LoadingStep, PipelineEvent, PipelineState, ReadyInfo,
    StepStatus,
};

const EVENT_BUFFER: usize = 1024;

/// Drives one file at a time through
/// `Idle → Loading → Ready → Converting → Done`, with `Error` reachable
/// from every working state.
///
/// Operations take `&mut self`, so a controller never runs two stages at
/// once. Calling an operation in the wrong state returns
/// [`PipelineError::InvalidState`] and leaves the state unchanged.
pub struct PipelineController {
    session: Arc<Session>,
    state: PipelineState,
    source: Option<SourceFile>,
    staged_input: Option<String>,
    steps: Vec<LoadingStep>,
    report: Option<ProbeReport>,
    format: OutputFormat,
    result: Option<ConversionResult>,
    error: Option<String>,
    progress: f32,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineController {
    /// Creates an idle controller with the session's default format selected.
    pub fn new(session: Arc<Session>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let format = session.default_format().clone();

        Self {
            session,
            state: PipelineState::Idle,
            source: None,
            staged_input: None,
            steps: Vec::new(),
            report: None,
            format,
            result: None,
            error: None,
            progress: 0.0,
            events,
        }
    }

    /// Subscribe to state, step, progress and result notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The file being processed, if any.
    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    /// Loading steps. Empty outside the Loading state.
    pub fn steps(&self) -> &[LoadingStep] {
        &self.steps
    }

    pub fn probe_report(&self) -> Option<&ProbeReport> {
        self.report.as_ref()
    }

    pub fn selected_format(&self) -> &OutputFormat {
        &self.format
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        self.result.as_ref()
    }

    /// User-visible message of the last failure.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Transcode progress of the current or last conversion (0 - 100).
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Whether conversion can be confirmed: Ready and an audio stream was found.
    pub fn can_convert(&self) -> bool {
        self.state == PipelineState::Ready && self.report.map(|r| r.has_audio).unwrap_or(false)
    }

    /// `<basename>.<extension>` of the selected format.
    pub fn suggested_filename(&self) -> Option<String> {
        self.source
            .as_ref()
            .map(|file| self.format.filename_for(file.basename()))
    }

    /// Snapshot shown at the Ready decision point.
    pub fn ready_info(&self) -> Option<ReadyInfo> {
        let file = self.source.as_ref()?;
        let report = self.report?;

        Some(ReadyInfo {
            file_name: file.name.clone(),
            size_bytes: file.size_bytes,
            has_audio: report.has_audio,
            duration_secs: report.duration_secs,
            duration_estimated: report.duration_estimated,
            format_id: self.format.id.clone(),
            suggested_filename: self.format.filename_for(file.basename()),
        })
    }

    /// Accepts a dropped file. Non-video media types fail immediately
    /// without entering Loading.
    pub async fn drop_file(&mut self, file: SourceFile) -> Result<(), PipelineError> {
        if !file.is_video() {
            self.clear().await;
            warn!("Rejected {} with media type {}", file.name, file.media_type);
            let err = PipelineError::InvalidInput {
                media_type: file.media_type,
            };
            self.fail(&err);
            return Err(err);
        }
        self.select_file(file).await
    }

    /// Selects a file and analyzes it. Selecting while not Idle resets first.
    ///
    /// Returns `Ok` once the pipeline is Ready, including when no audio
    /// stream was found.
    pub async fn select_file(&mut self, file: SourceFile) -> Result<(), PipelineError> {
        if self.state != PipelineState::Idle {
            self.reset().await;
        }

        info!(
            "Selected {} ({} bytes, {})",
            file.name, file.size_bytes, file.media_type
        );
        self.source = Some(file);
        self.run_analysis().await
    }

    /// Restarts from staging after a failure, keeping the selected file and
    /// the loaded engine.
    pub async fn retry(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Error || self.source.is_none() {
            return Err(PipelineError::invalid_state("retry", self.state));
        }

        self.discard_staged_input().await;
        self.error = None;
        self.progress = 0.0;
        info!("Retrying pipeline");
        self.run_analysis().await
    }

    /// Changes the output format. Allowed while Idle or Ready; at Ready the
    /// suggested filename is recomputed without probing again.
    pub fn select_format(&mut self, id: &str) -> Result<(), PipelineError> {
        if !matches!(self.state, PipelineState::Idle | PipelineState::Ready) {
            return Err(PipelineError::invalid_state("select format", self.state));
        }

        let format = self
            .session
            .catalog()
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::InvalidFormat { id: id.to_string() })?;

        debug!("Selected output format {}", format.id);
        self.format = format;

        if self.state == PipelineState::Ready {
            if let Some(info) = self.ready_info() {
                emit(&self.events, PipelineEvent::Ready(info));
            }
        }
        Ok(())
    }

    /// Extracts the audio track in the selected format.
    pub async fn convert(&mut self) -> Result<ConversionResult, PipelineError> {
        if self.state != PipelineState::Ready {
            return Err(PipelineError::invalid_state("convert", self.state));
        }
        if !self.can_convert() {
            return Err(PipelineError::NoAudio);
        }

        let session = Arc::clone(&self.session);
        let (Some(file), Some(input_name), Some(handle)) = (
            self.source.clone(),
            self.staged_input.clone(),
            session.engine().handle(),
        ) else {
            return Err(PipelineError::invalid_state("convert", self.state));
        };
        let format = self.format.clone();

        self.progress = 0.0;
        self.set_state(PipelineState::Converting);
        info!("Converting {} to {}", file.name, format.name);

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let events = &self.events;
        let mut last = 0.0f32;

        let transcode =
            session
                .engine()
                .transcode(&handle, &input_name, &format, Some(progress_tx));
        let forward = async {
            while let Some(event) = progress_rx.recv().await {
                last = event.percent;
                emit(events, PipelineEvent::Progress(event));
            }
        };
        let (outcome, ()) = tokio::join!(transcode, forward);
        self.progress = last;

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                let err = PipelineError::from(e);
                self.fail(&err);
                return Err(err);
            }
        };

        if let Some(previous) = self.result.take() {
            session.blobs().revoke(&previous.blob).await;
        }

        let blob = session
            .blobs()
            .create(output.bytes, output.mime_type.clone())
            .await;
        let result = ConversionResult {
            blob,
            mime_type: output.mime_type,
            size_bytes: output.size_bytes,
            filename: format.filename_for(file.basename()),
            created_at: Utc::now(),
        };

        info!(
            "Converted {} into {} ({} bytes)",
            file.name, result.filename, result.size_bytes
        );
        self.result = Some(result.clone());
        self.progress = 100.0;
        self.set_state(PipelineState::Done);
        Ok(result)
    }

    /// Returns to Idle from any state, releasing the result blob and the
    /// staged input. Calling it again is a no-op.
    ///
    /// An in-flight transcode is not aborted.
    pub async fn reset(&mut self) {
        self.clear().await;
        if self.state != PipelineState::Idle {
            info!("Pipeline reset from {}", self.state);
        }
        self.set_state(PipelineState::Idle);
    }

    async fn run_analysis(&mut self) -> Result<(), PipelineError> {
        let Some(file) = self.source.clone() else {
            return Err(PipelineError::invalid_state("analyze", self.state));
        };

        self.report = None;
        self.steps = loading_steps(self.session.engine().is_loaded());
        self.set_state(PipelineState::Loading);
        emit(&self.events, PipelineEvent::StepsChanged(self.steps.clone()));

        let outcome = self.analyze(&file).await;

        self.steps.clear();
        emit(&self.events, PipelineEvent::StepsChanged(Vec::new()));

        match outcome {
            Ok((input_name, report)) => {
                if !report.has_audio {
                    warn!("No audio stream found in {}", file.name);
                }
                self.staged_input = Some(input_name);
                self.report = Some(report);
                self.set_state(PipelineState::Ready);
                if let Some(info) = self.ready_info() {
                    info!(
                        "{} ready: audio={}, duration={:.1}s{}",
                        info.file_name,
                        info.has_audio,
                        info.duration_secs,
                        if info.duration_estimated { " (estimated)" } else { "" }
                    );
                    emit(&self.events, PipelineEvent::Ready(info));
                }
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Engine load, staging and probing, each step marked active then done.
    async fn analyze(&mut self, file: &SourceFile) -> Result<(String, ProbeReport), PipelineError> {
        let session = Arc::clone(&self.session);
        let engine = session.engine();
        let events = &self.events;
        let steps = &mut self.steps;

        let handle = if steps.iter().any(|s| s.id == step::DOWNLOAD) {
            update_step(steps, events, step::DOWNLOAD, StepStatus::Active, Some(0));
            let mut download: Option<EventProgress> = None;

            engine
                .ensure_loaded(|progress| match progress {
                    // Every mirror attempt is a fresh download from 0.
                    LoadProgress::Connecting { .. } => {
                        download = Some(EventProgress::start(ProgressOperation::Download, events));
                        update_step(steps, events, step::ENGINE, StepStatus::Pending, None);
                        update_step(steps, events, step::DOWNLOAD, StepStatus::Active, Some(0));
                    }
                    LoadProgress::Downloading(bytes) => {
                        if let (Some(download), Some(percent)) = (download.as_mut(), bytes.percent()) {
                            download.report(percent, events);
                            let shown = download.current() as u8;
                            update_step(steps, events, step::DOWNLOAD, StepStatus::Active, Some(shown));
                        }
                    }
                    LoadProgress::Initializing { .. } => {
                        if let Some(download) = download.as_mut() {
                            download.finish(events);
                        }
                        update_step(steps, events, step::DOWNLOAD, StepStatus::Done, Some(100));
                        update_step(steps, events, step::ENGINE, StepStatus::Active, None);
                    }
                })
                .await?
        } else {
            update_step(steps, events, step::ENGINE, StepStatus::Active, None);
            engine.ensure_loaded(|_| {}).await?
        };
        update_step(steps, events, step::ENGINE, StepStatus::Done, None);

        update_step(steps, events, step::READ, StepStatus::Active, Some(0));
        let mut staging = EventProgress::start(ProgressOperation::Staging, events);
        let input_name = engine
            .write_input(&handle, file, |bytes| {
                if let Some(percent) = bytes.percent() {
                    staging.report(percent, events);
                    let shown = staging.current() as u8;
                    update_step(steps, events, step::READ, StepStatus::Active, Some(shown));
                }
            })
            .await?;
        staging.finish(events);
        update_step(steps, events, step::READ, StepStatus::Done, Some(100));

        update_step(steps, events, step::ANALYZE, StepStatus::Active, None);
        let report = session.probe().probe(&handle, &input_name, file).await;
        update_step(steps, events, step::ANALYZE, StepStatus::Done, None);

        Ok((input_name, report))
    }

    fn set_state(&mut self, state: PipelineState) {
        if self.state == state {
            return;
        }
        debug!("Pipeline {} -> {}", self.state, state);
        self.state = state;
        emit(&self.events, PipelineEvent::StateChanged(state));
    }

    fn fail(&mut self, err: &PipelineError) {
        let message = err.to_string();
        warn!("Pipeline failed: {}", message);
        self.error = Some(message.clone());
        self.set_state(PipelineState::Error);
        emit(&self.events, PipelineEvent::Failed(message));
    }

    /// Drops the file and everything derived from it.
    async fn clear(&mut self) {
        if let Some(result) = self.result.take() {
            if self.session.blobs().revoke(&result.blob).await {
                debug!("Released {}", result.blob);
            }
        }
        self.discard_staged_input().await;

        if !self.steps.is_empty() {
            self.steps.clear();
            emit(&self.events, PipelineEvent::StepsChanged(Vec::new()));
        }
        self.source = None;
        self.report = None;
        self.error = None;
        self.progress = 0.0;
    }

    async fn discard_staged_input(&mut self) {
        let Some(name) = self.staged_input.take() else {
            return;
        };
        if let Some(handle) = self.session.engine().handle() {
            self.session.engine().remove_input(&handle, &name).await;
        }
    }
}

fn emit(events: &broadcast::Sender<PipelineEvent>, event: PipelineEvent) {
    // Err only means nobody is subscribed.
    let _ = events.send(event);
}

fn update_step(
    steps: &mut [LoadingStep],
    events: &broadcast::Sender<PipelineEvent>,
    id: &str,
    status: StepStatus,
    progress: Option<u8>,
) {
    let Some(entry) = steps.iter_mut().find(|s| s.id == id) else {
        return;
    };
    let progress = progress.or(entry.progress);
    if entry.status == status && entry.progress == progress {
        return;
    }
    entry.status = status;
    entry.progress = progress;
    emit(events, PipelineEvent::StepsChanged(steps.to_vec()));
}

/// Runs a [`ProgressReporter`] for one operation and republishes its
/// events on the pipeline's event channel.
struct EventProgress {
    reporter: ProgressReporter,
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl EventProgress {
    fn start(operation: ProgressOperation, events: &broadcast::Sender<PipelineEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut progress = Self {
            reporter: ProgressReporter::start(operation, Some(tx)),
            rx,
        };
        progress.drain(events);
        progress
    }

    fn report(&mut self, percent: f32, events: &broadcast::Sender<PipelineEvent>) {
        self.reporter.report(percent);
        self.drain(events);
    }

    fn finish(&mut self, events: &broadcast::Sender<PipelineEvent>) {
        self.reporter.finish();
        self.drain(events);
    }

    fn current(&self) -> f32 {
        self.reporter.current()
    }

    fn drain(&mut self, events: &broadcast::Sender<PipelineEvent>) {
        while let Ok(event) = self.rx.try_recv() {
            emit(events, PipelineEvent::Progress(event));
        }
    }
}
