//! Parallel WMA encoding using tokio
//!
//! Runs one encode job over a worker pool bounded by a semaphore. Each
//! worker resolves the output path, picks parameters (probing in auto mode),
//! runs the encoder and records the result in the shared `JobProgress`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use super::events::JobEvent;
use super::ffmpeg::{EncodeError, ExternalEncoder};
use super::output_paths::{claim_outputs, resolve_output_path, OutputMode, PathError};
use super::report::{FileReport, JobReport};
use crate::audio::{round_up, AudioProbe, EncodingMode, EncodingParameters};
use crate::core::{FileState, JobProgress, JobState};

/// Simultaneous encodes when the caller does not choose
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Shared flag asking a running job to stop
///
/// Files already encoding run to completion; files not yet started are
/// left alone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a single file did not produce output
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("cancelled")]
    Cancelled,
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// One batch conversion run
#[derive(Debug, Clone)]
pub struct EncodeJob {
    id: Uuid,
    files: Vec<PathBuf>,
    concurrency: usize,
    output_mode: OutputMode,
    encoding_mode: EncodingMode,
}

impl EncodeJob {
    /// Duplicate inputs are dropped (first occurrence kept) and a
    /// concurrency of zero is raised to one.
    pub fn new(
        files: Vec<PathBuf>,
        concurrency: usize,
        output_mode: OutputMode,
        encoding_mode: EncodingMode,
    ) -> Self {
        let mut seen = HashSet::new();
        let files = files
            .into_iter()
            .filter(|f| seen.insert(f.clone()))
            .collect();
        Self {
            id: Uuid::new_v4(),
            files,
            concurrency: concurrency.max(1),
            output_mode,
            encoding_mode,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn output_mode(&self) -> &OutputMode {
        &self.output_mode
    }

    pub fn encoding_mode(&self) -> EncodingMode {
        self.encoding_mode
    }
}

/// Runs encode jobs and publishes their progress
pub struct EncodeJobRunner {
    encoder: Arc<dyn ExternalEncoder>,
    probe: Arc<dyn AudioProbe>,
    progress: Arc<JobProgress>,
    events: Option<mpsc::UnboundedSender<JobEvent>>,
    cancel: CancelToken,
}

impl EncodeJobRunner {
    pub fn new(encoder: Arc<dyn ExternalEncoder>, probe: Arc<dyn AudioProbe>) -> Self {
        Self {
            encoder,
            probe,
            progress: Arc::new(JobProgress::new()),
            events: None,
            cancel: CancelToken::new(),
        }
    }

    /// Send a `JobEvent` on every transition
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Live progress; snapshot it at any time
    pub fn progress(&self) -> Arc<JobProgress> {
        self.progress.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run `job` to completion
    ///
    /// Returns once every dispatched file has finished. Individual file
    /// failures never abort the job; they are recorded in the progress and
    /// the returned report.
    pub async fn run(&self, job: &EncodeJob) -> JobReport {
        let started_at = Utc::now();
        let total = job.files().len();

        self.progress.reset(job.files());
        emit(
            &self.events,
            JobEvent::JobStarted {
                job_id: job.id(),
                total,
            },
        );

        log::info!(
            "Starting encode job {}: {} files with {} workers ({})",
            job.id(),
            total,
            job.concurrency(),
            describe_mode(job.encoding_mode())
        );

        let worker = Arc::new(Worker {
            encoder: self.encoder.clone(),
            probe: self.probe.clone(),
            progress: self.progress.clone(),
            events: self.events.clone(),
            cancel: self.cancel.clone(),
            output_owners: claim_outputs(job.files(), job.output_mode()),
            output_mode: job.output_mode().clone(),
            encoding_mode: job.encoding_mode(),
        });

        let semaphore = Arc::new(Semaphore::new(job.concurrency()));
        let mut futures = FuturesUnordered::new();

        for input in job.files() {
            // Check for cancellation before starting each new file
            if self.cancel.is_cancelled() {
                log::info!("Cancellation requested - skipping remaining files");
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if self.cancel.is_cancelled() {
                log::info!("Cancellation requested - skipping remaining files");
                break;
            }

            let worker = worker.clone();
            let task_input = input.clone();
            let handle = tokio::spawn(async move {
                let report = worker.process(&task_input).await;
                drop(permit);
                report
            });

            let input = input.clone();
            futures.push(async move { (input, handle.await) });
        }

        // Wait for all in-flight tasks to complete (even if cancelled)
        let mut reports: HashMap<PathBuf, FileReport> = HashMap::with_capacity(total);
        while let Some((input, joined)) = futures.next().await {
            let report = match joined {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Worker for {} did not finish: {}", input.display(), e);
                    let mut report = FileReport::pending(&input);
                    worker.fail(&mut report, FileError::Panicked(e.to_string()));
                    report
                }
            };
            reports.insert(input, report);
        }

        let cancelled = self.cancel.is_cancelled();
        self.progress.finish(cancelled);
        let snapshot = self.progress.snapshot();
        log::info!("{}", snapshot.status);

        let state = if cancelled {
            emit(&self.events, JobEvent::JobCancelled { progress: snapshot });
            JobState::Cancelled
        } else {
            emit(&self.events, JobEvent::JobCompleted { progress: snapshot });
            JobState::Completed
        };

        let files = job
            .files()
            .iter()
            .map(|f| reports.remove(f).unwrap_or_else(|| FileReport::pending(f)))
            .collect();
        JobReport::new(job.id(), started_at, state, files)
    }
}

/// Everything a worker task needs, shared across tasks
struct Worker {
    encoder: Arc<dyn ExternalEncoder>,
    probe: Arc<dyn AudioProbe>,
    progress: Arc<JobProgress>,
    events: Option<mpsc::UnboundedSender<JobEvent>>,
    cancel: CancelToken,
    /// Planned output -> the one input allowed to write it
    output_owners: HashMap<PathBuf, PathBuf>,
    output_mode: OutputMode,
    encoding_mode: EncodingMode,
}

impl Worker {
    async fn process(&self, input: &Path) -> FileReport {
        let mut report = FileReport::pending(input);

        self.transition(input, FileState::Resolving);
        let output = match self.resolve(input) {
            Ok(output) => output,
            Err(e) => {
                self.fail(&mut report, e.into());
                return report;
            }
        };
        report.output = Some(output.clone());

        let params = self.choose_parameters(input, &mut report).await;
        report.parameters = Some(params);
        emit(
            &self.events,
            JobEvent::ParametersResolved {
                path: input.to_path_buf(),
                params,
            },
        );

        if self.cancel.is_cancelled() {
            self.fail(&mut report, FileError::Cancelled);
            return report;
        }

        self.transition(input, FileState::Encoding);
        match self.encoder.encode(input, &output, params).await {
            Ok(()) => self.succeed(&mut report, &output),
            Err(e) => self.fail(&mut report, e.into()),
        }
        report
    }

    fn resolve(&self, input: &Path) -> Result<PathBuf, PathError> {
        let output = resolve_output_path(input, &self.output_mode)?;
        match self.output_owners.get(&output) {
            Some(owner) if owner != input => Err(PathError::OutputCollision {
                output,
                owner: owner.clone(),
            }),
            _ => Ok(output),
        }
    }

    async fn choose_parameters(&self, input: &Path, report: &mut FileReport) -> EncodingParameters {
        match self.encoding_mode {
            EncodingMode::Manual(params) => params,
            EncodingMode::Auto { fallback } => {
                self.transition(input, FileState::Probing);
                match self.probe.probe(input).await {
                    Ok(probed) => {
                        let params = round_up(probed.bit_depth, probed.sample_rate);
                        log::debug!(
                            "{}: {}-bit/{} Hz -> {}",
                            input.display(),
                            probed.bit_depth,
                            probed.sample_rate,
                            params.label()
                        );
                        params
                    }
                    Err(e) => {
                        log::warn!(
                            "Probe unavailable for {}: {} - using {}",
                            input.display(),
                            e,
                            fallback.label()
                        );
                        report
                            .notes
                            .push(format!("probe failed ({}); used {}", e, fallback.label()));
                        fallback
                    }
                }
            }
        }
    }

    fn transition(&self, input: &Path, state: FileState) {
        if self.progress.advance(input, state) {
            emit(
                &self.events,
                JobEvent::FileStateChanged {
                    path: input.to_path_buf(),
                    state,
                },
            );
        }
    }

    fn succeed(&self, report: &mut FileReport, output: &Path) {
        report.state = FileState::Succeeded;
        let Some(completed) = self.progress.record_success(&report.input, output) else {
            return;
        };
        let snapshot = self.progress.snapshot();
        log::debug!(
            "Completed ({}/{}): {}",
            completed,
            snapshot.total,
            report.input.display()
        );
        emit(
            &self.events,
            JobEvent::FileFinished {
                path: report.input.clone(),
                success: true,
                error: None,
                completed,
                progress: snapshot,
            },
        );
    }

    fn fail(&self, report: &mut FileReport, error: FileError) {
        let reason = error.to_string();
        report.state = FileState::Failed;
        report.error = Some(reason.clone());
        let Some(completed) = self.progress.record_failure(&report.input, &reason) else {
            return;
        };
        log::warn!("Failed: {} - {}", report.input.display(), reason);
        emit(
            &self.events,
            JobEvent::FileFinished {
                path: report.input.clone(),
                success: false,
                error: Some(reason),
                completed,
                progress: self.progress.snapshot(),
            },
        );
    }
}

fn emit(events: &Option<mpsc::UnboundedSender<JobEvent>>, event: JobEvent) {
    if let Some(tx) = events {
        // A dropped receiver just means nobody is listening any more
        let _ = tx.send(event);
    }
}

fn describe_mode(mode: EncodingMode) -> String {
    match mode {
        EncodingMode::Manual(params) => format!("manual, {}", params.label()),
        EncodingMode::Auto { fallback } => format!("auto, fallback {}", fallback.label()),
    }
}
