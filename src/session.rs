//! Upload session state machine.
//!
//! The session owns the whole interactive lifecycle of one user: which file
//! is selected, whether a request is in flight, and how the last request
//! resolved. Requests run as spawned tasks that report back through a
//! channel as [`Completion`]s tagged with a generation number; only the
//! completion for the current in-flight generation may change state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::client::AnalysisService;
use crate::contract::AnalysisResult;
use crate::submission_error::SubmissionError;
use crate::upload::SelectedFile;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    FileSelected(SelectedFile),
    Submitting(SelectedFile),
    /// The file is kept only so the same upload can be re-analyzed.
    Succeeded {
        file: SelectedFile,
        result: AnalysisResult,
    },
    Failed {
        file: SelectedFile,
        error: SubmissionError,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::FileSelected(_) => "file_selected",
            SessionState::Submitting(_) => "submitting",
            SessionState::Succeeded { .. } => "succeeded",
            SessionState::Failed { .. } => "failed",
        }
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        match self {
            SessionState::Idle => None,
            SessionState::FileSelected(file) | SessionState::Submitting(file) => Some(file),
            SessionState::Succeeded { file, .. } | SessionState::Failed { file, .. } => Some(file),
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            SessionState::Succeeded { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SubmissionError> {
        match self {
            SessionState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, SessionState::Submitting(_))
    }
}

/// Outcome of one spawned submission, delivered through the session's
/// completion channel.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub outcome: Result<AnalysisResult, SubmissionError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// The completion belonged to a superseded submission.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Please select a file first.")]
    NoFileProvided,
    #[error("An analysis is already in progress.")]
    SubmissionInFlight,
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

pub struct UploadSession<S: AnalysisService> {
    service: Arc<S>,
    state: SessionState,
    generation: u64,
    in_flight: Option<InFlight>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<S: AnalysisService> UploadSession<S> {
    /// Create an idle session. The receiver yields completions for
    /// [`UploadSession::resolve`].
    pub fn new(service: Arc<S>) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            service,
            state: SessionState::Idle,
            generation: 0,
            in_flight: None,
            completions: tx,
        };
        (session, rx)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Generation of the request currently in flight, if any.
    pub fn in_flight_generation(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.generation)
    }

    /// Replace the selection. Any result or error is dropped, and a request
    /// in flight is cancelled and can no longer change state.
    #[instrument(skip(self, file), fields(file = %file.name(), from = self.state.name()))]
    pub fn select_file(&mut self, file: SelectedFile) {
        if let Some(superseded) = self.in_flight.take() {
            info!(
                generation = superseded.generation,
                "Cancelling in-flight submission superseded by new file"
            );
            superseded.cancel.cancel();
        }

        debug!("File selected");
        self.state = SessionState::FileSelected(file);
    }

    /// Start analyzing the current file. Must be called from within a tokio
    /// runtime; exactly one request is spawned per successful call.
    #[instrument(skip(self), fields(from = self.state.name()))]
    pub fn submit(&mut self) -> Result<u64, SessionError> {
        let file = match &self.state {
            SessionState::Idle => {
                warn!("Submit requested with no file selected");
                return Err(SessionError::NoFileProvided);
            }
            SessionState::Submitting(_) => {
                debug!("Ignoring submit while a request is in flight");
                return Err(SessionError::SubmissionInFlight);
            }
            SessionState::FileSelected(file)
            | SessionState::Succeeded { file, .. }
            | SessionState::Failed { file, .. } => file.clone(),
        };

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();

        self.spawn_request(generation, file.clone(), cancel.clone());
        self.in_flight = Some(InFlight { generation, cancel });
        self.state = SessionState::Submitting(file);

        info!(generation, "Submission started");
        Ok(generation)
    }

    fn spawn_request(&self, generation: u64, file: SelectedFile, cancel: CancellationToken) {
        let service = Arc::clone(&self.service);
        let completions = self.completions.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(generation, "Submission abandoned");
                }
                outcome = service.analyze(file) => {
                    // The session may already be gone
                    let _ = completions.send(Completion { generation, outcome });
                }
            }
        });
    }

    /// Apply a completion if it answers the submission currently in flight;
    /// anything else is stale and leaves the state untouched.
    #[instrument(skip(self, completion), fields(generation = completion.generation))]
    pub fn resolve(&mut self, completion: Completion) -> Resolution {
        match &self.in_flight {
            Some(current) if current.generation == completion.generation => {}
            current => {
                debug!(
                    current = current.as_ref().map(|f| f.generation),
                    "Discarding stale completion"
                );
                return Resolution::Discarded;
            }
        }

        let file = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Submitting(file) => file,
            other => {
                warn!(state = other.name(), "Completion arrived outside of submitting state");
                self.state = other;
                return Resolution::Discarded;
            }
        };
        self.in_flight = None;

        self.state = match completion.outcome {
            Ok(result) => {
                info!(file = %file.name(), "Analysis succeeded");
                SessionState::Succeeded { file, result }
            }
            Err(error) => {
                warn!(file = %file.name(), error = %error, "Analysis failed");
                SessionState::Failed { file, error }
            }
        };
        Resolution::Applied
    }

    /// Wait until the in-flight submission resolves, discarding stale
    /// completions on the way. Returns immediately when nothing is in flight.
    pub async fn settle(
        &mut self,
        completions: &mut mpsc::UnboundedReceiver<Completion>,
    ) -> &SessionState {
        while self.in_flight.is_some() {
            match completions.recv().await {
                Some(completion) => {
                    self.resolve(completion);
                }
                None => break,
            }
        }
        &self.state
    }
}

impl<S: AnalysisService> Drop for UploadSession<S> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
        }
    }
}
