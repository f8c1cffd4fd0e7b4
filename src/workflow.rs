//! The conversion workflow state machine.
//!
//! [`WorkflowController`] owns everything that lives for the duration of one
//! user-visible run: the current [`WorkflowState`], the selected image and its
//! preview handle, the progress narrator and the result or error. Every
//! mutation goes through `&mut self`, so there is exactly one writer.
//!
//! ```text
//! Idle ──select valid image──▶ Preview ──confirm──▶ Processing ──Ok──▶ Done
//!   │                            │  ▲                   │
//!   │                            └──┘ reselect          └──Err─▶ Failed
//!   ├──select invalid image──▶ Failed
//!   └──submit text──▶ Processing
//! any state ──reset──▶ Idle
//! ```
//!
//! Each Processing attempt runs two tasks: the network call and the
//! [`ProgressNarrator`] timer. The narrator lives inside the Processing state
//! and dies with it. The network call is never aborted; it reports back over
//! a channel tagged with its [`AttemptToken`], and completions whose token
//! no longer matches the current attempt are dropped.

use crate::client::ConversionService;
use crate::config::ConversionConfig;
use crate::error::{ConversionError, WorkflowError};
use crate::input::ImageCandidate;
use crate::output::ConversionResult;
use crate::preview::{MediaPreview, PreviewHandle, PreviewView};
use crate::progress::{NoopObserver, ProgressNarrator, SharedObserver, STATUS_MESSAGES};
use crate::validate;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Modes and phases
// ---------------------------------------------------------------------------

/// Which kind of input the user is providing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Image,
    Text,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputMode::Image => "image",
            InputMode::Text => "text",
        })
    }
}

/// Payload-free mirror of [`WorkflowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    Preview,
    Processing,
    Done,
    Failed,
}

impl WorkflowPhase {
    /// `true` while a conversion request is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, WorkflowPhase::Processing)
    }

    /// `true` for the states a run ends in; only `reset` leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPhase::Done | WorkflowPhase::Failed)
    }

    /// A short label suitable for a status bar.
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowPhase::Idle => "Idle",
            WorkflowPhase::Preview => "Preview",
            WorkflowPhase::Processing => "Converting",
            WorkflowPhase::Done => "Done",
            WorkflowPhase::Failed => "Failed",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::Preview => "previewing",
            WorkflowPhase::Processing => "processing",
            WorkflowPhase::Done => "done",
            WorkflowPhase::Failed => "failed",
        })
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Generation number of one Processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptToken(u64);

/// An accepted image together with its live preview.
#[derive(Debug)]
pub struct SelectedImage {
    image: ImageCandidate,
    preview: PreviewHandle,
    view: PreviewView,
}

impl SelectedImage {
    pub fn image(&self) -> &ImageCandidate {
        &self.image
    }

    pub fn preview_handle(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn view(&self) -> &PreviewView {
        &self.view
    }
}

/// What an in-flight attempt is converting.
#[derive(Debug)]
pub enum ProcessingSource {
    Image(SelectedImage),
    Text(String),
}

/// The controller's state. Payloads only exist on the variant they belong to.
#[derive(Debug)]
pub enum WorkflowState {
    Idle,
    Preview {
        selected: SelectedImage,
    },
    Processing {
        attempt: AttemptToken,
        source: ProcessingSource,
        narrator: ProgressNarrator,
    },
    Done {
        result: ConversionResult,
    },
    Failed {
        error: ConversionError,
    },
}

impl WorkflowState {
    pub fn phase(&self) -> WorkflowPhase {
        match self {
            WorkflowState::Idle => WorkflowPhase::Idle,
            WorkflowState::Preview { .. } => WorkflowPhase::Preview,
            WorkflowState::Processing { .. } => WorkflowPhase::Processing,
            WorkflowState::Done { .. } => WorkflowPhase::Done,
            WorkflowState::Failed { .. } => WorkflowPhase::Failed,
        }
    }
}

/// The outcome of one attempt, as delivered by its network task.
#[derive(Debug)]
pub struct Completion {
    pub attempt: AttemptToken,
    pub outcome: Result<ConversionResult, ConversionError>,
}

enum Request {
    Image(ImageCandidate),
    Text(String),
}

// ---------------------------------------------------------------------------
// WorkflowController
// ---------------------------------------------------------------------------

/// Drives one user's conversion workflow.
///
/// `confirm` and `submit_text` spawn tokio tasks and must be called from
/// within a runtime.
///
/// ```rust,no_run
/// use hand2excal::{ConversionConfig, HttpConversionClient, ImageCandidate, WorkflowController, WorkflowPhase};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::default();
/// let client = Arc::new(HttpConversionClient::new(&config)?);
/// let mut controller = WorkflowController::new(client, &config);
///
/// let image = ImageCandidate::from_path("whiteboard.jpg").await?;
/// controller.select_image(image)?;
/// controller.confirm()?;
/// if controller.settle().await == WorkflowPhase::Done {
///     println!("{}", controller.result().unwrap().payload());
/// }
/// # Ok(())
/// # }
/// ```
pub struct WorkflowController {
    service: Arc<dyn ConversionService>,
    observer: SharedObserver,
    progress_interval: Duration,
    previews: MediaPreview,
    state: WorkflowState,
    mode: InputMode,
    generation: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl WorkflowController {
    pub fn new(service: Arc<dyn ConversionService>, config: &ConversionConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            service,
            observer: config
                .observer
                .clone()
                .unwrap_or_else(|| Arc::new(NoopObserver)),
            progress_interval: config.progress_interval(),
            previews: MediaPreview::new(),
            state: WorkflowState::Idle,
            mode: InputMode::default(),
            generation: 0,
            completions_tx,
            completions_rx,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.state.phase()
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// The accepted image, in Preview and while it is being converted.
    pub fn selected_image(&self) -> Option<&ImageCandidate> {
        self.selection().map(SelectedImage::image)
    }

    pub fn preview_view(&self) -> Option<&PreviewView> {
        self.selection().map(SelectedImage::view)
    }

    pub fn current_attempt(&self) -> Option<AttemptToken> {
        match &self.state {
            WorkflowState::Processing { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }

    /// Index of the status message being shown; `None` outside Processing.
    pub fn progress_cursor(&self) -> Option<usize> {
        match &self.state {
            WorkflowState::Processing { narrator, .. } => Some(narrator.cursor()),
            _ => None,
        }
    }

    pub fn progress_message(&self) -> Option<&'static str> {
        self.progress_cursor().map(|c| STATUS_MESSAGES[c])
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        match &self.state {
            WorkflowState::Done { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ConversionError> {
        match &self.state {
            WorkflowState::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Preview handles currently allocated; never more than one.
    pub fn live_previews(&self) -> usize {
        self.previews.live_count()
    }

    fn selection(&self) -> Option<&SelectedImage> {
        match &self.state {
            WorkflowState::Preview { selected }
            | WorkflowState::Processing {
                source: ProcessingSource::Image(selected),
                ..
            } => Some(selected),
            _ => None,
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────

    /// Switch between image and text input. Only allowed while Idle.
    pub fn set_mode(&mut self, mode: InputMode) -> Result<(), WorkflowError> {
        self.require(&[WorkflowPhase::Idle], "switch input mode")?;
        if self.mode != mode {
            debug!("Input mode {} -> {}", self.mode, mode);
            self.mode = mode;
        }
        Ok(())
    }

    /// Offer an image. Valid images land in Preview, replacing (and
    /// releasing) any earlier selection; invalid ones land in Failed.
    pub fn select_image(&mut self, candidate: ImageCandidate) -> Result<WorkflowPhase, WorkflowError> {
        const ACTION: &str = "select an image";
        self.require(&[WorkflowPhase::Idle, WorkflowPhase::Preview], ACTION)?;
        if self.mode != InputMode::Image {
            return Err(WorkflowError::WrongMode {
                action: ACTION,
                mode: self.mode,
            });
        }

        let from = self.phase();
        let verdict = validate::validate(&candidate);

        // The old handle goes before a new one is made.
        let previous = self.take_state();
        self.retire(previous);

        let next = match verdict {
            Ok(()) => {
                info!(
                    "Accepted {} ({:.1} MB, {})",
                    candidate.display_name,
                    candidate.size_mb(),
                    candidate.mime_type
                );
                let preview = self.previews.create(&candidate);
                let view = self.previews.render(&preview);
                self.observer.on_preview(&view);
                WorkflowState::Preview {
                    selected: SelectedImage {
                        image: candidate,
                        preview,
                        view,
                    },
                }
            }
            Err(e) => {
                warn!("Rejected {}: {}", candidate.display_name, e);
                WorkflowState::Failed { error: e.into() }
            }
        };
        self.enter(from, next);
        Ok(self.phase())
    }

    /// Start converting the previewed image.
    pub fn confirm(&mut self) -> Result<AttemptToken, WorkflowError> {
        let from = self.phase();
        match self.take_state() {
            WorkflowState::Preview { selected } => {
                let request = Request::Image(selected.image.clone());
                Ok(self.begin(from, ProcessingSource::Image(selected), request))
            }
            other => {
                self.state = other;
                Err(WorkflowError::ActionNotAllowed {
                    action: "convert",
                    phase: from,
                })
            }
        }
    }

    /// Start converting a process description.
    ///
    /// Whitespace-only text is refused with [`WorkflowError::EmptyText`] and
    /// nothing happens.
    pub fn submit_text(&mut self, text: impl Into<String>) -> Result<AttemptToken, WorkflowError> {
        const ACTION: &str = "convert text";
        self.require(&[WorkflowPhase::Idle], ACTION)?;
        if self.mode != InputMode::Text {
            return Err(WorkflowError::WrongMode {
                action: ACTION,
                mode: self.mode,
            });
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(WorkflowError::EmptyText);
        }
        let from = self.phase();
        let request = Request::Text(text.clone());
        Ok(self.begin(from, ProcessingSource::Text(text), request))
    }

    /// Return to Idle from any state, releasing the preview and stopping the
    /// narrator. An outstanding request keeps running but its answer will be
    /// ignored.
    pub fn reset(&mut self) {
        let from = self.phase();
        if from == WorkflowPhase::Idle {
            return;
        }
        let previous = self.take_state();
        self.retire(previous);
        self.enter(from, WorkflowState::Idle);
    }

    /// Apply a completion if it belongs to the current attempt.
    ///
    /// Returns `false` (and changes nothing) for stale completions.
    pub fn apply_completion(&mut self, completion: Completion) -> bool {
        if self.current_attempt() != Some(completion.attempt) {
            debug!(
                "Discarding completion for attempt {:?} while {}",
                completion.attempt,
                self.phase()
            );
            return false;
        }

        let from = self.phase();
        let previous = self.take_state();
        self.retire(previous);

        let next = match completion.outcome {
            Ok(result) => {
                match result.metadata() {
                    Some(m) => info!(
                        "Conversion complete: {} shapes, {} connections",
                        m.nodes_count, m.arrows_count
                    ),
                    None => info!("Conversion complete"),
                }
                WorkflowState::Done { result }
            }
            Err(error) => {
                warn!("Conversion failed: {}", error);
                WorkflowState::Failed { error }
            }
        };
        self.enter(from, next);
        true
    }

    /// Wait until the current attempt resolves. Returns immediately outside
    /// Processing.
    pub async fn settle(&mut self) -> WorkflowPhase {
        while self.phase() == WorkflowPhase::Processing {
            match self.completions_rx.recv().await {
                Some(completion) => {
                    self.apply_completion(completion);
                }
                // Unreachable while we hold a sender; bail rather than spin.
                None => break,
            }
        }
        self.phase()
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn require(&self, allowed: &[WorkflowPhase], action: &'static str) -> Result<(), WorkflowError> {
        let phase = self.phase();
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(WorkflowError::ActionNotAllowed { action, phase })
        }
    }

    fn begin(&mut self, from: WorkflowPhase, source: ProcessingSource, request: Request) -> AttemptToken {
        self.generation += 1;
        let attempt = AttemptToken(self.generation);

        let service = Arc::clone(&self.service);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            // A panicking service still yields a completion.
            let call = tokio::spawn(async move {
                match request {
                    Request::Image(image) => service.submit_image(image).await,
                    Request::Text(text) => service.submit_text(text).await,
                }
            });
            let outcome = call
                .await
                .unwrap_or_else(|e| Err(ConversionError::new(format!("Conversion task failed: {e}"))));
            // The controller may already be gone.
            let _ = tx.send(Completion { attempt, outcome });
        });

        let narrator = ProgressNarrator::start(self.progress_interval, Arc::clone(&self.observer));
        self.enter(
            from,
            WorkflowState::Processing {
                attempt,
                source,
                narrator,
            },
        );
        attempt
    }

    fn take_state(&mut self) -> WorkflowState {
        std::mem::replace(&mut self.state, WorkflowState::Idle)
    }

    /// Free what a departing state holds.
    fn retire(&mut self, state: WorkflowState) {
        match state {
            WorkflowState::Preview { selected } => self.previews.release(Some(selected.preview)),
            WorkflowState::Processing {
                source, narrator, ..
            } => {
                narrator.stop();
                if let ProcessingSource::Image(selected) = source {
                    self.previews.release(Some(selected.preview));
                }
            }
            WorkflowState::Idle | WorkflowState::Done { .. } | WorkflowState::Failed { .. } => {}
        }
    }

    fn enter(&mut self, from: WorkflowPhase, next: WorkflowState) {
        self.state = next;
        let to = self.phase();
        debug!("Workflow {} -> {}", from, to);
        self.observer.on_transition(from, to);
    }
}

impl fmt::Debug for WorkflowController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowController")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("generation", &self.generation)
            .field("live_previews", &self.previews.live_count())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
