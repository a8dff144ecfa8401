//! The session: owned artifact and message state, folded one stream at a time.
//!
//! # State machine
//!
//! ```text
//!            fold()           transport exhausted
//!   Idle ───────────► Streaming ─────────────────► Idle
//!     ▲                   │
//!     │                   │ transport error
//!     │   next fold()     ▼
//!     └─────────────── Failed
//! ```
//!
//! State is replaced wholesale on every change (copy-on-write behind a
//! `parking_lot::RwLock`), so a reader never observes a half-built version.
//! Every change is also published on a broadcast channel.
//!
//! Only one fold runs at a time. A second `fold()` or a `switch_session()`
//! issued while a fold is in flight is rejected with
//! [`SessionError::AlreadyFolding`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use scribe_types::{Artifact, Message};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, SessionError};
use crate::fold::{Fold, FoldRequest, SessionUpdate};
use crate::notify::{LogNotifier, Notifier};
use crate::reconcile::{PersistedBundle, reconcile};
use crate::share::{RunSharer, attach_shared_run};
use crate::source::FrameSource;

/// Where the session is in its fold lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FoldPhase {
    #[default]
    Idle,
    Streaming,
    /// The last fold ended on a transport failure.
    Failed,
}

/// How a fold's frame sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Exhausted,
    TransportFailed(String),
}

/// Result of a completed fold.
#[derive(Debug)]
pub struct FoldOutcome {
    pub run_id: Option<String>,
    pub followup_message_id: Option<String>,
    pub artifact: Option<Arc<Artifact>>,
    pub messages: Arc<Vec<Message>>,
    /// Index of the version written by this fold, if any.
    pub new_index: Option<u32>,
    pub termination: Termination,
    /// The run-sharing task, when one was launched.
    pub share: Option<JoinHandle<()>>,
}

impl FoldOutcome {
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Exhausted
    }
}

/// A consistent view of the session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub artifact: Option<Arc<Artifact>>,
    pub messages: Arc<Vec<Message>>,
    pub phase: FoldPhase,
}

#[derive(Debug, Default)]
struct SessionState {
    artifact: Option<Arc<Artifact>>,
    messages: Arc<Vec<Message>>,
    phase: FoldPhase,
}

impl SessionState {
    fn install(&mut self, update: &SessionUpdate) {
        match update {
            SessionUpdate::ArtifactChanged { artifact } => self.artifact = Some(Arc::clone(artifact)),
            SessionUpdate::MessagesChanged { messages } => self.messages = Arc::clone(messages),
            SessionUpdate::SessionReplaced { artifact, messages } => {
                self.artifact = artifact.clone();
                self.messages = Arc::clone(messages);
            }
            SessionUpdate::FoldFinished { .. } => {}
        }
    }
}

/// Clears the fold flag when dropped, however the fold ends.
struct FoldGuard<'a>(&'a AtomicBool);

impl<'a> FoldGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::AlreadyFolding)?;
        Ok(Self(flag))
    }
}

impl Drop for FoldGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One conversation's artifact and messages.
pub struct Session {
    id: Uuid,
    config: Arc<EngineConfig>,
    state: Arc<RwLock<SessionState>>,
    folding: AtomicBool,
    updates: broadcast::Sender<SessionUpdate>,
    notifier: Arc<dyn Notifier>,
    sharer: Option<Arc<dyn RunSharer>>,
}

impl Session {
    /// Create an empty session.
    pub fn new(config: EngineConfig) -> Self {
        let (updates, _) = broadcast::channel(config.update_capacity.max(1));
        Self {
            id: Uuid::new_v4(),
            config: Arc::new(config),
            state: Arc::new(RwLock::new(SessionState::default())),
            folding: AtomicBool::new(false),
            updates,
            notifier: Arc::new(LogNotifier),
            sharer: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_sharer(mut self, sharer: Arc<dyn RunSharer>) -> Self {
        self.sharer = Some(sharer);
        self
    }

    /// Seed the session with existing state, without publishing an update.
    pub fn with_state(self, artifact: Option<Artifact>, messages: Vec<Message>) -> Self {
        {
            let mut state = self.state.write();
            state.artifact = artifact.map(Arc::new);
            state.messages = Arc::new(messages);
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            artifact: state.artifact.clone(),
            messages: Arc::clone(&state.messages),
            phase: state.phase,
        }
    }

    pub fn artifact(&self) -> Option<Arc<Artifact>> {
        self.state.read().artifact.clone()
    }

    pub fn messages(&self) -> Arc<Vec<Message>> {
        Arc::clone(&self.state.read().messages)
    }

    pub fn phase(&self) -> FoldPhase {
        self.state.read().phase
    }

    pub fn is_folding(&self) -> bool {
        self.folding.load(Ordering::Acquire)
    }

    /// Fold a frame stream into the session state.
    ///
    /// Every frame is applied before the next is awaited. A transport
    /// failure ends the fold early but is not an error: whatever was folded
    /// so far stays, and the outcome records the failure.
    #[tracing::instrument(skip_all, name = "fold", fields(session = %self.id))]
    pub async fn fold<S: FrameSource>(&self, mut source: S, request: &FoldRequest) -> Result<FoldOutcome> {
        let _guard = FoldGuard::acquire(&self.folding)?;

        let (artifact, messages) = {
            let state = self.state.read();
            (state.artifact.clone(), Arc::clone(&state.messages))
        };
        let mut fold = Fold::new(&self.config, request, self.notifier.as_ref(), artifact, messages);
        let mut frames = 0usize;

        let termination = loop {
            match source.next_frame().await {
                Some(Ok(raw)) => {
                    if frames == 0 {
                        self.state.write().phase = FoldPhase::Streaming;
                        debug!("first frame received");
                    }
                    frames += 1;
                    if let Some(update) = fold.apply(raw) {
                        self.publish(update);
                    }
                }
                Some(Err(err)) => {
                    error!(frames, "{err}");
                    break Termination::TransportFailed(err.0);
                }
                None => break Termination::Exhausted,
            }
        };

        let summary = fold.finish();
        self.state.write().phase = match termination {
            Termination::Exhausted => FoldPhase::Idle,
            Termination::TransportFailed(_) => FoldPhase::Failed,
        };
        info!(
            frames,
            run_id = summary.run_id.as_deref(),
            new_index = summary.new_index,
            "fold finished"
        );
        self.publish(SessionUpdate::FoldFinished {
            run_id: summary.run_id.clone(),
        });

        let share = self.spawn_share(summary.run_id.as_deref(), summary.followup_message_id.as_deref());

        Ok(FoldOutcome {
            run_id: summary.run_id,
            followup_message_id: summary.followup_message_id,
            artifact: summary.artifact,
            messages: summary.messages,
            new_index: summary.new_index,
            termination,
            share,
        })
    }

    /// Replace the whole state with a persisted conversation.
    ///
    /// Nothing changes if the bundle's artifact cannot be migrated.
    pub fn switch_session(&self, bundle: PersistedBundle) -> Result<()> {
        let _guard = FoldGuard::acquire(&self.folding)?;
        let reconciled = reconcile(bundle, &self.config)?;
        info!(
            session = %self.id,
            messages = reconciled.messages.len(),
            has_artifact = reconciled.artifact.is_some(),
            "switched session"
        );

        let update = SessionUpdate::SessionReplaced {
            artifact: reconciled.artifact.map(Arc::new),
            messages: Arc::new(reconciled.messages),
        };
        {
            let mut state = self.state.write();
            state.phase = FoldPhase::Idle;
            state.install(&update);
        }
        let _ = self.updates.send(update);
        Ok(())
    }

    fn publish(&self, update: SessionUpdate) {
        self.state.write().install(&update);
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }

    /// Launch the run-sharing side effect for a finished fold.
    fn spawn_share(&self, run_id: Option<&str>, message_id: Option<&str>) -> Option<JoinHandle<()>> {
        let sharer = Arc::clone(self.sharer.as_ref()?);
        let (Some(run_id), Some(message_id)) = (run_id, message_id) else {
            debug!("nothing to share");
            return None;
        };
        let run_id = run_id.to_string();
        let message_id = message_id.to_string();
        let state = Arc::clone(&self.state);
        let config = Arc::clone(&self.config);
        let updates = self.updates.clone();
        let span = info_span!("share", session = %self.id, run_id = %run_id);

        let task = async move {
            let Some(url) = sharer.share_run(&run_id).await else {
                debug!("run not shared");
                return;
            };
            let messages = {
                let mut state = state.write();
                let Some(next) = attach_shared_run(&state.messages, &message_id, &url, &config) else {
                    debug!(message_id, "message missing or already annotated");
                    return;
                };
                let next = Arc::new(next);
                state.messages = Arc::clone(&next);
                next
            };
            info!(url, "attached shared run");
            let _ = updates.send(SessionUpdate::MessagesChanged { messages });
        };
        Some(tokio::spawn(task.instrument(span)))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("folding", &self.is_folding())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
