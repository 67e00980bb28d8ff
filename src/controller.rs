//! The chat session controller.
//!
//! [`ChatSessionController`] owns the session state (identifier, busy flag, remembered
//! follow-ups), issues the welcome and chat calls through a [`ChatTransport`], feeds reply events
//! to a [`ReplyAssembler`] and guarantees that every send ends with the input re-enabled.
//!
//! All methods take `&self`, so a front end can hold one controller and dispatch submit, click
//! and follow-up actions to it while a reply is still streaming; the busy guard rejects a second
//! send until the first has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::assembler::{ReplyAssembler, ReplyOutcome};
use crate::client::ChatTransport;
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::observability::{SENDS_IGNORED, STREAM_DURATION, STREAM_ERRORS, STREAM_TTFE};
use crate::pacing::Pacer;
use crate::render::{FollowUpId, LoadingHandle, Renderer, SharedRenderer};
use crate::session_id::{SESSION_STORAGE_KEY, SessionId, Storage, get_or_create_session_id};
use crate::types::ChatRequest;

/// Whether a send is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Ready to send.
    Idle,
    /// A request or its reply stream is in flight.
    Sending,
}

/// Why a send was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The text was empty or whitespace only.
    Empty,
    /// Another send is in flight.
    Busy,
    /// The text is longer than the configured maximum.
    TooLong {
        /// Length of the trimmed text in characters.
        chars: usize,
        /// The configured maximum.
        max: usize,
    },
    /// No follow-up with the given id has been rendered.
    UnknownFollowUp(FollowUpId),
}

/// The result of a send.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The reply stream ended normally.
    Completed(ReplyOutcome),
    /// The request or its stream failed; the fixed error turn was rendered.
    Failed {
        /// The failure, always [`Error::ChatStreamFailed`].
        error: Error,
        /// What was rendered before the failure.
        partial: ReplyOutcome,
    },
    /// Nothing was sent and nothing changed.
    Ignored(IgnoreReason),
}

impl SendOutcome {
    /// Returns true if a request was attempted.
    pub fn was_sent(&self) -> bool {
        !matches!(self, SendOutcome::Ignored(_))
    }

    /// Returns the failure, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            SendOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Resets the busy flag when the send that set it ends, however it ends.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Top-level orchestrator of a chat session.
pub struct ChatSessionController<T: ChatTransport, R: Renderer> {
    transport: T,
    renderer: SharedRenderer<R>,
    storage: Mutex<Box<dyn Storage>>,
    pacer: Box<dyn Pacer>,
    config: ChatConfig,
    busy: AtomicBool,
    session_id: Mutex<Option<SessionId>>,
    follow_ups: Mutex<Vec<String>>,
}

impl<T: ChatTransport, R: Renderer> ChatSessionController<T, R> {
    /// Creates a controller without contacting the server.
    pub fn new(
        transport: T,
        renderer: R,
        storage: impl Storage + 'static,
        pacer: impl Pacer + 'static,
        config: ChatConfig,
    ) -> Self {
        Self {
            transport,
            renderer: SharedRenderer::new(renderer),
            storage: Mutex::new(Box::new(storage)),
            pacer: Box::new(pacer),
            config,
            busy: AtomicBool::new(false),
            session_id: Mutex::new(None),
            follow_ups: Mutex::new(Vec::new()),
        }
    }

    /// Creates a controller and loads the welcome message.
    ///
    /// A failed welcome is rendered as the fixed welcome error turn; the controller is usable
    /// either way.
    pub async fn start(
        transport: T,
        renderer: R,
        storage: impl Storage + 'static,
        pacer: impl Pacer + 'static,
        config: ChatConfig,
    ) -> Self {
        let controller = Self::new(transport, renderer, storage, pacer, config);
        // Already rendered and logged.
        let _ = controller.load_welcome().await;
        controller
    }

    /// Fetches the welcome message, records the session identifier and renders the welcome turn.
    ///
    /// A server-issued identifier becomes the session identifier and is persisted. When the
    /// server issues none, or the call fails, the identifier comes from storage.
    pub async fn load_welcome(&self) -> Result<()> {
        match self.transport.welcome().await {
            Ok(welcome) => {
                let session_id = match welcome.session_id.filter(|id| !id.is_empty()) {
                    Some(id) => {
                        let id = SessionId::new(id);
                        lock(&self.storage).set(SESSION_STORAGE_KEY, id.as_str());
                        id
                    }
                    None => get_or_create_session_id(lock(&self.storage).as_mut()),
                };
                tracing::info!(session_id = %session_id, "welcome loaded");
                *lock(&self.session_id) = Some(session_id);
                self.renderer.with(|r| {
                    r.render_assistant_message(&welcome.content);
                    r.scroll_to_latest();
                });
                Ok(())
            }
            Err(err) => {
                let err = Error::welcome_fetch_failed(err);
                tracing::error!(error = %err, "welcome fetch failed");
                self.ensure_session_id();
                self.renderer.with(|r| {
                    r.render_assistant_message(err.user_message());
                    r.scroll_to_latest();
                });
                Err(err)
            }
        }
    }

    /// Sends `text` as a user message and streams the reply.
    ///
    /// Ignored, with no state change and nothing rendered, when the trimmed text is empty, too
    /// long, or another send is in flight. Otherwise the user turn and loading indicator are
    /// rendered before the request is issued, and input is re-enabled when the reply ends or
    /// fails.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let message = text.trim();
        if message.is_empty() {
            return Self::ignore(IgnoreReason::Empty);
        }
        if let Some(max) = self.config.max_message_chars {
            let chars = message.chars().count();
            if chars > max {
                return Self::ignore(IgnoreReason::TooLong { chars, max });
            }
        }
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return Self::ignore(IgnoreReason::Busy);
        };

        let loading = self.renderer.with(|r| {
            r.set_input_enabled(false);
            r.render_user_message(message);
            r.clear_input();
            r.scroll_to_latest();
            r.show_loading_indicator()
        });
        let mut loading = Some(loading);

        let follow_up_base = lock(&self.follow_ups).len();
        let mut assembler = ReplyAssembler::new(
            self.pacer.as_ref(),
            self.config.pacing_interval,
            follow_up_base,
        );
        let start = Instant::now();
        let result = self
            .stream_reply(message, &mut assembler, &mut loading, start)
            .await;
        STREAM_DURATION.add(start.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(()) => {
                let outcome = assembler.finish();
                if outcome.left_open.is_some() {
                    tracing::warn!("reply stream ended without a done event");
                }
                tracing::info!(
                    fragments = outcome.stats.fragments,
                    follow_ups = outcome.stats.follow_ups,
                    "reply complete"
                );
                self.remove_loading(&mut loading);
                SendOutcome::Completed(outcome)
            }
            Err(err) => {
                let error = Error::chat_stream_failed(err);
                STREAM_ERRORS.click();
                tracing::error!(error = %error, "chat stream failed");
                let partial = assembler.abandon(&self.renderer);
                self.remove_loading(&mut loading);
                self.renderer.with(|r| {
                    r.render_assistant_message(error.user_message());
                    r.scroll_to_latest();
                });
                SendOutcome::Failed { error, partial }
            }
        };

        if let SendOutcome::Completed(reply) | SendOutcome::Failed { partial: reply, .. } =
            &outcome
        {
            lock(&self.follow_ups).extend(reply.follow_ups.iter().cloned());
        }
        self.renderer.with(|r| {
            r.set_input_enabled(true);
            r.focus_input();
        });
        outcome
    }

    /// Sends the text of a previously rendered follow-up, exactly as if it had been typed.
    pub async fn click_follow_up(&self, id: FollowUpId) -> SendOutcome {
        let text = lock(&self.follow_ups).get(id.index()).cloned();
        match text {
            Some(text) => self.send_message(&text).await,
            None => Self::ignore(IgnoreReason::UnknownFollowUp(id)),
        }
    }

    /// Returns whether a send is in flight.
    pub fn state(&self) -> ControllerState {
        if self.busy.load(Ordering::Acquire) {
            ControllerState::Sending
        } else {
            ControllerState::Idle
        }
    }

    /// Returns the session identifier attached to chat requests.
    pub fn session_id(&self) -> Option<SessionId> {
        lock(&self.session_id).clone()
    }

    /// Returns every follow-up rendered so far, indexed by [`FollowUpId`].
    pub fn follow_ups(&self) -> Vec<String> {
        lock(&self.follow_ups).clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Runs `f` with exclusive access to the renderer.
    pub fn with_renderer<U>(&self, f: impl FnOnce(&mut R) -> U) -> U {
        self.renderer.with(f)
    }

    /// Consumes the controller and returns its renderer.
    pub fn into_renderer(self) -> R {
        self.renderer.into_inner()
    }

    async fn stream_reply(
        &self,
        message: &str,
        assembler: &mut ReplyAssembler<'_>,
        loading: &mut Option<LoadingHandle>,
        start: Instant,
    ) -> Result<()> {
        let session_id = self.session_id();
        let request = ChatRequest::new(message);
        let events = self
            .transport
            .open_chat_stream(session_id.as_ref(), &request)
            .await?;

        let renderer = &self.renderer;
        let mut first_event = true;
        assembler
            .consume(events, renderer, |event| {
                if first_event {
                    STREAM_TTFE.add(start.elapsed().as_secs_f64());
                    first_event = false;
                }
                if !event.is_follow_up() {
                    if let Some(handle) = loading.take() {
                        renderer.with(|r| r.remove_loading_indicator(handle));
                    }
                }
            })
            .await
    }

    fn remove_loading(&self, loading: &mut Option<LoadingHandle>) {
        if let Some(handle) = loading.take() {
            self.renderer.with(|r| r.remove_loading_indicator(handle));
        }
    }

    fn ensure_session_id(&self) {
        let mut current = lock(&self.session_id);
        if current.is_none() {
            *current = Some(get_or_create_session_id(lock(&self.storage).as_mut()));
        }
    }

    fn ignore(reason: IgnoreReason) -> SendOutcome {
        SENDS_IGNORED.click();
        tracing::debug!(?reason, "send ignored");
        SendOutcome::Ignored(reason)
    }
}
