//! Reconstruction of a streamed assistant reply.
//!
//! [`ReplyAssembler`] consumes the decoded events of one reply, in arrival order, and turns them
//! into renderer calls: text fragments grow the open assistant message (each after a pacing
//! delay), follow-ups are rendered as they arrive, and `done` closes the message.

use std::time::Duration;

use futures::{Stream, StreamExt};

use crate::error::Result;
use crate::observability::{REPLY_FOLLOW_UPS, REPLY_FRAGMENTS, REPLY_MESSAGES};
use crate::pacing::Pacer;
use crate::render::{FollowUpId, MessageHandle, Renderer, SharedRenderer};
use crate::types::StreamEvent;

/// Counts of what an assembler has rendered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Assistant messages opened.
    pub messages_opened: usize,
    /// Text fragments appended.
    pub fragments: usize,
    /// Follow-ups rendered.
    pub follow_ups: usize,
}

/// The result of assembling one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    /// Follow-up texts in arrival order.
    pub follow_ups: Vec<String>,
    /// The message still open when the stream ended without `done`.
    pub left_open: Option<MessageHandle>,
    /// Counts of rendered items.
    pub stats: AssemblyStats,
}

/// Drives a [`Renderer`] from the events of a single reply stream.
///
/// One assembler serves one reply; a new request gets a new assembler.
pub struct ReplyAssembler<'a> {
    pacer: &'a dyn Pacer,
    interval: Duration,
    follow_up_base: usize,
    open: Option<MessageHandle>,
    follow_ups: Vec<String>,
    stats: AssemblyStats,
}

impl<'a> ReplyAssembler<'a> {
    /// Creates an assembler that waits `interval` on `pacer` before each text fragment.
    ///
    /// Follow-ups are numbered from `follow_up_base`, so ids stay unique across replies.
    pub fn new(pacer: &'a dyn Pacer, interval: Duration, follow_up_base: usize) -> Self {
        Self {
            pacer,
            interval,
            follow_up_base,
            open: None,
            follow_ups: Vec::new(),
            stats: AssemblyStats::default(),
        }
    }

    /// Returns true while an assistant message is open.
    pub fn has_open_message(&self) -> bool {
        self.open.is_some()
    }

    /// Returns the counts rendered so far.
    pub fn stats(&self) -> AssemblyStats {
        self.stats
    }

    /// Applies one event.
    ///
    /// Any event other than a follow-up opens a message when none is open. A text fragment is
    /// appended after the pacing delay. `done` closes the message; later text opens a new one.
    pub async fn apply<R: Renderer>(&mut self, event: StreamEvent, renderer: &SharedRenderer<R>) {
        let text = match event {
            StreamEvent::FollowUp(text) => {
                let id = FollowUpId::new(self.follow_up_base + self.follow_ups.len());
                renderer.with(|r| {
                    r.render_follow_up(id, &text);
                    r.scroll_to_latest();
                });
                REPLY_FOLLOW_UPS.click();
                self.stats.follow_ups += 1;
                self.follow_ups.push(text);
                return;
            }
            StreamEvent::Done => None,
            StreamEvent::Text(text) => Some(text),
        };

        let handle = self.open_message(renderer);
        match text {
            None => {
                renderer.with(|r| r.finish_assistant_message(handle));
                self.open = None;
            }
            Some(text) => {
                self.pacer.pause(self.interval).await;
                renderer.with(|r| {
                    r.append_to_assistant_message(handle, &text);
                    r.scroll_to_latest();
                });
                REPLY_FRAGMENTS.click();
                self.stats.fragments += 1;
            }
        }
    }

    /// Applies every event of `events` until it ends or yields an error.
    ///
    /// `on_event` runs before each event is applied.
    pub async fn consume<S, R, F>(
        &mut self,
        events: S,
        renderer: &SharedRenderer<R>,
        mut on_event: F,
    ) -> Result<()>
    where
        S: Stream<Item = Result<StreamEvent>>,
        R: Renderer,
        F: FnMut(&StreamEvent),
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            let event = event?;
            on_event(&event);
            self.apply(event, renderer).await;
        }
        Ok(())
    }

    /// Ends assembly after the stream ran out.
    ///
    /// A message without a trailing `done` is left open and reported in the outcome.
    pub fn finish(self) -> ReplyOutcome {
        ReplyOutcome {
            follow_ups: self.follow_ups,
            left_open: self.open,
            stats: self.stats,
        }
    }

    /// Ends assembly after a failure, closing any open message.
    pub fn abandon<R: Renderer>(mut self, renderer: &SharedRenderer<R>) -> ReplyOutcome {
        if let Some(handle) = self.open.take() {
            renderer.with(|r| r.finish_assistant_message(handle));
        }
        self.finish()
    }

    fn open_message<R: Renderer>(&mut self, renderer: &SharedRenderer<R>) -> MessageHandle {
        if let Some(handle) = self.open {
            return handle;
        }
        let handle = renderer.with(|r| r.begin_assistant_message());
        REPLY_MESSAGES.click();
        self.stats.messages_opened += 1;
        self.open = Some(handle);
        handle
    }
}
