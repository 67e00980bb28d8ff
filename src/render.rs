//! Output rendering for the chat conversation.
//!
//! The controller never touches a display directly; it drives a [`Renderer`]. This module
//! provides the trait, a terminal implementation with optional ANSI styling, and
//! [`TranscriptRenderer`], which records the conversation as [`ConversationTurn`] values.

use std::io::{self, Stdout, Write};
use std::sync::{Mutex, PoisonError};

use crate::types::{Author, ConversationTurn, TurnKind};

/// ANSI escape code for dim text (used for the loading indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for follow-ups).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code that clears the current line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Text of the loading indicator.
const LOADING_TEXT: &str = "...";

///////////////////////////////////////// Handles /////////////////////////////////////////////

/// Identifies an assistant message opened with [`Renderer::begin_assistant_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(usize);

impl MessageHandle {
    /// Creates a handle from a renderer-chosen id.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the renderer-chosen id.
    pub fn id(&self) -> usize {
        self.0
    }
}

/// Identifies a loading indicator shown with [`Renderer::show_loading_indicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadingHandle(usize);

impl LoadingHandle {
    /// Creates a handle from a renderer-chosen id.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the renderer-chosen id.
    pub fn id(&self) -> usize {
        self.0
    }
}

/// Identifies a rendered follow-up.
///
/// Clicking a follow-up is reported back to the controller with this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FollowUpId(usize);

impl FollowUpId {
    /// Creates an id from a zero-based position.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the zero-based position.
    pub fn index(&self) -> usize {
        self.0
    }
}

//////////////////////////////////////// Renderer /////////////////////////////////////////////

/// Trait for rendering the conversation.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording turns in memory
pub trait Renderer: Send {
    /// Render the user's own message.
    fn render_user_message(&mut self, text: &str);

    /// Render a complete assistant message (welcome text, error notices).
    fn render_assistant_message(&mut self, text: &str);

    /// Open a new, empty assistant message that text will be streamed into.
    fn begin_assistant_message(&mut self) -> MessageHandle;

    /// Append a fragment of text to an open assistant message.
    fn append_to_assistant_message(&mut self, handle: MessageHandle, text: &str);

    /// Called when an assistant message will receive no more text.
    fn finish_assistant_message(&mut self, handle: MessageHandle) {
        _ = handle;
    }

    /// Render a clickable follow-up suggestion.
    fn render_follow_up(&mut self, id: FollowUpId, text: &str);

    /// Show a provisional loading indicator.
    fn show_loading_indicator(&mut self) -> LoadingHandle;

    /// Remove a loading indicator.
    fn remove_loading_indicator(&mut self, handle: LoadingHandle);

    /// Bring the latest turn into view.
    fn scroll_to_latest(&mut self) {}

    /// Enable or disable the input affordances (text field and send button).
    fn set_input_enabled(&mut self, enabled: bool) {
        _ = enabled;
    }

    /// Clear the input buffer.
    fn clear_input(&mut self) {}

    /// Move focus back to the input.
    fn focus_input(&mut self) {}
}

/// A renderer shared between the controller and its reply assembler.
///
/// The lock is held only for the duration of a single renderer call, never across an await.
#[derive(Debug, Default)]
pub struct SharedRenderer<R> {
    inner: Mutex<R>,
}

impl<R: Renderer> SharedRenderer<R> {
    /// Wraps a renderer.
    pub fn new(renderer: R) -> Self {
        Self {
            inner: Mutex::new(renderer),
        }
    }

    /// Runs `f` with exclusive access to the renderer.
    pub fn with<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Unwraps the renderer.
    pub fn into_inner(self) -> R {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

////////////////////////////////////// PlainTextRenderer //////////////////////////////////////

/// Plain text renderer with optional ANSI styling.
///
/// This renderer writes the conversation to stdout. User messages are not echoed, because the
/// line editor has already shown what was typed.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    next_message: usize,
    next_loading: usize,
    loading_visible: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            next_message: 0,
            next_loading: 0,
            loading_visible: false,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    /// Print an error message outside the conversation.
    pub fn print_error(&mut self, error: &str) {
        self.clear_loading();
        eprintln!("Error: {error}");
    }

    /// Print an informational message outside the conversation.
    pub fn print_info(&mut self, info: &str) {
        self.clear_loading();
        if self.use_color {
            println!("{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
        self.flush();
    }

    fn clear_loading(&mut self) {
        if self.loading_visible {
            if self.use_color {
                print!("{ANSI_CLEAR_LINE}");
            } else {
                println!();
            }
            self.loading_visible = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn render_user_message(&mut self, _: &str) {}

    fn render_assistant_message(&mut self, text: &str) {
        self.clear_loading();
        println!("{text}\n");
        self.flush();
    }

    fn begin_assistant_message(&mut self) -> MessageHandle {
        self.clear_loading();
        let handle = MessageHandle::new(self.next_message);
        self.next_message += 1;
        handle
    }

    fn append_to_assistant_message(&mut self, _: MessageHandle, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn finish_assistant_message(&mut self, _: MessageHandle) {
        println!("\n");
        self.flush();
    }

    fn render_follow_up(&mut self, id: FollowUpId, text: &str) {
        let number = id.index() + 1;
        if self.use_color {
            println!("{ANSI_CYAN}  [{number}] {text}{ANSI_RESET}");
        } else {
            println!("  [{number}] {text}");
        }
        self.flush();
    }

    fn show_loading_indicator(&mut self) -> LoadingHandle {
        if self.use_color {
            print!("{ANSI_DIM}{LOADING_TEXT}{ANSI_RESET}");
        } else {
            print!("{LOADING_TEXT}");
        }
        self.loading_visible = true;
        self.flush();
        let handle = LoadingHandle::new(self.next_loading);
        self.next_loading += 1;
        handle
    }

    fn remove_loading_indicator(&mut self, _: LoadingHandle) {
        self.clear_loading();
        self.flush();
    }
}

///////////////////////////////////// TranscriptRenderer //////////////////////////////////////

/// Renderer that records the conversation in memory.
///
/// Besides the turns themselves it records what happened to the input affordances and the
/// loading indicator, which makes it the natural renderer for tests and for embedding the
/// controller behind another UI.
#[derive(Debug, Clone)]
pub struct TranscriptRenderer {
    turns: Vec<ConversationTurn>,
    open: Vec<usize>,
    follow_ups: Vec<FollowUpId>,
    loading: Option<LoadingHandle>,
    loading_shown: usize,
    loading_removed: usize,
    input_enabled: bool,
    input_cleared: usize,
    focus_count: usize,
    scroll_count: usize,
}

impl TranscriptRenderer {
    /// Creates an empty transcript with input enabled.
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            open: Vec::new(),
            follow_ups: Vec::new(),
            loading: None,
            loading_shown: 0,
            loading_removed: 0,
            input_enabled: true,
            input_cleared: 0,
            focus_count: 0,
            scroll_count: 0,
        }
    }

    /// Returns the recorded turns in render order.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Returns the last recorded turn.
    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Returns the recorded turns authored by `author` with kind `kind`.
    pub fn turns_of(&self, author: Author, kind: TurnKind) -> Vec<&ConversationTurn> {
        self.turns
            .iter()
            .filter(|turn| turn.author == author && turn.kind == kind)
            .collect()
    }

    /// Returns the number of assistant messages still open for appends.
    pub fn open_message_count(&self) -> usize {
        self.open.len()
    }

    /// Returns the follow-up ids in render order.
    pub fn follow_up_ids(&self) -> &[FollowUpId] {
        &self.follow_ups
    }

    /// Returns true while a loading indicator is visible.
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// Returns how many loading indicators were shown.
    pub fn loading_shown(&self) -> usize {
        self.loading_shown
    }

    /// Returns how many loading indicators were removed.
    pub fn loading_removed(&self) -> usize {
        self.loading_removed
    }

    /// Returns whether the input affordances are enabled.
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Returns how many times the input buffer was cleared.
    pub fn input_cleared(&self) -> usize {
        self.input_cleared
    }

    /// Returns how many times focus was restored to the input.
    pub fn focus_count(&self) -> usize {
        self.focus_count
    }

    /// Returns how many times the view was scrolled to the latest turn.
    pub fn scroll_count(&self) -> usize {
        self.scroll_count
    }
}

impl Default for TranscriptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for TranscriptRenderer {
    fn render_user_message(&mut self, text: &str) {
        self.turns.push(ConversationTurn::user(text));
    }

    fn render_assistant_message(&mut self, text: &str) {
        self.turns.push(ConversationTurn::assistant(text));
    }

    fn begin_assistant_message(&mut self) -> MessageHandle {
        self.turns.push(ConversationTurn::assistant(""));
        let index = self.turns.len() - 1;
        self.open.push(index);
        MessageHandle::new(index)
    }

    fn append_to_assistant_message(&mut self, handle: MessageHandle, text: &str) {
        if !self.open.contains(&handle.id()) {
            return;
        }
        if let Some(turn) = self.turns.get_mut(handle.id()) {
            turn.text.push_str(text);
        }
    }

    fn finish_assistant_message(&mut self, handle: MessageHandle) {
        self.open.retain(|index| *index != handle.id());
    }

    fn render_follow_up(&mut self, id: FollowUpId, text: &str) {
        self.turns.push(ConversationTurn::follow_up(text));
        self.follow_ups.push(id);
    }

    fn show_loading_indicator(&mut self) -> LoadingHandle {
        let handle = LoadingHandle::new(self.loading_shown);
        self.loading_shown += 1;
        self.loading = Some(handle);
        handle
    }

    fn remove_loading_indicator(&mut self, handle: LoadingHandle) {
        if self.loading == Some(handle) {
            self.loading = None;
        }
        self.loading_removed += 1;
    }

    fn scroll_to_latest(&mut self) {
        self.scroll_count += 1;
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn clear_input(&mut self) {
        self.input_cleared += 1;
    }

    fn focus_input(&mut self) {
        self.focus_count += 1;
    }
}
