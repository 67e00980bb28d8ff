// Public modules
pub mod assembler;
pub mod client;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod observability;
pub mod pacing;
pub mod render;
pub mod session_id;
pub mod sse;
pub mod types;

// Re-exports
pub use assembler::{AssemblyStats, ReplyAssembler, ReplyOutcome};
pub use client::{ChatClient, ChatTransport, EventStream};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use controller::{ChatSessionController, ControllerState, IgnoreReason, SendOutcome};
pub use error::{CHAT_ERROR_MESSAGE, Error, Result, WELCOME_ERROR_MESSAGE};
pub use observability::register_biometrics;
pub use pacing::{NoPacing, PACING_INTERVAL, Pacer, TokioPacer};
pub use render::{
    FollowUpId, LoadingHandle, MessageHandle, PlainTextRenderer, Renderer, SharedRenderer,
    TranscriptRenderer,
};
pub use session_id::{
    FileStorage, MemoryStorage, SESSION_STORAGE_KEY, SessionId, Storage,
    get_or_create_session_id,
};
pub use sse::{MAX_LINE_LENGTH, process_events, process_events_with_max_line_length};
pub use types::*;
