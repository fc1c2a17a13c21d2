//! Telephony advisor: call dialogue, per-call sessions, TwiML and the
//! outbound call client

mod client;
mod dialogue;
mod session;
pub mod twiml;

pub use client::TwilioClient;
pub use dialogue::{
    CLOSING_LINE, Conversation, Dialogue, DialogueScript, FALLBACK_LINE, NO_RESULTS_LINE,
    REPROMPT_LINE, Stage, Step, normalize_utterance,
};
pub use session::{DEFAULT_CALL_SID, SessionStore, TERMINAL_STATUSES, is_terminal_status};
pub use twiml::VoiceResponse;
