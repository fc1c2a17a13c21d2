//! Chat advisor: prompt assembly, session histories and the request pipeline

mod advisor;
mod history;
pub mod prompt;

pub use advisor::{ChatAdvisor, ChatInput, ChatOutcome, NO_RECOGNIZER_WARNING};
pub use history::{ChatHistory, ChatRole, ChatSessions, ChatTurn};
