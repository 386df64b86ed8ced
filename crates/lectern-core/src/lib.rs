//! Configuration, session state, conversation building, and answer streaming.

pub mod config;
pub mod conversation;
pub mod error;
pub mod exchange;
pub mod secret;
pub mod session;
pub mod streamer;

pub use conversation::{ContextPolicy, ConversationBuilder, DEFAULT_PERSONA, build_messages};
pub use error::{BackendUnavailableError, CoreError, InvalidInputError, NotFoundError};
pub use exchange::{Exchange, ExchangeError, ExchangePhase};
pub use session::{InMemorySessionStore, SessionId, SessionStore};
pub use streamer::{
    ANSWER_FAILED, AnswerEvent, AnswerStream, AskRequest, answer_question, stream_answer,
};
