use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use lectern_llm::provider::total_chars;
use lectern_llm::{ChatStream, LlmProvider, Message};
use serde::Deserialize;

use crate::conversation::ConversationBuilder;
use crate::error::{BackendUnavailableError, CoreError};
use crate::exchange::{Exchange, ExchangePhase};

/// Client-facing message for any backend failure. Details stay in the logs.
pub const ANSWER_FAILED: &str = "Failed to get answer";

const QUESTION_PREVIEW_CHARS: usize = 100;

/// Body of a question about a chapter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub chapter_content: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<Message>,
}

/// One server-push event relayed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEvent {
    Content(String),
    /// The backend failed after streaming began. Always the last event.
    Error,
}

impl AnswerEvent {
    /// SSE event name; `None` means the default `message` event.
    #[must_use]
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            Self::Content(_) => None,
            Self::Error => Some("error"),
        }
    }

    /// JSON payload for the event's `data` field.
    #[must_use]
    pub fn data(&self) -> String {
        match self {
            Self::Content(fragment) => serde_json::json!({ "content": fragment }).to_string(),
            Self::Error => serde_json::json!({ "error": ANSWER_FAILED }).to_string(),
        }
    }
}

/// Lazy, finite stream of answer fragments in backend order.
///
/// Ends when the backend finishes, or right after a single
/// [`AnswerEvent::Error`] if it fails mid-stream. Dropping it drops the
/// upstream connection.
pub struct AnswerStream {
    inner: ChatStream,
    exchange: Exchange,
    done: bool,
}

impl AnswerStream {
    #[must_use]
    pub fn phase(&self) -> ExchangePhase {
        self.exchange.phase()
    }
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream")
            .field("exchange", &self.exchange)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Stream for AnswerStream {
    type Item = AnswerEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                self.exchange.record_fragment();
                Poll::Ready(Some(AnswerEvent::Content(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::error!(
                    exchange = %self.exchange.id(),
                    fragments = self.exchange.fragments(),
                    error = %e,
                    "chat backend failed mid-stream"
                );
                self.done = true;
                settle(&mut self.exchange, ExchangePhase::Failed);
                Poll::Ready(Some(AnswerEvent::Error))
            }
            Poll::Ready(None) => {
                self.done = true;
                settle(&mut self.exchange, ExchangePhase::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for AnswerStream {
    fn drop(&mut self) {
        if self.exchange.phase() == ExchangePhase::Streaming {
            tracing::info!(
                exchange = %self.exchange.id(),
                fragments = self.exchange.fragments(),
                "answer stream dropped before completion, client likely disconnected"
            );
            settle(&mut self.exchange, ExchangePhase::Failed);
        }
    }
}

fn settle(exchange: &mut Exchange, next: ExchangePhase) {
    if let Err(e) = exchange.advance(next) {
        tracing::warn!(exchange = %exchange.id(), error = %e, "ignored exchange transition");
    }
}

/// Send an already-built message sequence to the backend.
///
/// # Errors
///
/// Returns [`BackendUnavailableError`] if the backend fails before any
/// fragment is produced.
pub async fn stream_answer<P: LlmProvider>(
    provider: &P,
    messages: &[Message],
) -> Result<AnswerStream, BackendUnavailableError> {
    let mut exchange = Exchange::new();
    settle(&mut exchange, ExchangePhase::Validated);
    start_stream(provider, messages, exchange).await
}

/// Run one exchange end to end: validate, build messages, start streaming.
///
/// `Validated` is entered once the request is parsed; content checks that
/// fail move it straight to `Failed` without contacting the backend.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] for a blank question or chapter and
/// [`CoreError::BackendUnavailable`] if the backend rejects the request.
pub async fn answer_question<P: LlmProvider>(
    provider: &P,
    builder: &ConversationBuilder,
    request: &AskRequest,
) -> Result<AnswerStream, CoreError> {
    let mut exchange = Exchange::new();
    let question = request.question.as_deref().unwrap_or_default();
    let chapter_content = request.chapter_content.as_deref().unwrap_or_default();

    tracing::info!(
        exchange = %exchange.id(),
        question = %preview(question),
        chapter_chars = chapter_content.chars().count(),
        history_len = request.conversation_history.len(),
        "received question"
    );

    exchange.advance(ExchangePhase::Validated)?;
    let messages = match builder.build(chapter_content, &request.conversation_history, question) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(exchange = %exchange.id(), error = %e, "rejected question");
            exchange.advance(ExchangePhase::Failed)?;
            return Err(e.into());
        }
    };

    Ok(start_stream(provider, &messages, exchange).await?)
}

async fn start_stream<P: LlmProvider>(
    provider: &P,
    messages: &[Message],
    mut exchange: Exchange,
) -> Result<AnswerStream, BackendUnavailableError> {
    tracing::info!(
        exchange = %exchange.id(),
        provider = provider.name(),
        messages = messages.len(),
        total_chars = total_chars(messages),
        "sending request to chat backend"
    );

    match provider.chat_stream(messages).await {
        Ok(inner) => {
            settle(&mut exchange, ExchangePhase::Streaming);
            Ok(AnswerStream {
                inner,
                exchange,
                done: false,
            })
        }
        Err(e) => {
            tracing::error!(exchange = %exchange.id(), error = %e, "chat backend unavailable");
            settle(&mut exchange, ExchangePhase::Failed);
            Err(BackendUnavailableError(e))
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(QUESTION_PREVIEW_CHARS).collect()
}
