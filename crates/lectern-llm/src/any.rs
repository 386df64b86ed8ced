#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::openai::OpenAiCompatibleProvider;

use crate::provider::{ChatStream, LlmProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::OpenAiCompatible($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAiCompatible(OpenAiCompatibleProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, crate::LlmError> {
        delegate_provider!(self, |p| p.chat_stream(messages).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_provider_delegates_name() {
        let p = OpenAiCompatibleProvider::new("k".into(), "http://h".into(), "m".into()).unwrap();
        assert_eq!(AnyProvider::OpenAiCompatible(p).name(), "openai-compatible");
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn any_provider_delegates_stream() {
        use tokio_stream::StreamExt;

        let any = AnyProvider::Mock(MockProvider::with_fragments(["a", "b"]));
        let stream = any.chat_stream(&[Message::user("q")]).await.unwrap();
        let collected: Vec<String> = stream.map(Result::unwrap).collect().await;
        assert_eq!(collected, vec!["a", "b"]);
    }
}
