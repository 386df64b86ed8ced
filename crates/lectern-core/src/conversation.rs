use std::borrow::Cow;

use lectern_llm::Message;
use lectern_llm::provider::total_chars;

use crate::error::InvalidInputError;

pub const DEFAULT_PERSONA: &str = "\
You are a distinguished professor with decades of teaching experience, \
known for your ability to explain complex topics in clear, simple terms. \
You excel at breaking down difficult concepts into concise, easily digestible \
explanations that students can readily understand. You have a gift for providing \
relevant, memorable examples that perfectly illustrate key concepts and make \
abstract ideas concrete and accessible.\n\
You are helping a student understand a chapter of a book.";

const CHAPTER_HEADER: &str = "Here is the chapter content for reference:";

const CHAPTER_FOOTER: &str =
    "Please answer questions about this chapter while maintaining context from the conversation.";

/// Character budget for an assembled message sequence.
///
/// When over budget the oldest history turns go first, then the chapter
/// content is shortened. The persona and the question are never cut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextPolicy {
    pub max_context_chars: Option<usize>,
}

impl ContextPolicy {
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_chars(max_context_chars: usize) -> Self {
        Self {
            max_context_chars: Some(max_context_chars),
        }
    }
}

/// Assembles the message sequence for one question.
#[derive(Debug, Clone)]
pub struct ConversationBuilder {
    persona: String,
    policy: ContextPolicy,
}

impl Default for ConversationBuilder {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_owned(),
            policy: ContextPolicy::unlimited(),
        }
    }
}

impl ConversationBuilder {
    #[must_use]
    pub fn new(persona: impl Into<String>, policy: ContextPolicy) -> Self {
        Self {
            persona: persona.into(),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> ContextPolicy {
        self.policy
    }

    /// Build `[system, ...history, user(question)]`.
    ///
    /// History turns are copied unmodified and in order. The system message
    /// carries the persona followed by the chapter content.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError`] if `question` or `chapter_content` is
    /// blank. Nothing is built in that case.
    pub fn build(
        &self,
        chapter_content: &str,
        history: &[Message],
        question: &str,
    ) -> Result<Vec<Message>, InvalidInputError> {
        if question.trim().is_empty() {
            return Err(InvalidInputError::EmptyQuestion);
        }
        if chapter_content.trim().is_empty() {
            return Err(InvalidInputError::EmptyChapterContent);
        }

        let (chapter, history) = self.fit(chapter_content, history, question);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_message(&chapter)));
        messages.extend_from_slice(history);
        messages.push(Message::user(question));

        tracing::debug!(
            messages = messages.len(),
            total_chars = total_chars(&messages),
            "built message sequence"
        );
        Ok(messages)
    }

    fn system_message(&self, chapter_content: &str) -> String {
        format!(
            "{}\n\n{CHAPTER_HEADER}\n\n{chapter_content}\n\n{CHAPTER_FOOTER}",
            self.persona
        )
    }

    fn fit<'a>(
        &self,
        chapter_content: &'a str,
        history: &'a [Message],
        question: &str,
    ) -> (Cow<'a, str>, &'a [Message]) {
        let Some(limit) = self.policy.max_context_chars else {
            return (Cow::Borrowed(chapter_content), history);
        };

        let frame = self.system_message("").chars().count() + question.chars().count();
        let chapter_chars = chapter_content.chars().count();
        let mut history_chars = total_chars(history);

        let mut skip = 0;
        while skip < history.len() && frame + chapter_chars + history_chars > limit {
            history_chars -= history[skip].content.chars().count();
            skip += 1;
        }
        if skip > 0 {
            tracing::debug!(dropped_turns = skip, limit, "trimmed oldest history turns");
        }

        let kept = &history[skip..];
        if frame + chapter_chars + history_chars <= limit {
            return (Cow::Borrowed(chapter_content), kept);
        }

        let allowed = limit.saturating_sub(frame + history_chars);
        tracing::warn!(
            chapter_chars,
            allowed,
            limit,
            "chapter content exceeds context budget, truncating"
        );
        (Cow::Borrowed(truncate_chars(chapter_content, allowed)), kept)
    }
}

/// Build the message sequence with the default persona and no budget.
///
/// # Errors
///
/// Returns [`InvalidInputError`] if `question` or `chapter_content` is blank.
pub fn build_messages(
    chapter_content: &str,
    history: &[Message],
    question: &str,
) -> Result<Vec<Message>, InvalidInputError> {
    ConversationBuilder::default().build(chapter_content, history, question)
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use lectern_llm::Role;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn single_question_without_history() {
        let messages = build_messages("Chapter text", &[], "What happens?").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Chapter text"));
        assert!(messages[0].content.starts_with(DEFAULT_PERSONA));
        assert_eq!(messages[1], Message::user("What happens?"));
    }

    #[test]
    fn history_preserved_in_order() {
        let history = vec![
            Message::user("Who is the narrator?"),
            Message::assistant("Ishmael."),
            Message::user("Where does he go?"),
        ];
        let messages = build_messages("Call me Ishmael.", &history, "Why?").unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(&messages[1..4], history.as_slice());
        assert_eq!(messages[4], Message::user("Why?"));
    }

    #[test]
    fn role_alternation_not_enforced() {
        let history = vec![Message::user("a"), Message::user("b")];
        let messages = build_messages("c", &history, "q").unwrap();
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn chapter_content_is_verbatim() {
        let html = "<p>Some <em>marked up</em> text</p>\n<p>Second</p>";
        let messages = build_messages(html, &[], "q").unwrap();
        assert!(messages[0].content.contains(html));
    }

    #[test]
    fn empty_question_rejected() {
        assert_eq!(
            build_messages("Chapter text", &[], "").unwrap_err(),
            InvalidInputError::EmptyQuestion
        );
        assert_eq!(
            build_messages("Chapter text", &[], " \n ").unwrap_err(),
            InvalidInputError::EmptyQuestion
        );
    }

    #[test]
    fn empty_chapter_rejected() {
        assert_eq!(
            build_messages("", &[], "What happens?").unwrap_err(),
            InvalidInputError::EmptyChapterContent
        );
    }

    #[test]
    fn custom_persona_used() {
        let builder = ConversationBuilder::new("Be brief.", ContextPolicy::unlimited());
        let messages = builder.build("text", &[], "q").unwrap();
        assert!(messages[0].content.starts_with("Be brief."));
        assert!(!messages[0].content.contains("professor"));
    }

    #[test]
    fn unlimited_policy_never_trims() {
        let chapter = "x".repeat(100_000);
        let history: Vec<_> = (0..50).map(|i| Message::user(format!("turn {i}"))).collect();
        let messages = build_messages(&chapter, &history, "q").unwrap();
        assert_eq!(messages.len(), 52);
        assert!(messages[0].content.contains(&chapter));
    }

    #[test]
    fn oldest_history_dropped_first() {
        let base = ConversationBuilder::default()
            .build("chapter", &[], "question")
            .unwrap();
        let base_chars = total_chars(&base);

        let history = vec![
            Message::user("0123456789"),
            Message::assistant("abcdefghij"),
            Message::user("KLMNOPQRST"),
        ];
        let builder =
            ConversationBuilder::new(DEFAULT_PERSONA, ContextPolicy::with_max_chars(base_chars + 25));
        let messages = builder.build("chapter", &history, "question").unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1], history[1]);
        assert_eq!(messages[2], history[2]);
        assert!(total_chars(&messages) <= base_chars + 25);
    }

    #[test]
    fn chapter_cut_after_history_exhausted() {
        let builder = ConversationBuilder::default();
        let frame = total_chars(&builder.build("c", &[], "q").unwrap()) - 1;

        let limited = ConversationBuilder::new(DEFAULT_PERSONA, ContextPolicy::with_max_chars(frame + 4));
        let history = vec![Message::user("dropped entirely")];
        let messages = limited.build("ééééééé", &history, "q").unwrap();

        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("éééé\n"));
        assert!(!messages[0].content.contains("ééééé"));
        assert_eq!(messages[1], Message::user("q"));
    }

    #[test]
    fn question_never_cut() {
        let question = "q".repeat(500);
        let builder = ConversationBuilder::new("p", ContextPolicy::with_max_chars(10));
        let messages = builder.build("chapter", &[], &question).unwrap();
        assert_eq!(messages.last().unwrap().content, question);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    fn turn() -> impl Strategy<Value = Message> {
        (any::<bool>(), "[a-z ]{0,40}").prop_map(|(is_user, text)| {
            if is_user {
                Message::user(text)
            } else {
                Message::assistant(text)
            }
        })
    }

    proptest! {
        #[test]
        fn shape_is_system_history_question(
            chapter in "[a-zA-Z]{1,200}",
            question in "[a-zA-Z?]{1,50}",
            history in proptest::collection::vec(turn(), 0..10),
        ) {
            let messages = build_messages(&chapter, &history, &question).unwrap();
            prop_assert_eq!(messages.len(), history.len() + 2);
            prop_assert_eq!(messages[0].role, Role::System);
            prop_assert_eq!(&messages[1..=history.len()], history.as_slice());
            prop_assert_eq!(messages.last().unwrap(), &Message::user(question));
        }

        #[test]
        fn budget_respected_when_achievable(
            chapter in "[a-z]{1,400}",
            history in proptest::collection::vec(turn(), 0..8),
            extra in 0usize..600,
        ) {
            let frame = total_chars(&ConversationBuilder::default().build("c", &[], "q").unwrap()) - 1;
            let limit = frame + extra;
            let builder = ConversationBuilder::new(DEFAULT_PERSONA, ContextPolicy::with_max_chars(limit));
            let messages = builder.build(&chapter, &history, "q").unwrap();
            prop_assert!(total_chars(&messages) <= limit);
            prop_assert_eq!(messages.last().unwrap(), &Message::user("q"));
            let kept = &messages[1..messages.len() - 1];
            prop_assert!(history.ends_with(kept));
        }
    }
}
