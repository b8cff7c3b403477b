//! Append-only conversation history

use chat_llm::Message;

/// Ordered messages of one run
///
/// Messages can only be appended. Each run owns its own history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// An empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// A history seeded with one user message
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(query)],
        }
    }

    /// Append one message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append messages in order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recently appended message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
