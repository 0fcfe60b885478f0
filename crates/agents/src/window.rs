//! Bounded rolling conversation window.

use std::collections::VecDeque;

use switchboard_llm::ChatMessage;

/// Messages kept per handler: five query/response exchanges.
pub const DEFAULT_WINDOW: usize = 10;

/// FIFO of the most recent chat messages, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ConversationWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one exchange and trim back to capacity.
    pub fn record(&mut self, query: &str, response: &str) {
        self.messages.push_back(ChatMessage::user(query));
        self.messages.push_back(ChatMessage::assistant(response));
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
