//! Conversation-related types.

use converse_model::Message;

/// The history of an agent.
///
/// Messages can only be appended, never removed or modified, so the
/// history observed after a run always extends the one observed before.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Returns all messages in order.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if there are no messages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the newest message.
    #[inline]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[inline]
    pub(crate) fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Splits the history into the newest message and everything before it.
    #[inline]
    pub(crate) fn split_last(&self) -> Option<(&Message, &[Message])> {
        self.messages.split_last()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
