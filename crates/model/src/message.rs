use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message written by the user.
    User,
    /// A message produced by the model or the agent itself.
    Assistant,
    /// The system instructions.
    System,
    /// The result of a tool call.
    Tool,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// The tag of a transient event emitted while an agent is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Informational progress.
    Info,
    /// Something unexpected happened, but the run goes on.
    Warn,
    /// A failure. Terminal for a tool call.
    Error,
    /// The run has completed.
    Completed,
    /// Diagnostic progress.
    Log,
    /// The final output of a tool call or of a whole run.
    FinalResponse,
}

impl MessageType {
    /// Returns `true` if the type signals the end of a tool call or a run.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageType::FinalResponse
                | MessageType::Error
                | MessageType::Completed
        )
    }
}

/// A function invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The unique identifier of this call, used to correlate the result.
    pub id: String,
    /// Name of the tool to call.
    pub name: String,
    /// Raw arguments, checked against the tool's schema when dispatched.
    pub arguments: Value,
    /// The thread in which the call was issued.
    pub thread_id: String,
}

/// One unit of a conversation, or one event of a running agent.
///
/// Two messages are equal if and only if their `id`s are equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier of the message.
    pub id: String,
    /// The author of the message.
    pub role: Role,
    /// Text payload, possibly empty.
    pub content: String,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// The tool call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Event tag.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<MessageType>,
    /// The run that produced this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl Message {
    /// Creates a message with a fresh id.
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            r#type: None,
            thread_id: None,
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a tool message that answers the tool call `tool_call_id`.
    #[inline]
    pub fn tool<ID: Into<String>, S: Into<String>>(
        tool_call_id: ID,
        content: S,
    ) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Creates an assistant event with the given tag.
    #[inline]
    pub fn event<S: Into<String>>(r#type: MessageType, content: S) -> Self {
        Self::new(Role::Assistant, content).with_type(r#type)
    }

    /// Sets the thread id.
    #[inline]
    pub fn with_thread_id<S: Into<String>>(mut self, thread_id: S) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Sets the event tag.
    #[inline]
    pub fn with_type(mut self, r#type: MessageType) -> Self {
        self.r#type = Some(r#type);
        self
    }

    /// Attaches tool calls. An empty list clears them.
    #[inline]
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        };
        self
    }

    /// Returns `true` if the message is tagged with `r#type`.
    #[inline]
    pub fn is_type(&self, r#type: MessageType) -> bool {
        self.r#type == Some(r#type)
    }

    /// Returns the tool calls, or an empty slice.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Generates an identifier for messages and tool calls.
#[inline]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_identity_by_id() {
        let a = Message::user("Hi");
        let mut b = a.clone();
        b.content = "Bye".to_owned();
        assert_eq!(a, b);
        assert_ne!(a, Message::user("Hi"));

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_serialize_tags() {
        let msg = Message::event(MessageType::FinalResponse, "done")
            .with_thread_id("thread:1");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], json!("assistant"));
        assert_eq!(value["type"], json!("final_response"));
        assert_eq!(value["thread_id"], json!("thread:1"));
        assert!(value.get("tool_calls").is_none());

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back.r#type, Some(MessageType::FinalResponse));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let value = json!({ "id": "1", "role": "robot", "content": "" });
        assert!(serde_json::from_value::<Message>(value).is_err());
    }

    #[test]
    fn test_empty_tool_calls_cleared() {
        let msg = Message::assistant("").with_tool_calls(vec![]);
        assert!(msg.tool_calls.is_none());
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn test_terminal_types() {
        let terminal: Vec<_> = [
            MessageType::Info,
            MessageType::Warn,
            MessageType::Error,
            MessageType::Completed,
            MessageType::Log,
            MessageType::FinalResponse,
        ]
        .into_iter()
        .filter(|t| t.is_terminal())
        .collect();
        assert_eq!(terminal, [
            MessageType::Error,
            MessageType::Completed,
            MessageType::FinalResponse,
        ]);
    }
}
