use std::error::Error;

use crate::error::ErrorKind;
use crate::message::Message;
use crate::request::{ModelConfig, ModelTool};
use crate::response::ModelResponse;

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a model provider, which is an entry for starting
/// chat sessions with a model.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The session type for this provider.
    type Session: ChatSession<Error = Self::Error>;

    /// Starts a chat session.
    ///
    /// `history` contains every message of the conversation except the
    /// newest one, which will be passed to [`ChatSession::send_message`].
    /// Implementations translate the messages and `tools` into whatever
    /// representation the underlying model expects.
    fn start_chat(
        &self,
        history: &[Message],
        tools: &[ModelTool],
    ) -> Self::Session;
}

/// A chat session started by [`ModelProvider::start_chat`].
pub trait ChatSession: Send + 'static {
    /// The error type that may be returned by the session.
    type Error: ModelProviderError;

    /// The response type for this session.
    type Response: ModelResponse<Error = Self::Error>;

    /// Sends exactly one message to the model.
    ///
    /// Transport or provider failures are reported through the returned
    /// future, or later while polling the response.
    fn send_message(
        &mut self,
        message: &Message,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}

/// Creates model providers from a [`ModelConfig`].
///
/// Agents use connectors to defer the creation of their provider until
/// the first request is made.
pub trait ModelConnector: Send + Sync {
    /// The provider type this connector creates.
    type Provider: ModelProvider;

    /// Creates a provider for the selected model.
    fn connect(
        &self,
        config: &ModelConfig,
    ) -> Result<Self::Provider, <Self::Provider as ModelProvider>::Error>;
}
