use converse_model::{ErrorKind, ModelProviderError};

/// A failure that aborts a whole run.
///
/// Tool failures never surface as `AgentError`, they are reported to the
/// model as tool results instead.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model provider failed to answer.
    #[error("model request failed: {0}")]
    Model(Box<dyn ModelProviderError>),
    /// The model provider could not be created.
    #[error("failed to connect to model `{model}`: {reason}")]
    Connect {
        /// The model selector.
        model: String,
        /// The underlying provider error.
        reason: Box<dyn ModelProviderError>,
    },
    /// The agent has neither a provider nor a connector.
    #[error("no model provider is configured")]
    NoModel,
    /// There is nothing to send to the model.
    #[error("the conversation is empty")]
    EmptyConversation,
    /// The run stream ended without producing a history.
    #[error("the run ended before producing a history")]
    Aborted,
}

impl AgentError {
    /// Returns the kind of the provider error, if this error came from
    /// the model provider.
    pub fn model_error_kind(&self) -> Option<ErrorKind> {
        match self {
            AgentError::Model(err) => Some(err.kind()),
            AgentError::Connect { reason, .. } => Some(reason.kind()),
            _ => None,
        }
    }
}
