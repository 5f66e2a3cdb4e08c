mod builder;
mod run;
mod stream;

use std::fmt::{self, Debug};

use converse_model::{
    Message, MessageType, ModelConfig, ModelProviderError, Role, new_id,
};
use futures_util::StreamExt;

use crate::conversation::Conversation;
use crate::error::AgentError;
use crate::model_client::ModelClient;
use crate::tool::{AnyTool, Dispatcher};
pub use builder::AgentBuilder;
pub use stream::RunStream;

/// The turn budget used when [`RunOptions`] doesn't specify one.
pub const DEFAULT_MAX_TURNS: usize = 150;

type ConnectFn = Box<
    dyn Fn(&ModelConfig) -> Result<ModelClient, Box<dyn ModelProviderError>>
        + Send
        + Sync,
>;

/// Options of a single run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RunOptions {
    /// The maximum number of model round-trips before the agent is asked
    /// to conclude.
    pub max_turns: usize,
}

impl RunOptions {
    /// Sets the turn budget.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}

impl Default for RunOptions {
    #[inline]
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

/// An agent instance, which owns a tool registry, a model client, and the
/// conversation history.
///
/// Every run appends to the same history, so a second run continues the
/// conversation of the first one. Runs borrow the agent mutably, hence one
/// agent serves one conversation at a time. Create one agent per concurrent
/// conversation.
pub struct Agent {
    name: String,
    description: String,
    instruction: String,
    model_config: ModelConfig,
    model_client: Option<ModelClient>,
    connector: Option<ConnectFn>,
    dispatcher: Dispatcher,
    conversation: Conversation,
}

impl Agent {
    /// Creates an [`AgentBuilder`].
    #[inline]
    pub fn builder<S: Into<String>>(name: S) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description of the agent.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the instruction every run starts with.
    #[inline]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Returns the model configuration.
    #[inline]
    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    /// Returns the conversation history.
    #[inline]
    pub fn history(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the tool registered under `name`.
    #[inline]
    pub fn tool(&self, name: &str) -> Option<&AnyTool> {
        self.dispatcher.get(name)
    }

    /// Registers a tool, replacing any tool with the same name.
    #[inline]
    pub fn add_tool<S: Into<String>>(&mut self, name: S, tool: AnyTool) {
        self.dispatcher.add_tool(name.into(), tool);
    }

    /// Registers several tools.
    pub fn add_tools<I, S>(&mut self, tools: I)
    where
        I: IntoIterator<Item = (S, AnyTool)>,
        S: Into<String>,
    {
        for (name, tool) in tools {
            self.add_tool(name, tool);
        }
    }

    /// Runs the agent and streams every event of the run.
    ///
    /// The stream is lazy: nothing happens until it's polled. After the
    /// last event, [`RunStream::finish`] returns the complete history.
    /// A model failure is yielded as an `error` event followed by an
    /// `Err`, after which the stream ends.
    pub fn run_with_stream(
        &mut self,
        messages: Vec<Message>,
        options: RunOptions,
    ) -> RunStream<'_> {
        let thread_id = new_id();
        let events = self.drive(messages, options, thread_id.clone());
        RunStream::new(Box::pin(events), thread_id)
    }

    /// Runs the agent until it produces a final answer.
    ///
    /// Returns one assistant message for each final answer of the run.
    /// Progress events are discarded.
    pub async fn run(
        &mut self,
        messages: Vec<Message>,
        options: RunOptions,
    ) -> Result<Vec<Message>, AgentError> {
        let mut stream = self.run_with_stream(messages, options);
        let thread_id = stream.thread_id().to_owned();
        let mut responses = vec![];
        while let Some(event) = stream.next().await {
            let event = event?;
            if event.role == Role::Assistant
                && event.is_type(MessageType::FinalResponse)
            {
                responses.push(
                    Message::assistant(event.content)
                        .with_thread_id(&thread_id),
                );
            }
        }
        Ok(responses)
    }

    /// Returns the model client, connecting on first use.
    fn model_client(&mut self) -> Result<ModelClient, AgentError> {
        if let Some(client) = &self.model_client {
            return Ok(client.clone());
        }
        let Some(connect) = &self.connector else {
            return Err(AgentError::NoModel);
        };

        debug!("connecting to model: {:?}", self.model_config);
        let client =
            connect(&self.model_config).map_err(|reason| AgentError::Connect {
                model: self.model_config.model.clone(),
                reason,
            })?;
        self.model_client = Some(client.clone());
        Ok(client)
    }
}

impl Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("model_config", &self.model_config)
            .field("tools", &self.dispatcher.len())
            .field("history", &self.conversation.len())
            .finish_non_exhaustive()
    }
}
