use converse_model::{
    ModelConfig, ModelConnector, ModelProvider, ModelProviderError,
};

use super::{Agent, ConnectFn};
use crate::model_client::ModelClient;
use crate::tool::{AnyTool, Dispatcher};

/// [`Agent`] builder.
pub struct AgentBuilder {
    name: String,
    description: String,
    instruction: String,
    model_config: ModelConfig,
    model_client: Option<ModelClient>,
    connector: Option<ConnectFn>,
    tools: Vec<(String, AnyTool)>,
}

impl AgentBuilder {
    /// Creates a new builder for an agent named `name`.
    #[inline]
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            model_config: ModelConfig::default(),
            model_client: None,
            connector: None,
            tools: vec![],
        }
    }

    /// Sets a human-readable description.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the instruction every run starts with.
    #[inline]
    pub fn with_instruction<S: Into<String>>(mut self, instruction: S) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Selects the model passed to the connector.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model_config.model = model.into();
        self
    }

    /// Sets the API key passed to the connector.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.model_config.api_key = Some(api_key.into());
        self
    }

    /// Uses `provider` directly. Takes precedence over a connector.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        mut self,
        provider: P,
    ) -> Self {
        self.model_client = Some(ModelClient::new(provider));
        self
    }

    /// Creates the provider with `connector` when the agent first needs it.
    #[inline]
    pub fn with_model_connector<C>(mut self, connector: C) -> Self
    where
        C: ModelConnector + 'static,
        C::Provider: 'static,
    {
        self.connector = Some(Box::new(move |config| {
            connector
                .connect(config)
                .map(ModelClient::new)
                .map_err(|err| Box::new(err) as Box<dyn ModelProviderError>)
        }));
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<S: Into<String>>(
        mut self,
        name: S,
        tool: AnyTool,
    ) -> Self {
        self.tools.push((name.into(), tool));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        let AgentBuilder {
            name,
            description,
            instruction,
            model_config,
            model_client,
            connector,
            tools,
        } = self;

        let mut dispatcher = Dispatcher::default();
        for (name, tool) in tools {
            dispatcher.add_tool(name, tool);
        }

        Agent {
            name,
            description,
            instruction,
            model_config,
            model_client,
            connector,
            dispatcher,
            conversation: Default::default(),
        }
    }
}
