//! Tool call supports.

mod dispatcher;
mod error;
mod object;
mod schema;

use std::fmt::{self, Debug};
use std::sync::Arc;

use converse_model::{Message, MessageType};
use futures_util::stream::BoxStream;
use serde_json::Value;

pub(crate) use dispatcher::Dispatcher;
pub use error::{Error, ErrorKind};
use object::{
    BufferedObject, BufferedObjectImpl, StreamingObject, StreamingObjectImpl,
    ToolObject,
};
pub use schema::{ObjectSchema, Schema, TypedSchema};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// The events produced by a [`StreamingTool`].
pub type ToolStream = BoxStream<'static, Result<ToolEvent, Error>>;

/// The validated input produced by schema `S`.
pub type ToolInput<S> = <S as Schema>::Output;

/// A tool that produces its result in one piece.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as the working directory or the
/// current user. To do this, make the context an immutable state of the tool,
/// which can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The schema that validates the arguments of the tool.
    type Schema: Schema;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameters(&self) -> &Self::Schema;

    /// Executes the tool with the validated input.
    ///
    /// This method must return a future that is fully independent of `self`.
    /// A tool that imposes its own timeout reports it as an error here.
    fn execute(
        &self,
        input: ToolInput<Self::Schema>,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// A tool that reports progress before producing its result.
///
/// The returned stream yields any number of [`ToolEvent::Progress`] events
/// followed by one [`ToolEvent::Output`]. Events after the output are never
/// polled. A stream that ends without an output is treated as a failure.
pub trait StreamingTool: Send + Sync + 'static {
    /// The schema that validates the arguments of the tool.
    type Schema: Schema;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameters(&self) -> &Self::Schema;

    /// Executes the tool with the validated input.
    fn execute(
        &self,
        input: ToolInput<Self::Schema>,
        ctx: ToolContext,
    ) -> ToolStream;
}

/// An item of a [`ToolStream`].
#[derive(Clone, Debug)]
pub enum ToolEvent {
    /// A progress event, forwarded to the observer of the run unchanged.
    Progress(Message),
    /// The final result of the tool call.
    Output(String),
}

/// Information about the tool call a [`StreamingTool`] is executing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolContext {
    thread_id: String,
    call_id: String,
}

impl ToolContext {
    #[inline]
    pub(crate) fn new(thread_id: String, call_id: String) -> Self {
        Self { thread_id, call_id }
    }

    /// Returns the thread the call belongs to.
    #[inline]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Returns the id of the tool call.
    #[inline]
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Creates a progress event tagged with `r#type`.
    ///
    /// Terminal types are reserved for the outcome of the call. The
    /// dispatcher forwards progress events carrying one as `warn`.
    pub fn progress<S: Into<String>>(
        &self,
        r#type: MessageType,
        content: S,
    ) -> ToolEvent {
        let msg = Message::tool(&self.call_id, content)
            .with_type(r#type)
            .with_thread_id(&self.thread_id);
        ToolEvent::Progress(msg)
    }

    /// Creates a `log` progress event.
    #[inline]
    pub fn log<S: Into<String>>(&self, content: S) -> ToolEvent {
        self.progress(MessageType::Log, content)
    }

    /// Creates an `info` progress event.
    #[inline]
    pub fn info<S: Into<String>>(&self, content: S) -> ToolEvent {
        self.progress(MessageType::Info, content)
    }

    /// Creates a `warn` progress event.
    #[inline]
    pub fn warn<S: Into<String>>(&self, content: S) -> ToolEvent {
        self.progress(MessageType::Warn, content)
    }
}

/// A registered tool, either buffered or streaming.
#[derive(Clone)]
pub struct AnyTool(pub(crate) ToolKind);

#[derive(Clone)]
pub(crate) enum ToolKind {
    Buffered(Arc<dyn BufferedObject>),
    Streaming(Arc<dyn StreamingObject>),
}

impl AnyTool {
    /// Wraps a [`Tool`].
    #[inline]
    pub fn buffered<T: Tool>(tool: T) -> Self {
        Self(ToolKind::Buffered(Arc::new(BufferedObjectImpl(tool))))
    }

    /// Wraps a [`StreamingTool`].
    #[inline]
    pub fn streaming<T: StreamingTool>(tool: T) -> Self {
        Self(ToolKind::Streaming(Arc::new(StreamingObjectImpl(tool))))
    }

    /// Returns the description of the tool.
    #[inline]
    pub fn description(&self) -> &str {
        match &self.0 {
            ToolKind::Buffered(tool) => tool.description(),
            ToolKind::Streaming(tool) => tool.description(),
        }
    }

    /// Returns the JSON schema advertised to the model.
    #[inline]
    pub fn parameter_schema(&self) -> &Value {
        match &self.0 {
            ToolKind::Buffered(tool) => tool.parameter_schema(),
            ToolKind::Streaming(tool) => tool.parameter_schema(),
        }
    }

    /// Returns `true` if this is a streaming tool.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        matches!(self.0, ToolKind::Streaming(_))
    }
}

impl Debug for AnyTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyTool")
            .field("description", &self.description())
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}
