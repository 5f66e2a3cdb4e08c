use std::pin::Pin;

use serde_json::Value;
use tracing::Instrument;

use super::{
    Error, Schema, StreamingTool, Tool, ToolContext, ToolResult, ToolStream,
};

pub(crate) type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;
}

/// Type-erased [`Tool`].
///
/// `execute` fails only if the arguments don't pass the schema, execution
/// failures are reported through the returned future.
pub(crate) trait BufferedObject: ToolObject {
    fn execute(&self, arguments: Value) -> Result<ToolFuture, Error>;
}

/// Type-erased [`StreamingTool`].
pub(crate) trait StreamingObject: ToolObject {
    fn execute(
        &self,
        arguments: Value,
        ctx: ToolContext,
    ) -> Result<ToolStream, Error>;
}

pub(crate) struct BufferedObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for BufferedObjectImpl<T> {
    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameters().definition()
    }
}

impl<T: Tool> BufferedObject for BufferedObjectImpl<T> {
    fn execute(&self, arguments: Value) -> Result<ToolFuture, Error> {
        let input = self.0.parameters().validate(arguments)?;
        Ok(Box::pin(
            self.0.execute(input).instrument(debug_span!("tool execute")),
        ))
    }
}

pub(crate) struct StreamingObjectImpl<T: StreamingTool>(pub T);

impl<T: StreamingTool> ToolObject for StreamingObjectImpl<T> {
    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameters().definition()
    }
}

impl<T: StreamingTool> StreamingObject for StreamingObjectImpl<T> {
    fn execute(
        &self,
        arguments: Value,
        ctx: ToolContext,
    ) -> Result<ToolStream, Error> {
        let input = self.0.parameters().validate(arguments)?;
        Ok(self.0.execute(input, ctx))
    }
}
