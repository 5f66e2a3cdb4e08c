use std::collections::HashMap;

use async_stream::stream;
use converse_model::{Message, MessageType, ModelTool, ToolCall};
use futures_util::{Stream, StreamExt};

use crate::tool::{
    AnyTool, Error, ErrorKind, ToolContext, ToolEvent, ToolKind,
};

/// Resolves tool calls against the registered tools and runs them.
#[derive(Default)]
pub struct Dispatcher {
    tools: HashMap<String, AnyTool>,
}

impl Dispatcher {
    /// Registers a tool, replacing any tool with the same name.
    pub fn add_tool(&mut self, name: String, tool: AnyTool) {
        trace!("registering tool `{name}`: {tool:?}");
        if self.tools.insert(name, tool).is_some() {
            debug!("a registered tool has been replaced");
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&AnyTool> {
        self.tools.get(name)
    }

    /// Returns the definitions of all tools, ordered by name.
    pub fn definitions(&self) -> Vec<ModelTool> {
        let mut definitions: Vec<_> = self
            .tools
            .iter()
            .map(|(name, tool)| ModelTool {
                name: name.clone(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Runs one tool call.
    ///
    /// The returned stream yields the progress events of streaming tools in
    /// order, and always ends with exactly one `final_response` or `error`
    /// event. It doesn't borrow the dispatcher.
    pub fn dispatch(
        &self,
        call: &ToolCall,
    ) -> impl Stream<Item = Message> + Send + 'static {
        let tool = self.tools.get(&call.name).cloned();
        let call = call.clone();

        stream! {
            let outcome = match tool.map(|tool| tool.0) {
                None => {
                    warn!("tool not found: {}", call.name);
                    Err(Error::not_found().with_reason(format!(
                        "no tool named `{}` is registered",
                        call.name
                    )))
                }
                Some(ToolKind::Buffered(tool)) => {
                    trace!("running tool ({}): {}", call.id, call.arguments);
                    match tool.execute(call.arguments.clone()) {
                        Ok(fut) => fut.await,
                        Err(err) => Err(err),
                    }
                }
                Some(ToolKind::Streaming(tool)) => {
                    trace!("streaming tool ({}): {}", call.id, call.arguments);
                    let ctx = ToolContext::new(
                        call.thread_id.clone(),
                        call.id.clone(),
                    );
                    match tool.execute(call.arguments.clone(), ctx) {
                        Ok(mut events) => {
                            let mut outcome = Err(Error::execution_error()
                                .with_reason(
                                    "the tool finished without a result",
                                ));
                            while let Some(event) = events.next().await {
                                match event {
                                    Ok(ToolEvent::Progress(msg)) => {
                                        yield progress_message(msg);
                                    }
                                    Ok(ToolEvent::Output(output)) => {
                                        outcome = Ok(output);
                                        break;
                                    }
                                    Err(err) => {
                                        outcome = Err(err);
                                        break;
                                    }
                                }
                            }
                            outcome
                        }
                        Err(err) => Err(err),
                    }
                }
            };
            yield terminal_message(&call, outcome);
        }
    }
}

/// Terminal types are reserved for the outcome of the call, so a progress
/// event carrying one is downgraded to `warn`.
fn progress_message(mut msg: Message) -> Message {
    if msg.r#type.is_some_and(MessageType::is_terminal) {
        debug!("downgrading a {:?} progress event to warn", msg.r#type);
        msg.r#type = Some(MessageType::Warn);
    }
    msg
}

fn terminal_message(
    call: &ToolCall,
    outcome: Result<String, Error>,
) -> Message {
    let (r#type, content) = match outcome {
        Ok(output) => (MessageType::FinalResponse, output),
        Err(err) => {
            let content = describe_failure(call, &err);
            warn!("{content}");
            (MessageType::Error, content)
        }
    };
    Message::tool(&call.id, content)
        .with_type(r#type)
        .with_thread_id(&call.thread_id)
}

fn describe_failure(call: &ToolCall, err: &Error) -> String {
    let ToolCall {
        name, arguments, ..
    } = call;
    let reason = err.reason();
    match err.kind() {
        ErrorKind::NotFound => format!(
            "Tool `{name}` is not available for the arguments {arguments}: \
             {reason}"
        ),
        ErrorKind::InvalidInput => format!(
            "Tool `{name}` rejected the arguments {arguments}: \
             validation failed: {reason}"
        ),
        ErrorKind::ExecutionError => format!(
            "Tool `{name}` failed with the arguments {arguments}: {reason}"
        ),
    }
}
