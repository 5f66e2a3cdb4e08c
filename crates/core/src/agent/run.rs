use std::pin::pin;

use async_stream::try_stream;
use converse_model::{Message, MessageType, ModelTool, Role, ToolCall, new_id};
use futures_util::{Stream, StreamExt};

use super::stream::RunItem;
use super::{Agent, RunOptions};
use crate::conversation::Conversation;
use crate::error::AgentError;
use crate::model_client::{ChatRequest, ModelClient, ModelReply};

/// Appended to the last message when the turn budget runs out.
const CONCLUDE_INSTRUCTION: &str = "You have reached the maximum number of \
    turns. Do not call any more functions. Conclude the task now and reply \
    with your final answer based on what you have so far.";

fn event<S: Into<String>>(
    thread_id: &str,
    r#type: MessageType,
    content: S,
) -> RunItem {
    RunItem::Event(Message::event(r#type, content).with_thread_id(thread_id))
}

impl Agent {
    pub(super) fn drive(
        &mut self,
        messages: Vec<Message>,
        options: RunOptions,
        thread_id: String,
    ) -> impl Stream<Item = Result<RunItem, AgentError>> + Send + '_ {
        try_stream! {
            let RunOptions { max_turns } = options;
            debug!("starting run ({thread_id}) of agent `{}`", self.name);

            for msg in self.prepare_input(messages, &thread_id) {
                self.conversation.push(msg);
            }

            let model = self.model_client();
            if let Err(err) = &model {
                error!("run ({thread_id}) can't reach the model: {err}");
                yield event(&thread_id, MessageType::Error, err.to_string());
            }
            let model = model?;
            let tools = self.dispatcher.definitions();

            let mut answer = None;
            for turn in 1..=max_turns {
                yield event(
                    &thread_id,
                    MessageType::Log,
                    format!("Turn {turn}/{max_turns}: waiting for the model"),
                );

                let reply = self.ask(&model, tools.clone(), false).await;
                if let Err(err) = &reply {
                    error!("run ({thread_id}) failed on turn {turn}: {err}");
                    yield event(
                        &thread_id,
                        MessageType::Error,
                        err.to_string(),
                    );
                }
                let reply = reply?;
                trace!("turn {turn} finished: {:?}", reply.finish_reason);

                if reply.function_calls.is_empty() {
                    answer = Some(reply.text);
                    break;
                }

                let calls =
                    tool_calls(reply, &thread_id, &mut self.conversation);
                yield event(
                    &thread_id,
                    MessageType::Log,
                    format!("The model requested {} tool call(s)", calls.len()),
                );

                for call in &calls {
                    yield event(
                        &thread_id,
                        MessageType::Log,
                        format!("Running tool `{}`", call.name),
                    );

                    let mut events = pin!(self.dispatcher.dispatch(call));
                    while let Some(msg) = events.next().await {
                        let outcome = msg.r#type.filter(|t| t.is_terminal());
                        if let Some(r#type) = outcome {
                            self.conversation.push(
                                Message::tool(&call.id, &msg.content)
                                    .with_type(r#type)
                                    .with_thread_id(&thread_id),
                            );
                        }
                        yield RunItem::Event(msg);
                    }

                    yield event(
                        &thread_id,
                        MessageType::Log,
                        format!("Tool `{}` finished", call.name),
                    );
                }
            }

            let answer = match answer {
                Some(answer) => {
                    yield event(
                        &thread_id,
                        MessageType::Log,
                        "The model produced a final answer",
                    );
                    answer
                }
                None => {
                    warn!("run ({thread_id}) used up all {max_turns} turns");
                    yield event(
                        &thread_id,
                        MessageType::Warn,
                        format!("Reached the limit of {max_turns} turns"),
                    );
                    yield event(
                        &thread_id,
                        MessageType::Log,
                        "Asking the model to conclude",
                    );

                    let reply = self.ask(&model, vec![], true).await;
                    if let Err(err) = &reply {
                        error!("run ({thread_id}) failed to conclude: {err}");
                        yield event(
                            &thread_id,
                            MessageType::Error,
                            err.to_string(),
                        );
                    }
                    let reply = reply?;
                    if !reply.function_calls.is_empty() {
                        warn!(
                            "ignoring {} function call(s) after the turn limit",
                            reply.function_calls.len()
                        );
                    }
                    reply.text
                }
            };

            self.conversation.push(
                Message::assistant(&answer)
                    .with_type(MessageType::FinalResponse)
                    .with_thread_id(&thread_id),
            );
            yield event(&thread_id, MessageType::Completed, "");
            yield event(&thread_id, MessageType::FinalResponse, answer);

            debug!("run ({thread_id}) completed");
            yield RunItem::Finished(self.conversation.messages().to_vec());
        }
    }

    /// Appends the instruction unless the caller already starts with it,
    /// and tags every message with the thread.
    fn prepare_input(
        &self,
        messages: Vec<Message>,
        thread_id: &str,
    ) -> Vec<Message> {
        let has_instruction = messages.first().is_some_and(|msg| {
            msg.role == Role::System && msg.content == self.instruction
        });

        let mut input = Vec::with_capacity(messages.len() + 1);
        if !has_instruction && !self.instruction.is_empty() {
            input.push(Message::system(&self.instruction));
        }
        input.extend(messages);

        for msg in &mut input {
            if msg.thread_id.is_none() {
                msg.thread_id = Some(thread_id.to_owned());
            }
        }
        input
    }

    /// Sends the newest message with everything before it as history.
    async fn ask(
        &self,
        model: &ModelClient,
        tools: Vec<ModelTool>,
        conclude: bool,
    ) -> Result<ModelReply, AgentError> {
        let Some((last, history)) = self.conversation.split_last() else {
            return Err(AgentError::EmptyConversation);
        };

        let mut message = last.clone();
        if conclude {
            message.id = new_id();
            message.content =
                format!("{}\n\n{CONCLUDE_INSTRUCTION}", message.content);
        }

        let req = ChatRequest {
            history: history.to_vec(),
            tools,
            message,
        };
        model.send(req).await.map_err(AgentError::Model)
    }
}

/// Turns the function calls of `reply` into tool calls and records the
/// assistant message that requested them.
fn tool_calls(
    reply: ModelReply,
    thread_id: &str,
    conversation: &mut Conversation,
) -> Vec<ToolCall> {
    let calls: Vec<_> = reply
        .function_calls
        .into_iter()
        .map(|call| ToolCall {
            id: call.id.unwrap_or_else(new_id),
            name: call.name,
            arguments: call.arguments,
            thread_id: thread_id.to_owned(),
        })
        .collect();
    trace!("tool calls: {calls:?}");

    conversation.push(
        Message::assistant(reply.text)
            .with_tool_calls(calls.clone())
            .with_thread_id(thread_id),
    );
    calls
}
