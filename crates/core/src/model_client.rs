use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use converse_model::{
    ChatSession, FunctionCall, Message, ModelFinishReason, ModelProvider,
    ModelProviderError, ModelResponse, ModelResponseEvent, ModelTool,
};
use tracing::Instrument;

type SendMessageResult = Result<ModelReply, Box<dyn ModelProviderError>>;
type BoxedSendMessageFuture =
    Pin<Box<dyn Future<Output = SendMessageResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ChatRequest) -> BoxedSendMessageFuture + Send + Sync>;

/// One round-trip to the model.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    /// Everything except the newest message.
    pub history: Vec<Message>,
    pub tools: Vec<ModelTool>,
    /// The newest message.
    pub message: Message,
}

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req: ChatRequest| {
            let mut session = provider.start_chat(&req.history, &req.tools);
            let fut = session.send_message(&req.message);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send(&self, req: ChatRequest) -> SendMessageResult {
        (self.handler_fn)(req).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug, Default)]
pub struct ModelReply {
    pub text: String,
    /// Function calls requested by the model, in order.
    pub function_calls: Vec<FunctionCall>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

type ResponseOf<P> =
    <<P as ModelProvider>::Session as ChatSession>::Response;

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<ResponseOf<P>, P::Error>,
) -> SendMessageResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut reply = ModelReply::default();

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                reply.text.push_str(&msg);
            }
            ModelResponseEvent::FunctionCall(call) => {
                reply.function_calls.push(call);
            }
            ModelResponseEvent::Completed(reason) => {
                reply.finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use converse_model::ErrorKind;
    use converse_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };
    use serde_json::json;

    use super::*;

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            history: vec![Message::system("Be brief.")],
            tools: vec![],
            message: Message::user(text),
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        for _ in 0..3 {
            model_provider.add_assistant_response_step(
                PresetResponse::with_events([
                    PresetEvent::MessageDelta("How ".to_owned()),
                    PresetEvent::MessageDelta("are ".to_owned()),
                    PresetEvent::MessageDelta("you?".to_owned()),
                ]),
            );
        }

        let model_client = ModelClient::new(model_provider.clone());

        for _ in 0..3 {
            let reply = model_client.send(request("Hi")).await.unwrap();
            assert_eq!(reply.text, "How are you?");
            assert!(reply.function_calls.is_empty());
            assert_eq!(reply.finish_reason, Some(ModelFinishReason::Stop));
        }

        let requests = model_provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].history[0].content, "Be brief.");
        assert_eq!(requests[0].message.content, "Hi");
    }

    #[tokio::test]
    async fn test_function_calls() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([
                PresetEvent::MessageDelta("Let me check.".to_owned()),
                PresetEvent::call("first", json!({})),
                PresetEvent::call("second", json!({ "a": 1 })),
            ]),
        );

        let model_client = ModelClient::new(model_provider);
        let reply = model_client.send(request("Go")).await.unwrap();
        assert_eq!(reply.text, "Let me check.");
        let names: Vec<_> =
            reply.function_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(reply.finish_reason, Some(ModelFinishReason::ToolCalls));
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let err = model_client.send(request("Hi")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
