//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use converse_model::{
    ChatSession, ErrorKind, Message, ModelConfig, ModelConnector,
    ModelFinishReason, ModelProvider, ModelProviderError, ModelResponse,
    ModelResponseEvent, ModelTool,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub fn message(&self) -> &str {
        self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A request received by [`TestModelProvider`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// The history passed to `start_chat`.
    pub history: Vec<Message>,
    /// The tools passed to `start_chat`.
    pub tools: Vec<ModelTool>,
    /// The message passed to `send_message`.
    pub message: Message,
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            if this.event_idx < this.events.len() {
                let event = match &this.events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                    PresetEvent::FunctionCall(call) => {
                        ModelResponseEvent::FunctionCall(call.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == this.events.len() {
                this.event_idx += 1;
                let has_function_call = this
                    .events
                    .iter()
                    .any(|event| matches!(event, PresetEvent::FunctionCall(_)));
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    if has_function_call {
                        ModelFinishReason::ToolCalls
                    } else {
                        ModelFinishReason::Stop
                    },
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    steps: VecDeque<PresetResponse>,
    requests: Vec<RecordedRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. Each `send_message` call
/// consumes the next response step in order. If there are no enough steps in
/// the script, an error will be returned.
///
/// Clones share the same script, so a test can keep a clone to inspect the
/// requests after handing the provider over to an agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.script().steps.push_back(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all requests received so far.
    #[inline]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script().requests.clone()
    }

    /// Returns the number of steps that have not been consumed.
    #[inline]
    pub fn remaining_steps(&self) -> usize {
        self.script().steps.len()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(&self) -> Result<TestModelResponse, Error> {
        let mut script = self.script();
        let failures = script.steps.front().and_then(|step| step.failures);
        if let Some(failures) = failures {
            if let Some(step) = script.steps.front_mut() {
                step.failures = match failures {
                    0 => Some(0),
                    1 => None,
                    n => Some(n - 1),
                };
            }
            return Err(Error {
                message: "preset failure",
                kind: ErrorKind::RateLimitExceeded,
            });
        }

        let Some(step) = script.steps.pop_front() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };

        Ok(TestModelResponse {
            events: step.events,
            event_idx: 0,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

pub struct TestChatSession {
    provider: TestModelProvider,
    history: Vec<Message>,
    tools: Vec<ModelTool>,
}

impl ChatSession for TestChatSession {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_message(
        &mut self,
        message: &Message,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.provider.script().requests.push(RecordedRequest {
            history: self.history.clone(),
            tools: self.tools.clone(),
            message: message.clone(),
        });
        ready(self.provider.next_response())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Session = TestChatSession;

    fn start_chat(
        &self,
        history: &[Message],
        tools: &[ModelTool],
    ) -> Self::Session {
        TestChatSession {
            provider: self.clone(),
            history: history.to_vec(),
            tools: tools.to_vec(),
        }
    }
}

/// Hands out a shared [`TestModelProvider`] for any model selector.
///
/// Connection fails when `require_api_key` is set and the config carries
/// no key.
#[derive(Clone, Default)]
pub struct TestModelConnector {
    pub provider: TestModelProvider,
    pub require_api_key: bool,
}

impl ModelConnector for TestModelConnector {
    type Provider = TestModelProvider;

    fn connect(&self, config: &ModelConfig) -> Result<Self::Provider, Error> {
        if self.require_api_key && config.api_key.is_none() {
            return Err(Error {
                message: "missing api key",
                kind: ErrorKind::Unauthorized,
            });
        }
        Ok(self.provider.clone())
    }
}

impl Debug for TestModelProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModelProvider")
            .field("remaining_steps", &self.remaining_steps())
            .field("delay", &self.delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use converse_model::FunctionCall;
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<FunctionCall>, ModelFinishReason) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut function_call = None;
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(reason) => {
                    return (msg, function_call, reason);
                }
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::FunctionCall(call) => {
                    function_call = Some(call)
                }
            }
        }
    }

    #[tokio::test]
    async fn test_send_message() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(PresetResponse {
            events: vec![
                PresetEvent::MessageDelta("Hello, ".to_owned()),
                PresetEvent::MessageDelta("world!".to_owned()),
            ],
            failures: None,
        });
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("let me take a look.".to_owned()),
            PresetEvent::call("read_file", json!({ "filename": "todo.txt" })),
        ]));

        let tools = vec![ModelTool {
            name: "read_file".to_owned(),
            description: "Reads a file".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "filename": {
                        "type": "string",
                        "description": "The name of the file to read"
                    }
                }
            }),
        }];

        let mut session = provider.start_chat(&[], &tools);
        let resp = session.send_message(&Message::user("Hi")).await.unwrap();
        let (msg, _, reason) = collect_response(resp).await;
        assert_eq!(msg, "Hello, world!");
        assert_eq!(reason, ModelFinishReason::Stop);

        let history = vec![Message::user("Hi"), Message::assistant(msg)];
        let mut session = provider.start_chat(&history, &tools);
        let resp = session
            .send_message(&Message::user("Check my todo"))
            .await
            .unwrap();
        let (msg, function_call, reason) = collect_response(resp).await;
        assert_eq!(msg, "Sure, let me take a look.");
        assert_eq!(reason, ModelFinishReason::ToolCalls);
        let function_call = function_call.unwrap();
        assert_eq!(function_call.name, "read_file");
        assert_eq!(function_call.arguments, json!({ "filename": "todo.txt" }));

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].message.content, "Check my todo");
        assert_eq!(requests[1].tools, tools);
        assert_eq!(provider.remaining_steps(), 0);
    }

    #[tokio::test]
    async fn test_failures() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(
            PresetResponse::text("finally").with_failures(1),
        );

        let mut session = provider.start_chat(&[], &[]);
        let err = session
            .send_message(&Message::user("Hi"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        let resp = session.send_message(&Message::user("Hi")).await.unwrap();
        let (msg, _, _) = collect_response(resp).await;
        assert_eq!(msg, "finally");

        // The script is exhausted now.
        let err = session
            .send_message(&Message::user("Hi"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.message(), "no enough steps");
    }

    #[tokio::test]
    async fn test_permanent_failure() {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_response_step(
            PresetResponse::text("never").with_failures(0),
        );

        let mut session = provider.start_chat(&[], &[]);
        for _ in 0..3 {
            let err = session
                .send_message(&Message::user("Hi"))
                .await
                .err()
                .unwrap();
            assert_eq!(err.message(), "preset failure");
        }
        assert_eq!(provider.remaining_steps(), 1);
    }

    #[test]
    fn test_connector() {
        let connector = TestModelConnector {
            require_api_key: true,
            ..Default::default()
        };
        let err = connector.connect(&ModelConfig::new("test")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(
            connector
                .connect(&ModelConfig::new("test").with_api_key("key"))
                .is_ok()
        );
    }
}
