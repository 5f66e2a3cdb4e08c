use std::fmt::{self, Debug};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use converse_model::Message;
use futures_util::{Stream, StreamExt};

use crate::error::AgentError;

pub(crate) enum RunItem {
    Event(Message),
    Finished(Vec<Message>),
}

type BoxedRun<'a> =
    Pin<Box<dyn Stream<Item = Result<RunItem, AgentError>> + Send + 'a>>;

/// The event stream of a run, returned by
/// [`Agent::run_with_stream`](crate::Agent::run_with_stream).
///
/// Yields every progress event of the run in order. Dropping the stream
/// cancels the run, leaving whatever has been appended to the history so
/// far in place.
pub struct RunStream<'a> {
    inner: BoxedRun<'a>,
    thread_id: String,
    history: Option<Vec<Message>>,
}

impl<'a> RunStream<'a> {
    #[inline]
    pub(super) fn new(inner: BoxedRun<'a>, thread_id: String) -> Self {
        Self {
            inner,
            thread_id,
            history: None,
        }
    }

    /// Returns the thread id every event of this run carries.
    #[inline]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Returns the full history once the run has completed.
    #[inline]
    pub fn history(&self) -> Option<&[Message]> {
        self.history.as_deref()
    }

    /// Drains the remaining events and returns the full history.
    pub async fn finish(mut self) -> Result<Vec<Message>, AgentError> {
        while let Some(event) = self.next().await {
            event?;
        }
        self.history.ok_or(AgentError::Aborted)
    }
}

impl Stream for RunStream<'_> {
    type Item = Result<Message, AgentError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(RunItem::Event(msg))) => {
                    return Poll::Ready(Some(Ok(msg)));
                }
                Some(Ok(RunItem::Finished(history))) => {
                    this.history = Some(history);
                }
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl Debug for RunStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunStream")
            .field("thread_id", &self.thread_id)
            .field("finished", &self.history.is_some())
            .finish_non_exhaustive()
    }
}
