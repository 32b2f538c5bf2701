//! History channel — mediates worker invocations against the shared log.
//!
//! The channel marks where a run starts exactly once (`receive`, which
//! records the fork point rather than copying the log), then streams each
//! worker's output in production order, tagged with a visibility flag.
//! Default workers mark every message visible; the flag stays in the
//! contract so a worker can produce internal bookkeeping entries without
//! surfacing them.

use futures::stream::BoxStream;

use crate::error::TeamError;
use crate::history::{ChatHistory, Message};
use crate::worker::Worker;

#[derive(Default)]
pub struct HistoryChannel {
    initial_len: usize,
    received: bool,
}

impl HistoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where the run starts in the log. Only the first call per
    /// channel takes effect.
    pub fn receive(&mut self, messages: &[Message]) {
        if self.received {
            return;
        }
        self.initial_len = messages.len();
        self.received = true;
    }

    /// Number of messages the run started from (the fork point for
    /// delta computations).
    pub fn initial_len(&self) -> usize {
        self.initial_len
    }

    /// Invoke a worker against the history, yielding `(is_visible, message)`
    /// pairs in production order.
    pub fn invoke<'a>(
        &'a self,
        worker: &'a dyn Worker,
        history: &'a ChatHistory,
    ) -> BoxStream<'a, Result<(bool, Message), TeamError>> {
        Box::pin(async_stream::try_stream! {
            let produced = worker.respond(history).await.map_err(|e| match e {
                err @ TeamError::WorkerInvocation { .. } => err,
                other => TeamError::WorkerInvocation {
                    worker: worker.id().to_string(),
                    message: other.to_string(),
                },
            })?;

            for message in produced {
                yield (true, message);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::worker::WorkerDescriptor;

    struct Scripted {
        descriptor: WorkerDescriptor,
        replies: Vec<Message>,
    }

    #[async_trait]
    impl Worker for Scripted {
        fn descriptor(&self) -> &WorkerDescriptor {
            &self.descriptor
        }

        async fn respond(&self, _history: &ChatHistory) -> Result<Vec<Message>, TeamError> {
            Ok(self.replies.clone())
        }
    }

    struct Failing(WorkerDescriptor);

    #[async_trait]
    impl Worker for Failing {
        fn descriptor(&self) -> &WorkerDescriptor {
            &self.0
        }

        async fn respond(&self, _history: &ChatHistory) -> Result<Vec<Message>, TeamError> {
            Err(TeamError::Completion("upstream down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_invoke_yields_in_production_order() {
        let worker = Scripted {
            descriptor: WorkerDescriptor::new("echo", "Echo", "Echoes"),
            replies: vec![
                Message::assistant("echo", "one"),
                Message::assistant("echo", "two"),
            ],
        };
        let history = ChatHistory::new();
        let channel = HistoryChannel::new();

        let items: Vec<_> = channel
            .invoke(&worker, &history)
            .collect::<Result<Vec<_>, _>>()
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert!(items[0].0);
        assert_eq!(items[0].1.content, "one");
        assert_eq!(items[1].1.content, "two");
    }

    #[tokio::test]
    async fn test_invoke_wraps_worker_errors() {
        let worker = Failing(WorkerDescriptor::new("broken", "Broken", "Fails"));
        let history = ChatHistory::new();
        let channel = HistoryChannel::new();

        let err = channel
            .invoke(&worker, &history)
            .collect::<Result<Vec<_>, _>>()
            .await
            .unwrap_err();

        match err {
            TeamError::WorkerInvocation { worker, message } => {
                assert_eq!(worker, "broken");
                assert!(message.contains("upstream down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_receive_only_once() {
        let mut channel = HistoryChannel::new();
        let first = vec![Message::user("caller", "hello")];
        channel.receive(&first);
        channel.receive(&[Message::user("caller", "hello"), Message::user("caller", "again")]);
        assert_eq!(channel.initial_len(), 1);
    }
}
