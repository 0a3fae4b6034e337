//! Relay of server-streaming calls through the error classifier.
//!
//! A producer task opens the remote stream and forwards items into a bounded
//! queue; the caller pulls from [`ClassifiedStream`]. Dropping the stream
//! aborts the producer, which releases the underlying gRPC stream.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;
use tracing::Instrument;

use crate::classify::{ClassifiedError, ErrorHandling};
use crate::provider::RpcStream;

/// Queue depth between the producer task and the caller.
pub const RELAY_CAPACITY: usize = 64;

/// Ordered sequence of items from one streaming call.
///
/// Yields `Ok` items in the order the daemon sent them. Ends when the remote
/// stream closes, or after the first failure: a failure the classifier
/// suppresses ends the stream silently, any other is yielded once as `Err`.
pub struct ClassifiedStream<T> {
    inbox: ReceiverStream<Result<T, ClassifiedError>>,
    producer: Option<JoinHandle<()>>,
    mode: ErrorHandling,
}

impl<T: Send + 'static> ClassifiedStream<T> {
    /// Spawns the producer for `open` and returns the consumer side.
    ///
    /// Must be called within a tokio runtime.
    pub fn relay<F>(open: F, mode: ErrorHandling) -> Self
    where
        F: Future<Output = Result<RpcStream<T>, Status>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(RELAY_CAPACITY);
        let producer = tokio::spawn(produce(open, tx, mode).in_current_span());

        Self {
            inbox: ReceiverStream::new(rx),
            producer: Some(producer),
            mode,
        }
    }
}

async fn produce<T, F>(open: F, tx: mpsc::Sender<Result<T, ClassifiedError>>, mode: ErrorHandling)
where
    F: Future<Output = Result<RpcStream<T>, Status>>,
{
    let mut inbound = match open.await {
        Ok(stream) => stream,
        Err(status) => {
            forward_failure(&tx, status, mode).await;
            return;
        }
    };

    let mut relayed: u64 = 0;
    while let Some(item) = inbound.next().await {
        match item {
            Ok(value) => {
                if tx.send(Ok(value)).await.is_err() {
                    tracing::debug!(relayed, "stream consumer dropped, closing remote stream");
                    return;
                }
                relayed += 1;
            }
            Err(status) => {
                forward_failure(&tx, status, mode).await;
                return;
            }
        }
    }

    tracing::debug!(relayed, "remote stream ended");
}

async fn forward_failure<T>(
    tx: &mpsc::Sender<Result<T, ClassifiedError>>,
    status: Status,
    mode: ErrorHandling,
) {
    let err = ClassifiedError::from_status(status);
    err.log();
    if mode.delivers(&err) {
        // A closed queue means nobody is left to tell.
        let _ = tx.send(Err(err)).await;
    }
}

impl<T> Stream for ClassifiedStream<T> {
    type Item = Result<T, ClassifiedError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.inbox.poll_next_unpin(cx) {
            Poll::Ready(None) => {}
            other => return other,
        }

        // Queue closed: the producer has finished or is unwinding.
        let Some(producer) = this.producer.as_mut() else {
            return Poll::Ready(None);
        };
        let outcome = match Pin::new(producer).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(outcome) => outcome,
        };
        this.producer = None;

        match outcome {
            Ok(()) => Poll::Ready(None),
            Err(join_err) if join_err.is_cancelled() => Poll::Ready(None),
            Err(join_err) => {
                let err = ClassifiedError::Unexpected(join_err.to_string());
                err.log();
                if this.mode.delivers(&err) {
                    Poll::Ready(Some(Err(err)))
                } else {
                    Poll::Ready(None)
                }
            }
        }
    }
}

impl<T> Drop for ClassifiedStream<T> {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl<T> std::fmt::Debug for ClassifiedStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifiedStream")
            .field("mode", &self.mode)
            .field("finished", &self.producer.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn ok_stream(
        items: Vec<Result<u32, Status>>,
    ) -> impl Future<Output = Result<RpcStream<u32>, Status>> + Send {
        async move { Ok(stream::iter(items).boxed()) }
    }

    #[tokio::test]
    async fn test_relays_items_in_order() {
        let relay = ClassifiedStream::relay(
            ok_stream(vec![Ok(1), Ok(2), Ok(3)]),
            ErrorHandling::Suppress,
        );
        let items: Vec<_> = relay.map(|r| r.unwrap()).collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_stream_ends_cleanly() {
        let mut relay = ClassifiedStream::relay(ok_stream(vec![]), ErrorHandling::Suppress);
        assert!(relay.next().await.is_none());
        assert!(relay.next().await.is_none());
    }

    #[tokio::test]
    async fn test_more_items_than_capacity() {
        let n = (RELAY_CAPACITY * 3) as u32;
        let items: Vec<Result<u32, Status>> = (0..n).map(Ok).collect();
        let relay = ClassifiedStream::relay(ok_stream(items), ErrorHandling::Suppress);
        let received: Vec<_> = relay.map(|r| r.unwrap()).collect().await;
        assert_eq!(received, (0..n).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_open_failure_reraised() {
        let open = async { Err::<RpcStream<u32>, _>(Status::unimplemented("")) };
        let mut relay = ClassifiedStream::relay(open, ErrorHandling::Suppress);
        assert!(matches!(
            relay.next().await,
            Some(Err(ClassifiedError::Unimplemented(_)))
        ));
        assert!(relay.next().await.is_none());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_suppressed() {
        let relay = ClassifiedStream::relay(
            ok_stream(vec![Ok(1), Err(Status::not_found("x")), Ok(2)]),
            ErrorHandling::Suppress,
        );
        let items: Vec<_> = relay.collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(*items[0].as_ref().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_surface_mode_yields_suppressible_failure() {
        let mut relay = ClassifiedStream::relay(
            ok_stream(vec![Ok(7), Err(Status::unavailable("connection refused"))]),
            ErrorHandling::Surface,
        );
        assert_eq!(relay.next().await.unwrap().unwrap(), 7);
        assert!(matches!(
            relay.next().await,
            Some(Err(ClassifiedError::Unavailable(_)))
        ));
        assert!(relay.next().await.is_none());
    }

    #[tokio::test]
    async fn test_producer_panic_is_unexpected() {
        let open = async {
            let items = stream::iter(vec![1u32]).map(|i| -> Result<u32, Status> {
                if i == 1 {
                    panic!("decoder exploded");
                }
                Ok(i)
            });
            Ok::<_, Status>(items.boxed())
        };

        let mut relay = ClassifiedStream::relay(open, ErrorHandling::Surface);
        assert!(matches!(
            relay.next().await,
            Some(Err(ClassifiedError::Unexpected(_)))
        ));

        let open = async {
            let items = stream::iter(vec![1u32]).map(|_| -> Result<u32, Status> {
                panic!("decoder exploded");
            });
            Ok::<_, Status>(items.boxed())
        };
        let mut relay = ClassifiedStream::relay(open, ErrorHandling::Suppress);
        assert!(relay.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_releases_remote_stream() {
        let (remote_tx, remote_rx) = mpsc::channel::<Result<u32, Status>>(1);
        let open = async move { Ok::<_, Status>(ReceiverStream::new(remote_rx).boxed()) };

        let mut relay = ClassifiedStream::relay(open, ErrorHandling::Suppress);
        remote_tx.send(Ok(1)).await.unwrap();
        assert_eq!(relay.next().await.unwrap().unwrap(), 1);

        drop(relay);
        // Once the producer is gone the remote receiver is dropped with it.
        tokio::time::timeout(std::time::Duration::from_secs(5), remote_tx.closed())
            .await
            .expect("remote stream not released");
    }
}
