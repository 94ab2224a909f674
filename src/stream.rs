use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::error::SqlConduitError;
use crate::results::CustomDbRow;

/// Rows a producer may hold ahead of the consumer.
pub const PREFETCH_WINDOW: usize = 100;

/// One item of a [`QueryStream`].
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// Object mode: the record itself.
    Record(CustomDbRow),
    /// Text mode: the record as one JSON object terminated by `\n`.
    Text(String),
}

impl StreamChunk {
    #[must_use]
    pub fn into_record(self) -> Option<CustomDbRow> {
        match self {
            StreamChunk::Record(row) => Some(row),
            StreamChunk::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamChunk::Text(text) => Some(text),
            StreamChunk::Record(_) => None,
        }
    }
}

type RowMessage = Result<CustomDbRow, SqlConduitError>;

/// Lazy, forward-only result stream.
///
/// A backend task owns the checked-out connection and its cursor and feeds a channel of
/// [`PREFETCH_WINDOW`] slots; it pauses while the channel is full and shuts down, releasing the
/// connection, once the stream is dropped. After the end of the rows or the first error
/// the stream only yields `None`.
#[derive(Debug)]
pub struct QueryStream {
    receiver: mpsc::Receiver<RowMessage>,
    object_mode: bool,
    fetched: Arc<AtomicUsize>,
    done: bool,
}

impl QueryStream {
    /// Rows pulled from the backend so far, consumed or not.
    #[must_use]
    pub fn rows_fetched(&self) -> usize {
        self.fetched.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_object_mode(&self) -> bool {
        self.object_mode
    }

    fn chunk(&self, row: CustomDbRow) -> StreamChunk {
        if self.object_mode {
            StreamChunk::Record(row)
        } else {
            StreamChunk::Text(format!("{}\n", row.to_json()))
        }
    }
}

impl Stream for QueryStream {
    type Item = Result<StreamChunk, SqlConduitError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(err))) => {
                this.done = true;
                this.receiver.close();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(Some(Ok(row))) => Poll::Ready(Some(Ok(this.chunk(row)))),
        }
    }
}

/// Producer half handed to the backend task.
#[derive(Debug)]
pub(crate) struct RowSender {
    sender: mpsc::Sender<RowMessage>,
    fetched: Arc<AtomicUsize>,
}

impl RowSender {
    /// Deliver a row; `false` once the consumer has gone away.
    pub(crate) async fn send(&self, row: CustomDbRow) -> bool {
        self.fetched.fetch_add(1, Ordering::AcqRel);
        self.sender.send(Ok(row)).await.is_ok()
    }

    /// Blocking-thread variant of [`RowSender::send`].
    pub(crate) fn blocking_send(&self, row: CustomDbRow) -> bool {
        self.fetched.fetch_add(1, Ordering::AcqRel);
        self.sender.blocking_send(Ok(row)).is_ok()
    }

    pub(crate) async fn fail(&self, err: SqlConduitError) {
        tracing::error!(error = %err, "stream terminated by backend error");
        let _ = self.sender.send(Err(err)).await;
    }

    pub(crate) fn blocking_fail(&self, err: SqlConduitError) {
        tracing::error!(error = %err, "stream terminated by backend error");
        let _ = self.sender.blocking_send(Err(err));
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub(crate) fn row_channel(object_mode: bool) -> (RowSender, QueryStream) {
    let (sender, receiver) = mpsc::channel(PREFETCH_WINDOW);
    let fetched = Arc::new(AtomicUsize::new(0));
    (
        RowSender {
            sender,
            fetched: Arc::clone(&fetched),
        },
        QueryStream {
            receiver,
            object_mode,
            fetched,
            done: false,
        },
    )
}
