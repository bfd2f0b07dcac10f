use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{future::join_all, stream::Stream, StreamExt};
use tokio::sync::mpsc;

use crate::{
    chat::{ChunkStream, StreamChunk},
    error::RelayError,
};

type Item = Result<StreamChunk, RelayError>;

/// Splits one chunk stream into `n` independent handles.
///
/// A pump task reads the source and copies every item into a per-handle
/// unbounded buffer, so each handle sees the same sequence at its own pace.
/// The pump stops, dropping the source, once the source ends or errors, or
/// once every handle has been closed.
///
/// Must be called from within a tokio runtime.
pub fn tee(source: ChunkStream, n: usize) -> Vec<StreamHandle> {
    if n == 0 {
        return Vec::new();
    }
    let (senders, handles): (Vec<_>, Vec<_>) = (0..n)
        .map(|index| {
            let (tx, rx) = mpsc::unbounded_channel();
            (tx, StreamHandle::new(index, rx))
        })
        .unzip();
    tokio::spawn(pump(source, senders));
    handles
}

async fn pump(mut source: ChunkStream, mut senders: Vec<mpsc::UnboundedSender<Item>>) {
    loop {
        let item = tokio::select! {
            biased;
            _ = join_all(senders.iter().map(|tx| tx.closed())) => {
                log::debug!("all tee handles closed, releasing source");
                return;
            }
            item = source.next() => item,
        };

        let Some(item) = item else {
            return;
        };
        let failed = item.is_err();
        senders.retain(|tx| tx.send(item.clone()).is_ok());
        if failed || senders.is_empty() {
            return;
        }
    }
}

/// One branch of a tee.
///
/// `recv` yields chunks in producer order and returns `None` once the source
/// ended and this handle's buffer is drained, after a terminal chunk, or after
/// the handle has been closed.
#[derive(Debug)]
pub struct StreamHandle {
    index: usize,
    receiver: mpsc::UnboundedReceiver<Item>,
    finished: bool,
}

impl StreamHandle {
    fn new(index: usize, receiver: mpsc::UnboundedReceiver<Item>) -> Self {
        Self {
            index,
            receiver,
            finished: false,
        }
    }

    /// Position of this handle in the tee output.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Receives the next chunk. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Item> {
        self.next().await
    }

    /// Stops delivery to this handle and frees its buffered chunks.
    ///
    /// Other handles keep receiving.
    pub fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }

    pub fn is_closed(&self) -> bool {
        self.finished
    }
}

impl Stream for StreamHandle {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if chunk.is_terminal() {
                    self.close();
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                self.close();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "tee_tests.rs"]
mod tests;
