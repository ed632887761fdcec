use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures::{
    Stream, StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};

use crate::error::{ClientError, Result};

/// Lazy, single-pass body: a stream of byte chunks.
///
/// A body handed out by a transport holds on to the underlying connection
/// until it is read to the end or dropped. Call [`Content::drain`] when the
/// payload is not needed but the exchange should complete cleanly.
pub struct Content {
    chunks: BoxStream<'static, Result<Bytes>>,
}

impl Content {
    pub fn empty() -> Self {
        Self {
            chunks: stream::empty().boxed(),
        }
    }

    pub fn from_stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            chunks: chunks.boxed(),
        }
    }

    /// Reads the whole body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        let mut chunks = self.chunks;
        let Some(first) = chunks.try_next().await? else {
            return Ok(Bytes::new());
        };
        let Some(second) = chunks.try_next().await? else {
            return Ok(first);
        };
        let mut buffer = BytesMut::with_capacity(first.len() + second.len());
        buffer.extend_from_slice(&first);
        buffer.extend_from_slice(&second);
        while let Some(chunk) = chunks.try_next().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    /// Consumes and discards the remaining chunks.
    pub async fn drain(self) -> Result<()> {
        self.chunks
            .try_for_each(|_| async { Ok::<_, ClientError>(()) })
            .await
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content").finish_non_exhaustive()
    }
}

impl Stream for Content {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.poll_next_unpin(cx)
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        Self {
            chunks: stream::once(async move { Ok::<_, ClientError>(bytes) }).boxed(),
        }
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Bytes::from(text).into()
    }
}

impl From<&'static str> for Content {
    fn from(text: &'static str) -> Self {
        Bytes::from_static(text.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn test_collects_all_chunks() {
        smol::block_on(async {
            let content = Content::from_stream(stream::iter(vec![
                Ok(Bytes::from_static(b"hello")),
                Ok(Bytes::from_static(b", ")),
                Ok(Bytes::from_static(b"world")),
            ]));

            assert_eq!(content.bytes().await.unwrap(), Bytes::from_static(b"hello, world"));
        });
    }

    #[test]
    fn test_empty_content() {
        smol::block_on(async {
            assert!(Content::empty().bytes().await.unwrap().is_empty());
            assert!(Content::from("").bytes().await.unwrap().is_empty());
        });
    }

    #[test]
    fn test_drain_consumes_every_chunk() {
        smol::block_on(async {
            let polled = Arc::new(AtomicUsize::new(0));
            let counter = polled.clone();
            let content = Content::from_stream(stream::iter(0..5).map(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from_static(b"x"))
            }));

            content.drain().await.unwrap();

            assert_eq!(polled.load(Ordering::SeqCst), 5);
        });
    }

    #[test]
    fn test_errors_propagate() {
        smol::block_on(async {
            let content = Content::from_stream(stream::iter(vec![
                Ok(Bytes::from_static(b"partial")),
                Err(ClientError::Timeout("reading body")),
            ]));

            assert!(matches!(
                content.bytes().await,
                Err(ClientError::Timeout("reading body"))
            ));
        });
    }
}
