//! Chunked file streaming
//!
//! A background task reads the file and hands chunks to the response body
//! through a single-slot channel, so a slow client throttles disk reads.

use crate::error::{TransferError, TransferResult};
use crate::fs::FileRoot;
use crate::logger;
use crate::transfer::cancel::CancellationSignal;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::io::SeekFrom;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Largest chunk handed to the consumer
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Open `path`, seek to `start` and stream up to `length` bytes
///
/// `length == 0` streams until end of file. Open and seek failures are
/// returned before any chunk is produced.
pub async fn open_chunk_stream(
    root: &FileRoot,
    path: &str,
    start: u64,
    length: u64,
    cancel: CancellationSignal,
) -> TransferResult<ChunkStream> {
    let mut file = root.open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;

    let budget = if length == 0 { u64::MAX } else { length };
    let (tx, rx) = mpsc::channel(1);

    logger::log_debug(&format!(
        "[Transfer] Streaming {path} from offset {start} ({})",
        if length == 0 { "to EOF".to_string() } else { format!("{length} bytes") }
    ));

    let producer = tokio::spawn(produce_chunks(
        file,
        budget,
        tx,
        cancel.clone(),
        path.to_string(),
    ));

    Ok(ChunkStream {
        rx,
        cancel,
        producer,
        length: (length > 0).then_some(length),
    })
}

/// Producer loop; owns the file handle until it returns
///
/// Ends with `Err(Cancelled)` when stopped early. That outcome is never
/// handed to the consumer.
async fn produce_chunks(
    mut file: File,
    mut remaining: u64,
    tx: mpsc::Sender<TransferResult<Bytes>>,
    cancel: CancellationSignal,
    path: String,
) -> TransferResult<()> {
    while remaining > 0 {
        if cancel.is_fired() {
            logger::log_debug(&format!("[Transfer] Cancelled: {path}"));
            return Err(TransferError::Cancelled);
        }

        let want = usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE));
        let mut buf = vec![0u8; want];

        let count = match file.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(count) => count,
            Err(e) => {
                logger::log_error(&format!("Read failed mid-transfer for '{path}': {e}"));
                let reported = std::io::Error::new(e.kind(), e.to_string());
                let _ = tx.send(Err(TransferError::IoFault(reported))).await;
                return Err(TransferError::IoFault(e));
            }
        };

        buf.truncate(count);
        remaining = remaining.saturating_sub(count as u64);

        tokio::select! {
            biased;
            () = cancel.fired() => {
                logger::log_debug(&format!("[Transfer] Cancelled: {path}"));
                return Err(TransferError::Cancelled);
            }
            sent = tx.send(Ok(Bytes::from(buf))) => {
                if sent.is_err() {
                    // Consumer is gone
                    return Err(TransferError::Cancelled);
                }
            }
        }
    }
    Ok(())
}

/// Consumer side of a transfer, used directly as the response body
///
/// Yields chunks in file order. After the cancellation signal fires no
/// further chunk is yielded, including ones already queued. Dropping the
/// stream fires the signal.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::Receiver<TransferResult<Bytes>>,
    cancel: CancellationSignal,
    producer: JoinHandle<TransferResult<()>>,
    length: Option<u64>,
}

impl ChunkStream {
    /// Wait for the next chunk, `None` once the transfer has ended
    pub async fn next_chunk(&mut self) -> Option<TransferResult<Bytes>> {
        std::future::poll_fn(|cx| self.poll_chunk(cx)).await
    }

    /// Signal that stops this transfer when fired
    pub const fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }

    /// Whether the producer task has exited and released the file
    pub fn is_finished(&self) -> bool {
        self.producer.is_finished()
    }

    /// Wait for the producer to exit and report how the transfer ended
    ///
    /// `Err(Cancelled)` means it stopped before the window was exhausted.
    /// Call at most once.
    pub async fn outcome(&mut self) -> TransferResult<()> {
        (&mut self.producer)
            .await
            .map_err(|e| TransferError::IoFault(std::io::Error::other(e)))?
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<TransferResult<Bytes>>> {
        if self.cancel.is_fired() {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.cancel.fire();
    }
}

impl Body for ChunkStream {
    type Data = Bytes;
    type Error = TransferError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, TransferError>>> {
        self.get_mut()
            .poll_chunk(cx)
            .map(|item| item.map(|result| result.map(Frame::data)))
    }

    fn size_hint(&self) -> SizeHint {
        self.length.map_or_else(SizeHint::default, SizeHint::with_exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn fixture(len: usize) -> (TempDir, FileRoot, Vec<u8>) {
        let tmp = TempDir::new().unwrap();
        let data = pattern(len);
        std::fs::write(tmp.path().join("data.bin"), &data).unwrap();
        std::fs::create_dir(tmp.path().join("dir")).unwrap();
        let root = FileRoot::new(tmp.path());
        (tmp, root, data)
    }

    async fn collect(stream: &mut ChunkStream) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
            chunks.push(chunk.unwrap());
        }
        chunks
    }

    async fn wait_finished(stream: &ChunkStream) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !stream.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("producer should release the file");
    }

    #[tokio::test]
    async fn test_full_file_round_trip() {
        let (_tmp, root, data) = fixture(200_000);
        let mut stream = open_chunk_stream(&root, "data.bin", 0, data.len() as u64, CancellationSignal::new())
            .await
            .unwrap();

        let chunks = collect(&mut stream).await;
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= CHUNK_SIZE));
        assert_eq!(chunks.concat(), data);
        wait_finished(&stream).await;
        assert!(stream.outcome().await.is_ok());
    }

    #[tokio::test]
    async fn test_window_stops_at_length() {
        let (_tmp, root, data) = fixture(200_000);
        let mut stream = open_chunk_stream(&root, "data.bin", 1000, 70_000, CancellationSignal::new())
            .await
            .unwrap();

        let chunks = collect(&mut stream).await;
        let sizes: Vec<_> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, [CHUNK_SIZE, 70_000 - CHUNK_SIZE]);
        assert_eq!(chunks.concat(), &data[1000..71_000]);
    }

    #[tokio::test]
    async fn test_zero_length_streams_to_eof() {
        let (_tmp, root, data) = fixture(10_000);
        let mut stream = open_chunk_stream(&root, "data.bin", 100, 0, CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(collect(&mut stream).await.concat(), &data[100..]);
    }

    #[tokio::test]
    async fn test_budget_past_eof_stops_at_eof() {
        let (_tmp, root, data) = fixture(1000);
        let mut stream = open_chunk_stream(&root, "data.bin", 500, 5000, CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(collect(&mut stream).await.concat(), &data[500..]);
    }

    #[tokio::test]
    async fn test_open_failure_surfaces_before_chunks() {
        let (_tmp, root, _) = fixture(10);
        let result = open_chunk_stream(&root, "missing.bin", 0, 0, CancellationSignal::new()).await;
        assert!(matches!(result, Err(TransferError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_after_first_chunk() {
        let (_tmp, root, data) = fixture(CHUNK_SIZE * 8);
        let cancel = CancellationSignal::new();
        let mut stream = open_chunk_stream(&root, "data.bin", 0, data.len() as u64, cancel.clone())
            .await
            .unwrap();

        let first = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(first, &data[..CHUNK_SIZE]);

        cancel.fire();
        assert!(stream.next_chunk().await.is_none());
        assert!(stream.next_chunk().await.is_none());
        wait_finished(&stream).await;
        assert!(matches!(stream.outcome().await, Err(TransferError::Cancelled)));
    }

    #[tokio::test]
    async fn test_drop_fires_cancellation() {
        let (_tmp, root, data) = fixture(CHUNK_SIZE * 4);
        let stream = open_chunk_stream(&root, "data.bin", 0, data.len() as u64, CancellationSignal::new())
            .await
            .unwrap();
        let signal = stream.cancellation().clone();
        drop(stream);
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn test_size_hint() {
        let (_tmp, root, _) = fixture(1000);
        let bounded = open_chunk_stream(&root, "data.bin", 0, 400, CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(bounded.size_hint().exact(), Some(400));

        let unbounded = open_chunk_stream(&root, "data.bin", 0, 0, CancellationSignal::new())
            .await
            .unwrap();
        assert_eq!(unbounded.size_hint().exact(), None);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_read_error_is_propagated() {
        let (_tmp, root, _) = fixture(10);
        // Opening a directory succeeds on Linux but reading it fails
        let mut stream = open_chunk_stream(&root, "dir", 0, 0, CancellationSignal::new())
            .await
            .unwrap();

        assert!(matches!(
            stream.next_chunk().await,
            Some(Err(TransferError::IoFault(_)))
        ));
        assert!(stream.next_chunk().await.is_none());
        wait_finished(&stream).await;
        assert!(matches!(stream.outcome().await, Err(TransferError::IoFault(_))));
    }
}
