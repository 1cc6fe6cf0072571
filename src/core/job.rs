use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::encoder::Encoder;
use super::registry::{SubscriberRegistry, START_FAILURE};
use super::session::TranscodeBuffer;
use super::CHUNK_READ_TARGET;

/// Default upper bound on a single transcode: 4 hours.
pub const ENCODER_DEADLINE: Duration = Duration::from_secs(4 * 60 * 60);

/// Owns one external encoder process for one [`TranscodeBuffer`], feeding its
/// stdout into the buffer as chunks and notifying subscribers as it goes.
///
/// State machine: `Preparing -> Running -> Terminal`. All three transitions
/// out of `Running`/`Preparing` are handled inline in [`run`] — there is
/// deliberately no separate state enum, since each transition's body *is*
/// the terminal action (mark finished, drain registry, notify).
pub struct TranscodeJob;

impl TranscodeJob {
    /// Spawn the job as a background task. Returns immediately; the task
    /// itself drives the buffer until the encoder reaches a terminal state.
    pub fn start(
        encoder: Arc<dyn Encoder>,
        source_path: PathBuf,
        buffer: Arc<TranscodeBuffer>,
        cancel: CancellationToken,
        deadline: Duration,
        encoder_limit: Option<Arc<Semaphore>>,
    ) {
        tokio::spawn(async move {
            Self::run(encoder, source_path, buffer, cancel, deadline, encoder_limit).await;
        });
    }

    async fn run(
        encoder: Arc<dyn Encoder>,
        source_path: PathBuf,
        buffer: Arc<TranscodeBuffer>,
        cancel: CancellationToken,
        deadline: Duration,
        encoder_limit: Option<Arc<Semaphore>>,
    ) {
        // Held for the lifetime of this function so the slot is released the
        // moment the job reaches a terminal state, same shape as the
        // teacher's dispatcher holding `_permit` across job execution.
        let _permit = match encoder_limit {
            Some(sem) => match sem.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => None,
            },
            None => None,
        };

        let mut handle = match encoder.spawn(&source_path) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(path = %source_path.display(), error = %e, "encoder failed to start");
                buffer.chunks.mark_finished();
                let sinks = buffer.subscribers.drain();
                SubscriberRegistry::broadcast_terminal(&sinks, START_FAILURE).await;
                return;
            }
        };

        if let Some(stderr) = handle.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        let mut scratch = vec![0u8; CHUNK_READ_TARGET];

        let deadline_sleep = tokio::time::sleep(deadline);
        tokio::pin!(deadline_sleep);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(path = %source_path.display(), "transcode cancelled, killing encoder");
                    handle.kill().await;
                    Self::finish(&buffer).await;
                    return;
                }

                _ = &mut deadline_sleep => {
                    warn!(path = %source_path.display(), "encoder deadline exceeded, killing encoder");
                    handle.kill().await;
                    Self::finish(&buffer).await;
                    return;
                }

                read = handle.stdout.read(&mut scratch) => {
                    match read {
                        Ok(0) => {
                            debug!(path = %source_path.display(), "encoder stdout reached EOF");
                            Self::finish(&buffer).await;
                            return;
                        }
                        Ok(n) => {
                            // Copy defensively: `scratch` is reused on the next read.
                            let copy: Arc<[u8]> = Arc::from(&scratch[..n]);
                            let count = buffer.chunks.append(copy);
                            let sinks = buffer.subscribers.snapshot();
                            SubscriberRegistry::broadcast(&sinks, count as i64);
                        }
                        Err(e) => {
                            // Read errors and EOF are indistinguishable by design.
                            debug!(path = %source_path.display(), error = %e, "encoder stdout read ended");
                            Self::finish(&buffer).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Drains the registry and delivers the final `completed` count to every
    /// subscriber with a blocking send: unlike the per-chunk `try_send` in
    /// the read loop above, this terminal notification must never be
    /// silently dropped, or a lagging adaptor could end up stuck on a stale
    /// count with no further message coming (§4.2).
    async fn finish(buffer: &TranscodeBuffer) {
        buffer.chunks.mark_finished();
        let final_count = buffer.chunks.len() as i64;
        let sinks = buffer.subscribers.drain();
        SubscriberRegistry::broadcast_terminal(&sinks, final_count).await;
    }
}

async fn drain_stderr(mut stderr: Box<dyn tokio::io::AsyncBufRead + Unpin + Send>) {
    let mut line = String::new();
    loop {
        line.clear();
        match stderr.read_line(&mut line).await {
            Ok(0) => return,
            Ok(_) => debug!(target: "encoder", "{}", line.trim_end()),
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::encoder::test_support::ScriptedEncoder;
    use std::path::Path;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn successful_run_delivers_final_count_and_marks_finished() {
        let encoder: Arc<dyn Encoder> =
            Arc::new(ScriptedEncoder::ok(vec![b"abc".to_vec(), b"de".to_vec()]));
        let buffer = Arc::new(TranscodeBuffer::new());

        let (tx, mut rx) = mpsc::channel(1);
        buffer.subscribers.add(uuid::Uuid::new_v4(), tx);

        TranscodeJob::start(
            encoder,
            PathBuf::from("/dev/null"),
            buffer.clone(),
            CancellationToken::new(),
            Duration::from_secs(5),
            None,
        );

        let mut last_seen = 0;
        loop {
            let msg = rx.recv().await.expect("channel closed early");
            assert!(msg >= 0);
            last_seen = msg;
            if buffer.chunks.finished() && (last_seen as usize) >= buffer.chunks.len() {
                break;
            }
        }

        assert!(buffer.chunks.finished());
        assert_eq!(buffer.chunks.len(), 2);
        assert_eq!(&*buffer.chunks.get(0).unwrap().bytes, b"abc");
        assert_eq!(&*buffer.chunks.get(1).unwrap().bytes, b"de");
    }

    #[tokio::test]
    async fn start_failure_sends_negative_notification_and_drains() {
        let encoder: Arc<dyn Encoder> = Arc::new(ScriptedEncoder::failing());
        let buffer = Arc::new(TranscodeBuffer::new());

        let (tx, mut rx) = mpsc::channel(1);
        buffer.subscribers.add(uuid::Uuid::new_v4(), tx);

        TranscodeJob::start(
            encoder,
            PathBuf::from("/dev/null"),
            buffer.clone(),
            CancellationToken::new(),
            Duration::from_secs(5),
            None,
        );

        let msg = rx.recv().await.expect("channel closed early");
        assert_eq!(msg, START_FAILURE);
        assert!(buffer.chunks.finished());
        assert!(buffer.subscribers.is_empty());
    }

    #[tokio::test]
    async fn cancellation_kills_encoder_and_finishes_buffer() {
        // A single large chunk the writer will block on forever once the
        // duplex's internal buffer fills, so cancellation is what ends the
        // job rather than EOF.
        let encoder: Arc<dyn Encoder> = Arc::new(ScriptedEncoder::ok(vec![vec![0u8; 1]]));
        let buffer = Arc::new(TranscodeBuffer::new());
        let cancel = CancellationToken::new();

        let (tx, mut rx) = mpsc::channel(1);
        buffer.subscribers.add(uuid::Uuid::new_v4(), tx);

        TranscodeJob::start(
            encoder,
            PathBuf::from("/dev/null"),
            buffer.clone(),
            cancel.clone(),
            Duration::from_secs(30),
            None,
        );

        cancel.cancel();

        // Either the lone chunk notification or the terminal drain arrives;
        // in both cases the buffer ends up finished.
        while !buffer.chunks.finished() {
            let _ = rx.recv().await;
        }
        assert!(buffer.chunks.finished());
    }

    #[test]
    fn encoder_command_contract_is_stable() {
        // Smoke-test that FfmpegEncoder can be constructed pointed at an
        // arbitrary binary name without touching the filesystem.
        let _ = super::super::encoder::FfmpegEncoder::with_binary("ffmpeg");
        let _ = Path::new("/tmp");
    }
}
