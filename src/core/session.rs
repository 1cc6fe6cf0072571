use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::buffer::ChunkedBuffer;
use super::encoder::Encoder;
use super::job::{TranscodeJob, ENCODER_DEADLINE};
use super::registry::{Notification, SubscriberRegistry};
use crate::error::CoreError;

/// Default idle time before a zero-subscriber buffer is reclaimed: 4 hours.
pub const BUFFER_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// The shared state for one source path: the chunk sequence, the
/// subscriber registry, the encoder's cancellation hook, and the armed/not
/// state of the reclamation timer.
///
/// Chunks and subscribers are each guarded by their own lock (see
/// [`ChunkedBuffer`] and [`SubscriberRegistry`]); nothing here requires a
/// single combined lock because every invariant that matters — monotone
/// `completed`, at-most-one notification per advance — is local to one of
/// the two sub-components.
pub struct TranscodeBuffer {
    pub chunks: ChunkedBuffer,
    pub subscribers: SubscriberRegistry,
    pub cancel: CancellationToken,
    timer_armed: AtomicBool,
    timer_handle: Mutex<Option<tokio::task::AbortHandle>>,
}

impl TranscodeBuffer {
    pub fn new() -> Self {
        Self {
            chunks: ChunkedBuffer::new(),
            subscribers: SubscriberRegistry::new(),
            cancel: CancellationToken::new(),
            timer_armed: AtomicBool::new(false),
            timer_handle: Mutex::new(None),
        }
    }

    pub fn has_armed_timer(&self) -> bool {
        self.timer_armed.load(Ordering::SeqCst)
    }
}

impl Default for TranscodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

struct ManagerInner {
    buffers: Mutex<HashMap<PathBuf, Arc<TranscodeBuffer>>>,
    encoder: Arc<dyn Encoder>,
    encoder_deadline: Duration,
    buffer_ttl: Duration,
    /// Optional cap on concurrently *running* encoder processes, shared
    /// across every path. `None` is unbounded. Grounded in the teacher's
    /// `jobs::queue::JobQueue` semaphore-gated dispatcher — here the permit
    /// is acquired by the job task itself (see `TranscodeJob::run`) rather
    /// than by a central dispatcher, since jobs here are one-per-path rather
    /// than pulled off a shared submission queue.
    encoder_limit: Option<Arc<Semaphore>>,
}

/// Deduplicates transcode jobs by source path, hands out [`Session`]s, and
/// schedules TTL-based reclamation of idle buffers.
///
/// Cheaply `Clone`-able (an `Arc` around the shared map), matching the
/// teacher's `SessionManager`/`AuthRateLimiter` idiom of self-contained,
/// independently lockable registries.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self::with_config(encoder, ENCODER_DEADLINE, BUFFER_TTL)
    }

    pub fn with_config(
        encoder: Arc<dyn Encoder>,
        encoder_deadline: Duration,
        buffer_ttl: Duration,
    ) -> Self {
        Self::with_limits(encoder, encoder_deadline, buffer_ttl, None)
    }

    /// Like [`Self::with_config`], with an optional cap on concurrently
    /// running encoders (`MEDIA_SERVER_MAX_CONCURRENT_ENCODERS`).
    pub fn with_limits(
        encoder: Arc<dyn Encoder>,
        encoder_deadline: Duration,
        buffer_ttl: Duration,
        max_concurrent_encoders: Option<usize>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                buffers: Mutex::new(HashMap::new()),
                encoder,
                encoder_deadline,
                buffer_ttl,
                encoder_limit: max_concurrent_encoders.map(|n| Arc::new(Semaphore::new(n))),
            }),
        }
    }

    /// Number of live buffers, for the health endpoint.
    pub fn buffer_count(&self) -> usize {
        self.inner.buffers.lock().len()
    }

    /// Start a session for `source_path`, reusing a running encoder for
    /// that path if one exists, or starting a fresh one if not.
    pub fn start(&self, client_addr: String, source_path: PathBuf) -> Result<Session, CoreError> {
        let buffer = self.resolve_buffer(&source_path)?;
        self.cancel_reclaim_timer(&buffer);

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel::<Notification>(1);
        buffer.subscribers.add(id, tx.clone());

        let initial_count = buffer.chunks.len() as i64;
        tokio::spawn(async move {
            let _ = tx.send(initial_count).await;
        });

        info!(
            session = %id,
            client = %client_addr,
            path = %source_path.display(),
            initial_count,
            "session started"
        );

        Ok(Session {
            id,
            client_addr,
            path: source_path,
            buffer,
            manager: self.clone(),
            rx,
            stopped: AtomicBool::new(false),
        })
    }

    /// Idempotent; removes the subscriber and arms a reclaim timer if that
    /// was the last one. Called by [`Session::stop`] — kept as a plain
    /// method on the manager because it needs to reach back into the
    /// buffer map to arm the timer's double-check closure.
    fn stop(&self, session_id: Uuid, path: &Path, buffer: &Arc<TranscodeBuffer>) {
        buffer.subscribers.remove(&session_id);
        if buffer.subscribers.is_empty() {
            self.arm_reclaim_timer(path.to_path_buf(), buffer.clone());
        }
        info!(session = %session_id, path = %path.display(), "session stopped");
    }

    fn resolve_buffer(&self, path: &Path) -> Result<Arc<TranscodeBuffer>, CoreError> {
        if let Some(existing) = self.inner.buffers.lock().get(path) {
            return Ok(existing.clone());
        }

        if !path.exists() {
            return Err(CoreError::NotFound);
        }

        let shell = Arc::new(TranscodeBuffer::new());

        let installed = {
            let mut map = self.inner.buffers.lock();
            match map.get(path) {
                Some(existing) => existing.clone(),
                None => {
                    map.insert(path.to_path_buf(), shell.clone());
                    shell.clone()
                }
            }
        };

        // Only the Start that actually installed the shell launches the
        // encoder — no orphaned process is ever spawned for a discarded
        // shell.
        if Arc::ptr_eq(&installed, &shell) {
            TranscodeJob::start(
                self.inner.encoder.clone(),
                path.to_path_buf(),
                shell.clone(),
                shell.cancel.clone(),
                self.inner.encoder_deadline,
                self.inner.encoder_limit.clone(),
            );
        }

        Ok(installed)
    }

    fn arm_reclaim_timer(&self, path: PathBuf, buffer: Arc<TranscodeBuffer>) {
        if buffer
            .timer_armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let manager = self.clone();
        let ttl = self.inner.buffer_ttl;
        let task = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            manager.fire_reclaim(&path, &buffer);
        });
        *buffer.timer_handle.lock() = Some(task.abort_handle());
    }

    /// A Start that finds an armed reclaim timer must cancel it before
    /// returning. Best-effort `abort()` is an optimization; correctness
    /// comes from the double-check inside `fire_reclaim`, which runs even
    /// if this abort loses the race.
    fn cancel_reclaim_timer(&self, buffer: &TranscodeBuffer) {
        if buffer
            .timer_armed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(handle) = buffer.timer_handle.lock().take() {
                handle.abort();
            }
        }
    }

    fn fire_reclaim(&self, path: &Path, buffer: &Arc<TranscodeBuffer>) {
        let cleaned_up = {
            let mut map = self.inner.buffers.lock();
            match map.get(path) {
                Some(existing) if Arc::ptr_eq(existing, buffer) && buffer.subscribers.is_empty() => {
                    map.remove(path);
                    true
                }
                _ => false,
            }
        };

        if cleaned_up {
            buffer.cancel.cancel();
            buffer.chunks.mark_finished();
            buffer.timer_armed.store(false, Ordering::SeqCst);
            info!(path = %path.display(), "buffer reclaimed after TTL");
        }
    }
}

/// The binding of one client to one [`TranscodeBuffer`] via one subscriber
/// sink. `stop` is idempotent and is also run on drop so a forgotten
/// cleanup call can never leak a subscriber entry.
pub struct Session {
    pub id: Uuid,
    pub client_addr: String,
    path: PathBuf,
    buffer: Arc<TranscodeBuffer>,
    manager: SessionManager,
    pub rx: mpsc::Receiver<Notification>,
    stopped: AtomicBool,
}

impl Session {
    pub fn buffer(&self) -> &TranscodeBuffer {
        &self.buffer
    }

    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.manager.stop(self.id, &self.path, &self.buffer);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
