//! The shared transcode session manager: a content-addressed,
//! single-producer / many-consumer streaming buffer. This module has no
//! dependency on Axum, Clap, or any concrete HTTP type — everything in
//! `crate::http` is an external collaborator that only talks to the types
//! exported here.

pub mod buffer;
pub mod encoder;
pub mod job;
pub mod registry;
pub mod session;

pub use buffer::{Chunk, ChunkedBuffer};
pub use encoder::{Encoder, EncoderHandle, FfmpegEncoder, KillableProcess};
pub use job::{TranscodeJob, ENCODER_DEADLINE};
pub use registry::{Notification, SubscriberRegistry, START_FAILURE};
pub use session::{Session, SessionManager, TranscodeBuffer, BUFFER_TTL};

/// Scratch size per stdout read. The actual chunk size is whatever one
/// short read returns, not this target.
pub const CHUNK_READ_TARGET: usize = 1024 * 1024;

/// Soft cap on in-memory buffered transcode size. Advisory only — see
/// DESIGN.md for the decision not to enforce it (unbounded growth is an
/// acknowledged, pre-existing tradeoff, not a regression introduced here).
pub const MAX_BUFFER_SIZE: usize = 5 * 1024 * 1024 * 1024;
