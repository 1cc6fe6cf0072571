use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::CoreError;

/// A running encoder process: a readable stdout, an optional line-buffered
/// stderr for diagnostic logging, and a way to kill it.
///
/// This is the "replaceable collaborator" the design calls for: production
/// code gets one from [`FfmpegEncoder`], tests get one from a scripted
/// in-process generator, and [`crate::core::job::TranscodeJob`] only ever
/// sees this trait.
pub struct EncoderHandle {
    pub stdout: Box<dyn AsyncRead + Unpin + Send>,
    pub stderr: Option<Box<dyn AsyncBufRead + Unpin + Send>>,
    process: Box<dyn KillableProcess>,
}

impl EncoderHandle {
    pub fn new(
        stdout: Box<dyn AsyncRead + Unpin + Send>,
        stderr: Option<Box<dyn AsyncBufRead + Unpin + Send>>,
        process: Box<dyn KillableProcess>,
    ) -> Self {
        Self {
            stdout,
            stderr,
            process,
        }
    }

    pub async fn kill(&mut self) {
        self.process.kill().await;
    }
}

#[async_trait]
pub trait KillableProcess: Send {
    async fn kill(&mut self);
}

/// Spawns the external transcoder and hands back a stdout/stderr pair.
///
/// Implementations must not block the calling task: `spawn` only starts the
/// process, it does not wait for any output.
pub trait Encoder: Send + Sync {
    fn spawn(&self, source_path: &Path) -> Result<EncoderHandle, CoreError>;
}

/// Production encoder: invokes `ffmpeg` on the host `PATH` with the fixed
/// argument list from the design (stream mapping, x264 parameters, fragmented
/// MP4 muxing to stdout).
pub struct FfmpegEncoder {
    binary: String,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

struct ChildProcess(tokio::process::Child);

#[async_trait]
impl KillableProcess for ChildProcess {
    async fn kill(&mut self) {
        let _ = self.0.kill().await;
    }
}

impl Encoder for FfmpegEncoder {
    fn spawn(&self, source_path: &Path) -> Result<EncoderHandle, CoreError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-i")
            .arg(source_path)
            .arg("-map_metadata")
            .arg("-1")
            .arg("-map_chapters")
            .arg("-1")
            .arg("-threads")
            .arg("0")
            .arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("0:a:0")
            .arg("-codec:v")
            .arg("libx264")
            .arg("-preset")
            .arg("medium")
            .arg("-profile:v")
            .arg("high")
            .arg("-level")
            .arg("4.1")
            .arg("-crf")
            .arg("12")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-codec:a")
            .arg("aac")
            .arg("-ac")
            .arg("2")
            .arg("-b:a")
            .arg("384k")
            .arg("-movflags")
            .arg("frag_keyframe+empty_moov+default_base_moof")
            .arg("-frag_duration")
            .arg("1000")
            .arg("-f")
            .arg("mp4")
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(?cmd, "spawning ffmpeg");

        let mut child = cmd
            .spawn()
            .map_err(|e| CoreError::StartError(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::StartError("ffmpeg stdout not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .map(|s| Box::new(BufReader::new(s)) as Box<dyn AsyncBufRead + Unpin + Send>);

        Ok(EncoderHandle::new(
            Box::new(stdout),
            stderr,
            Box::new(ChildProcess(child)),
        ))
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::io::{duplex, AsyncWriteExt};

    struct FakeProcess {
        killed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl KillableProcess for FakeProcess {
        async fn kill(&mut self) {
            self.killed.store(true, Ordering::SeqCst);
        }
    }

    /// An encoder whose production is scripted up front: a fixed sequence
    /// of stdout chunks, with an optional artificial delay between them and
    /// an optional induced start failure. Used by core and HTTP-layer tests
    /// in place of a real `ffmpeg` binary.
    pub struct ScriptedEncoder {
        pub chunks: Vec<Vec<u8>>,
        pub fail_to_start: bool,
    }

    impl ScriptedEncoder {
        pub fn ok(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks,
                fail_to_start: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                chunks: vec![],
                fail_to_start: true,
            }
        }
    }

    impl Encoder for ScriptedEncoder {
        fn spawn(&self, _source_path: &Path) -> Result<EncoderHandle, CoreError> {
            if self.fail_to_start {
                return Err(CoreError::StartError("scripted failure".to_string()));
            }

            let (mut writer, reader) = duplex(64 * 1024);
            let chunks = self.chunks.clone();
            let killed = Arc::new(AtomicBool::new(false));
            let killed_writer = killed.clone();

            tokio::spawn(async move {
                for chunk in chunks {
                    if killed_writer.load(Ordering::SeqCst) {
                        return;
                    }
                    if writer.write_all(&chunk).await.is_err() {
                        return;
                    }
                }
                // Dropping `writer` here signals EOF to the reader.
            });

            Ok(EncoderHandle::new(
                Box::new(reader),
                None,
                Box::new(FakeProcess { killed }),
            ))
        }
    }
}
