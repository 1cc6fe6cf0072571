use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use framecast::core::{Encoder, EncoderHandle};
use framecast::error::CoreError;
use tokio::io::{duplex, AsyncWriteExt};

struct FakeProcess {
    killed: Arc<AtomicBool>,
}

#[async_trait]
impl framecast::core::KillableProcess for FakeProcess {
    async fn kill(&mut self) {
        self.killed.store(true, Ordering::SeqCst);
    }
}

/// An in-process stand-in for `ffmpeg` used by integration tests: writes a
/// fixed sequence of stdout chunks through a `tokio::io::duplex`, exactly
/// like `framecast::core::encoder::test_support::ScriptedEncoder`, but
/// redeclared here since that one lives behind `#[cfg(test)]` and isn't
/// visible across the crate boundary integration tests run in.
pub struct ScriptedEncoder {
    pub chunks: Vec<Vec<u8>>,
}

impl ScriptedEncoder {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self { chunks }
    }
}

impl Encoder for ScriptedEncoder {
    fn spawn(&self, _source_path: &Path) -> Result<EncoderHandle, CoreError> {
        let (mut writer, reader) = duplex(64 * 1024);
        let chunks = self.chunks.clone();
        let killed = Arc::new(AtomicBool::new(false));

        tokio::spawn(async move {
            for chunk in chunks {
                if writer.write_all(&chunk).await.is_err() {
                    return;
                }
            }
        });

        Ok(EncoderHandle::new(
            Box::new(reader),
            None,
            Box::new(FakeProcess { killed }),
        ))
    }
}
