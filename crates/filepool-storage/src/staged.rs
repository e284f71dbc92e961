//! Staged payload management.
//!
//! Between receipt and provider upload, file bytes are held either in memory
//! or in a temp file (above the configured spill threshold). The staged
//! resource is released exactly once on every exit path: explicitly via
//! [`StagedPayload::release`], or on drop for error and cancellation paths.
//! Temp-file deletion failure is logged and never replaces the request
//! outcome.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tempfile::NamedTempFile;

static LIVE_PAYLOADS: AtomicUsize = AtomicUsize::new(0);

/// Number of staged payloads currently held. Exposed for leak checks.
pub fn live_payloads() -> usize {
    LIVE_PAYLOADS.load(Ordering::SeqCst)
}

enum Source {
    Memory(Bytes),
    Disk(NamedTempFile),
}

/// A staged upload payload (memory buffer or temp-file handle).
pub struct StagedPayload {
    // None only after Drop has taken the source.
    source: Option<Source>,
    len: usize,
}

impl StagedPayload {
    /// Stage the payload, spilling to a temp file when it exceeds the
    /// threshold.
    pub fn stage(data: Bytes, spill_threshold: usize) -> std::io::Result<Self> {
        if data.len() > spill_threshold {
            Self::on_disk(&data)
        } else {
            Ok(Self::in_memory(data))
        }
    }

    pub fn in_memory(data: Bytes) -> Self {
        let len = data.len();
        LIVE_PAYLOADS.fetch_add(1, Ordering::SeqCst);
        StagedPayload {
            source: Some(Source::Memory(data)),
            len,
        }
    }

    pub fn on_disk(data: &[u8]) -> std::io::Result<Self> {
        let mut file = NamedTempFile::new()?;
        file.write_all(data)?;
        file.flush()?;
        LIVE_PAYLOADS.fetch_add(1, Ordering::SeqCst);
        Ok(StagedPayload {
            source: Some(Source::Disk(file)),
            len: data.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_on_disk(&self) -> bool {
        matches!(self.source, Some(Source::Disk(_)))
    }

    /// The payload bytes, read back from disk when spilled.
    ///
    /// `Bytes` is reference-counted, so the memory case is a cheap clone.
    pub async fn bytes(&self) -> std::io::Result<Bytes> {
        match &self.source {
            Some(Source::Memory(data)) => Ok(data.clone()),
            Some(Source::Disk(file)) => {
                let data = tokio::fs::read(file.path()).await?;
                Ok(Bytes::from(data))
            }
            None => unreachable!("staged payload accessed after release"),
        }
    }

    /// Release the staged resource. Dropping has the same effect; this method
    /// exists to make the success path explicit.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for StagedPayload {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            if let Source::Disk(file) = source {
                let path = file.path().to_path_buf();
                if let Err(e) = file.close() {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "Failed to delete staged temp file"
                    );
                }
            }
            LIVE_PAYLOADS.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
