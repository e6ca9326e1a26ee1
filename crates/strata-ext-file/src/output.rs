//! JSON-lines file output.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use strata_traits::error::TraitError;
use strata_traits::output::{AlertSink, PriceSink, PricingAlert};
use strata_traits::pricing::PriceRecord;
use strata_traits::transport::Codec;

// =============================================================================
// LINE WRITER
// =============================================================================

/// Appends one encoded value per line.
struct LineWriter<C> {
    path: PathBuf,
    codec: C,
    writer: Mutex<BufWriter<File>>,
    lines: AtomicU64,
}

impl<C: Codec> LineWriter<C> {
    async fn open(path: impl AsRef<Path>, codec: C) -> Result<Self, TraitError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TraitError::IoError(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            codec,
            writer: Mutex::new(BufWriter::new(file)),
            lines: AtomicU64::new(0),
        })
    }

    async fn append<T: Serialize + Sync>(&self, value: &T) -> Result<(), TraitError> {
        let encoded = self.codec.encode(value)?;
        if encoded.contains(&b'\n') {
            return Err(TraitError::SerializationError(format!(
                "{} codec output spans lines",
                self.codec.content_type()
            )));
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await?;
        writer.write_all(b"\n").await?;
        self.lines.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&self) -> Result<(), TraitError> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

// =============================================================================
// SINKS
// =============================================================================

/// Price sink writing one record per line.
///
/// Output is buffered; records reach the file on [`PriceSink::flush`].
pub struct FilePriceSink<C> {
    inner: LineWriter<C>,
}

impl<C: Codec> FilePriceSink<C> {
    /// Open (or create) `path` for appending.
    pub async fn open(path: impl AsRef<Path>, codec: C) -> Result<Self, TraitError> {
        Ok(Self {
            inner: LineWriter::open(path, codec).await?,
        })
    }

    /// Output file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Records written since opening.
    pub fn written(&self) -> u64 {
        self.inner.lines.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<C: Codec + 'static> PriceSink for FilePriceSink<C> {
    async fn publish(&self, record: &PriceRecord) -> Result<(), TraitError> {
        self.inner.append(record).await
    }

    async fn flush(&self) -> Result<(), TraitError> {
        self.inner.flush().await
    }
}

/// Alert sink writing one alert per line, flushed on every alert.
pub struct FileAlertSink<C> {
    inner: LineWriter<C>,
}

impl<C: Codec> FileAlertSink<C> {
    /// Open (or create) `path` for appending.
    pub async fn open(path: impl AsRef<Path>, codec: C) -> Result<Self, TraitError> {
        Ok(Self {
            inner: LineWriter::open(path, codec).await?,
        })
    }

    /// Output file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

#[async_trait]
impl<C: Codec + 'static> AlertSink for FileAlertSink<C> {
    async fn publish(&self, alert: &PricingAlert) -> Result<(), TraitError> {
        self.inner.append(alert).await?;
        self.inner.flush().await
    }
}
