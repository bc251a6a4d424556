//! [`SerialLink`] – one reader task per physical link.
//!
//! # Handshake
//!
//! | Direction | Byte | Meaning |
//! |---|---|---|
//! | host → device | `0x04` | start alignment: emit the marker |
//! | device → host | marker | repeated until acknowledged |
//! | host → device | `0x05` | alignment finished: stream records |
//!
//! The link owns its [`StreamAligner`] exclusively, so no locking is needed
//! between reads. A [`ResetHandle`] lets another task force a re-alignment.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use topica_types::TopicaError;
use tracing::{debug, info};

use crate::aligner::StreamAligner;
use crate::sink::RecordSink;

/// Sent when the link opens and after every reset.
pub const START_ALIGNMENT: u8 = 0x04;
/// Sent once the marker has been found.
pub const FINISHED_ALIGNMENT: u8 = 0x05;

const READ_CHUNK: usize = 512;

/// Counters returned when a link stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    pub bytes_read: u64,
    pub records: u64,
    pub alignments: u64,
}

/// Requests a re-alignment of a running [`SerialLink`].
#[derive(Clone)]
pub struct ResetHandle {
    notify: Arc<Notify>,
}

impl ResetHandle {
    pub fn request(&self) {
        self.notify.notify_one();
    }
}

pub struct SerialLink {
    name: String,
    aligner: StreamAligner,
    reset: Arc<Notify>,
}

impl SerialLink {
    pub fn new(name: impl Into<String>, aligner: StreamAligner) -> Self {
        Self {
            name: name.into(),
            aligner,
            reset: Arc::new(Notify::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reset_handle(&self) -> ResetHandle {
        ResetHandle {
            notify: Arc::clone(&self.reset),
        }
    }

    /// Read until EOF or cancellation, handing every record to `sink`.
    ///
    /// # Errors
    ///
    /// [`TopicaError::Io`] when reading from or acknowledging to the device
    /// fails.
    #[tracing::instrument(name = "serial_link", skip_all, fields(link = %self.name))]
    pub async fn run<R, W, S>(
        mut self,
        mut reader: R,
        mut writer: W,
        mut sink: S,
        cancel: CancellationToken,
    ) -> Result<LinkStats, TopicaError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
        S: RecordSink,
    {
        let mut stats = LinkStats::default();
        let mut buf = vec![0u8; READ_CHUNK];
        let reset = Arc::clone(&self.reset);

        acknowledge(&mut writer, START_ALIGNMENT).await?;
        info!(link = %self.name, "serial link opened, waiting for alignment");

        loop {
            let n = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = reset.notified() => {
                    self.aligner.reset();
                    acknowledge(&mut writer, START_ALIGNMENT).await?;
                    info!(link = %self.name, "re-alignment requested");
                    continue;
                }
                read = reader.read(&mut buf) => read?,
            };
            if n == 0 {
                debug!(link = %self.name, "serial stream ended");
                break;
            }
            stats.bytes_read += n as u64;

            let outcome = self.aligner.feed(&buf[..n]);
            if outcome.newly_aligned {
                stats.alignments += 1;
                acknowledge(&mut writer, FINISHED_ALIGNMENT).await?;
                info!(link = %self.name, "serial link aligned");
            }
            for record in &outcome.records {
                sink.on_record(record);
            }
            stats.records += outcome.records.len() as u64;
        }

        info!(
            link = %self.name,
            bytes = stats.bytes_read,
            records = stats.records,
            "serial link closed"
        );
        Ok(stats)
    }
}

async fn acknowledge<W: AsyncWrite + Unpin>(writer: &mut W, byte: u8) -> Result<(), TopicaError> {
    writer.write_all(&[byte]).await?;
    writer.flush().await?;
    Ok(())
}
