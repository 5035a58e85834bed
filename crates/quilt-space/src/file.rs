//! File reader and writer.
//!
//! A file's content is the left-fold of its delta records in timestamp
//! order over the empty buffer. The reader replays the chain into a
//! byte reader; the writer replays into `old`, lets the caller build
//! `new`, and on close appends `Difference(old, new)` as sealed delta
//! records with strictly increasing timestamps, then mines.

use std::io::{Cursor, Read};
use std::ops::ControlFlow;

use quilt_core::payload::{self, Delta};
use quilt_node::{now_millis, Node, WriteOptions};

use crate::diff::{chunk, difference, replay};
use crate::error::Result;
use crate::space::delta_channel;

/// Largest insert carried by one delta record, leaving headroom under
/// the payload limit for the envelope and framing.
pub const MAX_INSERT_BYTES: usize = 8 * 1024 * 1024;

/// Replay a file's delta chain.
///
/// Returns the content and the newest delta timestamp (0 when empty).
pub(crate) async fn load_content(node: &Node, mid: &str) -> Result<(Vec<u8>, i64)> {
    let channel = delta_channel(mid);
    let mut deltas: Vec<(i64, Delta)> = Vec::new();

    node.read(&channel, 0, |event| {
        if let Ok(delta) = payload::from_bytes::<Delta>(&event.payload) {
            deltas.push((event.record.timestamp, delta));
        }
        ControlFlow::Continue(())
    })
    .await?;

    deltas.sort_by_key(|(timestamp, _)| *timestamp);
    let latest = deltas.last().map(|(timestamp, _)| *timestamp).unwrap_or(0);
    let content = replay(deltas.iter().map(|(_, delta)| delta))?;
    Ok((content, latest))
}

/// A positioned reader over a file's replayed content.
pub struct FileReader {
    cursor: Cursor<Vec<u8>>,
}

impl FileReader {
    /// Refresh the delta channel and replay it.
    pub async fn open(node: &Node, mid: &str) -> Result<Self> {
        let (content, _) = load_content(node, mid).await?;
        Ok(Self {
            cursor: Cursor::new(content),
        })
    }

    /// The full content.
    pub fn content(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

/// An in-progress write to a file.
pub struct FileWriter<'n> {
    node: &'n Node,
    mid: String,
    old: Vec<u8>,
    new: Vec<u8>,
    next_timestamp: i64,
}

impl<'n> FileWriter<'n> {
    /// Open a writer: replay current content and copy it as the working
    /// buffer.
    pub async fn open(node: &'n Node, mid: &str) -> Result<FileWriter<'n>> {
        let (old, latest) = load_content(node, mid).await?;
        // Monotonic successor of the chain's newest delta, never behind
        // the clock.
        let next_timestamp = now_millis().max(latest + 1);
        Ok(Self {
            node,
            mid: mid.to_owned(),
            new: old.clone(),
            old,
            next_timestamp,
        })
    }

    /// The working buffer.
    pub fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.new
    }

    /// Replace the working buffer wholesale.
    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.new = content.into();
    }

    /// Diff, append delta records, and mine.
    ///
    /// Returns the number of delta records written; zero (and no mine)
    /// when the content did not change.
    pub async fn close(self) -> Result<usize> {
        let deltas = difference(&self.old, &self.new)?;
        if deltas.is_empty() {
            return Ok(0);
        }

        let channel = delta_channel(&self.mid);
        let recipients = [self.node.account().identity()];
        let mut timestamp = self.next_timestamp;
        let mut written = 0;

        for delta in deltas {
            for piece in chunk(delta, MAX_INSERT_BYTES) {
                self.node
                    .write(
                        &channel,
                        &payload::to_bytes(&piece)?,
                        &recipients,
                        WriteOptions {
                            timestamp: Some(timestamp),
                            ..Default::default()
                        },
                    )
                    .await?;
                timestamp += 1;
                written += 1;
            }
        }

        self.node.mine(&channel).await?;
        tracing::debug!(mid = %self.mid, deltas = written, "file updated");
        Ok(written)
    }
}

impl std::io::Write for FileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.new.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
