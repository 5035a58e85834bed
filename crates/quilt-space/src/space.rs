//! File metadata and tags.
//!
//! Each owner has a meta channel, `Meta-<alias>`, with one sealed record
//! per file; the record's hash, base64url-encoded, is the file id
//! (`mid`). Each file has a delta channel `Delta-<mid>` holding its edit
//! history and a tag channel `Tag-<mid>` with one record per tag, each
//! referencing the meta record.

use std::ops::ControlFlow;
use std::sync::Arc;

use quilt_core::payload::{self, FileMeta, Tag};
use quilt_core::{Alias, ChannelName, Hash, Reference};
use quilt_node::{Node, WriteOptions};

use crate::error::{Result, SpaceError};

/// The per-owner meta channel.
pub fn meta_channel(owner: &Alias) -> ChannelName {
    ChannelName::new(format!("Meta-{owner}")).expect("alias characters are name characters")
}

/// The per-file delta channel.
pub fn delta_channel(mid: &str) -> ChannelName {
    ChannelName::new(format!("Delta-{mid}")).expect("base64url characters are name characters")
}

/// The per-file tag channel.
pub fn tag_channel(mid: &str) -> ChannelName {
    ChannelName::new(format!("Tag-{mid}")).expect("base64url characters are name characters")
}

/// The file layer over a node.
pub struct Space {
    node: Arc<Node>,
}

impl Space {
    /// Wrap a node.
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    /// The underlying node.
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Create a file: a sealed meta record, mined into the owner's meta
    /// channel. Returns the file id.
    pub async fn create_file(&self, name: &str, mime: &str) -> Result<String> {
        let meta = FileMeta {
            name: name.to_owned(),
            mime: mime.to_owned(),
        };
        let channel = meta_channel(self.node.account().alias());
        let recipients = [self.node.account().identity()];

        let hash = self
            .node
            .write(
                &channel,
                &payload::to_bytes(&meta)?,
                &recipients,
                WriteOptions::default(),
            )
            .await?;
        self.node.mine(&channel).await?;

        Ok(hash.to_base64url())
    }

    /// List the owner's files as (mid, meta) pairs, newest first.
    pub async fn files(&self) -> Result<Vec<(String, FileMeta)>> {
        let channel = meta_channel(self.node.account().alias());
        let mut files = Vec::new();
        self.node
            .read(&channel, 0, |event| {
                if let Ok(meta) = payload::from_bytes::<FileMeta>(&event.payload) {
                    files.push((event.hash.to_base64url(), meta));
                }
                ControlFlow::Continue(())
            })
            .await?;
        Ok(files)
    }

    /// Look a file's meta record up by id.
    pub async fn meta(&self, mid: &str) -> Result<FileMeta> {
        let wanted = Hash::from_base64url(mid)?;
        let channel = meta_channel(self.node.account().alias());
        let mut found = None;
        self.node
            .read(&channel, 0, |event| {
                if event.hash == wanted {
                    found = payload::from_bytes::<FileMeta>(&event.payload).ok();
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await?;
        found.ok_or_else(|| SpaceError::UnknownFile(mid.to_owned()))
    }

    /// Attach a tag to a file.
    pub async fn add_tag(&self, mid: &str, value: &str) -> Result<Hash> {
        let meta_hash = Hash::from_base64url(mid)?;
        let channel = tag_channel(mid);
        let recipients = [self.node.account().identity()];

        let reference = Reference::record(meta_channel(self.node.account().alias()), meta_hash);
        let hash = self
            .node
            .write(
                &channel,
                &payload::to_bytes(&Tag {
                    value: value.to_owned(),
                })?,
                &recipients,
                WriteOptions {
                    references: vec![reference],
                    ..Default::default()
                },
            )
            .await?;
        self.node.mine(&channel).await?;
        Ok(hash)
    }

    /// The tags attached to a file.
    pub async fn tags(&self, mid: &str) -> Result<Vec<String>> {
        let channel = tag_channel(mid);
        let mut tags = Vec::new();
        self.node
            .read(&channel, 0, |event| {
                if let Ok(tag) = payload::from_bytes::<Tag>(&event.payload) {
                    tags.push(tag.value);
                }
                ControlFlow::Continue(())
            })
            .await?;
        Ok(tags)
    }
}
