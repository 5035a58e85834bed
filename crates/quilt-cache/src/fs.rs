//! Filesystem-backed implementation of the Cache trait.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/block/<base64url(hash)>                  serialized block
//! <root>/channel/<base64url(channel)>             serialized head reference
//! <root>/entry/<base64url(channel)>/<timestamp>   serialized pending entry
//! <root>/mapping/<base64url(channel)>/<base64url(record)>  block hash
//! ```
//!
//! Writes go to a temporary file in the destination directory followed by
//! a rename, so concurrent readers never observe partial values.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use quilt_core::{Block, BlockEntry, ChannelName, Hash, Reference, HASH_LEN};

use crate::error::{CacheError, Result};
use crate::traits::Cache;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem cache rooted at a directory.
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    /// Open (creating directories as needed) a cache under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in ["block", "channel", "entry", "mapping"] {
            std::fs::create_dir_all(root.join(sub))?;
        }
        tracing::debug!(root = %root.display(), "filesystem cache opened");
        Ok(Self { root })
    }

    /// The cache's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn block_path(&self, hash: &Hash) -> PathBuf {
        self.root.join("block").join(hash.to_base64url())
    }

    fn head_path(&self, channel: &ChannelName) -> PathBuf {
        self.root.join("channel").join(channel.to_base64url())
    }

    fn entry_dir(&self, channel: &ChannelName) -> PathBuf {
        self.root.join("entry").join(channel.to_base64url())
    }

    fn mapping_path(&self, channel: &ChannelName, record: &Hash) -> PathBuf {
        self.root
            .join("mapping")
            .join(channel.to_base64url())
            .join(record.to_base64url())
    }
}

/// Write bytes atomically: temp file in the target directory, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CacheError::Serialization("path has no parent".into()))?;
    let tmp = dir.join(format!(
        ".tmp-{}-{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_value<T: DeserializeOwned>(path: &Path) -> std::io::Result<Result<T>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(ciborium::from_reader(bytes.as_slice())
        .map_err(|e| CacheError::Serialization(e.to_string())))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CacheError::Serialization(e.to_string()))?;
    Ok(buf)
}

#[async_trait]
impl Cache for FsCache {
    async fn head(&self, channel: &ChannelName) -> Result<Reference> {
        match read_value(&self.head_path(channel)).await {
            Ok(result) => result,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::NoSuchHead(channel.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn block(&self, hash: &Hash) -> Result<Block> {
        match read_value(&self.block_path(hash)).await {
            Ok(result) => result,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::NoSuchBlock(hash.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn entries(&self, channel: &ChannelName, since: i64) -> Result<Vec<BlockEntry>> {
        let dir = self.entry_dir(channel);
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NoSuchEntry(channel.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut timestamps = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            // Skip in-flight temporaries and anything not a timestamp.
            if let Some(ts) = name.to_str().and_then(|s| s.parse::<i64>().ok()) {
                if ts >= since {
                    timestamps.push(ts);
                }
            }
        }
        timestamps.sort_unstable();

        let mut entries = Vec::with_capacity(timestamps.len());
        for ts in timestamps {
            let path = dir.join(ts.to_string());
            match read_value::<BlockEntry>(&path).await {
                Ok(result) => entries.push(result?),
                // Raced with a concurrent rename; the listing is best-effort.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(entries)
    }

    async fn block_for_record(&self, channel: &ChannelName, record: &Hash) -> Result<Block> {
        let path = self.mapping_path(channel, record);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NoSuchMapping(record.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let arr: [u8; HASH_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CacheError::Serialization("mapping is not a hash".into()))?;
        self.block(&Hash::from_bytes(arr)).await
    }

    async fn put_head(&self, channel: &ChannelName, head: Reference) -> Result<()> {
        write_atomic(&self.head_path(channel), &encode(&head)?).await
    }

    async fn put_block(&self, hash: &Hash, block: &Block) -> Result<()> {
        write_atomic(&self.block_path(hash), &encode(block)?).await?;

        let mapping_dir = self.root.join("mapping").join(block.channel.to_base64url());
        tokio::fs::create_dir_all(&mapping_dir).await?;
        for entry in &block.entries {
            let path = self.mapping_path(&block.channel, &entry.hash);
            write_atomic(&path, hash.as_bytes()).await?;
        }
        Ok(())
    }

    async fn put_entry(&self, channel: &ChannelName, entry: BlockEntry) -> Result<()> {
        let dir = self.entry_dir(channel);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(entry.record.timestamp.to_string());
        write_atomic(&path, &encode(&entry)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_core::{Alias, Keypair, RecordBuilder};

    fn make_entry(keypair: &Keypair, timestamp: i64, payload: &[u8]) -> BlockEntry {
        let record = RecordBuilder::new(Alias::new("alice").unwrap(), timestamp)
            .payload(payload.to_vec())
            .sign(keypair)
            .unwrap();
        BlockEntry::new(record)
    }

    #[tokio::test]
    async fn test_fs_head_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCache::open(dir.path()).unwrap();
        let channel = ChannelName::new("T").unwrap();

        assert!(matches!(
            cache.head(&channel).await,
            Err(CacheError::NoSuchHead(_))
        ));

        let head = Reference::head(channel.clone(), Hash::of(b"h"), 1_000);
        cache.put_head(&channel, head.clone()).await.unwrap();
        assert_eq!(cache.head(&channel).await.unwrap(), head);

        // Heads overwrite.
        let newer = Reference::head(channel.clone(), Hash::of(b"h2"), 2_000);
        cache.put_head(&channel, newer.clone()).await.unwrap();
        assert_eq!(cache.head(&channel).await.unwrap(), newer);
    }

    #[tokio::test]
    async fn test_fs_block_and_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCache::open(dir.path()).unwrap();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = ChannelName::new("T").unwrap();
        let entry = make_entry(&keypair, 1_000, b"a");
        let record_hash = entry.hash;

        let block = Block::genesis(
            channel.clone(),
            1_000,
            Alias::new("miner").unwrap(),
            vec![entry],
        );
        let hash = block.hash();
        cache.put_block(&hash, &block).await.unwrap();

        assert_eq!(cache.block(&hash).await.unwrap(), block);
        assert_eq!(
            cache.block_for_record(&channel, &record_hash).await.unwrap(),
            block
        );

        // Layout check: block file named by base64url hash.
        assert!(dir
            .path()
            .join("block")
            .join(hash.to_base64url())
            .exists());
    }

    #[tokio::test]
    async fn test_fs_entries_since() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCache::open(dir.path()).unwrap();
        let keypair = Keypair::from_seed(&[1; 32]);
        let channel = ChannelName::new("T").unwrap();

        for ts in [5_000, 1_000, 3_000] {
            cache
                .put_entry(&channel, make_entry(&keypair, ts, b"x"))
                .await
                .unwrap();
        }

        let all = cache.entries(&channel, 0).await.unwrap();
        let timestamps: Vec<i64> = all.iter().map(|e| e.record.timestamp).collect();
        assert_eq!(timestamps, vec![1_000, 3_000, 5_000]);

        let later = cache.entries(&channel, 3_000).await.unwrap();
        assert_eq!(later.len(), 2);

        // Entry files are decimal timestamps under the channel directory.
        assert!(dir
            .path()
            .join("entry")
            .join(channel.to_base64url())
            .join("1000")
            .exists());
    }

    #[tokio::test]
    async fn test_fs_missing_entry_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCache::open(dir.path()).unwrap();
        let channel = ChannelName::new("empty").unwrap();
        assert!(matches!(
            cache.entries(&channel, 0).await,
            Err(CacheError::NoSuchEntry(_))
        ));
    }
}
