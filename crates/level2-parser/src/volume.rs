//! Volume assembly from a bucket listing.
//!
//! A station's prefix usually holds several volumes at once (the one being
//! written plus a handful of older ones). We group chunks by
//! `(site, volume number)`, keep the group touched most recently, and order
//! its chunks for sequential decoding.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk_key::{chunk_sort_number, ChunkIdentity, ChunkType};
use crate::observer::DecodeObserver;

/// One entry from a chunk repository listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkListing {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
}

impl ChunkListing {
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            last_modified,
            size_bytes,
        }
    }
}

/// A parsed chunk together with its listing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeChunk {
    pub identity: ChunkIdentity,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// The chunks of one volume, ascending by chunk number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    pub site: String,
    pub volume_number: String,
    /// Greatest `last_modified` across the volume's chunks
    pub latest_modified: DateTime<Utc>,
    pub chunks: Vec<VolumeChunk>,
}

impl Volume {
    /// The first Start chunk in chunk order, if any.
    pub fn start_chunk(&self) -> Option<&VolumeChunk> {
        self.chunks.iter().find(|c| c.identity.is_start())
    }

    /// Chunks other than the designated Start chunk, in chunk order.
    pub fn remaining_chunks(&self) -> impl Iterator<Item = &VolumeChunk> {
        let start_key = self.start_chunk().map(|c| c.identity.raw_key.clone());
        self.chunks
            .iter()
            .filter(move |c| Some(&c.identity.raw_key) != start_key.as_ref())
    }

    /// Whether the End chunk has been published.
    pub fn is_complete(&self) -> bool {
        self.chunks
            .iter()
            .any(|c| c.identity.chunk_type == ChunkType::End)
    }

    pub fn identities(&self) -> Vec<ChunkIdentity> {
        self.chunks.iter().map(|c| c.identity.clone()).collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.size_bytes).sum()
    }

    fn sort_chunks(&mut self) {
        self.chunks.sort_by(|a, b| {
            chunk_sort_number(&a.identity.raw_key)
                .cmp(&chunk_sort_number(&b.identity.raw_key))
                .then_with(|| a.identity.raw_key.cmp(&b.identity.raw_key))
        });
    }
}

/// Group parseable listings into volumes, each sorted by chunk number.
///
/// Returns the volumes (ordered by site then volume number) and the count of
/// keys that failed to parse.
pub fn group_volumes(
    listings: &[ChunkListing],
    observer: &dyn DecodeObserver,
) -> (Vec<Volume>, usize) {
    let mut groups: BTreeMap<(String, String), Volume> = BTreeMap::new();
    let mut rejected = 0;

    for listing in listings {
        let identity = match ChunkIdentity::parse(&listing.key) {
            Ok(identity) => identity,
            Err(e) => {
                observer.key_rejected(&listing.key, &e);
                rejected += 1;
                continue;
            }
        };

        let group_key = (identity.site.clone(), identity.volume_number.clone());
        let volume = groups.entry(group_key).or_insert_with(|| Volume {
            site: identity.site.clone(),
            volume_number: identity.volume_number.clone(),
            latest_modified: listing.last_modified,
            chunks: Vec::new(),
        });
        volume.latest_modified = volume.latest_modified.max(listing.last_modified);
        volume.chunks.push(VolumeChunk {
            identity,
            last_modified: listing.last_modified,
            size_bytes: listing.size_bytes,
        });
    }

    let mut volumes: Vec<Volume> = groups.into_values().collect();
    for volume in &mut volumes {
        volume.sort_chunks();
    }
    (volumes, rejected)
}

/// Pick the volume with the most recent modification.
///
/// Ties on `latest_modified` go to the greater volume number, then the
/// greater site. Returns `None` when nothing in the listing parses.
pub fn select_latest_volume(
    listings: &[ChunkListing],
    observer: &dyn DecodeObserver,
) -> Option<Volume> {
    let (volumes, rejected) = group_volumes(listings, observer);

    let selected = volumes.into_iter().max_by(|a, b| {
        a.latest_modified
            .cmp(&b.latest_modified)
            .then_with(|| a.volume_number.cmp(&b.volume_number))
            .then_with(|| a.site.cmp(&b.site))
    })?;

    observer.volume_selected(
        &selected.site,
        &selected.volume_number,
        selected.chunks.len(),
        rejected,
    );
    Some(selected)
}
