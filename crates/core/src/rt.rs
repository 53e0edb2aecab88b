//! Lock-free handoff of playlist contents to a real-time reader.
//!
//! The editing side builds an immutable [`PlaylistSnapshot`] after each edit
//! and pushes it through an `rtrb` ring as a `basedrop::Shared`. The reader
//! swaps to the newest snapshot without locking or freeing; old snapshots are
//! reclaimed on the editing side by [`RealtimeBridge::collect`].

use std::collections::HashMap;

use basedrop::{Collector, Handle, Shared};
use daw_transport::{Samplecnt, Samplepos};

use crate::playlist::{Playlist, PlaylistId};
use crate::region::{Layer, RegionId};
use crate::region_factory::RegionFactory;
use crate::source::SourceId;

const SNAPSHOT_QUEUE: usize = 4;

/// What playback needs from one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSnapshot {
    pub id: RegionId,
    pub position: Samplepos,
    pub start: Samplepos,
    pub length: Samplecnt,
    pub layer: Layer,
    pub muted: bool,
    pub opaque: bool,
    pub sources: Vec<SourceId>,
}

impl RegionSnapshot {
    pub fn end(&self) -> Samplepos {
        self.position + self.length
    }

    pub fn covers(&self, position: Samplepos) -> bool {
        position >= self.position && position < self.end()
    }
}

/// A playlist's members at one generation, in position order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistSnapshot {
    pub generation: u64,
    pub regions: Vec<RegionSnapshot>,
}

impl PlaylistSnapshot {
    pub fn capture(playlist: &Playlist, rf: &RegionFactory) -> Self {
        let regions = playlist
            .region_list()
            .iter()
            .filter_map(|id| rf.region(*id))
            .map(|r| RegionSnapshot {
                id: r.id(),
                position: r.position(),
                start: r.start(),
                length: r.length(),
                layer: r.layer(),
                muted: r.muted(),
                opaque: r.opaque(),
                sources: r.sources().iter().map(|s| s.id()).collect(),
            })
            .collect();

        Self {
            generation: playlist.generation(),
            regions,
        }
    }

    /// The highest unmuted region sounding at `position`.
    pub fn top_region_at(&self, position: Samplepos) -> Option<&RegionSnapshot> {
        self.regions
            .iter()
            .filter(|r| !r.muted && r.covers(position))
            .max_by_key(|r| r.layer)
    }
}

type SharedSnapshot = Shared<PlaylistSnapshot>;

/// Real-time side of one playlist's snapshot stream.
pub struct SnapshotReader {
    rx: rtrb::Consumer<SharedSnapshot>,
    current: SharedSnapshot,
}

impl SnapshotReader {
    /// Swap to the newest published snapshot. Returns whether it changed.
    pub fn update(&mut self) -> bool {
        let mut changed = false;
        while let Ok(snapshot) = self.rx.pop() {
            self.current = snapshot;
            changed = true;
        }
        changed
    }

    pub fn current(&self) -> &PlaylistSnapshot {
        &self.current
    }
}

struct Publisher {
    tx: rtrb::Producer<SharedSnapshot>,
    generation: u64,
}

/// Editing side: one ring per attached playlist, plus the collector that
/// frees snapshots the readers have dropped.
pub struct RealtimeBridge {
    collector: Collector,
    handle: Handle,
    publishers: HashMap<PlaylistId, Publisher>,
}

impl RealtimeBridge {
    pub fn new() -> Self {
        let collector = Collector::new();
        let handle = collector.handle();
        Self {
            collector,
            handle,
            publishers: HashMap::new(),
        }
    }

    /// Start streaming `playlist`, replacing any earlier reader for it.
    pub fn attach(&mut self, playlist: &Playlist, rf: &RegionFactory) -> SnapshotReader {
        let (tx, rx) = rtrb::RingBuffer::<SharedSnapshot>::new(SNAPSHOT_QUEUE);
        let current = Shared::new(&self.handle, PlaylistSnapshot::capture(playlist, rf));
        self.publishers.insert(
            playlist.id(),
            Publisher {
                tx,
                generation: playlist.generation(),
            },
        );
        SnapshotReader { rx, current }
    }

    pub fn detach(&mut self, playlist: PlaylistId) {
        self.publishers.remove(&playlist);
    }

    pub fn is_attached(&self, playlist: PlaylistId) -> bool {
        self.publishers.contains_key(&playlist)
    }

    /// Push a fresh snapshot if the playlist changed since the last one.
    /// Returns whether a snapshot was queued.
    pub fn publish(&mut self, playlist: &Playlist, rf: &RegionFactory) -> bool {
        let Some(publisher) = self.publishers.get_mut(&playlist.id()) else {
            return false;
        };
        if publisher.generation == playlist.generation() {
            return false;
        }

        let snapshot = Shared::new(&self.handle, PlaylistSnapshot::capture(playlist, rf));
        match publisher.tx.push(snapshot) {
            Ok(()) => {
                publisher.generation = playlist.generation();
                true
            }
            Err(_) => {
                // reader is behind; the next edit retries
                log::warn!("snapshot queue for playlist {:?} is full", playlist.id());
                false
            }
        }
    }

    /// Free snapshots no reader holds any more.
    pub fn collect(&mut self) {
        self.collector.collect();
    }
}

impl Default for RealtimeBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RealtimeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeBridge")
            .field("attached", &self.publishers.len())
            .finish()
    }
}
