//! Fixtures shared by unit tests.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use daw_transport::{DataType, Samplecnt, Samplepos};

use crate::events::PlaylistEvent;
use crate::playlist::Playlist;
use crate::region::{RegionId, RegionProperties};
use crate::region_factory::RegionFactory;
use crate::source::{FileSource, Source, SourceId, SourceKind};

fn audio_file(id: u64, length: Samplecnt, length_mutable: bool) -> Source {
    Source::new(
        SourceId(id),
        format!("take{id}"),
        DataType::Audio,
        SourceKind::File(FileSource {
            path: format!("take{id}.wav").into(),
            length,
            natural_position: 0,
            length_mutable,
        }),
    )
}

pub(crate) fn file_source(id: u64, length: Samplecnt) -> Arc<Source> {
    Arc::new(audio_file(id, length, false))
}

pub(crate) fn growing_source(id: u64, length: Samplecnt) -> Arc<Source> {
    Arc::new(audio_file(id, length, true))
}

/// Register a file source under a fixed id, as loading a session would.
pub(crate) fn register_file_source(rf: &mut RegionFactory, id: u64, length: Samplecnt) -> Arc<Source> {
    rf.insert_source(audio_file(id, length, false))
}

pub(crate) fn factory_with_source(length: Samplecnt) -> (RegionFactory, Arc<Source>) {
    let mut rf = RegionFactory::new();
    let source = rf.create_file_source("take", DataType::Audio, "take.wav", length, false);
    (rf, source)
}

pub(crate) fn audio_playlist(rf: &mut RegionFactory) -> Playlist {
    Playlist::new(rf.next_playlist_id(), "Audio 1", DataType::Audio)
}

/// Create a region over `source` and add it to `pl` at `position`.
pub(crate) fn place(
    rf: &mut RegionFactory,
    pl: &mut Playlist,
    source: &Arc<Source>,
    position: Samplepos,
    length: Samplecnt,
) -> RegionId {
    let id = rf.create_from_sources(vec![source.clone()], RegionProperties::new().length(length), false);
    pl.add_region(rf, id, position, 1.0, false);
    id
}

/// `(position, length)` of every member, in playlist order.
pub(crate) fn bounds(rf: &RegionFactory, pl: &Playlist) -> Vec<(Samplepos, Samplecnt)> {
    pl.region_list()
        .iter()
        .map(|id| {
            let r = rf.region(*id).expect("member region");
            (r.position(), r.length())
        })
        .collect()
}

pub(crate) fn drain(rx: &Receiver<PlaylistEvent>) -> Vec<PlaylistEvent> {
    rx.try_iter().collect()
}
