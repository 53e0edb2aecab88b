use std::path::PathBuf;
use std::sync::Arc;

use daw_project::{SourceData, SourceKindData};
use daw_transport::{DataType, Samplecnt, Samplepos};

use crate::playlist::{Playlist, PlaylistId};
use crate::region_factory::RegionFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

/// Material a region reads from. Sample I/O lives elsewhere; this only
/// describes extent and provenance.
#[derive(Debug)]
pub struct Source {
    id: SourceId,
    name: String,
    data_type: DataType,
    kind: SourceKind,
}

#[derive(Debug)]
pub enum SourceKind {
    File(FileSource),
    Playlist(PlaylistSource),
}

#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
    pub length: Samplecnt,
    pub natural_position: Samplepos,
    /// Recording targets can still grow, so bounds checks skip them.
    pub length_mutable: bool,
}

/// One channel of a compound region's internal playlist.
#[derive(Debug)]
pub struct PlaylistSource {
    pub playlist: Arc<Playlist>,
    /// The playlist the compound was combined on.
    pub original: PlaylistId,
    pub channel: u32,
    pub offset: Samplepos,
    pub length: Samplecnt,
    /// Nesting depth: one more than the deepest source inside `playlist`.
    pub level: u32,
}

impl Source {
    pub(crate) fn new(id: SourceId, name: String, data_type: DataType, kind: SourceKind) -> Self {
        Self {
            id,
            name,
            data_type,
            kind,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    pub fn length(&self, _origin: Samplepos) -> Samplecnt {
        match &self.kind {
            SourceKind::File(file) => file.length,
            SourceKind::Playlist(pls) => pls.length,
        }
    }

    pub fn natural_position(&self) -> Samplepos {
        match &self.kind {
            SourceKind::File(file) => file.natural_position,
            SourceKind::Playlist(_) => 0,
        }
    }

    pub fn length_mutable(&self) -> bool {
        match &self.kind {
            SourceKind::File(file) => file.length_mutable,
            SourceKind::Playlist(_) => false,
        }
    }

    pub fn level(&self) -> u32 {
        match &self.kind {
            SourceKind::File(_) => 0,
            SourceKind::Playlist(pls) => pls.level,
        }
    }

    pub fn playlist_source(&self) -> Option<&PlaylistSource> {
        match &self.kind {
            SourceKind::Playlist(pls) => Some(pls),
            SourceKind::File(_) => None,
        }
    }

    pub fn state(&self, factory: &RegionFactory) -> SourceData {
        let kind = match &self.kind {
            SourceKind::File(file) => SourceKindData::File {
                path: file.path.clone(),
                length: file.length,
                natural_position: file.natural_position,
                length_mutable: file.length_mutable,
            },
            SourceKind::Playlist(pls) => SourceKindData::Playlist {
                original: pls.original.0,
                channel: pls.channel,
                offset: pls.offset,
                length: pls.length,
                playlist: Box::new(pls.playlist.state(factory, true)),
            },
        };

        SourceData {
            id: self.id.0,
            name: self.name.clone(),
            data_type: self.data_type,
            kind,
        }
    }
}
