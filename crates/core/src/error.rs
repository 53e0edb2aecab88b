use daw_project::ProjectError;
use daw_transport::DataType;

use crate::config::ConfigError;
use crate::playlist::PlaylistId;
use crate::region::RegionId;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("project error: {0}")]
    Project(#[from] ProjectError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("unknown playlist {0:?}")]
    UnknownPlaylist(PlaylistId),

    #[error("unknown region {0:?}")]
    UnknownRegion(RegionId),

    #[error("region {region} references missing source {source_id}")]
    MissingSource { region: u64, source_id: u64 },

    #[error("playlist {playlist:?} holds {expected} data but region {region} is {found}")]
    DataTypeMismatch {
        playlist: PlaylistId,
        region: u64,
        expected: DataType,
        found: DataType,
    },
}
