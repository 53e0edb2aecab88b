pub mod automation_line;
pub mod clip_ops;
pub mod config;
pub mod error;
pub mod events;
pub mod playlist;
pub mod region;
pub mod region_factory;
pub mod rt;
pub mod session;
pub mod source;
pub mod time;

#[cfg(test)]
mod test_util;

pub use automation_line::{AutomationLine, ControlList, ParameterDescriptor};
pub use config::{ConfigError, EditorConfig};
pub use error::SessionError;
pub use events::PlaylistEvent;
pub use playlist::{LAYER_BOTTOM, LAYER_TOP, Playlist, PlaylistId, RegionPoint};
pub use region::{Layer, PropertyChange, Region, RegionId, RegionProperties};
pub use region_factory::RegionFactory;
pub use rt::{PlaylistSnapshot, RealtimeBridge, SnapshotReader};
pub use session::Session;
pub use source::{Source, SourceId};
pub use time::{MusicalPosition, TimeContext, TimeSignature};

pub use daw_project::{Project, ProjectError, load_project, save_project};
pub use daw_transport::{
    DataType, EditMode, LayerModel, OverlapType, PPQN, PositionLockStyle, Range, RangeMove, Samplecnt, Samplepos,
    TempoMap,
};
