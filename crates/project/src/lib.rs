mod load;
mod save;

use daw_transport::{DataType, EditMode, PositionLockStyle};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use load::{ProjectMetadata, load_project, load_project_metadata};
pub use save::{save_project, save_project_binary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub tempo: f64,
    pub sample_rate: u32,
    pub time_signature: (u32, u32),
    pub sources: Vec<SourceData>,
    pub playlists: Vec<PlaylistData>,
    /// Copy-region id to original-region id, needed to undo a combine.
    #[serde(default)]
    pub compound_associations: Vec<CompoundAssociation>,
    /// Regions on no playlist that associations still point at.
    #[serde(default)]
    pub unplaced_regions: Vec<RegionData>,
}

impl Project {
    pub fn region_count(&self) -> usize {
        self.playlists.iter().map(|p| p.regions.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundAssociation {
    pub copy: u64,
    pub original: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceData {
    pub id: u64,
    pub name: String,
    pub data_type: DataType,
    pub kind: SourceKindData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceKindData {
    File {
        path: PathBuf,
        length: i64,
        natural_position: i64,
        length_mutable: bool,
    },
    /// One channel of a compound region's internal playlist.
    Playlist {
        original: u64,
        channel: u32,
        offset: i64,
        length: i64,
        playlist: Box<PlaylistData>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistData {
    pub id: u64,
    pub name: String,
    pub data_type: DataType,
    pub frozen: bool,
    pub orig_track_id: Option<u64>,
    #[serde(default)]
    pub shared_with: Vec<u64>,
    pub combine_ops: u32,
    #[serde(default)]
    pub edit_mode: EditMode,
    pub regions: Vec<RegionData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionData {
    pub id: u64,
    pub name: String,
    pub data_type: DataType,
    pub position: i64,
    pub start: i64,
    pub length: i64,
    pub layer: u32,
    pub layering_index: u64,

    pub muted: bool,
    pub opaque: bool,
    pub locked: bool,
    pub video_locked: bool,
    pub position_locked: bool,
    pub hidden: bool,
    pub whole_file: bool,
    pub automatic: bool,
    pub import: bool,
    pub external: bool,
    pub sync_marked: bool,
    pub left_of_split: bool,
    pub right_of_split: bool,

    pub sync_position: i64,
    pub ancestral_start: i64,
    pub ancestral_length: i64,
    pub stretch: f32,
    pub shift: f32,
    pub position_lock_style: PositionLockStyle,
    pub beat_position: i64,
    pub kind: RegionKindData,
    pub sources: Vec<u64>,
    pub master_sources: Vec<u64>,
    #[serde(default)]
    pub tags: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionKindData {
    Audio {
        scale_amplitude: f32,
        fade_in_length: i64,
        fade_out_length: i64,
    },
    Midi {
        start_beats: i64,
        length_beats: i64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn region(id: u64, position: i64, length: i64, source: u64) -> RegionData {
        RegionData {
            id,
            name: format!("clip.{id}"),
            data_type: DataType::Audio,
            position,
            start: 0,
            length,
            layer: 0,
            layering_index: id,
            muted: false,
            opaque: true,
            locked: false,
            video_locked: false,
            position_locked: false,
            hidden: false,
            whole_file: false,
            automatic: false,
            import: false,
            external: false,
            sync_marked: false,
            left_of_split: false,
            right_of_split: false,
            sync_position: 0,
            ancestral_start: 0,
            ancestral_length: length,
            stretch: 1.0,
            shift: 1.0,
            position_lock_style: PositionLockStyle::AudioTime,
            beat_position: 0,
            kind: RegionKindData::Audio {
                scale_amplitude: 1.0,
                fade_in_length: 64,
                fade_out_length: 64,
            },
            sources: vec![source],
            master_sources: vec![source],
            tags: String::new(),
        }
    }

    pub(crate) fn sample_project() -> Project {
        Project {
            name: "Test Project".to_string(),
            tempo: 120.0,
            sample_rate: 48_000,
            time_signature: (4, 4),
            sources: vec![SourceData {
                id: 1,
                name: "kick.wav".to_string(),
                data_type: DataType::Audio,
                kind: SourceKindData::File {
                    path: PathBuf::from("audio/kick.wav"),
                    length: 96_000,
                    natural_position: 0,
                    length_mutable: false,
                },
            }],
            playlists: vec![
                PlaylistData {
                    id: 10,
                    name: "Drums".to_string(),
                    data_type: DataType::Audio,
                    frozen: false,
                    orig_track_id: Some(1),
                    shared_with: vec![],
                    combine_ops: 0,
                    edit_mode: EditMode::Normal,
                    regions: vec![region(100, 0, 1000, 1), region(101, 2000, 500, 1)],
                },
                PlaylistData {
                    id: 11,
                    name: "Empty".to_string(),
                    data_type: DataType::Audio,
                    frozen: true,
                    orig_track_id: None,
                    shared_with: vec![2, 3],
                    combine_ops: 4,
                    edit_mode: EditMode::Splice,
                    regions: vec![],
                },
            ],
            compound_associations: vec![CompoundAssociation {
                copy: 200,
                original: 100,
            }],
            unplaced_regions: vec![],
        }
    }

    #[test]
    fn test_project_serialization_roundtrip() {
        let project = sample_project();

        let bytes = rmp_serde::encode::to_vec(&project).expect("serialize");
        let decoded: Project = rmp_serde::decode::from_slice(&bytes).expect("deserialize");

        assert_eq!(decoded.name, project.name);
        assert_eq!(decoded.tempo, project.tempo);
        assert_eq!(decoded.time_signature, project.time_signature);
        assert_eq!(decoded.playlists.len(), project.playlists.len());
        assert_eq!(decoded.compound_associations, project.compound_associations);
    }

    #[test]
    fn test_playlist_data_keeps_attributes() {
        let project = sample_project();
        let json = serde_json::to_string(&project.playlists[1]).expect("serialize");
        let decoded: PlaylistData = serde_json::from_str(&json).expect("deserialize");

        assert!(decoded.frozen);
        assert_eq!(decoded.orig_track_id, None);
        assert_eq!(decoded.shared_with, vec![2, 3]);
        assert_eq!(decoded.combine_ops, 4);
        assert_eq!(decoded.edit_mode, EditMode::Splice);
        assert!(decoded.regions.is_empty());
    }

    #[test]
    fn test_region_data_serialization() {
        let mut region = region(7, 4800, 960, 3);
        region.kind = RegionKindData::Midi {
            start_beats: 480,
            length_beats: 1920,
        };
        region.position_lock_style = PositionLockStyle::MusicTime;
        region.tags = "drums,loop".to_string();

        let bytes = rmp_serde::encode::to_vec(&region).expect("serialize");
        let decoded: RegionData = rmp_serde::decode::from_slice(&bytes).expect("deserialize");

        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.position, 4800);
        assert_eq!(decoded.length, 960);
        assert_eq!(decoded.sources, vec![3]);
        assert_eq!(decoded.position_lock_style, PositionLockStyle::MusicTime);
        assert_eq!(
            decoded.kind,
            RegionKindData::Midi {
                start_beats: 480,
                length_beats: 1920
            }
        );
        assert_eq!(decoded.tags, "drums,loop");
    }

    #[test]
    fn test_nested_playlist_source_serialization() {
        let nested = sample_project().playlists[0].clone();
        let source = SourceData {
            id: 5,
            name: "Drums compound-1 (1)".to_string(),
            data_type: DataType::Audio,
            kind: SourceKindData::Playlist {
                original: 10,
                channel: 0,
                offset: 0,
                length: 2500,
                playlist: Box::new(nested),
            },
        };

        let json = serde_json::to_string(&source).expect("serialize");
        let decoded: SourceData = serde_json::from_str(&json).expect("deserialize");

        match decoded.kind {
            SourceKindData::Playlist {
                original,
                length,
                playlist,
                ..
            } => {
                assert_eq!(original, 10);
                assert_eq!(length, 2500);
                assert_eq!(playlist.regions.len(), 2);
            }
            other => panic!("expected playlist source, got {other:?}"),
        }
    }

    #[test]
    fn test_region_count() {
        assert_eq!(sample_project().region_count(), 2);
    }
}
