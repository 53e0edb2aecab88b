use crate::{Project, ProjectError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    pub name: String,
    pub tempo: f64,
    pub time_signature: (u32, u32),
    pub playlist_count: usize,
    pub region_count: usize,
}

fn load_project_data(path: &Path) -> Result<Project, ProjectError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    // Try JSON first, fall back to MessagePack
    serde_json::from_reader(reader).or_else(|_| {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        rmp_serde::decode::from_read(reader).map_err(ProjectError::from)
    })
}

pub fn load_project_metadata(path: &Path) -> Result<ProjectMetadata, ProjectError> {
    let project = load_project_data(path)?;

    Ok(ProjectMetadata {
        region_count: project.region_count(),
        playlist_count: project.playlists.len(),
        name: project.name,
        tempo: project.tempo,
        time_signature: project.time_signature,
    })
}

pub fn load_project(path: &Path) -> Result<Project, ProjectError> {
    let project = load_project_data(path)?;
    log::info!(
        "loaded project '{}' with {} sources and {} playlists",
        project.name,
        project.sources.len(),
        project.playlists.len()
    );
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_project;
    use crate::{SourceKindData, save_project, save_project_binary};
    use tempfile::tempdir;

    #[test]
    fn test_load_project_json_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.dawproj");
        let project = sample_project();

        save_project(&path, &project).expect("save");
        let loaded = load_project(&path).expect("load");

        assert_eq!(loaded.name, project.name);
        assert_eq!(loaded.sample_rate, 48_000);
        assert_eq!(loaded.playlists.len(), 2);
        assert_eq!(loaded.playlists[0].regions[0].id, 100);
        assert_eq!(loaded.playlists[0].regions[1].position, 2000);
        assert!(matches!(
            loaded.sources[0].kind,
            SourceKindData::File { length: 96_000, .. }
        ));
    }

    #[test]
    fn test_load_project_falls_back_to_messagepack() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.dawbin");

        save_project_binary(&path, &sample_project()).expect("save");
        let loaded = load_project(&path).expect("load");

        assert_eq!(loaded.name, "Test Project");
        assert_eq!(loaded.playlists[1].shared_with, vec![2, 3]);
        assert_eq!(loaded.compound_associations.len(), 1);
    }

    #[test]
    fn test_load_project_metadata() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.dawproj");

        save_project(&path, &sample_project()).expect("save");
        let metadata = load_project_metadata(&path).expect("metadata");

        assert_eq!(metadata.name, "Test Project");
        assert_eq!(metadata.tempo, 120.0);
        assert_eq!(metadata.time_signature, (4, 4));
        assert_eq!(metadata.playlist_count, 2);
        assert_eq!(metadata.region_count, 2);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().expect("tempdir");
        let result = load_project(&dir.path().join("nope.dawproj"));
        assert!(matches!(result, Err(ProjectError::Io(_))));
    }

    #[test]
    fn test_load_garbage_is_deserialize_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("garbage.dawproj");
        std::fs::write(&path, b"not a project").expect("write");

        let result = load_project(&path);
        assert!(matches!(result, Err(ProjectError::Deserialize(_))));
    }
}
