use crate::{Project, ProjectError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write the project as pretty-printed JSON.
pub fn save_project(path: &Path, project: &Project) -> Result<(), ProjectError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, project)?;

    log::info!(
        "saved project '{}' ({} playlists) to {}",
        project.name,
        project.playlists.len(),
        path.display()
    );
    Ok(())
}

/// Write the project as MessagePack. `load_project` reads either format.
pub fn save_project_binary(path: &Path, project: &Project) -> Result<(), ProjectError> {
    let bytes = rmp_serde::encode::to_vec_named(project)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
