use std::collections::HashSet;
use std::path::Path;

use daw_project::{CompoundAssociation, Project, SourceKindData, load_project, save_project};
use daw_transport::{DataType, Range, Samplecnt, Samplepos, TempoMap};
use rayon::prelude::*;

use crate::automation_line::{AutomationLine, ControlList};
use crate::config::EditorConfig;
use crate::error::SessionError;
use crate::playlist::{Playlist, PlaylistId};
use crate::region::RegionId;
use crate::region_factory::RegionFactory;
use crate::rt::{RealtimeBridge, SnapshotReader};
use crate::time::{MusicalPosition, TimeContext, TimeSignature};

/// Everything one edit session owns: the regions and sources, the track
/// playlists, the time context and the real-time bridge.
#[derive(Debug)]
pub struct Session {
    name: String,
    factory: RegionFactory,
    playlists: Vec<Playlist>,
    time_context: TimeContext,
    config: EditorConfig,
    rt: RealtimeBridge,
}

impl Session {
    pub fn new(name: impl Into<String>, config: EditorConfig) -> Self {
        let tempo_map = TempoMap::new(config.default_tempo, config.sample_rate);
        Self {
            name: name.into(),
            factory: RegionFactory::new(),
            playlists: Vec::new(),
            time_context: TimeContext::new(tempo_map, TimeSignature::default(), 100.0),
            config,
            rt: RealtimeBridge::new(),
        }
    }

    /// A new session using the editor preferences stored at `path`.
    pub fn with_config_file(name: impl Into<String>, path: &Path) -> Result<Self, SessionError> {
        let config = EditorConfig::load_from(path)?;
        Ok(Self::new(name, config))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn factory(&self) -> &RegionFactory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut RegionFactory {
        &mut self.factory
    }

    pub fn time_context(&self) -> &TimeContext {
        &self.time_context
    }

    pub fn tempo(&self) -> f64 {
        self.time_context.tempo()
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_context.time_signature
    }

    pub fn set_time_signature(&mut self, time_signature: impl Into<TimeSignature>) {
        self.time_context.time_signature = time_signature.into();
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    fn configure(&self, pl: &mut Playlist) {
        pl.set_layer_model(self.config.layer_model);
        pl.set_use_overlap_equivalency(self.config.use_overlap_equivalency);
        pl.set_tempo_map(self.time_context.tempo_map);
    }

    pub fn new_playlist(&mut self, name: impl Into<String>, data_type: DataType) -> PlaylistId {
        let id = self.factory.next_playlist_id();
        let mut pl = Playlist::new(id, name, data_type);
        pl.set_edit_mode(self.config.edit_mode);
        self.configure(&mut pl);
        self.playlists.push(pl);
        id
    }

    pub fn remove_playlist(&mut self, id: PlaylistId) -> Option<Playlist> {
        let index = self.playlists.iter().position(|p| p.id() == id)?;
        self.rt.detach(id);
        Some(self.playlists.remove(index))
    }

    pub fn playlist(&self, id: PlaylistId) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id() == id)
    }

    pub fn playlist_mut(&mut self, id: PlaylistId) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.id() == id)
    }

    pub fn playlist_by_name(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name() == name)
    }

    /// Run an edit against one playlist, then hand the result to any
    /// attached real-time reader.
    pub fn edit<R>(
        &mut self,
        id: PlaylistId,
        f: impl FnOnce(&mut Playlist, &mut RegionFactory) -> R,
    ) -> Result<R, SessionError> {
        let pl = self
            .playlists
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or(SessionError::UnknownPlaylist(id))?;
        let result = f(pl, &mut self.factory);
        self.rt.publish(pl, &self.factory);
        Ok(result)
    }

    fn playlist_of(&self, region: RegionId) -> Result<PlaylistId, SessionError> {
        self.factory
            .region(region)
            .and_then(|r| r.playlist())
            .ok_or(SessionError::UnknownRegion(region))
    }

    pub fn raise_region(&mut self, region: RegionId) -> Result<(), SessionError> {
        let id = self.playlist_of(region)?;
        self.edit(id, |pl, rf| pl.raise_region(rf, region))
    }

    pub fn lower_region(&mut self, region: RegionId) -> Result<(), SessionError> {
        let id = self.playlist_of(region)?;
        self.edit(id, |pl, rf| pl.lower_region(rf, region))
    }

    pub fn raise_region_to_top(&mut self, region: RegionId) -> Result<(), SessionError> {
        let id = self.playlist_of(region)?;
        self.edit(id, |pl, rf| pl.raise_region_to_top(rf, region))
    }

    pub fn lower_region_to_bottom(&mut self, region: RegionId) -> Result<(), SessionError> {
        let id = self.playlist_of(region)?;
        self.edit(id, |pl, rf| pl.lower_region_to_bottom(rf, region))
    }

    /// Ripple every playlist after a group edit. Regions in `exclude` were
    /// already moved by the edit and stay where they are.
    pub fn ripple_all(&mut self, at: Samplepos, distance: Samplecnt, exclude: &[RegionId]) {
        log::debug!("ripple at {} by {distance} samples", self.musical_position(at));
        for pl in &mut self.playlists {
            pl.ripple(&mut self.factory, at, distance, exclude);
            self.rt.publish(pl, &self.factory);
        }
    }

    /// Change the tempo and move music-locked regions to follow it.
    pub fn set_tempo(&mut self, bpm: f64) {
        let tempo = TempoMap::new(bpm, self.time_context.sample_rate());
        self.time_context.tempo_map = tempo;
        for pl in &mut self.playlists {
            pl.update_after_tempo_map_change(&mut self.factory, tempo);
            self.rt.publish(pl, &self.factory);
        }
        log::debug!("tempo changed to {bpm} bpm");
    }

    /// Drop regions no playlist has ever held. Returns how many went.
    pub fn cleanup_unused_regions(&mut self) -> usize {
        let mut live: HashSet<RegionId> = HashSet::new();
        for pl in &self.playlists {
            live.extend(pl.all_regions().iter().copied());
        }
        for source in self.factory.sources() {
            if let Some(pls) = source.playlist_source() {
                live.extend(pls.playlist.all_regions().iter().copied());
            }
        }
        self.factory.collect_unused(&live)
    }

    /// Where `position` falls in bars, beats and ticks.
    pub fn musical_position(&self, position: Samplepos) -> MusicalPosition {
        self.time_context.format_position(position)
    }

    /// The span covered by regions on any playlist.
    pub fn timeline_extent(&self) -> Option<Range> {
        self.playlists
            .iter()
            .filter_map(|pl| pl.get_extent(&self.factory))
            .reduce(|a, b| Range::new(a.start.min(b.start), a.end.max(b.end)))
    }

    /// An editable view of `list` on this session's timeline.
    pub fn automation_line(&self, name: impl Into<String>, list: ControlList) -> AutomationLine {
        AutomationLine::new(name, list, self.time_context, self.config.max_gain)
    }

    /// Stream a playlist's contents to a real-time consumer.
    pub fn attach_reader(&mut self, id: PlaylistId) -> Result<SnapshotReader, SessionError> {
        let pl = self
            .playlists
            .iter()
            .find(|p| p.id() == id)
            .ok_or(SessionError::UnknownPlaylist(id))?;
        Ok(self.rt.attach(pl, &self.factory))
    }

    /// Free snapshots the real-time side has finished with.
    pub fn collect_garbage(&mut self) {
        self.rt.collect();
    }

    pub fn to_project(&self) -> Project {
        // the rt bridge is not Sync, so the parallel closure borrows the factory alone
        let factory = &self.factory;
        let mut sources: Vec<_> = self.factory.sources().collect();
        // nested playlists can only be rebuilt once their own sources exist
        sources.sort_by_key(|s| (s.level(), s.id()));

        let mut compound_associations: Vec<CompoundAssociation> = self
            .factory
            .compound_associations()
            .iter()
            .map(|(copy, original)| CompoundAssociation {
                copy: copy.0,
                original: original.0,
            })
            .collect();
        compound_associations.sort_by_key(|a| a.copy);

        let mut placed: HashSet<RegionId> = HashSet::new();
        for pl in &self.playlists {
            placed.extend(pl.region_list().iter().copied());
        }
        for source in &sources {
            if let Some(pls) = source.playlist_source() {
                placed.extend(pls.playlist.region_list().iter().copied());
            }
        }
        let mut unplaced: Vec<RegionId> = self
            .factory
            .compound_associations()
            .values()
            .filter(|id| !placed.contains(id))
            .copied()
            .collect();
        unplaced.sort();
        unplaced.dedup();

        Project {
            name: self.name.clone(),
            tempo: self.tempo(),
            sample_rate: self.time_context.sample_rate(),
            time_signature: self.time_signature().into(),
            sources: sources.iter().map(|s| s.state(&self.factory)).collect(),
            playlists: self.playlists.par_iter().map(|pl| pl.state(factory, true)).collect(),
            compound_associations,
            unplaced_regions: unplaced
                .iter()
                .filter_map(|id| self.factory.region(*id))
                .map(|r| r.state())
                .collect(),
        }
    }

    pub fn from_project(project: &Project, config: EditorConfig) -> Result<Self, SessionError> {
        let mut session = Self::new(project.name.clone(), config);
        session.time_context = TimeContext::new(
            TempoMap::new(project.tempo, project.sample_rate),
            project.time_signature,
            session.time_context.pixels_per_beat,
        );

        let (files, compounds): (Vec<_>, Vec<_>) = project
            .sources
            .iter()
            .partition(|s| matches!(s.kind, SourceKindData::File { .. }));
        for source in files.into_iter().chain(compounds) {
            session.factory.create_source_from_state(source)?;
        }

        let mut max_playlist = 0;
        for data in &project.playlists {
            let mut pl = Playlist::new(PlaylistId(data.id), data.name.clone(), data.data_type);
            session.configure(&mut pl);
            pl.set_state(&mut session.factory, data)?;
            max_playlist = max_playlist.max(data.id);
            session.playlists.push(pl);
        }
        session.factory.seed_ids(0, 0, max_playlist);

        for region in &project.unplaced_regions {
            session.factory.create_from_state(region)?;
        }

        for assoc in &project.compound_associations {
            session
                .factory
                .add_compound_association(RegionId(assoc.original), RegionId(assoc.copy));
        }

        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let project = self.to_project();
        save_project(path, &project)?;
        log::info!(
            "saved session \"{}\" ({} playlists, {} regions) to {}",
            self.name,
            project.playlists.len(),
            project.region_count(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path, config: EditorConfig) -> Result<Self, SessionError> {
        let project = load_project(path)?;
        let session = Self::from_project(&project, config)?;
        log::info!(
            "loaded session \"{}\" ({} playlists) from {}",
            session.name,
            session.playlists.len(),
            path.display()
        );
        Ok(session)
    }
}
