use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use daw_project::{RegionData, SourceData, SourceKindData};
use daw_transport::{DataType, Samplecnt, Samplepos};

use crate::error::SessionError;
use crate::playlist::{Playlist, PlaylistId};
use crate::region::{Region, RegionId, RegionProperties};
use crate::source::{FileSource, PlaylistSource, Source, SourceId, SourceKind};

/// Owner of every region and source in a session.
///
/// Regions live here and nowhere else; playlists refer to them by id. The
/// factory also mints ids for regions, sources and playlists, keeps names
/// unique, and remembers which combined copy came from which original.
#[derive(Debug, Default)]
pub struct RegionFactory {
    regions: HashMap<RegionId, Region>,
    sources: HashMap<SourceId, Arc<Source>>,
    region_name_map: HashMap<String, RegionId>,
    region_name_number_map: HashMap<String, u32>,
    /// copy -> original
    compound_associations: HashMap<RegionId, RegionId>,
    holds: HashMap<RegionId, usize>,
    next_region_id: u64,
    next_source_id: u64,
    next_playlist_id: u64,
    listeners: Vec<Sender<RegionId>>,
}

impl RegionFactory {
    pub fn new() -> Self {
        Self {
            next_region_id: 1,
            next_source_id: 1,
            next_playlist_id: 1,
            ..Default::default()
        }
    }

    /// Receive the id of every region created with `announce = true`.
    pub fn subscribe_new_regions(&mut self) -> Receiver<RegionId> {
        let (tx, rx) = unbounded();
        self.listeners.push(tx);
        rx
    }

    /// Make sure ids loaded from disk are never handed out again.
    pub fn seed_ids(&mut self, region: u64, source: u64, playlist: u64) {
        self.next_region_id = self.next_region_id.max(region + 1);
        self.next_source_id = self.next_source_id.max(source + 1);
        self.next_playlist_id = self.next_playlist_id.max(playlist + 1);
    }

    fn mint_region_id(&mut self) -> RegionId {
        let id = RegionId(self.next_region_id);
        self.next_region_id += 1;
        id
    }

    fn mint_source_id(&mut self) -> SourceId {
        let id = SourceId(self.next_source_id);
        self.next_source_id += 1;
        id
    }

    pub fn next_playlist_id(&mut self) -> PlaylistId {
        let id = PlaylistId(self.next_playlist_id);
        self.next_playlist_id += 1;
        id
    }

    pub fn create_file_source(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        path: impl Into<PathBuf>,
        length: Samplecnt,
        length_mutable: bool,
    ) -> Arc<Source> {
        let id = self.mint_source_id();
        let kind = SourceKind::File(FileSource {
            path: path.into(),
            length,
            natural_position: 0,
            length_mutable,
        });
        self.insert_source(Source::new(id, name.into(), data_type, kind))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_playlist_source(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        playlist: Arc<Playlist>,
        original: PlaylistId,
        channel: u32,
        offset: Samplepos,
        length: Samplecnt,
    ) -> Arc<Source> {
        let id = self.mint_source_id();
        let level = playlist.max_source_level(self) + 1;
        let kind = SourceKind::Playlist(PlaylistSource {
            playlist,
            original,
            channel,
            offset,
            length,
            level,
        });
        self.insert_source(Source::new(id, name.into(), data_type, kind))
    }

    /// Register a source built elsewhere, typically from saved state.
    pub(crate) fn insert_source(&mut self, source: Source) -> Arc<Source> {
        self.next_source_id = self.next_source_id.max(source.id().0 + 1);
        let source = Arc::new(source);
        self.sources.insert(source.id(), source.clone());
        source
    }

    /// Rebuild a saved source under its saved id. A compound source rebuilds
    /// its nested playlist, so the sources that playlist uses must already be
    /// registered.
    pub fn create_source_from_state(&mut self, data: &SourceData) -> Result<Arc<Source>, SessionError> {
        if let Some(existing) = self.sources.get(&SourceId(data.id)) {
            return Ok(existing.clone());
        }

        let kind = match &data.kind {
            SourceKindData::File {
                path,
                length,
                natural_position,
                length_mutable,
            } => SourceKind::File(FileSource {
                path: path.clone(),
                length: *length,
                natural_position: *natural_position,
                length_mutable: *length_mutable,
            }),
            SourceKindData::Playlist {
                original,
                channel,
                offset,
                length,
                playlist,
            } => {
                let nested = Playlist::from_state(self, playlist)?;
                self.next_playlist_id = self.next_playlist_id.max(nested.id().0 + 1);
                let level = nested.max_source_level(self) + 1;
                SourceKind::Playlist(PlaylistSource {
                    playlist: Arc::new(nested),
                    original: PlaylistId(*original),
                    channel: *channel,
                    offset: *offset,
                    length: *length,
                    level,
                })
            }
        };

        Ok(self.insert_source(Source::new(
            SourceId(data.id),
            data.name.clone(),
            data.data_type,
            kind,
        )))
    }

    pub fn source(&self, id: SourceId) -> Option<&Arc<Source>> {
        self.sources.get(&id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Arc<Source>> {
        self.sources.values()
    }

    pub fn create_from_sources(
        &mut self,
        sources: Vec<Arc<Source>>,
        props: RegionProperties,
        announce: bool,
    ) -> RegionId {
        let id = self.mint_region_id();
        let data_type = sources.first().map(|s| s.data_type()).unwrap_or_default();
        let base = sources.first().map(|s| s.name().to_string()).unwrap_or_default();
        let name = match &props.name {
            Some(name) => name.clone(),
            None => self.region_name(&base, false),
        };

        let mut region = Region::new(id, name, data_type, sources);
        region.apply_properties(&props);
        self.map_add(region, announce)
    }

    /// A pure copy: same sources, bounds and name, new identity.
    pub fn create_copy(&mut self, other: RegionId, announce: bool) -> Option<RegionId> {
        let id = self.mint_region_id();
        let region = self.regions.get(&other)?.duplicate_as(id);
        Some(self.map_add(region, announce))
    }

    /// A copy of `other` with `props` applied on top.
    pub fn create_from(
        &mut self,
        other: RegionId,
        props: RegionProperties,
        announce: bool,
    ) -> Option<RegionId> {
        let id = self.mint_region_id();
        let mut region = self.regions.get(&other)?.duplicate_as(id);
        let props = RegionProperties {
            whole_file: props.whole_file.or(Some(false)),
            ..props
        };
        region.apply_properties(&props);
        Some(self.map_add(region, announce))
    }

    /// A copy of `other` reading from different sources.
    pub fn create_with_sources(
        &mut self,
        other: RegionId,
        sources: Vec<Arc<Source>>,
        props: RegionProperties,
        announce: bool,
    ) -> Option<RegionId> {
        let template = self.regions.get(&other)?.clone();
        let id = self.mint_region_id();
        let mut region = Region::new(id, template.name().to_string(), template.data_type(), sources);
        region.apply_state(&RegionData {
            id: id.0,
            ..template.state()
        });
        region.apply_properties(&props);
        Some(self.map_add(region, announce))
    }

    /// Rebuild a region from saved state, keeping its id. If the id is already
    /// live its scalar state is restored in place.
    pub fn create_from_state(&mut self, data: &RegionData) -> Result<RegionId, SessionError> {
        let id = RegionId(data.id);
        if let Some(existing) = self.regions.get_mut(&id) {
            existing.apply_state(data);
            return Ok(id);
        }

        let sources = self.resolve_sources(data.id, &data.sources)?;
        let master_sources = self.resolve_sources(data.id, &data.master_sources)?;
        self.next_region_id = self.next_region_id.max(data.id + 1);

        let region = Region::from_state(data, sources, master_sources);
        Ok(self.map_add(region, false))
    }

    fn resolve_sources(&self, region: u64, ids: &[u64]) -> Result<Vec<Arc<Source>>, SessionError> {
        ids.iter()
            .map(|id| {
                self.sources
                    .get(&SourceId(*id))
                    .cloned()
                    .ok_or(SessionError::MissingSource {
                        region,
                        source_id: *id,
                    })
            })
            .collect()
    }

    fn map_add(&mut self, region: Region, announce: bool) -> RegionId {
        let id = region.id();
        self.note_name(region.name(), id);
        self.regions.insert(id, region);

        if announce {
            self.listeners.retain(|tx| tx.send(id).is_ok());
        }
        id
    }

    pub fn region_by_id(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    /// Direct access for editing regions that are not in a playlist.
    /// Members of a playlist should be edited through `Playlist::modify_region`.
    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.get_mut(&id)
    }

    pub fn region_by_name(&self, name: &str) -> Option<&Region> {
        self.region_name_map
            .get(name)
            .and_then(|id| self.regions.get(id))
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions_using_source(&self, source: SourceId) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = self
            .regions
            .values()
            .filter(|r| r.uses_source(source, self))
            .map(|r| r.id())
            .collect();
        ids.sort();
        ids
    }

    /// A unique name derived from `base`: `clip`, then `clip.1`, `clip.2`, ...
    ///
    /// Unless `new_level` is set, a trailing numeric suffix on `base` is
    /// stripped first so that splitting `clip.3` yields `clip.4`, not `clip.3.1`.
    pub fn region_name(&mut self, base: &str, new_level: bool) -> String {
        let base = base.rsplit('/').next().unwrap_or(base);
        if base.is_empty() {
            let mut n = self.regions.len() + 1;
            loop {
                let candidate = format!("region.{n}");
                if !self.region_name_map.contains_key(&candidate) {
                    return candidate;
                }
                n += 1;
            }
        }

        let subbase = if new_level {
            base
        } else {
            split_numeric_suffix(base).map_or(base, |(stem, _)| stem)
        };

        if !self.region_name_number_map.contains_key(subbase) && !self.region_name_map.contains_key(subbase) {
            self.region_name_number_map.insert(subbase.to_string(), 0);
            return subbase.to_string();
        }

        let counter = self.region_name_number_map.entry(subbase.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{subbase}.{counter}");
            if !self.region_name_map.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub fn new_region_name(&mut self, old: &str) -> String {
        self.region_name(old, false)
    }

    pub fn compound_region_name(playlist: &str, combine_ops: u32, level: u32, whole_source: bool) -> String {
        let name = format!("{playlist} compound-{} ({})", combine_ops + 1, level + 1);
        if whole_source {
            format!("{name}+")
        } else {
            name
        }
    }

    pub fn rename_region(&mut self, id: RegionId, new_name: &str) -> bool {
        let Some(region) = self.regions.get_mut(&id) else {
            return false;
        };
        let old = region.name().to_string();
        if region.set_name(new_name.to_string()).is_empty() {
            return false;
        }
        if self.region_name_map.get(&old) == Some(&id) {
            self.region_name_map.remove(&old);
        }
        self.note_name(new_name, id);
        true
    }

    fn note_name(&mut self, name: &str, id: RegionId) {
        self.region_name_map.insert(name.to_string(), id);
        match split_numeric_suffix(name) {
            Some((stem, n)) => {
                let counter = self.region_name_number_map.entry(stem.to_string()).or_insert(0);
                *counter = (*counter).max(n);
            }
            None => {
                self.region_name_number_map.entry(name.to_string()).or_insert(0);
            }
        }
    }

    pub fn add_compound_association(&mut self, original: RegionId, copy: RegionId) {
        self.compound_associations.insert(copy, original);
    }

    /// copy -> original
    pub fn compound_associations(&self) -> &HashMap<RegionId, RegionId> {
        &self.compound_associations
    }

    pub fn original_of(&self, copy: RegionId) -> Option<RegionId> {
        self.compound_associations.get(&copy).copied()
    }

    /// Keep a region alive outside any playlist, e.g. while selected.
    pub fn hold(&mut self, id: RegionId) {
        *self.holds.entry(id).or_insert(0) += 1;
    }

    pub fn release(&mut self, id: RegionId) {
        if let Some(count) = self.holds.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.holds.remove(&id);
            }
        }
    }

    pub fn remove_region(&mut self, id: RegionId) -> Option<Region> {
        let region = self.regions.remove(&id)?;
        if self.region_name_map.get(region.name()) == Some(&id) {
            self.region_name_map.remove(region.name());
        }
        self.holds.remove(&id);
        Some(region)
    }

    /// Drop every region not in `live`, not held, and not part of a compound association.
    pub fn collect_unused(&mut self, live: &HashSet<RegionId>) -> usize {
        let associated: HashSet<RegionId> = self
            .compound_associations
            .iter()
            .flat_map(|(copy, original)| [*copy, *original])
            .collect();

        let dead: Vec<RegionId> = self
            .regions
            .keys()
            .filter(|id| !live.contains(id) && !self.holds.contains_key(id) && !associated.contains(id))
            .copied()
            .collect();

        for id in &dead {
            self.remove_region(*id);
        }
        if !dead.is_empty() {
            log::debug!("dropped {} unused regions", dead.len());
        }
        dead.len()
    }
}

fn split_numeric_suffix(name: &str) -> Option<(&str, u32)> {
    let (stem, suffix) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    suffix.parse().ok().map(|n| (stem, n))
}
