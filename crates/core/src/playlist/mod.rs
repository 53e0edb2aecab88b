//! A track's timeline: an ordered set of regions, their stacking, and the
//! edit operations that reshape them.
//!
//! Region data lives in the [`RegionFactory`]; a playlist only holds ids, kept
//! sorted by position. Every mutating operation takes the factory by `&mut`,
//! queries take it by `&`. Change notifications are queued while the playlist
//! is frozen and delivered, after relayering, when the outermost
//! [`Playlist::thaw`] runs.

mod combine;
mod edit;
mod layering;
mod query;
mod state;

use std::collections::BTreeSet;
use std::mem;

use crossbeam_channel::{Receiver, Sender, unbounded};
use daw_transport::{
    DataType, EditMode, LayerModel, MAX_SAMPLEPOS, PositionLockStyle, Range, RangeMove, Samplecnt,
    Samplepos, TempoMap, coalesce_ranges,
};

use crate::events::PlaylistEvent;
use crate::region::{PropertyChange, Region, RegionId, RegionProperties};
use crate::region_factory::RegionFactory;

pub use layering::{LAYER_BOTTOM, LAYER_TOP};
pub use query::RegionPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaylistId(pub u64);

/// Changes collected while frozen, drained by `flush`.
#[derive(Debug, Default)]
struct PendingChanges {
    adds: Vec<RegionId>,
    removes: Vec<RegionId>,
    bounds: Vec<RegionId>,
    range_moves: Vec<RangeMove>,
    region_extensions: Vec<Range>,
    dependent_ranges: Vec<Range>,
    contents: bool,
    layering: bool,
}

#[derive(Debug)]
pub struct Playlist {
    id: PlaylistId,
    name: String,
    data_type: DataType,
    /// Members, sorted by position. Ties keep insertion order.
    regions: Vec<RegionId>,
    /// Every region ever added, kept for undo and source-use queries.
    all_regions: BTreeSet<RegionId>,

    edit_mode: EditMode,
    layer_model: LayerModel,
    use_overlap_equivalency: bool,
    tempo_map: TempoMap,

    frozen: bool,
    hidden: bool,
    orig_track_id: Option<u64>,
    shared_with: Vec<u64>,
    combine_ops: u32,
    subcnt: u32,

    freeze_depth: u32,
    pending: PendingChanges,
    in_set_state: bool,
    in_flush: bool,
    in_partition: bool,
    in_undo: bool,
    splicing: bool,
    rippling: bool,
    nudging: bool,
    shuffling: bool,
    /// Nonzero while a compound edit handles splicing itself.
    splice_suppressed: u32,

    /// Bumped after every flush; snapshot publishers compare against it.
    generation: u64,
    listeners: Vec<Sender<PlaylistEvent>>,
}

impl Playlist {
    pub fn new(id: PlaylistId, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            regions: Vec::new(),
            all_regions: BTreeSet::new(),
            edit_mode: EditMode::Normal,
            layer_model: LayerModel::LayeringIndex,
            use_overlap_equivalency: false,
            tempo_map: TempoMap::default(),
            frozen: false,
            hidden: false,
            orig_track_id: None,
            shared_with: Vec::new(),
            combine_ops: 0,
            subcnt: 0,
            freeze_depth: 0,
            pending: PendingChanges::default(),
            in_set_state: false,
            in_flush: false,
            in_partition: false,
            in_undo: false,
            splicing: false,
            rippling: false,
            nudging: false,
            shuffling: false,
            splice_suppressed: 0,
            generation: 0,
            listeners: Vec::new(),
        }
    }

    /// An empty playlist carrying over this one's editing settings.
    fn sibling(&self, id: PlaylistId, name: impl Into<String>, hidden: bool) -> Self {
        let mut pl = Self::new(id, name, self.data_type);
        pl.edit_mode = self.edit_mode;
        pl.layer_model = self.layer_model;
        pl.use_overlap_equivalency = self.use_overlap_equivalency;
        pl.tempo_map = self.tempo_map;
        pl.hidden = hidden;
        pl
    }

    pub fn subscribe(&mut self) -> Receiver<PlaylistEvent> {
        let (tx, rx) = unbounded();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: PlaylistEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn id(&self) -> PlaylistId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    pub fn set_edit_mode(&mut self, mode: EditMode) {
        self.edit_mode = mode;
    }

    pub fn layer_model(&self) -> LayerModel {
        self.layer_model
    }

    pub fn set_layer_model(&mut self, model: LayerModel) {
        self.layer_model = model;
    }

    pub fn set_use_overlap_equivalency(&mut self, yn: bool) {
        self.use_overlap_equivalency = yn;
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    /// Adopt a tempo map without moving anything, as when loading.
    pub(crate) fn set_tempo_map(&mut self, tempo: TempoMap) {
        self.tempo_map = tempo;
    }

    pub fn frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_frozen(&mut self, yn: bool) {
        self.frozen = yn;
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn orig_track_id(&self) -> Option<u64> {
        self.orig_track_id
    }

    pub fn set_orig_track_id(&mut self, track: Option<u64>) {
        self.orig_track_id = track;
    }

    pub fn shared_with(&self) -> &[u64] {
        &self.shared_with
    }

    pub fn share_with(&mut self, track: u64) {
        if !self.shared_with.contains(&track) {
            self.shared_with.push(track);
        }
    }

    pub fn unshare_with(&mut self, track: u64) {
        self.shared_with.retain(|t| *t != track);
    }

    pub fn combine_ops(&self) -> u32 {
        self.combine_ops
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn holding_state(&self) -> bool {
        self.freeze_depth > 0
    }

    /// Start batching. Nested calls must be balanced by [`Playlist::thaw`].
    pub fn freeze(&mut self) {
        self.freeze_depth += 1;
    }

    /// End a batch. The outermost thaw relayers and delivers queued events.
    pub fn thaw(&mut self, rf: &mut RegionFactory) {
        self.release(rf, false);
    }

    fn release(&mut self, rf: &mut RegionFactory, from_undo: bool) {
        if self.freeze_depth == 0 {
            return;
        }
        self.freeze_depth -= 1;
        if self.freeze_depth == 0 {
            self.flush(rf, from_undo);
        }
    }

    /// Replaying history: edits must not splice again.
    pub fn begin_undo(&mut self) {
        self.in_undo = true;
        self.freeze();
    }

    pub fn end_undo(&mut self, rf: &mut RegionFactory) {
        self.release(rf, true);
        self.in_undo = false;
    }

    fn flush(&mut self, rf: &mut RegionFactory, from_undo: bool) {
        if self.in_flush {
            return;
        }
        self.in_flush = true;

        let pending = mem::take(&mut self.pending);
        let regions_changed =
            !pending.bounds.is_empty() || !pending.removes.is_empty() || !pending.adds.is_empty();

        let mut dependent = pending.dependent_ranges;
        for id in &pending.bounds {
            if let Some(r) = rf.region(*id) {
                dependent.push(r.last_range());
                dependent.push(r.range());
            }
        }
        for id in &pending.removes {
            if let Some(r) = rf.region(*id) {
                dependent.push(r.range());
            }
            self.emit(PlaylistEvent::RegionRemoved(*id));
        }
        for id in &pending.adds {
            if let Some(r) = rf.region(*id) {
                dependent.push(r.range());
            }
        }

        // new regions are only announced once their layer is known
        if ((regions_changed || pending.contents) && !self.in_set_state) || pending.layering {
            self.relayer(rf);
        }

        if regions_changed || pending.contents {
            self.emit(PlaylistEvent::ContentsChanged);
        }

        for id in &pending.adds {
            if let Some(r) = rf.region_mut(*id) {
                r.clear_changes();
            }
            self.emit(PlaylistEvent::RegionAdded(*id));
        }

        let dependent = coalesce_ranges(dependent);
        if !dependent.is_empty() {
            self.emit(PlaylistEvent::DependentRangesChanged(dependent));
        }

        if !pending.range_moves.is_empty() {
            self.emit(PlaylistEvent::RangesMoved {
                moves: pending.range_moves,
                from_undo,
            });
        }

        if !pending.region_extensions.is_empty() {
            self.emit(PlaylistEvent::RegionsExtended(pending.region_extensions));
        }

        self.generation += 1;
        self.in_flush = false;
    }

    fn notify_region_added(&mut self, id: RegionId) {
        if !self.pending.adds.contains(&id) {
            self.pending.adds.push(id);
        }
        self.pending.contents = true;
    }

    fn notify_region_removed(&mut self, id: RegionId) {
        if !self.pending.removes.contains(&id) {
            self.pending.removes.push(id);
        }
        self.pending.contents = true;
    }

    fn notify_layering_changed(&mut self) {
        if self.holding_state() {
            self.pending.layering = true;
        } else {
            self.pending.layering = false;
            self.emit(PlaylistEvent::LayeringChanged);
        }
    }

    /// Insert `region` at `position`, `times` times end to end.
    ///
    /// A fractional `times` adds a final shortened copy. Every added region is
    /// raised to the top, and in splice or ripple mode later material moves
    /// out of the way. With `auto_partition` the destination span is cut
    /// clear first.
    pub fn add_region(
        &mut self,
        rf: &mut RegionFactory,
        region: RegionId,
        position: Samplepos,
        times: f64,
        auto_partition: bool,
    ) {
        let Some(template) = rf.region(region) else {
            return;
        };
        if !self.accepts(region, template) {
            return;
        }
        let length = template.length();
        let base_name = template.name().to_string();
        let start = template.start();
        let layer = template.layer();

        let times = times.abs();
        self.freeze();
        self.splice_suppressed += 1;

        if auto_partition {
            let span = (length as f64 * times).floor() as Samplecnt;
            self.partition_internal(rf, position, position.saturating_add(span), true);
        }

        let mut itimes = times.floor() as u64;
        let mut pos = position;
        let mut added = Vec::new();

        if itimes >= 1 {
            if self.add_region_internal(rf, region, pos) {
                self.set_layer(rf, region, LAYER_TOP);
                added.push(region);
            }
            pos = pos.saturating_add(length);
            itimes -= 1;
        }

        for _ in 0..itimes {
            if let Some(copy) = rf.create_copy(region, true) {
                if self.add_region_internal(rf, copy, pos) {
                    self.set_layer(rf, copy, LAYER_TOP);
                    added.push(copy);
                }
            }
            pos = pos.saturating_add(length);
        }

        let mut tail = 0;
        let fraction = times - times.floor();
        if fraction > 0.0 {
            tail = ((length as f64 * fraction).floor() as Samplecnt).max(1);
            let name = rf.region_name(&base_name, false);
            let props = RegionProperties::new()
                .start(start)
                .length(tail)
                .name(name)
                .layer(layer);
            if let Some(sub) = rf.create_from(region, props, true) {
                if self.add_region_internal(rf, sub, pos) {
                    self.set_layer(rf, sub, LAYER_TOP);
                    added.push(sub);
                }
            }
        }

        self.splice_suppressed -= 1;
        self.possibly_splice(rf, position, pos.saturating_add(tail) - position, &added);
        self.thaw(rf);
    }

    /// Whether `region` may live here at all: same data type, and not owned
    /// by another playlist. Copies of a refused region are refused too.
    fn accepts(&self, id: RegionId, region: &Region) -> bool {
        if region.data_type() != self.data_type {
            log::warn!(
                "playlist {:?} ({}) refuses {} region {:?}",
                self.id,
                self.data_type,
                region.data_type(),
                id
            );
            return false;
        }
        if region.playlist().is_some_and(|owner| owner != self.id) {
            log::warn!("region {:?} belongs to another playlist", id);
            return false;
        }
        true
    }

    fn add_region_internal(&mut self, rf: &mut RegionFactory, id: RegionId, position: Samplepos) -> bool {
        let Some(region) = rf.region(id) else {
            return false;
        };
        if !self.accepts(id, region) {
            return false;
        }
        if self.regions.contains(&id) {
            log::warn!("region {:?} is already on playlist {:?}", id, self.id);
            return false;
        }
        let Some(region) = rf.region_mut(id) else {
            return false;
        };

        region.set_playlist(Some(self.id));
        region.set_position_internal(position);
        region.recompute_beat_position(&self.tempo_map);
        let position = region.position();
        let length = region.length();

        let at = self.upper_bound(rf, position);
        self.regions.insert(at, id);
        self.all_regions.insert(id);

        self.possibly_splice(rf, position, length, &[id]);
        self.notify_region_added(id);
        true
    }

    /// Remove one region instance. Later material closes the gap in splice mode.
    pub fn remove_region(&mut self, rf: &mut RegionFactory, region: RegionId) {
        self.freeze();
        self.remove_region_internal(rf, region);
        self.thaw(rf);
    }

    fn remove_region_internal(&mut self, rf: &mut RegionFactory, id: RegionId) -> bool {
        let Some(index) = self.regions.iter().position(|r| *r == id) else {
            return false;
        };
        self.regions.remove(index);

        let Some(region) = rf.region_mut(id) else {
            return false;
        };
        if !self.in_set_state {
            region.set_playlist(None);
        }
        let (position, length) = (region.position(), region.length());

        self.possibly_splice(rf, position, -length, &[]);
        self.notify_region_removed(id);
        true
    }

    /// Apply `f` to a member region and react to what it changed.
    ///
    /// This is how playlist members are edited from outside: moving a region
    /// re-sorts the playlist, splices in splice mode, and queues the matching
    /// events. Non-members are left alone.
    pub fn modify_region(
        &mut self,
        rf: &mut RegionFactory,
        region: RegionId,
        f: impl FnOnce(&mut Region) -> PropertyChange,
    ) -> PropertyChange {
        if !self.contains(region) {
            return PropertyChange::NONE;
        }
        self.freeze();
        let change = self.edit_region(rf, region, f);
        self.thaw(rf);
        change
    }

    fn edit_region(
        &mut self,
        rf: &mut RegionFactory,
        id: RegionId,
        f: impl FnOnce(&mut Region) -> PropertyChange,
    ) -> PropertyChange {
        let Some(region) = rf.region_mut(id) else {
            return PropertyChange::NONE;
        };
        let change = f(region);
        if !change.is_empty() {
            self.region_changed(rf, id, change);
        }
        change
    }

    fn region_changed(&mut self, rf: &mut RegionFactory, id: RegionId, what: PropertyChange) {
        if self.in_set_state || self.in_flush {
            return;
        }

        if what.contains(PropertyChange::BOUNDS) {
            self.region_bounds_changed(rf, id, what);
        }

        let Some(region) = rf.region_mut(id) else {
            return;
        };

        if what.contains(PropertyChange::POSITION)
            && region.position_lock_style() == PositionLockStyle::MusicTime
        {
            region.recompute_beat_position(&self.tempo_map);
        }

        let moved = what.contains(PropertyChange::POSITION);
        let resized = what.contains(PropertyChange::LENGTH);
        let (position, length) = (region.position(), region.length());
        let (last_position, last_length) = (region.last_position(), region.last_length());

        match (moved, resized) {
            (true, false) => {
                self.pending
                    .range_moves
                    .push(RangeMove::new(last_position, length, position));
            }
            (false, true) if length > last_length => {
                self.pending
                    .region_extensions
                    .push(Range::new(position + last_length, position + length));
            }
            (true, true) if position < last_position => {
                self.pending
                    .region_extensions
                    .push(Range::new(position, last_position));
            }
            _ => {}
        }

        if what.contains(PropertyChange::MUTED | PropertyChange::OPAQUE) {
            self.pending.dependent_ranges.push(Range::new(position, position + length));
            self.pending.contents = true;
        }
    }

    fn region_bounds_changed(&mut self, rf: &mut RegionFactory, id: RegionId, what: PropertyChange) {
        if !self.contains(id) {
            return;
        }

        // bulk movers re-sort once when they finish
        if self.splicing || self.rippling || self.nudging || self.shuffling {
            self.pending.bounds.push(id);
            return;
        }

        if what.contains(PropertyChange::POSITION) {
            self.regions.retain(|r| *r != id);
            let position = position_of(rf, id);
            let at = self.upper_bound(rf, position);
            self.regions.insert(at, id);
        }

        if what.contains(PropertyChange::POSITION | PropertyChange::LENGTH) {
            if let Some(region) = rf.region(id) {
                let mut delta = 0;
                if what.contains(PropertyChange::POSITION) {
                    delta += region.position() - region.last_position();
                }
                if what.contains(PropertyChange::LENGTH) {
                    delta += region.length() - region.last_length();
                }
                let at = region.last_position() + region.last_length();
                if delta != 0 {
                    self.possibly_splice(rf, at, delta, &[id]);
                }
            }
        }

        self.pending.bounds.push(id);
    }

    fn upper_bound(&self, rf: &RegionFactory, position: Samplepos) -> usize {
        self.regions
            .partition_point(|id| position_of(rf, *id) <= position)
    }

    fn sort_regions(&mut self, rf: &RegionFactory) {
        self.regions.sort_by_key(|id| position_of(rf, *id));
    }

    fn possibly_splice(&mut self, rf: &mut RegionFactory, at: Samplepos, distance: Samplecnt, exclude: &[RegionId]) {
        if self.splicing
            || self.rippling
            || self.splice_suppressed > 0
            || self.in_set_state
            || self.in_undo
            || self.in_partition
        {
            return;
        }

        match self.edit_mode {
            EditMode::Normal => {}
            EditMode::Splice => self.core_splice(rf, at, distance, exclude),
            EditMode::Ripple => self.core_ripple(rf, at, distance, exclude),
        }
    }

    /// Move every region at or after `at` by `distance`, except `exclude`.
    pub fn splice(&mut self, rf: &mut RegionFactory, at: Samplepos, distance: Samplecnt, exclude: Option<RegionId>) {
        self.freeze();
        self.core_splice(rf, at, distance, exclude.as_slice());
        self.thaw(rf);
    }

    /// Like [`Playlist::splice`], but leaves a whole set of regions in place,
    /// typically ones a group edit has already moved.
    pub fn ripple(&mut self, rf: &mut RegionFactory, at: Samplepos, distance: Samplecnt, exclude: &[RegionId]) {
        self.freeze();
        self.core_ripple(rf, at, distance, exclude);
        self.thaw(rf);
    }

    fn core_splice(&mut self, rf: &mut RegionFactory, at: Samplepos, distance: Samplecnt, exclude: &[RegionId]) {
        self.splicing = true;
        self.shift_from(rf, at, distance, exclude);
        self.splicing = false;
    }

    fn core_ripple(&mut self, rf: &mut RegionFactory, at: Samplepos, distance: Samplecnt, exclude: &[RegionId]) {
        self.rippling = true;
        self.shift_from(rf, at, distance, exclude);
        self.rippling = false;
    }

    fn shift_from(&mut self, rf: &mut RegionFactory, at: Samplepos, distance: Samplecnt, exclude: &[RegionId]) {
        for id in self.regions.clone() {
            if exclude.contains(&id) {
                continue;
            }
            let Some(region) = rf.region(id) else {
                continue;
            };
            if region.position() < at {
                continue;
            }
            let target = clamp_position(region.position(), distance, region.length());
            self.edit_region(rf, id, |r| r.set_position(target));
        }
        self.sort_regions(rf);
        self.pending.contents = true;
    }
}

fn position_of(rf: &RegionFactory, id: RegionId) -> Samplepos {
    rf.region(id).map_or(0, |r| r.position())
}

/// `position + distance`, kept inside `[0, MAX_SAMPLEPOS - length]`.
fn clamp_position(position: Samplepos, distance: Samplecnt, length: Samplecnt) -> Samplepos {
    position
        .saturating_add(distance)
        .clamp(0, MAX_SAMPLEPOS - length)
}
