use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use daw_project::{RegionData, RegionKindData};
use daw_transport::{
    DataType, MAX_SAMPLEPOS, OverlapType, PositionLockStyle, Range, Samplecnt, Sampleoffset,
    Samplepos, TempoMap, Ticks, coverage,
};

use crate::playlist::PlaylistId;
use crate::region_factory::RegionFactory;
use crate::source::{Source, SourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u64);

pub type Layer = u32;

/// The set of region properties touched by an edit. Empty means the edit was rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyChange(u32);

impl PropertyChange {
    pub const NONE: Self = Self(0);
    pub const POSITION: Self = Self(1 << 0);
    pub const START: Self = Self(1 << 1);
    pub const LENGTH: Self = Self(1 << 2);
    pub const LAYER: Self = Self(1 << 3);
    pub const LAYERING_INDEX: Self = Self(1 << 4);
    pub const NAME: Self = Self(1 << 5);
    pub const MUTED: Self = Self(1 << 6);
    pub const OPAQUE: Self = Self(1 << 7);
    pub const LOCKED: Self = Self(1 << 8);
    pub const VIDEO_LOCKED: Self = Self(1 << 9);
    pub const POSITION_LOCKED: Self = Self(1 << 10);
    pub const HIDDEN: Self = Self(1 << 11);
    pub const SYNC: Self = Self(1 << 12);
    pub const LOCK_STYLE: Self = Self(1 << 13);

    pub const BOUNDS: Self = Self(Self::POSITION.0 | Self::START.0 | Self::LENGTH.0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any property in `other` is also in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for PropertyChange {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PropertyChange {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioRegionData {
    pub scale_amplitude: f32,
    pub fade_in_length: Samplecnt,
    pub fade_out_length: Samplecnt,
}

impl Default for AudioRegionData {
    fn default() -> Self {
        Self {
            scale_amplitude: 1.0,
            fade_in_length: 64,
            fade_out_length: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MidiRegionData {
    /// Offset into the source in musical time.
    pub start_beats: Ticks,
    pub length_beats: Ticks,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegionKind {
    Audio(AudioRegionData),
    Midi(MidiRegionData),
}

impl RegionKind {
    pub fn for_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Audio => RegionKind::Audio(AudioRegionData::default()),
            DataType::Midi => RegionKind::Midi(MidiRegionData::default()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            RegionKind::Audio(_) => DataType::Audio,
            RegionKind::Midi(_) => DataType::Midi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionFlags {
    pub muted: bool,
    pub opaque: bool,
    pub locked: bool,
    pub video_locked: bool,
    pub position_locked: bool,
    pub hidden: bool,
    pub whole_file: bool,
    /// Created by an edit rather than by the user.
    pub automatic: bool,
    pub import: bool,
    pub external: bool,
    pub sync_marked: bool,
    pub left_of_split: bool,
    pub right_of_split: bool,
}

impl Default for RegionFlags {
    fn default() -> Self {
        Self {
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
        }
    }
}

/// Overrides applied when the factory mints a region.
#[derive(Debug, Clone, Default)]
pub struct RegionProperties {
    pub name: Option<String>,
    pub position: Option<Samplepos>,
    pub start: Option<Samplepos>,
    pub length: Option<Samplecnt>,
    pub layer: Option<Layer>,
    pub layering_index: Option<u64>,
    pub muted: Option<bool>,
    pub opaque: Option<bool>,
    pub hidden: Option<bool>,
    pub whole_file: Option<bool>,
    pub automatic: Option<bool>,
    pub external: Option<bool>,
    pub import: Option<bool>,
    pub left_of_split: Option<bool>,
    pub right_of_split: Option<bool>,
    pub position_lock_style: Option<PositionLockStyle>,
    pub start_beats: Option<Ticks>,
}

impl RegionProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn position(mut self, position: Samplepos) -> Self {
        self.position = Some(position);
        self
    }

    pub fn start(mut self, start: Samplepos) -> Self {
        self.start = Some(start);
        self
    }

    pub fn length(mut self, length: Samplecnt) -> Self {
        self.length = Some(length);
        self
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn layering_index(mut self, index: u64) -> Self {
        self.layering_index = Some(index);
        self
    }

    pub fn muted(mut self, yn: bool) -> Self {
        self.muted = Some(yn);
        self
    }

    pub fn hidden(mut self, yn: bool) -> Self {
        self.hidden = Some(yn);
        self
    }

    pub fn whole_file(mut self, yn: bool) -> Self {
        self.whole_file = Some(yn);
        self
    }

    pub fn automatic(mut self, yn: bool) -> Self {
        self.automatic = Some(yn);
        self
    }

    pub fn external(mut self, yn: bool) -> Self {
        self.external = Some(yn);
        self
    }

    pub fn left_of_split(mut self, yn: bool) -> Self {
        self.left_of_split = Some(yn);
        self
    }

    pub fn right_of_split(mut self, yn: bool) -> Self {
        self.right_of_split = Some(yn);
        self
    }

    pub fn position_lock_style(mut self, style: PositionLockStyle) -> Self {
        self.position_lock_style = Some(style);
        self
    }

    pub fn start_beats(mut self, beats: Ticks) -> Self {
        self.start_beats = Some(beats);
        self
    }
}

/// A time slice of one or more sources, placed on the timeline.
///
/// Regions are only minted by [`RegionFactory`]. Bounds setters validate
/// their input and silently do nothing when the result would be invalid;
/// the returned [`PropertyChange`] says what actually changed.
#[derive(Debug, Clone)]
pub struct Region {
    id: RegionId,
    name: String,
    kind: RegionKind,
    position: Samplepos,
    start: Samplepos,
    length: Samplecnt,
    last_position: Samplepos,
    last_length: Samplecnt,
    layer: Layer,
    layering_index: u64,
    flags: RegionFlags,
    sync_position: Samplepos,
    ancestral_start: Samplepos,
    ancestral_length: Samplecnt,
    stretch: f32,
    shift: f32,
    position_lock_style: PositionLockStyle,
    beat_position: Ticks,
    sources: Vec<Arc<Source>>,
    master_sources: Vec<Arc<Source>>,
    playlist: Option<PlaylistId>,
    tags: String,
    changes: PropertyChange,
}

impl Region {
    pub(crate) fn new(id: RegionId, name: String, data_type: DataType, sources: Vec<Arc<Source>>) -> Self {
        let length = sources.first().map(|s| s.length(0)).unwrap_or(1).max(1);
        Self {
            id,
            name,
            kind: RegionKind::for_type(data_type),
            position: 0,
            start: 0,
            length,
            last_position: 0,
            last_length: length,
            layer: 0,
            layering_index: 0,
            flags: RegionFlags::default(),
            sync_position: 0,
            ancestral_start: 0,
            ancestral_length: length,
            stretch: 1.0,
            shift: 1.0,
            position_lock_style: PositionLockStyle::AudioTime,
            beat_position: 0,
            master_sources: sources.clone(),
            sources,
            playlist: None,
            tags: String::new(),
            changes: PropertyChange::NONE,
        }
    }

    /// A copy of this region under a new identity, detached from any playlist.
    pub(crate) fn duplicate_as(&self, id: RegionId) -> Self {
        let mut region = self.clone();
        region.id = id;
        region.playlist = None;
        region.changes = PropertyChange::NONE;
        region
    }

    pub(crate) fn apply_properties(&mut self, props: &RegionProperties) {
        if let Some(name) = &props.name {
            self.name = name.clone();
        }
        if let Some(start) = props.start {
            self.start = start.max(0);
        }
        if let Some(length) = props.length.filter(|l| *l > 0) {
            self.length = length;
        }
        if let Some(position) = props.position {
            self.position = position.clamp(0, MAX_SAMPLEPOS - self.length);
        }
        if let Some(layer) = props.layer {
            self.layer = layer;
        }
        if let Some(index) = props.layering_index {
            self.layering_index = index;
        }
        let flags = &mut self.flags;
        for (value, flag) in [
            (props.muted, &mut flags.muted),
            (props.opaque, &mut flags.opaque),
            (props.hidden, &mut flags.hidden),
            (props.whole_file, &mut flags.whole_file),
            (props.automatic, &mut flags.automatic),
            (props.external, &mut flags.external),
            (props.import, &mut flags.import),
            (props.left_of_split, &mut flags.left_of_split),
            (props.right_of_split, &mut flags.right_of_split),
        ] {
            if let Some(value) = value {
                *flag = value;
            }
        }
        if let Some(style) = props.position_lock_style {
            self.position_lock_style = style;
        }
        if let (Some(beats), RegionKind::Midi(midi)) = (props.start_beats, &mut self.kind) {
            midi.start_beats = beats;
        }
        self.last_position = self.position;
        self.last_length = self.length;
    }

    pub(crate) fn from_state(data: &RegionData, sources: Vec<Arc<Source>>, master_sources: Vec<Arc<Source>>) -> Self {
        let mut region = Self::new(RegionId(data.id), data.name.clone(), data.data_type, sources);
        region.master_sources = master_sources;
        region.apply_state(data);
        region
    }

    /// Restore every scalar attribute from persisted state. Sources are left alone.
    pub(crate) fn apply_state(&mut self, data: &RegionData) {
        self.name = data.name.clone();
        self.position = data.position.max(0);
        self.start = data.start;
        self.length = data.length.max(1);
        self.last_position = self.position;
        self.last_length = self.length;
        self.layer = data.layer;
        self.layering_index = data.layering_index;
        self.flags = RegionFlags {
            muted: data.muted,
            opaque: data.opaque,
            locked: data.locked,
            video_locked: data.video_locked,
            position_locked: data.position_locked,
            hidden: data.hidden,
            whole_file: data.whole_file,
            automatic: data.automatic,
            import: data.import,
            external: data.external,
            sync_marked: data.sync_marked,
            left_of_split: data.left_of_split,
            right_of_split: data.right_of_split,
        };
        self.sync_position = data.sync_position;
        self.ancestral_start = data.ancestral_start;
        self.ancestral_length = data.ancestral_length;
        self.stretch = data.stretch;
        self.shift = data.shift;
        self.position_lock_style = data.position_lock_style;
        self.beat_position = data.beat_position;
        self.kind = match data.kind {
            RegionKindData::Audio {
                scale_amplitude,
                fade_in_length,
                fade_out_length,
            } => RegionKind::Audio(AudioRegionData {
                scale_amplitude,
                fade_in_length,
                fade_out_length,
            }),
            RegionKindData::Midi {
                start_beats,
                length_beats,
            } => RegionKind::Midi(MidiRegionData {
                start_beats,
                length_beats,
            }),
        };
        self.tags = data.tags.clone();
        self.changes = PropertyChange::NONE;
    }

    pub fn state(&self) -> RegionData {
        let kind = match self.kind {
            RegionKind::Audio(audio) => RegionKindData::Audio {
                scale_amplitude: audio.scale_amplitude,
                fade_in_length: audio.fade_in_length,
                fade_out_length: audio.fade_out_length,
            },
            RegionKind::Midi(midi) => RegionKindData::Midi {
                start_beats: midi.start_beats,
                length_beats: midi.length_beats,
            },
        };

        RegionData {
            id: self.id.0,
            name: self.name.clone(),
            data_type: self.data_type(),
            position: self.position,
            start: self.start,
            length: self.length,
            layer: self.layer,
            layering_index: self.layering_index,
            muted: self.flags.muted,
            opaque: self.flags.opaque,
            locked: self.flags.locked,
            video_locked: self.flags.video_locked,
            position_locked: self.flags.position_locked,
            hidden: self.flags.hidden,
            whole_file: self.flags.whole_file,
            automatic: self.flags.automatic,
            import: self.flags.import,
            external: self.flags.external,
            sync_marked: self.flags.sync_marked,
            left_of_split: self.flags.left_of_split,
            right_of_split: self.flags.right_of_split,
            sync_position: self.sync_position,
            ancestral_start: self.ancestral_start,
            ancestral_length: self.ancestral_length,
            stretch: self.stretch,
            shift: self.shift,
            position_lock_style: self.position_lock_style,
            beat_position: self.beat_position,
            kind,
            sources: self.sources.iter().map(|s| s.id().0).collect(),
            master_sources: self.master_sources.iter().map(|s| s.id().0).collect(),
            tags: self.tags.clone(),
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &RegionKind {
        &self.kind
    }

    pub fn data_type(&self) -> DataType {
        self.kind.data_type()
    }

    pub fn position(&self) -> Samplepos {
        self.position
    }

    pub fn start(&self) -> Samplepos {
        self.start
    }

    pub fn length(&self) -> Samplecnt {
        self.length
    }

    /// Exclusive end of the region on the timeline.
    pub fn end(&self) -> Samplepos {
        self.position + self.length
    }

    pub fn range(&self) -> Range {
        Range::new(self.position, self.end())
    }

    pub fn last_position(&self) -> Samplepos {
        self.last_position
    }

    pub fn last_length(&self) -> Samplecnt {
        self.last_length
    }

    pub fn last_range(&self) -> Range {
        Range::new(self.last_position, self.last_position + self.last_length)
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn layering_index(&self) -> u64 {
        self.layering_index
    }

    pub fn flags(&self) -> &RegionFlags {
        &self.flags
    }

    pub fn muted(&self) -> bool {
        self.flags.muted
    }

    pub fn opaque(&self) -> bool {
        self.flags.opaque
    }

    pub fn locked(&self) -> bool {
        self.flags.locked
    }

    pub fn position_locked(&self) -> bool {
        self.flags.position_locked
    }

    pub fn hidden(&self) -> bool {
        self.flags.hidden
    }

    pub fn whole_file(&self) -> bool {
        self.flags.whole_file
    }

    pub fn automatic(&self) -> bool {
        self.flags.automatic
    }

    pub fn ancestral_start(&self) -> Samplepos {
        self.ancestral_start
    }

    pub fn ancestral_length(&self) -> Samplecnt {
        self.ancestral_length
    }

    pub fn stretch(&self) -> f32 {
        self.stretch
    }

    pub fn shift(&self) -> f32 {
        self.shift
    }

    pub fn position_lock_style(&self) -> PositionLockStyle {
        self.position_lock_style
    }

    pub fn beat_position(&self) -> Ticks {
        self.beat_position
    }

    pub fn tags(&self) -> &str {
        &self.tags
    }

    pub fn set_tags(&mut self, tags: impl Into<String>) {
        self.tags = tags.into();
    }

    pub fn playlist(&self) -> Option<PlaylistId> {
        self.playlist
    }

    pub(crate) fn set_playlist(&mut self, playlist: Option<PlaylistId>) {
        self.playlist = playlist;
    }

    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    pub fn master_sources(&self) -> &[Arc<Source>] {
        &self.master_sources
    }

    pub fn source(&self, n: usize) -> Option<&Arc<Source>> {
        self.sources.get(n)
    }

    pub fn n_channels(&self) -> usize {
        self.sources.len()
    }

    pub fn source_length(&self, n: usize) -> Option<Samplecnt> {
        self.sources.get(n).map(|s| s.length(self.position - self.start))
    }

    pub fn max_source_level(&self) -> u32 {
        self.sources.iter().map(|s| s.level()).max().unwrap_or(0)
    }

    /// True if `source` feeds this region directly or through a compound's playlist.
    pub fn uses_source(&self, source: SourceId, factory: &RegionFactory) -> bool {
        self.sources
            .iter()
            .chain(self.master_sources.iter())
            .any(|s| {
                s.id() == source
                    || s.playlist_source()
                        .is_some_and(|pls| pls.playlist.uses_source(factory, source))
            })
    }

    /// Properties changed since the last [`Region::clear_changes`].
    pub fn pending_changes(&self) -> PropertyChange {
        self.changes
    }

    pub fn clear_changes(&mut self) {
        self.changes = PropertyChange::NONE;
    }

    fn record(&mut self, change: PropertyChange) -> PropertyChange {
        self.changes |= change;
        change
    }

    fn remember_bounds(&mut self) {
        self.last_position = self.position;
        self.last_length = self.length;
    }

    fn can_move(&self) -> bool {
        !self.flags.locked && !self.flags.position_locked
    }

    pub fn set_position(&mut self, pos: Samplepos) -> PropertyChange {
        if !self.can_move() {
            return PropertyChange::NONE;
        }
        self.set_position_internal(pos)
    }

    /// Move without honouring locks. Used when a playlist places a region.
    pub(crate) fn set_position_internal(&mut self, pos: Samplepos) -> PropertyChange {
        let pos = pos.max(0);
        if pos == self.position && MAX_SAMPLEPOS - self.length >= pos {
            return PropertyChange::NONE;
        }

        self.remember_bounds();
        let mut change = PropertyChange::NONE;
        if pos != self.position {
            self.position = pos;
            change |= PropertyChange::POSITION;
        }
        // position + length must stay representable
        if MAX_SAMPLEPOS - self.length < self.position {
            self.length = MAX_SAMPLEPOS - self.position;
            change |= PropertyChange::LENGTH;
        }
        self.record(change)
    }

    pub fn nudge_position(&mut self, n: Sampleoffset) -> PropertyChange {
        if !self.can_move() || n == 0 {
            return PropertyChange::NONE;
        }
        let target = if n > 0 {
            self.position
                .saturating_add(n)
                .min(MAX_SAMPLEPOS - self.length)
        } else {
            (self.position + n).max(0)
        };
        self.set_position_internal(target)
    }

    pub fn set_start(&mut self, pos: Samplepos) -> PropertyChange {
        if !self.can_move() || pos == self.start || !self.verify_start(pos) {
            return PropertyChange::NONE;
        }
        self.remember_bounds();
        self.start = pos;
        self.flags.whole_file = false;
        self.record(PropertyChange::START)
    }

    pub fn set_length(&mut self, len: Samplecnt) -> PropertyChange {
        if self.flags.locked || len <= 0 || MAX_SAMPLEPOS - len < self.position {
            return PropertyChange::NONE;
        }
        let Some(len) = self.verify_length(len) else {
            return PropertyChange::NONE;
        };
        if len == self.length {
            return PropertyChange::NONE;
        }
        self.remember_bounds();
        self.length = len;
        self.flags.whole_file = false;
        self.record(PropertyChange::LENGTH)
    }

    /// Move the content offset by `distance` while keeping position and length.
    pub fn move_start(&mut self, distance: Sampleoffset) -> PropertyChange {
        if !self.can_move() || distance == 0 {
            return PropertyChange::NONE;
        }
        let new_start = if distance > 0 {
            self.start.saturating_add(distance)
        } else {
            (self.start + distance).max(0)
        };
        if new_start == self.start || !self.verify_start(new_start) {
            return PropertyChange::NONE;
        }
        self.remember_bounds();
        self.start = new_start;
        self.flags.whole_file = false;
        self.record(PropertyChange::START)
    }

    /// Move the front edge to `new_position`, keeping the end fixed.
    pub fn trim_front(&mut self, new_position: Samplepos) -> PropertyChange {
        if self.flags.locked {
            return PropertyChange::NONE;
        }
        let end = self.end();
        if new_position >= end {
            return PropertyChange::NONE;
        }
        // can't reveal material before the start of the source
        let source_zero = (self.position - self.start).max(0);
        let new_position = new_position.max(source_zero);
        self.trim_to_internal(new_position, end - new_position)
    }

    /// Move the exclusive end edge to `new_end`, keeping the front fixed.
    pub fn trim_end(&mut self, new_end: Samplepos) -> PropertyChange {
        if self.flags.locked || new_end <= self.position {
            return PropertyChange::NONE;
        }
        self.trim_to_internal(self.position, new_end - self.position)
    }

    pub fn trim_to(&mut self, position: Samplepos, length: Samplecnt) -> PropertyChange {
        if self.flags.locked {
            return PropertyChange::NONE;
        }
        self.trim_to_internal(position, length)
    }

    fn trim_to_internal(&mut self, position: Samplepos, length: Samplecnt) -> PropertyChange {
        if position < 0 || length <= 0 {
            return PropertyChange::NONE;
        }
        let start_shift = position - self.position;
        let new_start = if start_shift >= 0 {
            self.start.saturating_add(start_shift)
        } else {
            (self.start + start_shift).max(0)
        };
        let Some(length) = self.verify_start_and_length(new_start, length) else {
            return PropertyChange::NONE;
        };
        let length = length.min(MAX_SAMPLEPOS - position);

        let mut change = PropertyChange::NONE;
        if new_start != self.start {
            change |= PropertyChange::START;
        }
        if length != self.length {
            change |= PropertyChange::LENGTH;
        }
        if position != self.position {
            change |= PropertyChange::POSITION;
        }
        if change.is_empty() {
            return change;
        }

        self.remember_bounds();
        self.start = new_start;
        self.length = length;
        self.position = position;
        self.flags.whole_file = false;
        self.record(change)
    }

    fn fixed_sources(&self) -> impl Iterator<Item = &Arc<Source>> + '_ {
        self.sources.iter().filter(|s| !s.length_mutable())
    }

    fn verify_start(&self, pos: Samplepos) -> bool {
        if pos < 0 {
            return false;
        }
        self.fixed_sources()
            .all(|s| pos <= s.length(self.position - self.start) - self.length)
    }

    /// Clamp `len` to what the sources can supply from the current start.
    fn verify_length(&self, len: Samplecnt) -> Option<Samplecnt> {
        self.verify_start_and_length(self.start, len)
    }

    fn verify_start_and_length(&self, new_start: Samplepos, len: Samplecnt) -> Option<Samplecnt> {
        if new_start < 0 {
            return None;
        }
        let available = self
            .fixed_sources()
            .map(|s| s.length(self.position - self.start) - new_start)
            .max();
        let len = match available {
            Some(max) => len.min(max),
            None => len,
        };
        (len > 0).then_some(len)
    }

    pub(crate) fn set_name(&mut self, name: String) -> PropertyChange {
        if self.name == name {
            return PropertyChange::NONE;
        }
        self.name = name;
        self.record(PropertyChange::NAME)
    }

    pub(crate) fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
    }

    pub(crate) fn set_layering_index(&mut self, index: u64) {
        self.layering_index = index;
    }

    pub(crate) fn set_start_beats(&mut self, beats: Ticks) {
        if let RegionKind::Midi(midi) = &mut self.kind {
            midi.start_beats = beats;
        }
    }

    fn set_flag(&mut self, flag: fn(&mut RegionFlags) -> &mut bool, yn: bool, change: PropertyChange) -> PropertyChange {
        let slot = flag(&mut self.flags);
        if *slot == yn {
            return PropertyChange::NONE;
        }
        *slot = yn;
        self.record(change)
    }

    pub fn set_muted(&mut self, yn: bool) -> PropertyChange {
        self.set_flag(|f| &mut f.muted, yn, PropertyChange::MUTED)
    }

    pub fn set_opaque(&mut self, yn: bool) -> PropertyChange {
        self.set_flag(|f| &mut f.opaque, yn, PropertyChange::OPAQUE)
    }

    pub fn set_locked(&mut self, yn: bool) -> PropertyChange {
        self.set_flag(|f| &mut f.locked, yn, PropertyChange::LOCKED)
    }

    pub fn set_video_locked(&mut self, yn: bool) -> PropertyChange {
        self.set_flag(|f| &mut f.video_locked, yn, PropertyChange::VIDEO_LOCKED)
    }

    pub fn set_position_locked(&mut self, yn: bool) -> PropertyChange {
        self.set_flag(|f| &mut f.position_locked, yn, PropertyChange::POSITION_LOCKED)
    }

    pub fn set_hidden(&mut self, yn: bool) -> PropertyChange {
        self.set_flag(|f| &mut f.hidden, yn, PropertyChange::HIDDEN)
    }

    /// Mark `absolute_pos` (a timeline position) as the region's sync point.
    pub fn set_sync_position(&mut self, absolute_pos: Samplepos) -> PropertyChange {
        let file_pos = self.start + (absolute_pos - self.position);
        if self.flags.sync_marked && file_pos == self.sync_position {
            return PropertyChange::NONE;
        }
        self.flags.sync_marked = true;
        self.sync_position = file_pos;
        self.record(PropertyChange::SYNC)
    }

    pub fn clear_sync_position(&mut self) -> PropertyChange {
        if !self.flags.sync_marked {
            return PropertyChange::NONE;
        }
        self.flags.sync_marked = false;
        self.record(PropertyChange::SYNC)
    }

    /// Distance from the region start to the sync point, and its direction.
    pub fn sync_offset(&self) -> (Samplecnt, i32) {
        if !self.flags.sync_marked {
            return (0, 1);
        }
        if self.sync_position > self.start {
            (self.sync_position - self.start, 1)
        } else {
            (self.start - self.sync_position, -1)
        }
    }

    /// Where the region would have to start so its sync point lands on `pos`.
    pub fn adjust_to_sync(&self, pos: Samplepos) -> Samplepos {
        let (offset, direction) = self.sync_offset();
        if direction > 0 {
            (pos - offset).max(0)
        } else if MAX_SAMPLEPOS - pos > offset {
            pos + offset
        } else {
            pos
        }
    }

    /// The sync point on the timeline, or the position when none is marked.
    pub fn sync_position(&self) -> Samplepos {
        if self.flags.sync_marked {
            self.position + (self.sync_position - self.start)
        } else {
            self.position
        }
    }

    pub fn set_position_lock_style(&mut self, style: PositionLockStyle, tempo: &TempoMap) -> PropertyChange {
        if self.position_lock_style == style {
            return PropertyChange::NONE;
        }
        self.position_lock_style = style;
        self.recompute_beat_position(tempo);
        self.record(PropertyChange::LOCK_STYLE)
    }

    pub fn recompute_beat_position(&mut self, tempo: &TempoMap) {
        if self.position_lock_style == PositionLockStyle::MusicTime {
            self.beat_position = tempo.samples_to_ticks(self.position);
        }
    }

    /// Music-locked regions follow their beat position through a tempo change.
    pub fn update_position_after_tempo_map_change(&mut self, tempo: &TempoMap) -> PropertyChange {
        if self.position_lock_style != PositionLockStyle::MusicTime {
            return PropertyChange::NONE;
        }
        let beats = self.beat_position;
        let change = self.set_position_internal(tempo.ticks_to_samples(beats));
        self.beat_position = beats;
        change
    }

    pub fn coverage(&self, start: Samplepos, end: Samplepos) -> OverlapType {
        coverage(self.position, self.end(), start, end)
    }

    pub fn covers(&self, pos: Samplepos) -> bool {
        pos >= self.position && pos < self.end()
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.coverage(other.position, other.end()) != OverlapType::None
    }

    pub fn source_equivalent(&self, other: &Region) -> bool {
        fn same(a: &[Arc<Source>], b: &[Arc<Source>]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id() == y.id())
        }
        same(&self.sources, &other.sources) && same(&self.master_sources, &other.master_sources)
    }

    pub fn exact_equivalent(&self, other: &Region) -> bool {
        self.start == other.start
            && self.position == other.position
            && self.length == other.length
            && self.source_equivalent(other)
    }

    pub fn size_equivalent(&self, other: &Region) -> bool {
        self.start == other.start && self.length == other.length
    }

    pub fn region_list_equivalent(&self, other: &Region) -> bool {
        self.size_equivalent(other) && self.source_equivalent(other) && self.name == other.name
    }

    pub fn overlap_equivalent(&self, other: &Region) -> bool {
        self.source_equivalent(other) && self.overlaps(other)
    }

    pub fn enclosed_equivalent(&self, other: &Region) -> bool {
        let inside = self.position >= other.position && self.end() <= other.end();
        let around = self.position <= other.position && self.end() >= other.end();
        self.source_equivalent(other) && (inside || around)
    }

    pub fn layer_and_time_equivalent(&self, other: &Region) -> bool {
        self.layer == other.layer && self.position == other.position && self.length == other.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{file_source, growing_source};

    fn region(position: Samplepos, start: Samplepos, length: Samplecnt) -> Region {
        let mut r = Region::new(RegionId(1), "clip".into(), DataType::Audio, vec![file_source(1, 10_000)]);
        r.apply_properties(&RegionProperties::new().start(start).length(length).position(position));
        r
    }

    #[test]
    fn test_set_position_reports_change() {
        let mut r = region(100, 0, 400);
        let change = r.set_position(250);
        assert!(change.contains(PropertyChange::POSITION));
        assert_eq!(r.position(), 250);
        assert_eq!(r.last_position(), 100);
        assert!(r.set_position(250).is_empty(), "same position is a no-op");
    }

    #[test]
    fn test_set_position_clamps_length_at_max() {
        let mut r = region(0, 0, 400);
        let change = r.set_position(MAX_SAMPLEPOS - 100);
        assert!(change.contains(PropertyChange::LENGTH));
        assert_eq!(r.length(), 100);
        assert_eq!(r.end(), MAX_SAMPLEPOS);
    }

    #[test]
    fn test_locked_region_ignores_edits() {
        let mut r = region(100, 0, 400);
        r.set_locked(true);
        assert!(r.set_position(0).is_empty());
        assert!(r.trim_end(300).is_empty());
        assert!(r.trim_front(200).is_empty());
        assert!(r.set_length(10).is_empty());
        assert_eq!((r.position(), r.length()), (100, 400));
    }

    #[test]
    fn test_position_locked_region_can_still_trim_end() {
        let mut r = region(100, 0, 400);
        r.set_position_locked(true);
        assert!(r.set_position(0).is_empty());
        assert!(!r.trim_end(300).is_empty());
        assert_eq!(r.length(), 200);
    }

    #[test]
    fn test_trim_end_is_exclusive() {
        let mut r = region(100, 0, 400);
        let change = r.trim_end(300);
        assert_eq!(change, PropertyChange::LENGTH);
        assert_eq!(r.end(), 300);
        assert!(r.trim_end(300).is_empty());
        assert!(r.trim_end(100).is_empty(), "cannot trim to zero length");
        assert!(r.trim_end(50).is_empty());
        assert_eq!(r.length(), 200);
    }

    #[test]
    fn test_trim_front_moves_start_with_position() {
        let mut r = region(100, 1000, 400);
        let change = r.trim_front(150);
        assert!(change.contains(PropertyChange::POSITION));
        assert!(change.contains(PropertyChange::START));
        assert!(change.contains(PropertyChange::LENGTH));
        assert_eq!(r.position(), 150);
        assert_eq!(r.start(), 1050);
        assert_eq!(r.end(), 500);
    }

    #[test]
    fn test_trim_front_clamps_to_source_zero() {
        let mut r = region(1000, 200, 400);
        r.trim_front(0);
        // only 200 samples of material exist before the current start
        assert_eq!(r.position(), 800);
        assert_eq!(r.start(), 0);
        assert_eq!(r.length(), 600);
    }

    #[test]
    fn test_trim_front_past_end_is_noop() {
        let mut r = region(100, 0, 400);
        assert!(r.trim_front(500).is_empty());
        assert!(r.trim_front(900).is_empty());
        assert_eq!((r.position(), r.length()), (100, 400));
    }

    #[test]
    fn test_set_length_clamped_to_source() {
        let mut r = region(0, 9000, 500);
        r.set_length(5000);
        assert_eq!(r.length(), 1000, "source is 10000 long and we start at 9000");
    }

    #[test]
    fn test_set_length_rejects_non_positive() {
        let mut r = region(0, 0, 500);
        assert!(r.set_length(0).is_empty());
        assert!(r.set_length(-5).is_empty());
        assert_eq!(r.length(), 500);
    }

    #[test]
    fn test_growing_source_skips_length_check() {
        let mut r = Region::new(RegionId(1), "take".into(), DataType::Audio, vec![growing_source(2, 100)]);
        r.set_length(50_000);
        assert_eq!(r.length(), 50_000);
    }

    #[test]
    fn test_set_start_verifies_against_source() {
        let mut r = region(0, 0, 1000);
        assert!(r.set_start(9001).is_empty(), "start + length past source end");
        assert!(r.set_start(-1).is_empty());
        assert_eq!(r.set_start(9000), PropertyChange::START);
    }

    #[test]
    fn test_move_start() {
        let mut r = region(0, 100, 1000);
        assert_eq!(r.move_start(50), PropertyChange::START);
        assert_eq!(r.start(), 150);
        r.move_start(-500);
        assert_eq!(r.start(), 0);
        assert_eq!(r.position(), 0);
        assert_eq!(r.length(), 1000);
    }

    #[test]
    fn test_trim_to_rejects_invalid_bounds() {
        let mut r = region(0, 0, 1000);
        assert!(r.trim_to(-10, 100).is_empty());
        assert!(r.trim_to(10, 0).is_empty());
        assert!(!r.trim_to(10, 100).is_empty());
        assert_eq!((r.position(), r.start(), r.length()), (10, 10, 100));
    }

    #[test]
    fn test_nudge_position_saturates() {
        let mut r = region(100, 0, 400);
        r.nudge_position(-1000);
        assert_eq!(r.position(), 0);
        r.nudge_position(i64::MAX);
        assert_eq!(r.position(), MAX_SAMPLEPOS - 400);
    }

    #[test]
    fn test_sync_position() {
        let mut r = region(1000, 500, 400);
        assert_eq!(r.sync_position(), 1000);
        r.set_sync_position(1100);
        assert_eq!(r.sync_offset(), (100, 1));
        assert_eq!(r.sync_position(), 1100);
        assert_eq!(r.adjust_to_sync(2000), 1900);
        assert_eq!(r.clear_sync_position(), PropertyChange::SYNC);
        assert_eq!(r.adjust_to_sync(2000), 2000);
    }

    #[test]
    fn test_pending_changes_accumulate_until_cleared() {
        let mut r = region(0, 0, 1000);
        r.set_position(10);
        r.set_muted(true);
        let pending = r.pending_changes();
        assert!(pending.contains(PropertyChange::POSITION));
        assert!(pending.contains(PropertyChange::MUTED));
        r.clear_changes();
        assert!(r.pending_changes().is_empty());
    }

    #[test]
    fn test_coverage_is_half_open() {
        let r = region(100, 0, 400);
        assert_eq!(r.coverage(500, 600), OverlapType::None);
        assert_eq!(r.coverage(0, 100), OverlapType::None);
        assert_eq!(r.coverage(200, 300), OverlapType::Internal);
        assert_eq!(r.coverage(50, 200), OverlapType::Start);
        assert_eq!(r.coverage(300, 600), OverlapType::End);
        assert_eq!(r.coverage(100, 500), OverlapType::External);
        assert!(r.covers(100));
        assert!(!r.covers(500));
    }

    #[test]
    fn test_equivalence_predicates() {
        let a = region(100, 0, 400);
        let mut b = a.duplicate_as(RegionId(2));
        assert!(a.exact_equivalent(&b));
        assert!(a.layer_and_time_equivalent(&b));

        b.set_position(300);
        assert!(!a.exact_equivalent(&b));
        assert!(a.overlap_equivalent(&b));
        assert!(a.size_equivalent(&b));
        assert!(!a.enclosed_equivalent(&b));

        b.trim_to(150, 100);
        assert!(a.enclosed_equivalent(&b));

        let other_source = Region::new(RegionId(3), "clip".into(), DataType::Audio, vec![file_source(9, 10_000)]);
        assert!(!a.source_equivalent(&other_source));
        assert!(!a.overlap_equivalent(&other_source));
    }

    #[test]
    fn test_music_time_follows_tempo_change() {
        let tempo = TempoMap::new(120.0, 48_000);
        let mut r = region(48_000, 0, 400);
        r.set_position_lock_style(PositionLockStyle::MusicTime, &tempo);
        assert_eq!(r.beat_position(), 2 * daw_transport::PPQN);

        let faster = TempoMap::new(240.0, 48_000);
        r.update_position_after_tempo_map_change(&faster);
        assert_eq!(r.position(), 24_000);
        assert_eq!(r.beat_position(), 2 * daw_transport::PPQN);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut r = region(100, 20, 400);
        r.set_muted(true);
        r.set_tags("vox");
        let state = r.state();
        let restored = Region::from_state(&state, r.sources().to_vec(), r.master_sources().to_vec());
        assert!(restored.exact_equivalent(&r));
        assert!(restored.muted());
        assert_eq!(restored.tags(), "vox");
        assert_eq!(restored.id(), r.id());
    }
}
