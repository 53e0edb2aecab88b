use daw_transport::{MAX_SAMPLEPOS, PositionLockStyle, Range, Samplecnt, Sampleoffset, Samplepos, TempoMap};

use super::{LAYER_TOP, Playlist, clamp_position};
use crate::clip_ops::{Piece, Trim, plan_partition, plan_range_copy, plan_split};
use crate::region::{Region, RegionId, RegionKind, RegionProperties};
use crate::region_factory::RegionFactory;
use crate::source::SourceId;

impl Playlist {
    /// Cut every region at `start` and `end`. With `cut` the material in
    /// between is removed; otherwise it becomes separate regions.
    pub fn partition(&mut self, rf: &mut RegionFactory, start: Samplepos, end: Samplepos, cut: bool) {
        self.freeze();
        self.partition_internal(rf, start, end, cut);
        self.thaw(rf);
    }

    pub(super) fn partition_internal(&mut self, rf: &mut RegionFactory, start: Samplepos, end: Samplepos, cutting: bool) {
        self.in_partition = true;

        // work from a copy: pieces added below must not be partitioned again
        for id in self.regions.clone() {
            let Some(region) = rf.region(id) else {
                continue;
            };
            let Some(plan) = plan_partition(
                region.position(),
                region.start(),
                region.length(),
                start,
                end,
                cutting,
            ) else {
                continue;
            };

            if plan.remove {
                self.remove_region_internal(rf, id);
                continue;
            }

            for piece in &plan.pieces {
                let Some(props) = self.piece_properties(rf, id, piece) else {
                    continue;
                };
                let props = props.automatic(true);
                if let Some(new_id) = rf.create_from(id, props, true) {
                    self.add_region_internal(rf, new_id, piece.position);
                }
            }

            match plan.trim {
                Some(Trim::End(at)) => {
                    self.edit_region(rf, id, |r| {
                        r.clear_changes();
                        r.trim_end(at)
                    });
                }
                Some(Trim::Front(at)) => {
                    self.edit_region(rf, id, |r| {
                        r.clear_changes();
                        r.trim_front(at)
                    });
                }
                None => {}
            }
        }

        self.in_partition = false;
        self.pending.dependent_ranges.push(Range::new(start, end));
        log::debug!("partitioned {:?} over [{}, {}) cut={}", self.id, start, end, cutting);
    }

    /// Properties for a piece carved out of `id`, keeping its stacking.
    fn piece_properties(&self, rf: &mut RegionFactory, id: RegionId, piece: &Piece) -> Option<RegionProperties> {
        let region = rf.region(id)?;
        let base = region.name().to_string();
        let mut props = RegionProperties::new()
            .position(piece.position)
            .start(piece.start)
            .length(piece.length)
            .layer(region.layer())
            .layering_index(region.layering_index())
            .left_of_split(piece.side.left_of_split())
            .right_of_split(piece.side.right_of_split());

        if let Some(beats) = music_start_beats(region, piece.position, &self.tempo_map) {
            props = props.start_beats(beats);
        }

        Some(props.name(rf.region_name(&base, false)))
    }

    /// Split one region in two at `position`. Positions on or outside the
    /// region's edges are ignored.
    pub fn split_region(&mut self, rf: &mut RegionFactory, region: RegionId, position: Samplepos) {
        if !self.contains(region) {
            return;
        }
        self.freeze();
        self.splice_suppressed += 1;
        self.split_region_internal(rf, region, position);
        self.splice_suppressed -= 1;
        self.thaw(rf);
    }

    fn split_region_internal(&mut self, rf: &mut RegionFactory, id: RegionId, at: Samplepos) {
        let Some(region) = rf.region(id) else {
            return;
        };
        let Some((left, right)) = plan_split(region.position(), region.start(), region.length(), at) else {
            return;
        };

        for piece in [left, right] {
            let Some(props) = self.piece_properties(rf, id, &piece) else {
                return;
            };
            if let Some(new_id) = rf.create_from(id, props, true) {
                self.add_region_internal(rf, new_id, piece.position);
            }
        }
        self.remove_region_internal(rf, id);
    }

    /// Split every region that spans `at`.
    pub fn split(&mut self, rf: &mut RegionFactory, at: Samplepos) {
        self.freeze();
        self.splice_suppressed += 1;
        for id in self.regions.clone() {
            self.split_region_internal(rf, id, at);
        }
        self.splice_suppressed -= 1;
        self.thaw(rf);
    }

    /// Move regions at or after `at` by `distance`.
    ///
    /// Regions spanning `at` only move with `move_intersected`. Regions locked
    /// to music time keep their beat position instead, unless
    /// `ignore_music_glue` is set.
    pub fn shift(
        &mut self,
        rf: &mut RegionFactory,
        at: Samplepos,
        distance: Sampleoffset,
        move_intersected: bool,
        ignore_music_glue: bool,
    ) {
        self.freeze();
        self.splice_suppressed += 1;

        let mut fixup = Vec::new();
        for id in self.regions.clone() {
            let Some(region) = rf.region(id) else {
                continue;
            };
            if region.end() <= at {
                continue;
            }
            if at > region.position() && at < region.end() && !move_intersected {
                continue;
            }
            if !ignore_music_glue && region.position_lock_style() != PositionLockStyle::AudioTime {
                fixup.push(id);
                continue;
            }
            let target = clamp_position(region.position(), distance, region.length());
            self.edit_region(rf, id, |r| r.set_position(target));
        }

        let tempo = self.tempo_map;
        for id in fixup {
            self.edit_region(rf, id, |r| r.update_position_after_tempo_map_change(&tempo));
        }

        self.splice_suppressed -= 1;
        self.thaw(rf);
    }

    /// Nudge every region starting at or after `start`.
    pub fn nudge_after(&mut self, rf: &mut RegionFactory, start: Samplepos, distance: Samplecnt, forwards: bool) {
        self.freeze();
        self.nudging = true;

        // `forwards` carries the direction
        let distance = distance.saturating_abs();
        let mut moved = false;
        for id in self.regions.clone() {
            let Some(region) = rf.region(id) else {
                continue;
            };
            if region.position() < start {
                continue;
            }
            let target = if forwards {
                if region.end() > MAX_SAMPLEPOS - distance {
                    MAX_SAMPLEPOS - region.length()
                } else {
                    region.position() + distance
                }
            } else {
                (region.position() - distance).max(0)
            };
            self.edit_region(rf, id, |r| r.set_position(target));
            moved = true;
        }

        self.nudging = false;
        if moved {
            self.sort_regions(rf);
            self.pending.contents = true;
        }
        self.thaw(rf);
    }

    /// Swap `region` with its neighbour: the next one if `dir > 0`, else the previous one.
    ///
    /// Regions that touched before the swap still touch afterwards.
    pub fn shuffle(&mut self, rf: &mut RegionFactory, region: RegionId, dir: i32) {
        if rf.region(region).is_none_or(|r| r.locked()) {
            return;
        }
        let Some(index) = self.regions.iter().position(|r| *r == region) else {
            return;
        };
        let neighbour = if dir > 0 {
            index + 1
        } else if index > 0 {
            index - 1
        } else {
            return;
        };
        let Some(&other) = self.regions.get(neighbour) else {
            return;
        };
        let (Some(this), Some(that)) = (rf.region(region), rf.region(other)) else {
            return;
        };
        if that.locked() {
            return;
        }

        let (earlier, later) = if dir > 0 { (this, that) } else { (that, this) };
        let later_target = earlier.position();
        let earlier_target = if later.position() != earlier.end() {
            later.position()
        } else {
            earlier.position() + later.length()
        };
        let (earlier_id, later_id) = (earlier.id(), later.id());

        self.freeze();
        self.shuffling = true;
        self.edit_region(rf, later_id, |r| r.set_position(later_target));
        self.edit_region(rf, earlier_id, |r| r.set_position(earlier_target));
        self.regions.swap(index, neighbour);
        self.shuffling = false;

        self.pending.layering = true;
        self.pending.contents = true;
        self.thaw(rf);
    }

    /// Place `times` copies of `region` end to end from `position`, on top.
    pub fn duplicate(&mut self, rf: &mut RegionFactory, region: RegionId, position: Samplepos, times: f64) {
        let Some(template) = rf.region(region) else {
            return;
        };
        let (length, start, base) = (template.length(), template.start(), template.name().to_string());
        let times = times.abs();

        self.freeze();
        self.splice_suppressed += 1;

        let mut pos = position;
        for _ in 0..times.floor() as u64 {
            if let Some(copy) = rf.create_copy(region, true) {
                if self.add_region_internal(rf, copy, pos) {
                    self.set_layer(rf, copy, LAYER_TOP);
                }
            }
            pos = pos.saturating_add(length);
        }

        let fraction = times - times.floor();
        if fraction > 0.0 {
            let tail = ((length as f64 * fraction).floor() as Samplecnt).max(1);
            let props = RegionProperties::new()
                .start(start)
                .length(tail)
                .name(rf.region_name(&base, false));
            if let Some(sub) = rf.create_from(region, props, true) {
                if self.add_region_internal(rf, sub, pos) {
                    self.set_layer(rf, sub, LAYER_TOP);
                }
            }
        }

        self.splice_suppressed -= 1;
        self.thaw(rf);
    }

    /// Copy `other`'s contents in at `position`, `times` times, above
    /// everything already here while keeping their relative stacking.
    pub fn paste(&mut self, rf: &mut RegionFactory, other: &Playlist, position: Samplepos, times: f64) {
        let times = times.abs();
        let shift = other.get_extent(rf).map_or(0, |r| r.end);
        let top = f64::from(self.top_layer(rf)) + 1.0;

        self.freeze();
        self.splice_suppressed += 1;

        let mut pos = position;
        for _ in 0..times.floor() as u64 {
            for id in &other.regions {
                let Some(source_region) = rf.region(*id) else {
                    continue;
                };
                let (offset, layer) = (source_region.position(), f64::from(source_region.layer()));
                if let Some(copy) = rf.create_copy(*id, true) {
                    if self.add_region_internal(rf, copy, offset.saturating_add(pos)) {
                        self.set_layer(rf, copy, layer + top);
                    }
                }
            }
            pos = pos.saturating_add(shift);
        }

        self.splice_suppressed -= 1;
        self.thaw(rf);
    }

    /// A new playlist holding the parts of `source` inside
    /// `[start, start + cnt)`, re-based so `start` becomes zero.
    pub fn from_range(
        rf: &mut RegionFactory,
        source: &Playlist,
        start: Samplepos,
        cnt: Samplecnt,
        name: impl Into<String>,
        hidden: bool,
    ) -> Playlist {
        let mut pl = source.sibling(rf.next_playlist_id(), name, hidden);
        pl.in_set_state = true;
        pl.freeze();

        if cnt > 0 {
            for id in &source.regions {
                let Some(region) = rf.region(*id) else {
                    continue;
                };
                let Some(piece) = plan_range_copy(region.position(), region.start(), region.length(), start, cnt)
                else {
                    continue;
                };
                let layer = region.layer();
                let base = region.name().to_string();
                let props = RegionProperties::new()
                    .start(piece.start)
                    .length(piece.length)
                    .layer(layer)
                    .name(rf.region_name(&base, false));
                if let Some(new_id) = rf.create_from(*id, props, true) {
                    pl.add_region_internal(rf, new_id, piece.position);
                }
            }
        }

        pl.thaw(rf);
        pl.in_set_state = false;
        pl
    }

    fn next_subname(&mut self) -> String {
        self.subcnt += 1;
        format!("{}.{}", self.name, self.subcnt)
    }

    /// Copy `[start, start + cnt)` into a new playlist.
    pub fn copy(&mut self, rf: &mut RegionFactory, start: Samplepos, cnt: Samplecnt, hidden: bool) -> Playlist {
        let name = self.next_subname();
        let extent_end = self.get_extent(rf).map_or(0, |r| r.end);
        let cnt = cnt.min(extent_end - start);
        Playlist::from_range(rf, self, start, cnt, name, hidden)
    }

    /// Move `[start, start + cnt)` into a new playlist, leaving a hole here.
    pub fn cut(&mut self, rf: &mut RegionFactory, start: Samplepos, cnt: Samplecnt, hidden: bool) -> Playlist {
        let name = self.next_subname();
        let copy = Playlist::from_range(rf, self, start, cnt, name, hidden);
        self.partition(rf, start, start.saturating_add(cnt), true);
        copy
    }

    /// Swap `old` for `new` at `position`, keeping `old`'s place in the stack.
    pub fn replace_region(&mut self, rf: &mut RegionFactory, old: RegionId, new: RegionId, position: Samplepos) {
        if !self.contains(old) {
            return;
        }
        let Some((old_length, old_layer)) = rf.region(old).map(|r| (r.length(), r.layer())) else {
            return;
        };

        self.freeze();
        self.splice_suppressed += 1;
        self.remove_region_internal(rf, old);
        let added = self.add_region_internal(rf, new, position);
        if added {
            self.set_layer(rf, new, f64::from(old_layer));
        }
        self.splice_suppressed -= 1;

        if added {
            let new_length = rf.region(new).map_or(old_length, |r| r.length());
            self.possibly_splice(rf, position + old_length, new_length - old_length, &[new]);
        }
        self.thaw(rf);
    }

    /// Remove every region.
    pub fn clear(&mut self, rf: &mut RegionFactory) {
        self.freeze();
        self.splice_suppressed += 1;
        for id in self.regions.clone() {
            self.remove_region_internal(rf, id);
        }
        self.splice_suppressed -= 1;
        self.thaw(rf);
    }

    /// Remove every region reading from `source`, directly or through a compound.
    pub fn remove_region_by_source(&mut self, rf: &mut RegionFactory, source: SourceId) {
        let doomed: Vec<RegionId> = {
            let rf: &RegionFactory = rf;
            self.regions
                .iter()
                .copied()
                .filter(|id| rf.region(*id).is_some_and(|r| r.uses_source(source, rf)))
                .collect()
        };

        self.freeze();
        for id in doomed {
            self.remove_region_internal(rf, id);
        }
        self.thaw(rf);
    }

    /// Adopt a new tempo map and move music-locked regions to follow it.
    pub fn update_after_tempo_map_change(&mut self, rf: &mut RegionFactory, tempo: TempoMap) {
        self.tempo_map = tempo;
        self.freeze();
        self.splice_suppressed += 1;
        for id in self.regions.clone() {
            self.edit_region(rf, id, |r| r.update_position_after_tempo_map_change(&tempo));
        }
        self.splice_suppressed -= 1;
        self.thaw(rf);
    }
}

/// Musical start offset for a piece of a music-locked MIDI region beginning at `piece_position`.
fn music_start_beats(region: &Region, piece_position: Samplepos, tempo: &TempoMap) -> Option<daw_transport::Ticks> {
    let RegionKind::Midi(midi) = region.kind() else {
        return None;
    };
    if region.position_lock_style() != PositionLockStyle::MusicTime {
        return None;
    }
    let elapsed = tempo.samples_to_ticks(piece_position) - tempo.samples_to_ticks(region.position());
    Some(midi.start_beats + elapsed)
}
