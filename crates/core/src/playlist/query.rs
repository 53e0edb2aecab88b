use std::collections::BTreeSet;

use daw_transport::{OverlapType, Range, Samplepos};

use super::Playlist;
use crate::region::{Layer, Region, RegionId};
use crate::region_factory::RegionFactory;
use crate::source::SourceId;

/// Which point of a region [`Playlist::find_next_region`] measures from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionPoint {
    Start,
    /// The last sample inside the region.
    End,
    SyncPoint,
}

impl Playlist {
    pub fn contains(&self, region: RegionId) -> bool {
        self.regions.contains(&region)
    }

    /// Members in position order.
    pub fn region_list(&self) -> &[RegionId] {
        &self.regions
    }

    /// Every region this playlist has ever held, members or not.
    pub fn all_regions(&self) -> &BTreeSet<RegionId> {
        &self.all_regions
    }

    pub fn n_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Look up a region this playlist has held, including removed ones kept for undo.
    pub fn region_by_id<'a>(&self, rf: &'a RegionFactory, id: RegionId) -> Option<&'a Region> {
        if !self.all_regions.contains(&id) {
            return None;
        }
        rf.region(id)
    }

    fn members<'a>(&'a self, rf: &'a RegionFactory) -> impl Iterator<Item = &'a Region> + 'a {
        self.regions.iter().filter_map(|id| rf.region(*id))
    }

    pub fn regions_at(&self, rf: &RegionFactory, position: Samplepos) -> Vec<RegionId> {
        self.members(rf)
            .filter(|r| r.covers(position))
            .map(Region::id)
            .collect()
    }

    pub fn count_regions_at(&self, rf: &RegionFactory, position: Samplepos) -> usize {
        self.members(rf).filter(|r| r.covers(position)).count()
    }

    pub fn has_region_at(&self, rf: &RegionFactory, position: Samplepos) -> bool {
        self.members(rf).any(|r| r.covers(position))
    }

    /// The audible region at `position`: the one on the highest layer.
    pub fn top_region_at(&self, rf: &RegionFactory, position: Samplepos) -> Option<RegionId> {
        self.members(rf)
            .filter(|r| r.covers(position))
            .max_by_key(|r| r.layer())
            .map(Region::id)
    }

    pub fn top_unmuted_region_at(&self, rf: &RegionFactory, position: Samplepos) -> Option<RegionId> {
        self.members(rf)
            .filter(|r| r.covers(position) && !r.muted())
            .max_by_key(|r| r.layer())
            .map(Region::id)
    }

    /// Regions with any material inside `[start, end)`.
    pub fn regions_touched(&self, rf: &RegionFactory, start: Samplepos, end: Samplepos) -> Vec<RegionId> {
        self.members(rf)
            .filter(|r| r.coverage(start, end) != OverlapType::None)
            .map(Region::id)
            .collect()
    }

    pub fn regions_with_start_within(&self, rf: &RegionFactory, range: Range) -> Vec<RegionId> {
        self.members(rf)
            .filter(|r| range.contains(r.position()))
            .map(Region::id)
            .collect()
    }

    pub fn regions_with_end_within(&self, rf: &RegionFactory, range: Range) -> Vec<RegionId> {
        self.members(rf)
            .filter(|r| range.contains(r.end() - 1))
            .map(Region::id)
            .collect()
    }

    /// The span from the earliest start to the latest end.
    pub fn get_extent(&self, rf: &RegionFactory) -> Option<Range> {
        let start = self.members(rf).map(Region::position).min()?;
        let end = self.members(rf).map(Region::end).max()?;
        Some(Range::new(start, end))
    }

    pub fn top_layer(&self, rf: &RegionFactory) -> Layer {
        self.members(rf).map(Region::layer).max().unwrap_or(0)
    }

    /// Earliest start at or after `t` of a region on the top layer.
    pub fn find_next_top_layer_position(&self, rf: &RegionFactory, t: Samplepos) -> Option<Samplepos> {
        let top = self.top_layer(rf);
        self.members(rf)
            .filter(|r| r.layer() == top && r.position() >= t)
            .map(Region::position)
            .min()
    }

    /// The region whose `point` is nearest to `position` in direction `dir`
    /// (`dir > 0` looks later, otherwise earlier). Points exactly at
    /// `position` are skipped.
    pub fn find_next_region(
        &self,
        rf: &RegionFactory,
        position: Samplepos,
        point: RegionPoint,
        dir: i32,
    ) -> Option<RegionId> {
        self.members(rf)
            .filter_map(|r| {
                let at = match point {
                    RegionPoint::Start => r.position(),
                    RegionPoint::End => r.end() - 1,
                    RegionPoint::SyncPoint => r.sync_position(),
                };
                let distance = if dir > 0 { at - position } else { position - at };
                (distance > 0).then_some((distance, r.id()))
            })
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, id)| id)
    }

    /// The nearest region edge or sync point strictly after (`dir > 0`) or
    /// before `position`.
    pub fn find_next_region_boundary(&self, rf: &RegionFactory, position: Samplepos, dir: i32) -> Option<Samplepos> {
        let candidates = self.members(rf).flat_map(|r| {
            let sync = r.flags().sync_marked.then(|| r.sync_position());
            [Some(r.position()), Some(r.end() - 1), sync].into_iter().flatten()
        });
        if dir > 0 {
            candidates.filter(|at| *at > position).min()
        } else {
            candidates.filter(|at| *at < position).max()
        }
    }

    /// Members that represent the same material as `other`: overlapping
    /// copies when overlap equivalency is on, exact copies otherwise.
    pub fn get_equivalent_regions(&self, rf: &RegionFactory, other: &Region) -> Vec<RegionId> {
        self.members(rf)
            .filter(|r| {
                if self.use_overlap_equivalency {
                    r.overlap_equivalent(other)
                } else {
                    r.exact_equivalent(other)
                }
            })
            .map(Region::id)
            .collect()
    }

    pub fn get_region_list_equivalent_regions(&self, rf: &RegionFactory, other: &Region) -> Vec<RegionId> {
        self.members(rf)
            .filter(|r| r.region_list_equivalent(other))
            .map(Region::id)
            .collect()
    }

    /// Whether any region this playlist has held reads from `source`,
    /// directly or through a compound.
    pub fn uses_source(&self, rf: &RegionFactory, source: SourceId) -> bool {
        self.all_regions
            .iter()
            .filter_map(|id| rf.region(*id))
            .any(|r| r.uses_source(source, rf))
    }

    /// How often `region` is referenced here: once per membership, plus
    /// once more if a compound was built from it.
    pub fn region_use_count(&self, rf: &RegionFactory, region: RegionId) -> usize {
        let members = self.regions.iter().filter(|id| **id == region).count();
        let in_compound = rf.compound_associations().values().any(|original| *original == region);
        members + usize::from(in_compound)
    }

    /// Deepest compound nesting among the members.
    pub fn max_source_level(&self, rf: &RegionFactory) -> u32 {
        self.members(rf).map(Region::max_source_level).max().unwrap_or(0)
    }
}
