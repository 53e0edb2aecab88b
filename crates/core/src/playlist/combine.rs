use std::sync::Arc;

use daw_transport::{OverlapType, Samplepos, coverage};

use super::{LAYER_TOP, Playlist};
use crate::region::{RegionId, RegionProperties};
use crate::region_factory::RegionFactory;

impl Playlist {
    /// Replace `regions` with one compound region playing the same material.
    ///
    /// Copies of the members go into a hidden playlist that backs the
    /// compound through one playlist source per channel. Each copy is
    /// associated with its original so [`Playlist::uncombine`] can restore
    /// them. Returns the compound, or `None` when no member was given.
    pub fn combine(&mut self, rf: &mut RegionFactory, regions: &[RegionId]) -> Option<RegionId> {
        let mut members: Vec<RegionId> = Vec::new();
        for id in regions {
            if self.contains(*id) && !members.contains(id) {
                members.push(*id);
            }
        }
        if members.is_empty() {
            return None;
        }

        members.sort_by_key(|id| {
            rf.region(*id)
                .map_or((0, 0), |r| (r.layer(), r.layering_index()))
        });

        let mut earliest = Samplepos::MAX;
        let mut latest = 0;
        let mut max_layer = 0;
        let mut max_level = 0;
        let mut channels = 1;
        for id in &members {
            let Some(r) = rf.region(*id) else {
                continue;
            };
            earliest = earliest.min(r.position());
            latest = latest.max(r.end());
            max_layer = max_layer.max(r.layer());
            max_level = max_level.max(r.max_source_level());
            channels = channels.max(r.n_channels());
        }
        let extent = latest - earliest;

        let parent_name = RegionFactory::compound_region_name(&self.name, self.combine_ops, max_level, true);
        let child_name = RegionFactory::compound_region_name(&self.name, self.combine_ops, max_level, false);

        let mut nested = self.sibling(rf.next_playlist_id(), parent_name.clone(), true);
        nested.freeze();
        nested.in_partition = true;
        for id in &members {
            let Some(position) = rf.region(*id).map(|r| r.position()) else {
                continue;
            };
            let Some(copy) = rf.create_copy(*id, false) else {
                continue;
            };
            rf.add_compound_association(*id, copy);
            nested.add_region(rf, copy, position - earliest, 1.0, false);
        }
        nested.in_partition = false;
        nested.thaw(rf);
        let nested = Arc::new(nested);

        let sources = (0..channels as u32)
            .map(|channel| {
                rf.create_playlist_source(
                    parent_name.clone(),
                    self.data_type,
                    nested.clone(),
                    self.id,
                    channel,
                    0,
                    extent,
                )
            })
            .collect();

        let parent = rf.create_from_sources(
            sources,
            RegionProperties::new()
                .start(0)
                .length(extent)
                .name(parent_name)
                .whole_file(true),
            true,
        );
        let compound = rf.create_from(
            parent,
            RegionProperties::new()
                .start(0)
                .length(extent)
                .name(child_name)
                .layer(max_layer + 1),
            true,
        )?;

        self.freeze();
        self.splice_suppressed += 1;
        for id in &members {
            self.remove_region_internal(rf, *id);
        }
        self.add_region_internal(rf, compound, earliest);
        // land where the highest member was, not above unrelated regions
        self.set_layer(rf, compound, f64::from(max_layer) + 0.5);
        self.combine_ops += 1;
        self.splice_suppressed -= 1;
        self.thaw(rf);

        log::debug!(
            "combined {} regions on {:?} into {:?} spanning [{}, {})",
            members.len(),
            self.id,
            compound,
            earliest,
            latest
        );
        Some(compound)
    }

    /// Break a compound region back into the regions it was made from.
    ///
    /// Trims and moves applied to the compound since it was combined carry
    /// over to the restored regions. Originals that no longer fall inside the
    /// compound's bounds are dropped.
    pub fn uncombine(&mut self, rf: &mut RegionFactory, region: RegionId) {
        if !self.contains(region) {
            return;
        }
        let Some(target) = rf.region(region) else {
            return;
        };
        let Some(pls) = target.source(0).and_then(|s| s.playlist_source()) else {
            return;
        };
        let nested = pls.playlist.clone();
        let same_playlist = pls.original == self.id;
        let (t_position, t_start, t_length) = (target.position(), target.start(), target.length());

        let mut bounds: Option<(Samplepos, Samplepos, Samplepos)> = None;
        let mut originals = Vec::new();

        for copy_id in nested.region_list() {
            let Some(original_id) = rf.original_of(*copy_id) else {
                log::warn!("compound {:?} holds {:?} with no original", region, copy_id);
                continue;
            };
            let (Some(copy), Some(original)) = (rf.region(*copy_id), rf.region(original_id)) else {
                continue;
            };

            let (adjusted_start, adjusted_end, move_offset) = *bounds.get_or_insert_with(|| {
                let origin = original.position() - copy.position();
                let adjusted_start = origin + t_start;
                (adjusted_start, adjusted_start + t_length, t_position - origin - t_start)
            });

            let overlap = coverage(original.position(), original.end(), adjusted_start, adjusted_end);
            if overlap == OverlapType::None {
                continue;
            }

            let reuse = same_playlist && original.playlist().is_none();
            let restored = if reuse {
                original_id
            } else {
                let Some(fresh) = rf.create_copy(original_id, false) else {
                    continue;
                };
                fresh
            };
            let Some(r) = rf.region_mut(restored) else {
                continue;
            };

            match overlap {
                OverlapType::Internal => {
                    r.trim_to(adjusted_start, adjusted_end - adjusted_start);
                }
                OverlapType::End => {
                    r.trim_front(adjusted_start);
                }
                OverlapType::Start => {
                    r.trim_end(adjusted_end);
                }
                OverlapType::External | OverlapType::None => {}
            }
            let position = r.position() + move_offset;
            r.set_position_internal(position);
            originals.push((r.layer(), r.layering_index(), restored));
        }

        originals.sort_by_key(|(layer, index, _)| (*layer, *index));

        self.freeze();
        self.splice_suppressed += 1;
        self.remove_region_internal(rf, region);
        for (_, _, id) in &originals {
            let Some(position) = rf.region(*id).map(|r| r.position()) else {
                continue;
            };
            if self.add_region_internal(rf, *id, position) {
                self.set_layer(rf, *id, LAYER_TOP);
            }
        }
        self.splice_suppressed -= 1;
        self.thaw(rf);

        log::debug!("uncombined {:?} into {} regions", region, originals.len());
    }
}
