use std::collections::HashMap;

use daw_transport::{LayerModel, OverlapType, Samplepos, coverage};

use super::Playlist;
use crate::region::{Layer, RegionId};
use crate::region_factory::RegionFactory;

/// Target for [`Playlist::set_layer`]: above everything.
pub const LAYER_TOP: f64 = f64::INFINITY;
/// Target for [`Playlist::set_layer`]: below everything.
pub const LAYER_BOTTOM: f64 = f64::NEG_INFINITY;

/// Time buckets used to limit overlap checks while relayering.
const DIVISIONS: usize = 512;

impl Playlist {
    /// Recompute every region's layer from the stacking order.
    ///
    /// Regions are visited in layering-index order (or position order under
    /// [`LayerModel::Position`]); each lands one layer above the highest
    /// layer holding a region it overlaps. Overlapping regions therefore
    /// never share a layer, and later regions in the order end up on top.
    /// Layering indices are then renumbered `0..n` in that order.
    pub(crate) fn relayer(&mut self, rf: &mut RegionFactory) {
        if self.in_set_state {
            return;
        }

        let spans: HashMap<RegionId, (Samplepos, Samplepos)> = self
            .regions
            .iter()
            .filter_map(|id| rf.region(*id).map(|r| (*id, (r.position(), r.end()))))
            .collect();

        let start = spans.values().map(|s| s.0).min().unwrap_or(0);
        let end = spans.values().map(|s| s.1).max().unwrap_or(0);
        let division_size = (end - start) as f64 / DIVISIONS as f64;

        let mut order = self.regions.clone();
        match self.layer_model {
            LayerModel::LayeringIndex => {
                order.sort_by_key(|id| rf.region(*id).map_or(0, |r| r.layering_index()))
            }
            LayerModel::Position => order.sort_by_key(|id| rf.region(*id).map_or(0, |r| r.position())),
        }

        // layers[layer][division] holds the spans already placed there
        let mut layers: Vec<Vec<Vec<(Samplepos, Samplepos)>>> = vec![vec![Vec::new(); DIVISIONS]];

        for id in &order {
            let Some(&(rs, re)) = spans.get(id) else {
                continue;
            };

            let (first, last) = if division_size > 0.0 {
                let bucket = |pos: Samplepos| {
                    (((pos - start) as f64 / division_size).floor() as usize).min(DIVISIONS - 1)
                };
                // an empty region still occupies its start bucket
                (bucket(rs), bucket((re - 1).max(rs)))
            } else {
                (0, 0)
            };

            let mut j = layers.len();
            while j > 0 {
                let blocked = (first..=last).any(|k| {
                    layers[j - 1][k]
                        .iter()
                        .any(|&(os, oe)| coverage(os, oe, rs, re) != OverlapType::None)
                });
                if blocked {
                    break;
                }
                j -= 1;
            }

            if j == layers.len() {
                layers.push(vec![Vec::new(); DIVISIONS]);
            }
            for bucket in &mut layers[j][first..=last] {
                bucket.push((rs, re));
            }

            if let Some(region) = rf.region_mut(*id) {
                region.set_layer(j as Layer);
            }
        }

        log::debug!(
            "relayered playlist {:?}: {} regions on {} layers",
            self.id,
            order.len(),
            layers.len()
        );

        self.notify_layering_changed();
        self.setup_layering_indices(rf, &order);
    }

    fn setup_layering_indices(&self, rf: &mut RegionFactory, order: &[RegionId]) {
        for (index, id) in order.iter().enumerate() {
            if let Some(region) = rf.region_mut(*id) {
                region.set_layering_index(index as u64);
            }
        }
    }

    /// Move `region` in the stacking order so it sits just below the first
    /// region whose layer exceeds `new_layer`. Layers themselves are
    /// recomputed by the next relayer.
    pub fn set_layer(&mut self, rf: &mut RegionFactory, region: RegionId, new_layer: f64) {
        if !self.contains(region) {
            return;
        }

        let mut order: Vec<RegionId> = self.regions.iter().copied().filter(|r| *r != region).collect();
        order.sort_by_key(|id| rf.region(*id).map_or(0, |r| r.layering_index()));

        let at = order
            .iter()
            .position(|id| rf.region(*id).is_some_and(|r| f64::from(r.layer()) > new_layer))
            .unwrap_or(order.len());
        order.insert(at, region);

        self.setup_layering_indices(rf, &order);
    }

    fn restack(&mut self, rf: &mut RegionFactory, region: RegionId, new_layer: impl FnOnce(Layer) -> f64) {
        let Some(current) = rf.region(region).map(|r| r.layer()) else {
            return;
        };
        self.freeze();
        self.set_layer(rf, region, new_layer(current));
        self.pending.layering = true;
        self.thaw(rf);
    }

    pub fn raise_region(&mut self, rf: &mut RegionFactory, region: RegionId) {
        self.restack(rf, region, |layer| f64::from(layer) + 1.5);
    }

    pub fn lower_region(&mut self, rf: &mut RegionFactory, region: RegionId) {
        self.restack(rf, region, |layer| f64::from(layer) - 1.5);
    }

    pub fn raise_region_to_top(&mut self, rf: &mut RegionFactory, region: RegionId) {
        self.restack(rf, region, |_| LAYER_TOP);
    }

    pub fn lower_region_to_bottom(&mut self, rf: &mut RegionFactory, region: RegionId) {
        self.restack(rf, region, |_| LAYER_BOTTOM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{audio_playlist, drain, factory_with_source, place};
    use crate::events::PlaylistEvent;
    use crate::region::RegionProperties;
    use daw_transport::MAX_SAMPLEPOS;

    fn layers(rf: &RegionFactory, ids: &[RegionId]) -> Vec<Layer> {
        ids.iter().map(|id| rf.region(*id).expect("region").layer()).collect()
    }

    fn assert_no_shared_overlap(rf: &RegionFactory, pl: &Playlist) {
        let ids = pl.region_list();
        for a in ids {
            for b in ids {
                if a == b {
                    continue;
                }
                let (ra, rb) = (rf.region(*a).expect("a"), rf.region(*b).expect("b"));
                if ra.layer() == rb.layer() {
                    assert_eq!(
                        ra.coverage(rb.position(), rb.end()),
                        OverlapType::None,
                        "{:?} and {:?} overlap on layer {}",
                        a,
                        b,
                        ra.layer()
                    );
                }
            }
        }
    }

    #[test]
    fn test_disjoint_regions_share_layer_zero() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        let ids: Vec<_> = (0..4).map(|i| place(&mut rf, &mut pl, &source, i * 1000, 1000)).collect();

        assert_eq!(layers(&rf, &ids), vec![0, 0, 0, 0], "touching regions do not overlap");
    }

    #[test]
    fn test_relayer_never_stacks_overlaps_on_one_layer() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        // an irregular pile, including regions spanning many buckets
        let spans = [
            (0, 50_000),
            (10, 5),
            (100, 900),
            (40_000, 20_000),
            (49_999, 2),
            (500, 100_000),
            (60_000, 1),
            (59_999, 1),
            (0, 1),
        ];
        for (pos, len) in spans {
            place(&mut rf, &mut pl, &source, pos, len);
        }

        assert_no_shared_overlap(&rf, &pl);
    }

    #[test]
    fn test_relayer_stacks_a_long_overlap_chain() {
        let (mut rf, source) = factory_with_source(10_000_000);
        let mut pl = audio_playlist(&mut rf);
        pl.freeze();
        let ids: Vec<_> = (0..500).map(|i| place(&mut rf, &mut pl, &source, i * 700, 1000)).collect();
        pl.thaw(&mut rf);

        assert_no_shared_overlap(&rf, &pl);
        // each region overlaps the one before it, so they climb
        assert_eq!(rf.region(ids[499]).expect("last").layer(), 499);
    }

    #[test]
    fn test_relayer_with_empty_region_at_timeline_end() {
        let (mut rf, source) = factory_with_source(10_000_000);
        let mut pl = audio_playlist(&mut rf);
        place(&mut rf, &mut pl, &source, 0, 1000);
        let id = rf.create_from_sources(vec![source], RegionProperties::new().length(1000), false);

        // the fractional tail is squeezed to nothing at MAX_SAMPLEPOS
        pl.add_region(&mut rf, id, MAX_SAMPLEPOS - 100, 1.5, false);

        assert_eq!(pl.n_regions(), 3);
        assert_no_shared_overlap(&rf, &pl);
        let tail = *pl.region_list().last().expect("tail");
        assert_eq!(rf.region(tail).expect("tail").length(), 0);
    }

    #[test]
    fn test_layering_indices_are_renumbered() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        let ids: Vec<_> = (0..3).map(|_| place(&mut rf, &mut pl, &source, 0, 100)).collect();

        let indices: Vec<u64> = ids
            .iter()
            .map(|id| rf.region(*id).expect("region").layering_index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(layers(&rf, &ids), vec![0, 1, 2]);
    }

    #[test]
    fn test_raise_and_lower() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        let a = place(&mut rf, &mut pl, &source, 0, 100);
        let b = place(&mut rf, &mut pl, &source, 0, 100);
        let c = place(&mut rf, &mut pl, &source, 0, 100);
        assert_eq!(layers(&rf, &[a, b, c]), vec![0, 1, 2]);

        pl.raise_region(&mut rf, a);
        assert_eq!(layers(&rf, &[a, b, c]), vec![1, 0, 2]);

        pl.raise_region_to_top(&mut rf, a);
        assert_eq!(layers(&rf, &[a, b, c]), vec![2, 0, 1]);

        pl.lower_region(&mut rf, c);
        assert_eq!(layers(&rf, &[a, b, c]), vec![2, 1, 0]);

        pl.lower_region_to_bottom(&mut rf, a);
        assert_eq!(layers(&rf, &[a, b, c]), vec![0, 2, 1]);
    }

    #[test]
    fn test_restack_emits_one_layering_change() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        let a = place(&mut rf, &mut pl, &source, 0, 100);
        place(&mut rf, &mut pl, &source, 0, 100);
        let rx = pl.subscribe();

        pl.raise_region_to_top(&mut rf, a);

        let events = drain(&rx);
        assert_eq!(events, vec![PlaylistEvent::LayeringChanged]);
    }

    #[test]
    fn test_position_model_puts_later_regions_on_top() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        pl.set_layer_model(LayerModel::Position);
        let late = place(&mut rf, &mut pl, &source, 500, 1000);
        let early = place(&mut rf, &mut pl, &source, 0, 1000);

        assert_eq!(layers(&rf, &[early, late]), vec![0, 1]);

        // manual raising has no lasting effect in this model
        pl.raise_region_to_top(&mut rf, early);
        assert_eq!(layers(&rf, &[early, late]), vec![0, 1]);
    }

    #[test]
    fn test_set_layer_ignores_non_members() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        let a = place(&mut rf, &mut pl, &source, 0, 100);
        let loose = rf.create_from_sources(vec![source], crate::region::RegionProperties::new(), false);

        pl.set_layer(&mut rf, loose, LAYER_BOTTOM);

        assert_eq!(rf.region(a).expect("a").layering_index(), 0);
        assert!(!pl.contains(loose));
    }
}
