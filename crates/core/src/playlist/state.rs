use daw_project::PlaylistData;

use super::{Playlist, PlaylistId};
use crate::error::SessionError;
use crate::region_factory::RegionFactory;

impl Playlist {
    /// Persisted form. Without `full` only the playlist's own attributes are
    /// saved, not its regions.
    pub fn state(&self, rf: &RegionFactory, full: bool) -> PlaylistData {
        let regions = if full {
            self.regions
                .iter()
                .filter_map(|id| rf.region(*id))
                .map(|r| r.state())
                .collect()
        } else {
            Vec::new()
        };

        PlaylistData {
            id: self.id.0,
            name: self.name.clone(),
            data_type: self.data_type,
            frozen: self.frozen,
            orig_track_id: self.orig_track_id,
            shared_with: self.shared_with.clone(),
            combine_ops: self.combine_ops,
            edit_mode: self.edit_mode,
            regions,
        }
    }

    /// Rebuild a playlist from saved state. Every source its regions use must
    /// already be registered with `rf`.
    pub fn from_state(rf: &mut RegionFactory, data: &PlaylistData) -> Result<Playlist, SessionError> {
        let mut pl = Playlist::new(PlaylistId(data.id), data.name.clone(), data.data_type);
        pl.set_state(rf, data)?;
        Ok(pl)
    }

    /// Replace this playlist's attributes and membership with `data`.
    ///
    /// Saved layers are kept as they are: nothing is relayered and no edit
    /// splices while the state is applied.
    pub fn set_state(&mut self, rf: &mut RegionFactory, data: &PlaylistData) -> Result<(), SessionError> {
        if let Some(bad) = data.regions.iter().find(|r| r.data_type != data.data_type) {
            return Err(SessionError::DataTypeMismatch {
                playlist: PlaylistId(data.id),
                region: bad.id,
                expected: data.data_type,
                found: bad.data_type,
            });
        }

        self.in_set_state = true;
        self.freeze();

        self.name = data.name.clone();
        self.frozen = data.frozen;
        self.orig_track_id = data.orig_track_id;
        self.shared_with = data.shared_with.clone();
        self.combine_ops = data.combine_ops;
        self.edit_mode = data.edit_mode;

        for id in self.regions.clone() {
            self.remove_region_internal(rf, id);
            if let Some(region) = rf.region_mut(id) {
                region.set_playlist(None);
            }
        }

        let mut result = Ok(());
        for region in &data.regions {
            match rf.create_from_state(region) {
                Ok(id) => {
                    self.add_region_internal(rf, id, region.position);
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        self.thaw(rf);
        self.in_set_state = false;

        if result.is_ok() {
            log::debug!("restored playlist {:?} with {} regions", self.id, self.regions.len());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlaylistEvent;
    use crate::test_util::{audio_playlist, bounds, drain, factory_with_source, place, register_file_source};
    use daw_transport::{DataType, EditMode};

    #[test]
    fn test_state_round_trip_keeps_layers() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        let a = place(&mut rf, &mut pl, &source, 0, 1000);
        let b = place(&mut rf, &mut pl, &source, 500, 1000);
        pl.raise_region_to_top(&mut rf, a);
        pl.set_edit_mode(EditMode::Ripple);
        pl.share_with(7);

        let data = pl.state(&rf, true);
        let mut fresh = RegionFactory::new();
        register_file_source(&mut fresh, source.id().0, 1_000_000);
        let restored = Playlist::from_state(&mut fresh, &data).expect("restore");

        assert_eq!(restored.region_list(), &[a, b]);
        assert_eq!(bounds(&fresh, &restored), bounds(&rf, &pl));
        assert_eq!(fresh.region(a).expect("a").layer(), 1);
        assert_eq!(fresh.region(b).expect("b").layer(), 0);
        assert_eq!(restored.edit_mode(), EditMode::Ripple);
        assert_eq!(restored.shared_with(), &[7]);
        assert_eq!(fresh.region(a).expect("a").playlist(), Some(restored.id()));
    }

    #[test]
    fn test_state_without_regions() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        place(&mut rf, &mut pl, &source, 0, 1000);

        let data = pl.state(&rf, false);
        assert!(data.regions.is_empty());
        assert_eq!(data.name, pl.name());
    }

    #[test]
    fn test_set_state_restores_membership_without_splicing() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        let a = place(&mut rf, &mut pl, &source, 0, 1000);
        let b = place(&mut rf, &mut pl, &source, 1000, 1000);
        let saved = pl.state(&rf, true);

        pl.set_edit_mode(EditMode::Splice);
        pl.remove_region(&mut rf, a);
        assert_eq!(rf.region(b).expect("b").position(), 0);

        pl.set_state(&mut rf, &saved).expect("set state");

        assert_eq!(pl.region_list(), &[a, b]);
        assert_eq!(bounds(&rf, &pl), vec![(0, 1000), (1000, 1000)]);
        assert_eq!(pl.edit_mode(), EditMode::Normal);
    }

    #[test]
    fn test_set_state_skips_relayer_and_reports_contents() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        place(&mut rf, &mut pl, &source, 0, 1000);
        let mut data = pl.state(&rf, true);
        // a saved layer the relayer would never produce
        data.regions[0].layer = 5;
        let rx = pl.subscribe();

        pl.set_state(&mut rf, &data).expect("set state");

        let region = rf.region(pl.region_list()[0]).expect("region");
        assert_eq!(region.layer(), 5);
        let events = drain(&rx);
        assert!(events.contains(&PlaylistEvent::ContentsChanged));
        assert!(!events.contains(&PlaylistEvent::LayeringChanged));
    }

    #[test]
    fn test_from_state_rejects_mixed_types() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        place(&mut rf, &mut pl, &source, 0, 1000);
        let mut data = pl.state(&rf, true);
        data.data_type = DataType::Midi;

        let err = Playlist::from_state(&mut rf, &data).expect_err("mismatch");
        assert!(matches!(err, SessionError::DataTypeMismatch { .. }));
    }

    #[test]
    fn test_from_state_reports_missing_source() {
        let (mut rf, source) = factory_with_source(1_000_000);
        let mut pl = audio_playlist(&mut rf);
        place(&mut rf, &mut pl, &source, 0, 1000);
        let data = pl.state(&rf, true);

        let mut empty = RegionFactory::new();
        let err = Playlist::from_state(&mut empty, &data).expect_err("missing source");
        assert!(matches!(err, SessionError::MissingSource { .. }));
    }
}
