use daw_transport::{Range, RangeMove};

use crate::region::RegionId;

/// Change notifications emitted by a playlist once its outermost edit finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistEvent {
    RegionAdded(RegionId),
    RegionRemoved(RegionId),
    RangesMoved {
        moves: Vec<RangeMove>,
        from_undo: bool,
    },
    /// Regions grew into these ranges (trimmed longer at either end).
    RegionsExtended(Vec<Range>),
    LayeringChanged,
    ContentsChanged,
    /// Coalesced ranges whose derived data (fades, crossfades, peaks) is stale.
    DependentRangesChanged(Vec<Range>),
}
