//! Pure geometry for region edits, testable without a playlist.

use daw_transport::{OverlapType, Samplecnt, Samplepos, coverage};

/// Which side of a cut a new piece came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceSide {
    Left,
    Right,
    /// A middle piece, cut on both sides.
    Both,
}

impl PieceSide {
    pub fn left_of_split(self) -> bool {
        matches!(self, PieceSide::Left | PieceSide::Both)
    }

    pub fn right_of_split(self) -> bool {
        matches!(self, PieceSide::Right | PieceSide::Both)
    }
}

/// A new region carved out of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub position: Samplepos,
    /// Offset into the source material.
    pub start: Samplepos,
    pub length: Samplecnt,
    pub side: PieceSide,
}

/// How the original region is shortened after a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trim {
    /// Cut the end back to this (exclusive) position.
    End(Samplepos),
    /// Move the front edge forward to this position.
    Front(Samplepos),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    pub remove: bool,
    pub pieces: Vec<Piece>,
    pub trim: Option<Trim>,
}

/// Plan how `[range_start, range_end)` partitions a region.
///
/// With `cutting` the material inside the range is discarded; otherwise it
/// becomes its own piece so the region is divided at both range edges.
/// Returns `None` when the range misses the region.
pub fn plan_partition(
    position: Samplepos,
    start: Samplepos,
    length: Samplecnt,
    range_start: Samplepos,
    range_end: Samplepos,
    cutting: bool,
) -> Option<PartitionPlan> {
    let end = position + length;
    let offset_of = |pos: Samplepos| start + (pos - position);

    let plan = match coverage(position, end, range_start, range_end) {
        OverlapType::None => return None,

        // [ ---- range_start ==== range_end ---- ]
        OverlapType::Internal => {
            let mut pieces = Vec::with_capacity(2);
            if !cutting {
                pieces.push(Piece {
                    position: range_start,
                    start: offset_of(range_start),
                    length: range_end - range_start,
                    side: PieceSide::Both,
                });
            }
            pieces.push(Piece {
                position: range_end,
                start: offset_of(range_end),
                length: end - range_end,
                side: PieceSide::Right,
            });
            PartitionPlan {
                remove: false,
                pieces,
                trim: Some(Trim::End(range_start)),
            }
        }

        // [ ---- range_start ==== ] range_end
        OverlapType::End => {
            let pieces = if cutting {
                Vec::new()
            } else {
                vec![Piece {
                    position: range_start,
                    start: offset_of(range_start),
                    length: end - range_start,
                    side: PieceSide::Left,
                }]
            };
            PartitionPlan {
                remove: false,
                pieces,
                trim: Some(Trim::End(range_start)),
            }
        }

        // range_start [ ==== range_end ---- ]
        OverlapType::Start => {
            let pieces = if cutting {
                Vec::new()
            } else {
                vec![Piece {
                    position,
                    start,
                    length: range_end - position,
                    side: PieceSide::Right,
                }]
            };
            PartitionPlan {
                remove: false,
                pieces,
                trim: Some(Trim::Front(range_end)),
            }
        }

        OverlapType::External => PartitionPlan {
            remove: cutting,
            pieces: Vec::new(),
            trim: None,
        },
    };
    Some(plan)
}

/// Split a region at `at`. Nothing to do unless `at` is strictly inside.
pub fn plan_split(
    position: Samplepos,
    start: Samplepos,
    length: Samplecnt,
    at: Samplepos,
) -> Option<(Piece, Piece)> {
    if at <= position || at >= position + length {
        return None;
    }
    let before = at - position;
    let left = Piece {
        position,
        start,
        length: before,
        side: PieceSide::Left,
    };
    let right = Piece {
        position: at,
        start: start + before,
        length: length - before,
        side: PieceSide::Right,
    };
    Some((left, right))
}

/// The part of a region inside `[range_start, range_start + cnt)`, with its
/// position made relative to `range_start`.
pub fn plan_range_copy(
    position: Samplepos,
    start: Samplepos,
    length: Samplecnt,
    range_start: Samplepos,
    cnt: Samplecnt,
) -> Option<Piece> {
    let end = position + length;
    let range_end = range_start + cnt;

    let (offset, relative_position, len) = match coverage(position, end, range_start, range_end) {
        OverlapType::None => return None,
        OverlapType::Internal => (range_start - position, 0, cnt),
        OverlapType::Start => (0, position - range_start, range_end - position),
        OverlapType::End => (range_start - position, 0, end - range_start),
        OverlapType::External => (0, position - range_start, length),
    };

    Some(Piece {
        position: relative_position,
        start: start + offset,
        length: len,
        side: PieceSide::Both,
    })
}
