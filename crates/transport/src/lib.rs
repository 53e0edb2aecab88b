use serde::{Deserialize, Serialize};

/// Pulses Per Quarter Note - defines timing resolution
pub const PPQN: i64 = 960;

/// Absolute timeline position in samples.
pub type Samplepos = i64;
/// Duration in samples.
pub type Samplecnt = i64;
/// Signed distance between two sample positions.
pub type Sampleoffset = i64;
/// Musical time at `PPQN` resolution.
pub type Ticks = i64;

/// Largest representable timeline position. Nothing may end past it.
pub const MAX_SAMPLEPOS: Samplepos = i64::MAX;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Audio,
    Midi,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Audio => write!(f, "audio"),
            DataType::Midi => write!(f, "midi"),
        }
    }
}

/// How insertions and removals propagate to later material on a playlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    Normal,
    Splice,
    Ripple,
}

/// Sort key used when layers are recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerModel {
    /// Manual stacking order, kept in each region's layering index.
    #[default]
    LayeringIndex,
    /// Later regions always sit above earlier ones.
    Position,
}

/// Whether a region is anchored to a sample position or to a musical position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionLockStyle {
    #[default]
    AudioTime,
    MusicTime,
}

/// How a query range relates to a region's span. Both are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapType {
    /// Disjoint, touching, or empty.
    None,
    /// The query lies inside the span without covering either end.
    Internal,
    /// The query covers the span's start but ends inside it.
    Start,
    /// The query starts inside the span and covers its end.
    End,
    /// The query covers the whole span.
    External,
}

/// Classify how `[start_b, end_b)` covers `[start_a, end_a)`.
///
/// Ranges that only touch at an edge do not overlap.
pub fn coverage(
    start_a: Samplepos,
    end_a: Samplepos,
    start_b: Samplepos,
    end_b: Samplepos,
) -> OverlapType {
    if end_a <= start_a || end_b <= start_b {
        return OverlapType::None;
    }
    if end_b <= start_a || start_b >= end_a {
        return OverlapType::None;
    }

    match (start_b <= start_a, end_b >= end_a) {
        (true, true) => OverlapType::External,
        (true, false) => OverlapType::Start,
        (false, true) => OverlapType::End,
        (false, false) => OverlapType::Internal,
    }
}

/// A half-open span of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Samplepos,
    pub end: Samplepos,
}

impl Range {
    pub fn new(start: Samplepos, end: Samplepos) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> Samplecnt {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, pos: Samplepos) -> bool {
        pos >= self.start && pos < self.end
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        coverage(self.start, self.end, other.start, other.end) != OverlapType::None
    }
}

/// Material that used to occupy `[from, from + length)` now starts at `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMove {
    pub from: Samplepos,
    pub length: Samplecnt,
    pub to: Samplepos,
}

impl RangeMove {
    pub fn new(from: Samplepos, length: Samplecnt, to: Samplepos) -> Self {
        Self { from, length, to }
    }
}

/// Merge overlapping or touching ranges. Output is sorted by start.
pub fn coalesce_ranges(mut ranges: Vec<Range>) -> Vec<Range> {
    ranges.retain(|r| !r.is_empty());
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Constant-tempo conversion between sample time and musical time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    pub bpm: f64,
    pub sample_rate: u32,
}

impl TempoMap {
    pub fn new(bpm: f64, sample_rate: u32) -> Self {
        Self { bpm, sample_rate }
    }

    pub fn samples_per_tick(&self) -> f64 {
        let seconds_per_beat = 60.0 / self.bpm;
        let seconds_per_tick = seconds_per_beat / PPQN as f64;
        seconds_per_tick * self.sample_rate as f64
    }

    pub fn samples_to_ticks(&self, samples: Samplepos) -> Ticks {
        (samples as f64 / self.samples_per_tick()).round() as Ticks
    }

    pub fn ticks_to_samples(&self, ticks: Ticks) -> Samplepos {
        (ticks as f64 * self.samples_per_tick()).round() as Samplepos
    }

    pub fn samples_to_seconds(&self, samples: Samplepos) -> f64 {
        samples as f64 / self.sample_rate as f64
    }

    pub fn seconds_to_samples(&self, seconds: f64) -> Samplepos {
        (seconds * self.sample_rate as f64).round() as Samplepos
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(120.0, 48_000)
    }
}
