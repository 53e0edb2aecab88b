use std::fmt;

use daw_transport::{PPQN, Samplepos, TempoMap, Ticks};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.numerator
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl From<(u32, u32)> for TimeSignature {
    fn from((numerator, denominator): (u32, u32)) -> Self {
        Self::new(numerator, denominator)
    }
}

impl From<TimeSignature> for (u32, u32) {
    fn from(ts: TimeSignature) -> Self {
        (ts.numerator, ts.denominator)
    }
}

/// How timeline samples map onto musical time and onto screen pixels.
#[derive(Debug, Clone, Copy)]
pub struct TimeContext {
    pub tempo_map: TempoMap,
    pub time_signature: TimeSignature,
    pub pixels_per_beat: f64,
}

impl TimeContext {
    pub fn new(tempo_map: TempoMap, time_signature: impl Into<TimeSignature>, pixels_per_beat: f64) -> Self {
        Self {
            tempo_map,
            time_signature: time_signature.into(),
            pixels_per_beat,
        }
    }

    pub fn tempo(&self) -> f64 {
        self.tempo_map.bpm
    }

    pub fn sample_rate(&self) -> u32 {
        self.tempo_map.sample_rate
    }

    pub fn samples_per_pixel(&self) -> f64 {
        self.tempo_map.samples_per_tick() * PPQN as f64 / self.pixels_per_beat
    }

    /// Unrounded, so a point converted back and forth lands where it started.
    pub fn samples_to_pixels(&self, samples: Samplepos) -> f64 {
        samples as f64 / self.samples_per_pixel()
    }

    pub fn pixels_to_samples(&self, pixels: f64) -> Samplepos {
        (pixels * self.samples_per_pixel()).round() as Samplepos
    }

    pub fn format_position(&self, samples: Samplepos) -> MusicalPosition {
        let ticks = self.tempo_map.samples_to_ticks(samples).max(0);
        let beats_per_bar = Ticks::from(self.time_signature.beats_per_bar().max(1));
        let total_beats = ticks / PPQN;

        MusicalPosition {
            bar: (total_beats / beats_per_bar) as u32 + 1,
            beat: (total_beats % beats_per_bar) as u32 + 1,
            tick: (ticks % PPQN) as u32,
        }
    }
}

impl Default for TimeContext {
    fn default() -> Self {
        Self::new(TempoMap::default(), TimeSignature::default(), 100.0)
    }
}

/// A bar.beat.tick position, 1-based in bars and beats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicalPosition {
    pub bar: u32,
    pub beat: u32,
    pub tick: u32,
}

impl fmt::Display for MusicalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{:03}", self.bar, self.beat, self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_position() {
        // 120 bpm at 48k: a beat is 24000 samples
        let ctx = TimeContext::default();
        assert_eq!(ctx.format_position(0).to_string(), "1.1.000");
        assert_eq!(ctx.format_position(24_000).to_string(), "1.2.000");
        assert_eq!(ctx.format_position(96_000 + 12_000).to_string(), "2.1.480");
    }

    #[test]
    fn test_pixel_mapping() {
        let ctx = TimeContext::default();
        assert_eq!(ctx.samples_to_pixels(48_000), 200.0);
        assert_eq!(ctx.pixels_to_samples(50.0), 12_000);
    }

    #[test]
    fn test_three_four() {
        let ctx = TimeContext::new(TempoMap::default(), (3, 4), 100.0);
        assert_eq!(ctx.format_position(72_000).to_string(), "2.1.000");
    }
}
