use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::FeatureMatrix;

/// A single analysed beat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub start: f64,
    pub duration: f64,
}

impl Beat {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// An analysed segment: a short, timbrally uniform slice of audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
    pub timbre: Vec<f32>,
    #[serde(default)]
    pub loudness_max: f32,
}

impl Segment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// One input audio source together with everything the pipeline learned
/// about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub source: PathBuf,
    /// Sorted by start time.
    pub beats: Vec<Beat>,
    pub segments: Vec<Segment>,
    pub tempo: Option<f64>,
    /// Overall loudness in dB.
    pub loudness: Option<f64>,
    pub channels: u16,
    /// Set when [`make_stereo`] duplicated a mono channel.
    pub upmixed: bool,
    /// Sound-check gain applied by the renderer.
    pub gain: f32,
    /// Beat-aligned, whitened timbre matrix. One row per beat.
    pub features: Option<FeatureMatrix>,
    duration: Option<f64>,
}

impl Track {
    /// Creates a track from its beat grid. Beats are sorted by start, so
    /// analyzers may hand them over in any order.
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, mut beats: Vec<Beat>) -> Self {
        beats.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            name: name.into(),
            source: source.into(),
            beats,
            segments: Vec::new(),
            tempo: None,
            loudness: None,
            channels: 2,
            upmixed: false,
            gain: 1.0,
            features: None,
            duration: None,
        }
    }

    /// Test fixture: a track with a regular beat grid covering `[0, duration)`.
    #[cfg(test)]
    pub(crate) fn with_regular_beats(name: impl Into<String>, duration: f64, beat_length: f64) -> Self {
        let mut beats = Vec::new();
        if beat_length > 0.0 {
            let mut start = 0.0;
            while start + beat_length <= duration + 1e-9 {
                beats.push(Beat::new(start, beat_length));
                start += beat_length;
            }
        }
        let name = name.into();
        let mut track = Self::new(name.clone(), name, beats);
        track.duration = Some(duration);
        track
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Total duration in seconds. Falls back to the end of the last beat
    /// when the analysis did not report one.
    pub fn duration(&self) -> f64 {
        self.duration
            .or_else(|| self.beats.last().map(Beat::end))
            .unwrap_or(0.0)
            .max(0.0)
    }

    /// The `[start, end]` interval covered by the beat grid, if any.
    pub fn beat_span(&self) -> Option<(f64, f64)> {
        let first = self.beats.first()?;
        let last = self.beats.last()?;
        let (start, end) = (first.start, last.end());
        (start.is_finite() && end.is_finite() && end >= start).then_some((start, end))
    }

    /// Indices of the beats that start inside `[start, end)`.
    pub fn beats_within(&self, start: f64, end: f64) -> std::ops::Range<usize> {
        let from = self.beats.partition_point(|beat| beat.start < start);
        let to = self.beats.partition_point(|beat| beat.start < end);
        from..to.max(from)
    }
}

/// Makes a track safe to mix with stereo material. Mono tracks are flagged
/// for channel duplication; anything with two or more channels passes
/// through untouched.
pub fn make_stereo(mut track: Track) -> Track {
    if track.channels < 2 {
        tracing::debug!(track = %track.name, channels = track.channels, "upmixing to stereo");
        track.channels = 2;
        track.upmixed = true;
    }
    track
}
