use crate::Track;

/// Reference loudness, in dB, that maps to unity gain.
pub const LOUDNESS_THRESHOLD: f64 = -8.0;

/// Converts an overall loudness into a sound-check gain. Quieter tracks are
/// boosted and louder ones attenuated, never below silence.
pub fn loudness_to_gain(loudness: f64) -> f32 {
    let gain = 1.0 - LOUDNESS_THRESHOLD * (LOUDNESS_THRESHOLD - loudness) / 100.0;
    gain.max(0.0) as f32
}

/// Duration-weighted mean of the segments' peak loudness. Stands in for
/// the overall loudness when the analysis did not report one.
pub fn segment_loudness(track: &Track) -> Option<f64> {
    let (weighted, total) = track
        .segments
        .iter()
        .filter(|segment| segment.duration > 0.0 && segment.loudness_max.is_finite())
        .fold((0.0_f64, 0.0_f64), |(weighted, total), segment| {
            (
                weighted + f64::from(segment.loudness_max) * segment.duration,
                total + segment.duration,
            )
        });
    (total > 0.0).then(|| weighted / total)
}

/// Sets each track's gain from its loudness, falling back to the segment
/// loudness. Tracks with neither keep their current gain.
pub fn equalize_tracks(tracks: Vec<Track>) -> Vec<Track> {
    tracks
        .into_iter()
        .map(|mut track| {
            let loudness = track.loudness.or_else(|| segment_loudness(&track));
            if let Some(loudness) = loudness {
                track.gain = loudness_to_gain(loudness);
                tracing::debug!(
                    track = %track.name,
                    loudness,
                    "volume = {:.0}%",
                    track.gain * 100.0
                );
            }
            track
        })
        .collect()
}
