use crate::Track;

/// Orders tracks so neighbouring tempos are as close as possible.
///
/// Tempos are first folded toward the median by an octave: a track more than
/// half an octave slower than the median counts double, one more than half
/// an octave faster counts half. Tracks are then sorted by the folded tempo.
/// The sort is stable and tracks without a tempo keep their relative order
/// after all the others, so the result is always a permutation of the input.
pub fn order_tracks(tracks: Vec<Track>) -> Vec<Track> {
    let mut tempos: Vec<f64> = tracks.iter().filter_map(|track| track.tempo).collect();
    let Some(median) = median(&mut tempos) else {
        tracing::debug!("no tempo information, keeping input order");
        return tracks;
    };

    let mut keyed: Vec<(Option<f64>, Track)> = tracks
        .into_iter()
        .map(|track| (track.tempo.map(|tempo| fold_tempo(tempo, median)), track))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    keyed.into_iter().map(|(_, track)| track).collect()
}

fn fold_tempo(tempo: f64, median: f64) -> f64 {
    let octaves = (tempo / median).log2();
    if octaves < -0.5 {
        tempo * 2.0
    } else if octaves > 0.5 {
        tempo / 2.0
    } else {
        tempo
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
