//! Turns an ordered list of tracks into the flat action list a renderer
//! plays back verbatim.
//!
//! For `N` tracks the list is always
//!
//! ```text
//! [fade-in, playback]                       first track
//! [crossmatch, playback] x (N - 1)          one group per adjacent pair
//! [fade-out]                                last track
//! ```
//!
//! so it holds `2N + 1` actions and lasts `N * (transition + intermission) +
//! transition` seconds.

use std::iter::FusedIterator;
use std::slice::Windows;

use crate::action::{initialize, make_transition, terminate, Action};
use crate::{CapsuleError, Result, TerminationMode, Timing, Track};

/// Whether `track` is long enough to take part in a mix.
///
/// The beat grid must fit an entry window, one intermission and an exit
/// window without any of them overlapping, so its span has to be strictly
/// longer than `intermission + 2 * transition`. Both durations must be
/// positive. A track without beats cannot be placed and is never valid.
pub fn is_valid(track: &Track, timing: &Timing) -> bool {
    if !timing.is_usable() {
        return false;
    }
    match track.beat_span() {
        Some((start, end)) => end - start > timing.min_track_span(),
        None => false,
    }
}

/// Keeps the valid tracks, in their original order.
pub fn filter_valid(tracks: Vec<Track>, timing: &Timing) -> Vec<Track> {
    tracks
        .into_iter()
        .filter(|track| {
            let keep = is_valid(track, timing);
            if !keep {
                tracing::warn!(
                    track = %track.name,
                    span = track.beat_span().map(|(start, end)| end - start).unwrap_or(0.0),
                    required = timing.min_track_span(),
                    "dropping track too short to mix"
                );
            }
            keep
        })
        .collect()
}

/// Lazy sequence of adjacent `(tracks[i], tracks[i + 1])` pairs.
#[derive(Debug, Clone)]
pub struct TransitionPairs<'a> {
    inner: Windows<'a, Track>,
}

impl<'a> Iterator for TransitionPairs<'a> {
    type Item = (&'a Track, &'a Track);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|pair| (&pair[0], &pair[1]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for TransitionPairs<'_> {}

impl FusedIterator for TransitionPairs<'_> {}

/// Enumerates the `N - 1` adjacent pairs of `tracks`; empty when `N < 2`.
pub fn transition_pairs(tracks: &[Track]) -> TransitionPairs<'_> {
    TransitionPairs {
        inner: tracks.windows(2),
    }
}

/// Builds the complete action list for `tracks`, which must already be
/// ordered and filtered.
pub fn build_actions(
    tracks: &[Track],
    timing: &Timing,
    ending: TerminationMode,
) -> Result<Vec<Action>> {
    let (Some(first), Some(last)) = (tracks.first(), tracks.last()) else {
        return Err(CapsuleError::InsufficientTracks {
            analysed: 0,
            intermission: timing.intermission,
            transition: timing.transition,
        });
    };

    let mut actions = Vec::with_capacity(2 * tracks.len() + 1);
    actions.extend(initialize(0, first, timing));
    for (index, (outgoing, incoming)) in transition_pairs(tracks).enumerate() {
        actions.extend(make_transition(index, outgoing, incoming, timing));
    }
    actions.extend(terminate(tracks.len() - 1, last, timing, ending));

    tracing::debug!(
        tracks = tracks.len(),
        actions = actions.len(),
        "assembled transition instructions"
    );
    Ok(actions)
}

/// Length of the rendered mix.
pub fn total_duration(actions: &[Action]) -> f64 {
    actions.iter().map(Action::duration).sum()
}

/// Length a mix of `tracks` valid tracks will have.
pub fn expected_duration(tracks: usize, timing: &Timing) -> f64 {
    if tracks == 0 {
        return 0.0;
    }
    tracks as f64 * (timing.transition + timing.intermission) + timing.transition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    const TOLERANCE: f64 = 1e-6;

    fn timing() -> Timing {
        Timing::default()
    }

    fn tracks(durations: &[f64]) -> Vec<Track> {
        durations
            .iter()
            .enumerate()
            .map(|(i, duration)| Track::with_regular_beats(format!("t{i}"), *duration, 0.5))
            .collect()
    }

    fn kinds(actions: &[Action]) -> Vec<ActionKind> {
        actions.iter().map(Action::kind).collect()
    }

    #[test]
    fn validity_threshold_is_strict() {
        let timing = Timing::new(8.0, 4.0).unwrap();
        // Needs more than 8 + 2 * 4 = 16 seconds of beats.
        assert!(!is_valid(&Track::with_regular_beats("a", 16.0, 0.5), &timing));
        assert!(is_valid(&Track::with_regular_beats("b", 16.5, 0.5), &timing));
        assert!(!is_valid(&Track::with_regular_beats("c", 10.0, 0.5), &timing));
    }

    #[test]
    fn validity_uses_beat_span_not_reported_duration() {
        let timing = Timing::new(8.0, 4.0).unwrap();
        let track = Track::with_regular_beats("short grid", 12.0, 0.5).with_duration(60.0);
        assert!(!is_valid(&track, &timing));
    }

    #[test]
    fn tracks_without_beats_are_invalid() {
        let track = Track::new("silent", "silent.mp3", Vec::new()).with_duration(300.0);
        assert!(!is_valid(&track, &timing()));
    }

    #[test]
    fn zero_durations_make_every_track_invalid() {
        let track = Track::with_regular_beats("long", 300.0, 0.5);
        assert!(!is_valid(&track, &Timing::new(0.0, 8.0).unwrap()));
        assert!(!is_valid(&track, &Timing::new(8.0, 0.0).unwrap()));
    }

    #[test]
    fn validity_is_monotonic_in_duration() {
        let timing = timing();
        let mut seen_valid = false;
        for half_seconds in 0..200 {
            let track = Track::with_regular_beats("t", half_seconds as f64 * 0.5, 0.5);
            let valid = is_valid(&track, &timing);
            assert!(!seen_valid || valid, "validity lost at {half_seconds}");
            seen_valid |= valid;
        }
        assert!(seen_valid);
    }

    #[test]
    fn filtering_preserves_order() {
        let filtered = filter_valid(tracks(&[30.0, 10.0, 25.0, 5.0, 40.0]), &timing());
        let names: Vec<_> = filtered.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["t0", "t2", "t4"]);
    }

    #[test]
    fn pairs_are_adjacent_and_repeatable() {
        let input = tracks(&[30.0, 25.0, 40.0, 33.0]);
        let pairs = transition_pairs(&input);
        assert_eq!(pairs.len(), 3);

        let first: Vec<_> = pairs
            .clone()
            .map(|(a, b)| (a.name.clone(), b.name.clone()))
            .collect();
        let second: Vec<_> = transition_pairs(&input)
            .map(|(a, b)| (a.name.clone(), b.name.clone()))
            .collect();
        assert_eq!(first, second);
        assert_eq!(first[0], ("t0".to_string(), "t1".to_string()));
        assert_eq!(first[2], ("t2".to_string(), "t3".to_string()));
    }

    #[test]
    fn fewer_than_two_tracks_have_no_pairs() {
        assert_eq!(transition_pairs(&[]).count(), 0);
        assert_eq!(transition_pairs(&tracks(&[30.0])).count(), 0);
    }

    #[test]
    fn three_tracks_make_seven_actions() {
        let input = tracks(&[30.0, 25.0, 40.0]);
        let actions = build_actions(&input, &timing(), TerminationMode::FadeOut).unwrap();

        assert_eq!(actions.len(), 7);
        assert_eq!(
            kinds(&actions),
            [
                ActionKind::FadeIn,
                ActionKind::Playback,
                ActionKind::Crossmatch,
                ActionKind::Playback,
                ActionKind::Crossmatch,
                ActionKind::Playback,
                ActionKind::FadeOut,
            ]
        );
        let labels: Vec<_> = actions
            .iter()
            .map(|action| action.sources().last().unwrap().label.clone())
            .collect();
        assert_eq!(labels, ["t0", "t0", "t1", "t1", "t2", "t2", "t2"]);
    }

    #[test]
    fn single_track_has_no_crossmatch() {
        let actions = build_actions(&tracks(&[30.0]), &timing(), TerminationMode::FadeOut).unwrap();
        assert_eq!(
            kinds(&actions),
            [ActionKind::FadeIn, ActionKind::Playback, ActionKind::FadeOut]
        );
    }

    #[test]
    fn action_count_and_duration_follow_track_count() {
        let timing = Timing::new(7.25, 3.5).unwrap();
        for n in 1..=6 {
            let input = tracks(&vec![45.0; n]);
            let actions = build_actions(&input, &timing, TerminationMode::FadeOut).unwrap();
            assert_eq!(actions.len(), 2 + 2 * (n - 1) + 1);
            assert!((total_duration(&actions) - expected_duration(n, &timing)).abs() < TOLERANCE);
            assert!(actions.iter().all(|action| action.duration() >= 0.0));
        }
    }

    #[test]
    fn cut_ending_keeps_duration() {
        let input = tracks(&[30.0, 30.0]);
        let fade = build_actions(&input, &timing(), TerminationMode::FadeOut).unwrap();
        let cut = build_actions(&input, &timing(), TerminationMode::Cut).unwrap();
        assert_eq!(cut.last().unwrap().kind(), ActionKind::Playback);
        assert!((total_duration(&fade) - total_duration(&cut)).abs() < TOLERANCE);
    }

    #[test]
    fn windows_never_overlap_within_a_track() {
        let input = tracks(&[24.5, 24.5, 24.5]);
        let actions = build_actions(&input, &timing(), TerminationMode::FadeOut).unwrap();
        for index in 0..input.len() {
            let mut windows: Vec<_> = actions
                .iter()
                .flat_map(|action| action.sources())
                .filter(|window| window.track == index)
                .collect();
            windows.sort_by(|a, b| a.start.total_cmp(&b.start));
            for pair in windows.windows(2) {
                assert!(pair[0].end() <= pair[1].start + TOLERANCE);
            }
            assert!(windows.last().unwrap().end() <= 24.5 + TOLERANCE);
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = build_actions(&[], &timing(), TerminationMode::FadeOut).unwrap_err();
        assert!(matches!(err, CapsuleError::InsufficientTracks { .. }));
    }
}
