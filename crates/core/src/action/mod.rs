//! Rendering instructions and the constructors for each group of them.
//!
//! Every window is anchored to a track's beat grid `[g0, g1]`: a track is
//! entered at the start of its grid and left at the end of it. The caller is
//! responsible for only passing tracks whose grid is long enough (see
//! [`crate::mix::is_valid`]); the constructors clamp rather than fail.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{TerminationMode, Timing, Track};

/// A region of one track, addressed by the track's position in the mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWindow {
    pub track: usize,
    pub label: String,
    pub start: f64,
    pub duration: f64,
}

impl SourceWindow {
    fn new(index: usize, track: &Track, start: f64, duration: f64) -> Self {
        Self {
            track: index,
            label: track.name.clone(),
            start: start.max(0.0),
            duration: duration.max(0.0),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FadeIn,
    FadeOut,
    Crossmatch,
    Playback,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::FadeIn => "Fade in",
            ActionKind::FadeOut => "Fade out",
            ActionKind::Crossmatch => "Crossmatch",
            ActionKind::Playback => "Playback",
        };
        f.write_str(name)
    }
}

/// One instruction for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    FadeIn {
        window: SourceWindow,
    },
    Playback {
        window: SourceWindow,
    },
    /// Blends the tail of `outgoing` into the head of `incoming`. Both
    /// windows have the same length.
    Crossmatch {
        outgoing: SourceWindow,
        incoming: SourceWindow,
        /// Mean distance between the whitened timbre rows on either side,
        /// when both tracks carry features. Lower blends more smoothly.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timbre_distance: Option<f32>,
    },
    FadeOut {
        window: SourceWindow,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::FadeIn { .. } => ActionKind::FadeIn,
            Action::Playback { .. } => ActionKind::Playback,
            Action::Crossmatch { .. } => ActionKind::Crossmatch,
            Action::FadeOut { .. } => ActionKind::FadeOut,
        }
    }

    /// Seconds this action contributes to the output.
    pub fn duration(&self) -> f64 {
        match self {
            Action::FadeIn { window } | Action::Playback { window } | Action::FadeOut { window } => {
                window.duration
            }
            Action::Crossmatch { outgoing, .. } => outgoing.duration,
        }
    }

    /// Windows this action reads from, in playback order.
    pub fn sources(&self) -> Vec<&SourceWindow> {
        match self {
            Action::FadeIn { window } | Action::Playback { window } | Action::FadeOut { window } => {
                vec![window]
            }
            Action::Crossmatch {
                outgoing, incoming, ..
            } => vec![outgoing, incoming],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Crossmatch {
                outgoing,
                incoming,
                timbre_distance,
            } => {
                write!(
                    f,
                    "{:<10} {:>8.3}s  {} [{:.3}-{:.3}] -> {} [{:.3}-{:.3}]",
                    self.kind(),
                    self.duration(),
                    outgoing.label,
                    outgoing.start,
                    outgoing.end(),
                    incoming.label,
                    incoming.start,
                    incoming.end(),
                )?;
                if let Some(distance) = timbre_distance {
                    write!(f, "  (timbre distance {distance:.3})")?;
                }
                Ok(())
            }
            Action::FadeIn { window } | Action::Playback { window } | Action::FadeOut { window } => {
                write!(
                    f,
                    "{:<10} {:>8.3}s  {} [{:.3}-{:.3}]",
                    self.kind(),
                    self.duration(),
                    window.label,
                    window.start,
                    window.end(),
                )
            }
        }
    }
}

/// Opening group for the first track: a fade-in over the head of its grid
/// followed by one intermission of steady playback.
pub fn initialize(index: usize, track: &Track, timing: &Timing) -> Vec<Action> {
    let (g0, _) = grid(track);
    vec![
        Action::FadeIn {
            window: SourceWindow::new(index, track, g0, timing.transition),
        },
        Action::Playback {
            window: SourceWindow::new(index, track, g0 + timing.transition, timing.intermission),
        },
    ]
}

/// Middle group for the adjacent pair `(outgoing, incoming)`: a crossmatch
/// from the tail of `outgoing` into the head of `incoming`, then one
/// intermission of `incoming`.
pub fn make_transition(
    index: usize,
    outgoing: &Track,
    incoming: &Track,
    timing: &Timing,
) -> Vec<Action> {
    let (_, out_end) = grid(outgoing);
    let (in_start, _) = grid(incoming);
    let out_window = SourceWindow::new(
        index,
        outgoing,
        out_end - timing.transition,
        timing.transition,
    );
    let in_window = SourceWindow::new(index + 1, incoming, in_start, timing.transition);
    let timbre_distance = timbre_distance(outgoing, &out_window, incoming, &in_window);

    vec![
        Action::Crossmatch {
            outgoing: out_window,
            incoming: in_window,
            timbre_distance,
        },
        Action::Playback {
            window: SourceWindow::new(
                index + 1,
                incoming,
                in_start + timing.transition,
                timing.intermission,
            ),
        },
    ]
}

/// Closing group for the last track: one window of `transition` seconds
/// ending at the end of its grid, faded or played straight.
pub fn terminate(index: usize, track: &Track, timing: &Timing, mode: TerminationMode) -> Vec<Action> {
    let (_, g1) = grid(track);
    let window = SourceWindow::new(index, track, g1 - timing.transition, timing.transition);
    match mode {
        TerminationMode::FadeOut => vec![Action::FadeOut { window }],
        TerminationMode::Cut => vec![Action::Playback { window }],
    }
}

/// One line per action, in playback order.
pub fn display_actions(actions: &[Action]) -> String {
    actions
        .iter()
        .enumerate()
        .map(|(i, action)| format!("{:>3}. {action}\n", i + 1))
        .collect()
}

fn grid(track: &Track) -> (f64, f64) {
    track.beat_span().unwrap_or((0.0, track.duration()))
}

fn timbre_distance(
    outgoing: &Track,
    out_window: &SourceWindow,
    incoming: &Track,
    in_window: &SourceWindow,
) -> Option<f32> {
    let out_features = outgoing.features.as_ref()?;
    let in_features = incoming.features.as_ref()?;

    let out_rows = outgoing.beats_within(out_window.start, out_window.end());
    let in_rows = incoming.beats_within(in_window.start, in_window.end());

    let mut total = 0.0_f32;
    let mut count = 0_usize;
    for (a, b) in out_rows.zip(in_rows) {
        let (Some(a), Some(b)) = (out_features.row(a), in_features.row(b)) else {
            break;
        };
        if a.len() != b.len() {
            return None;
        }
        total += a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f32>()
            .sqrt();
        count += 1;
    }

    (count > 0).then(|| total / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeatureMatrix;

    fn timing() -> Timing {
        Timing::new(8.0, 4.0).unwrap()
    }

    fn window(action: &Action) -> &SourceWindow {
        action.sources()[0]
    }

    #[test]
    fn initialize_fades_in_from_grid_start() {
        let mut track = Track::with_regular_beats("a", 30.0, 0.5);
        track.beats.remove(0);
        let actions = initialize(0, &track, &timing());

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind(), ActionKind::FadeIn);
        assert_eq!(window(&actions[0]).start, 0.5);
        assert_eq!(actions[0].duration(), 4.0);
        assert_eq!(actions[1].kind(), ActionKind::Playback);
        assert_eq!(window(&actions[1]).start, 4.5);
        assert_eq!(actions[1].duration(), 8.0);
    }

    #[test]
    fn transition_blends_tail_into_head() {
        let a = Track::with_regular_beats("a", 30.0, 0.5);
        let b = Track::with_regular_beats("b", 25.0, 0.5);
        let actions = make_transition(3, &a, &b, &timing());

        assert_eq!(actions.len(), 2);
        match &actions[0] {
            Action::Crossmatch {
                outgoing,
                incoming,
                timbre_distance,
            } => {
                assert_eq!((outgoing.track, outgoing.start, outgoing.end()), (3, 26.0, 30.0));
                assert_eq!((incoming.track, incoming.start, incoming.end()), (4, 0.0, 4.0));
                assert_eq!(*timbre_distance, None);
            }
            other => panic!("expected crossmatch, got {other:?}"),
        }
        assert_eq!(actions[0].duration(), 4.0);
        assert_eq!(window(&actions[1]).label, "b");
        assert_eq!(window(&actions[1]).start, 4.0);
        assert_eq!(actions[1].duration(), 8.0);
    }

    #[test]
    fn terminate_ends_at_grid_end() {
        let track = Track::with_regular_beats("z", 40.0, 0.5);
        let fade = terminate(2, &track, &timing(), TerminationMode::FadeOut);
        assert_eq!(fade.len(), 1);
        assert_eq!(fade[0].kind(), ActionKind::FadeOut);
        assert_eq!(window(&fade[0]).start, 36.0);
        assert_eq!(window(&fade[0]).end(), 40.0);

        let cut = terminate(2, &track, &timing(), TerminationMode::Cut);
        assert_eq!(cut[0].kind(), ActionKind::Playback);
        assert_eq!(cut[0].duration(), 4.0);
    }

    #[test]
    fn timbre_distance_compares_boundary_beats() {
        let mut a = Track::with_regular_beats("a", 4.0, 1.0);
        let mut b = Track::with_regular_beats("b", 4.0, 1.0);
        a.features = Some(FeatureMatrix::from_rows(vec![vec![0.0, 0.0]; 4]).unwrap());
        b.features = Some(
            FeatureMatrix::from_rows(vec![
                vec![3.0, 4.0],
                vec![3.0, 4.0],
                vec![9.0, 9.0],
                vec![9.0, 9.0],
            ])
            .unwrap(),
        );

        let timing = Timing::new(1.0, 2.0).unwrap();
        let actions = make_transition(0, &a, &b, &timing);
        match &actions[0] {
            Action::Crossmatch {
                timbre_distance, ..
            } => assert_eq!(*timbre_distance, Some(5.0)),
            other => panic!("expected crossmatch, got {other:?}"),
        }
    }

    #[test]
    fn display_lists_every_action() {
        let track = Track::with_regular_beats("song", 20.0, 0.5);
        let mut actions = initialize(0, &track, &timing());
        actions.extend(terminate(0, &track, &timing(), TerminationMode::FadeOut));

        let listing = display_actions(&actions);
        assert_eq!(listing.lines().count(), 3);
        assert!(listing.lines().next().unwrap().contains("Fade in"));
        assert!(listing.contains("Fade out"));
    }

    #[test]
    fn actions_serialise_with_kind_tag() {
        let track = Track::with_regular_beats("song", 20.0, 0.5);
        let json = serde_json::to_value(&initialize(0, &track, &timing())[0]).unwrap();
        assert_eq!(json["kind"], "fade_in");
        assert_eq!(json["window"]["label"], "song");
    }
}
