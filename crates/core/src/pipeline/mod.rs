use std::path::Path;

use crate::action::Action;
use crate::features::{resample_features, timbre_whiten, Rate};
use crate::mix::{build_actions, filter_valid, is_valid, total_duration};
use crate::{
    equalize_tracks, make_stereo, order_tracks, AnalysisPolicy, CapsuleError, MixConfig, Renderer,
    Result, Timing, Track, TrackAnalyzer,
};

/// Everything a renderer needs: the tracks that made it into the mix, in
/// playback order, and the actions referencing them by index.
#[derive(Debug, Clone)]
pub struct MixPlan {
    pub tracks: Vec<Track>,
    pub actions: Vec<Action>,
    pub total_duration: f64,
}

impl MixPlan {
    /// Hands the plan to `renderer`, which writes `output`.
    pub fn render(&self, renderer: &dyn Renderer, output: &Path) -> Result<()> {
        tracing::info!(renderer = renderer.name(), output = %output.display(), "rendering");
        renderer.render(self, output)
    }
}

/// Drives one mixing run from source paths to a [`MixPlan`].
#[derive(Debug)]
pub struct Pipeline<A> {
    config: MixConfig,
    analyzer: A,
}

impl<A: TrackAnalyzer> Pipeline<A> {
    /// Validates `config` up front so a bad run never touches a file.
    pub fn new(config: MixConfig, analyzer: A) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, analyzer })
    }

    /// Analyses every path, then plans the mix.
    pub fn run<P: AsRef<Path>>(&self, paths: &[P]) -> Result<MixPlan> {
        let tracks = self.load(paths)?;
        self.plan(tracks)
    }

    /// Loads each path with the configured analyzer. Failures either abort
    /// the run or are logged and skipped, depending on the policy.
    pub fn load<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Track>> {
        tracing::info!(
            analyzer = self.analyzer.name(),
            files = paths.len(),
            "analysing tracks"
        );
        let mut tracks = Vec::with_capacity(paths.len());
        let mut skipped = 0_usize;
        for path in paths {
            let path = path.as_ref();
            match self.analyzer.analyze(path) {
                Ok(track) => tracks.push(track),
                Err(err) => match self.config.on_analysis_error {
                    AnalysisPolicy::Abort => return Err(err),
                    AnalysisPolicy::Skip => {
                        tracing::warn!(path = %path.display(), error = %err, "skipping track");
                        skipped += 1;
                    }
                },
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "some tracks could not be analysed");
        }
        Ok(tracks)
    }

    /// Runs every stage after analysis on already loaded tracks.
    pub fn plan(&self, tracks: Vec<Track>) -> Result<MixPlan> {
        let analysed = tracks.len();
        let timing = &self.config.timing;

        let tracks = if self.config.order {
            tracing::info!("ordering tracks");
            order_tracks(tracks)
        } else {
            tracks
        };

        let tracks = if self.config.equalize {
            tracing::info!("equalizing tracks");
            equalize_tracks(tracks)
        } else {
            tracks
        };

        let tracks = resample_all(tracks, timing)?;

        let tracks: Vec<Track> = filter_valid(tracks, timing)
            .into_iter()
            .map(make_stereo)
            .collect();
        if tracks.is_empty() {
            return Err(CapsuleError::InsufficientTracks {
                analysed,
                intermission: timing.intermission,
                transition: timing.transition,
            });
        }

        tracing::info!(tracks = tracks.len(), "computing transitions");
        let actions = build_actions(&tracks, timing, self.config.ending)?;
        let total_duration = total_duration(&actions);

        Ok(MixPlan {
            tracks,
            actions,
            total_duration,
        })
    }
}

/// Attaches whitened beat features to every track that can take part in
/// the mix. Tracks the validity filter is about to drop are passed through
/// untouched, so missing timing data never aborts the run.
fn resample_all(tracks: Vec<Track>, timing: &Timing) -> Result<Vec<Track>> {
    tracks
        .into_iter()
        .map(|mut track| {
            if !is_valid(&track, timing) {
                return Ok(track);
            }
            tracing::debug!(track = %track.name, "resampling");
            let matrix = resample_features(&track, Rate::Beats)?;
            track.features = Some(timbre_whiten(matrix));
            Ok(track)
        })
        .collect()
}
