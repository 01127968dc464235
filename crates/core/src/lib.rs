//! Core library for Capsule.
//!
//! Capsule stitches analysed tracks into one continuous mix. The library
//! never touches audio samples: it loads analyses, optionally reorders and
//! level-matches the tracks, projects their timbre onto the beat grid and
//! then computes the ordered list of fade, crossmatch and playback actions a
//! renderer executes. Each module owns one stage of that pipeline.

pub mod action;
pub mod analysis;
pub mod config;
pub mod equalize;
pub mod error;
pub mod features;
pub mod mix;
pub mod ordering;
pub mod pipeline;
pub mod render;
pub mod track;

pub use action::{display_actions, Action, ActionKind, SourceWindow};
pub use analysis::{AnalysisCache, CachedAnalyzer, TrackAnalyzer};
pub use config::{AnalysisPolicy, MixConfig, TerminationMode, Timing};
pub use equalize::equalize_tracks;
pub use error::{CapsuleError, Result};
pub use features::{resample_features, timbre_whiten, FeatureMatrix, Rate};
pub use mix::{build_actions, filter_valid, is_valid, total_duration, transition_pairs};
pub use ordering::order_tracks;
pub use pipeline::{MixPlan, Pipeline};
pub use render::{Renderer, ScriptRenderer};
pub use track::{make_stereo, Beat, Segment, Track};
