use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Beat, CapsuleError, Result, Segment, Track};

/// Source of analysed tracks. The pipeline only talks to this trait so a
/// real feature extractor can replace the cache reader.
pub trait TrackAnalyzer {
    /// Loads the analysis for `path`. Beats may come in any order;
    /// [`Track::new`] sorts them.
    fn analyze(&self, path: &Path) -> Result<Track>;

    /// Name used in log output.
    fn name(&self) -> &'static str;
}

/// On-disk analysis of one audio file, as written by an offline analyser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisCache {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub loudness: Option<f64>,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default)]
    pub beats: Vec<Beat>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

fn default_channels() -> u16 {
    2
}

impl AnalysisCache {
    /// Turns the cache into a [`Track`] for `source`. Beats and segments
    /// are sorted by start so later stages can binary search them.
    pub fn into_track(self, source: &Path) -> Result<Track> {
        if let Some(bad) = self
            .beats
            .iter()
            .find(|beat| !(beat.start >= 0.0 && beat.duration >= 0.0))
        {
            return Err(CapsuleError::analysis(
                source,
                format!("beat at {} has invalid timing", bad.start),
            ));
        }

        let name = self.name.unwrap_or_else(|| display_name(source));
        let mut segments = self.segments;
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut track = Track::new(name, source, self.beats);
        track.segments = segments;
        track.tempo = self.tempo.filter(|tempo| *tempo > 0.0);
        track.loudness = self.loudness;
        track.channels = self.channels;
        if let Some(duration) = self.duration {
            track = track.with_duration(duration);
        }
        Ok(track)
    }
}

/// Reads analyses from JSON sidecar files. `song.mp3` is looked up as
/// `song.mp3.json`; a path that already ends in `.json` is read directly.
#[derive(Debug, Clone, Default)]
pub struct CachedAnalyzer;

impl CachedAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn cache_path(path: &Path) -> PathBuf {
        if path.extension().is_some_and(|ext| ext == "json") {
            path.to_path_buf()
        } else {
            let mut cache = path.as_os_str().to_owned();
            cache.push(".json");
            PathBuf::from(cache)
        }
    }
}

impl TrackAnalyzer for CachedAnalyzer {
    fn analyze(&self, path: &Path) -> Result<Track> {
        let cache_path = Self::cache_path(path);
        let raw = std::fs::read_to_string(&cache_path).map_err(|err| {
            CapsuleError::analysis(
                path,
                format!("cannot read analysis `{}`: {err}", cache_path.display()),
            )
        })?;
        let cache: AnalysisCache = serde_json::from_str(&raw)
            .map_err(|err| CapsuleError::analysis(path, format!("malformed analysis: {err}")))?;

        let source = if cache_path.as_path() == path {
            path.with_extension("")
        } else {
            path.to_path_buf()
        };
        let track = cache.into_track(&source)?;
        tracing::debug!(
            track = %track.name,
            beats = track.beats.len(),
            segments = track.segments.len(),
            duration = track.duration(),
            "loaded analysis"
        );
        Ok(track)
    }

    fn name(&self) -> &'static str {
        "json-cache"
    }
}

fn display_name(source: &Path) -> String {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string())
}
