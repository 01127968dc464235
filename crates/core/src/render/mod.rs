use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{action::Action, CapsuleError, MixPlan, Result};

/// Consumes a finished plan and produces the output at `output`.
pub trait Renderer {
    fn render(&self, plan: &MixPlan, output: &Path) -> Result<()>;

    /// Name used in log output.
    fn name(&self) -> &'static str;
}

pub const SCRIPT_VERSION: u32 = 1;

/// Writes the plan as a JSON render script that an audio backend can play
/// back verbatim. The file only appears once it is complete.
#[derive(Debug, Clone, Default)]
pub struct ScriptRenderer {
    pub pretty: bool,
}

#[derive(Debug, Serialize)]
struct RenderScript<'a> {
    version: u32,
    total_duration: f64,
    tracks: Vec<ScriptTrack<'a>>,
    actions: &'a [Action],
}

#[derive(Debug, Serialize)]
struct ScriptTrack<'a> {
    name: &'a str,
    source: &'a Path,
    gain: f32,
    channels: u16,
    upmixed: bool,
}

impl ScriptRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn encode(&self, plan: &MixPlan) -> Result<Vec<u8>> {
        let script = RenderScript {
            version: SCRIPT_VERSION,
            total_duration: plan.total_duration,
            tracks: plan
                .tracks
                .iter()
                .map(|track| ScriptTrack {
                    name: &track.name,
                    source: &track.source,
                    gain: track.gain,
                    channels: track.channels,
                    upmixed: track.upmixed,
                })
                .collect(),
            actions: &plan.actions,
        };
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&script)?
        } else {
            serde_json::to_vec(&script)?
        };
        Ok(bytes)
    }
}

impl Renderer for ScriptRenderer {
    fn render(&self, plan: &MixPlan, output: &Path) -> Result<()> {
        if plan.actions.is_empty() {
            return Err(CapsuleError::Render("refusing to render an empty action list".into()));
        }
        if let Some(bad) = plan
            .actions
            .iter()
            .flat_map(Action::sources)
            .find(|window| window.track >= plan.tracks.len())
        {
            return Err(CapsuleError::Render(format!(
                "action references track {} but the plan has {}",
                bad.track,
                plan.tracks.len()
            )));
        }

        let bytes = self.encode(plan)?;
        let partial = partial_path(output);
        if let Err(err) = std::fs::write(&partial, bytes).and_then(|_| std::fs::rename(&partial, output)) {
            let _ = std::fs::remove_file(&partial);
            return Err(CapsuleError::Render(format!(
                "cannot write `{}`: {err}",
                output.display()
            )));
        }
        tracing::debug!(output = %output.display(), actions = plan.actions.len(), "render script written");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-script"
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}
