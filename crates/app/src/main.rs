use std::path::PathBuf;
use std::process::ExitCode;

use capsule_core::{
    display_actions, AnalysisPolicy, CachedAnalyzer, MixConfig, Pipeline, ScriptRenderer,
    TerminationMode,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Successful runs exit with 1; wrapper scripts check for it.
const SUCCESS: u8 = 1;
const FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::from(SUCCESS),
        Err(err) => {
            eprintln!("{}", failure_message(&err));
            ExitCode::from(FAILURE)
        }
    }
}

fn run(cli: &Cli) -> capsule_core::Result<()> {
    let config = cli.mix_config()?;
    tracing::info!(
        files = cli.tracks.len(),
        intermission = config.timing.intermission,
        transition = config.timing.transition,
        "starting capsule"
    );

    let pipeline = Pipeline::new(config, CachedAnalyzer::new())?;
    let plan = pipeline.run(&cli.tracks)?;

    if cli.verbose {
        print!("{}", display_actions(&plan.actions));
    }
    println!("Output Duration = {:.3} sec", plan.total_duration);

    println!("Rendering...");
    plan.render(&ScriptRenderer::pretty(), &cli.output)
}

/// The one line printed on stderr for a failed run.
fn failure_message(err: &capsule_core::CapsuleError) -> String {
    format!("Error computing capsule: {err}")
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Order, beatmatch and crossfade songs into a single mix",
    long_about = None
)]
struct Cli {
    /// Analysed source files (each needs a `<file>.json` analysis next to it).
    #[arg(required = true)]
    tracks: Vec<PathBuf>,
    /// Transition length in seconds.
    #[arg(short, long)]
    transition: Option<f64>,
    /// Length, in seconds, of the section that is not transitioning.
    #[arg(short, long)]
    inter: Option<f64>,
    /// Automatically order tracks.
    #[arg(short, long)]
    order: bool,
    /// Automatically adjust volumes.
    #[arg(short, long)]
    equalize: bool,
    /// Show results on screen.
    #[arg(short, long)]
    verbose: bool,
    /// Where to write the render script.
    #[arg(long, default_value = "capsule.json")]
    output: PathBuf,
    /// JSON mix configuration. Command line flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Leave out files that cannot be analysed instead of stopping.
    #[arg(long)]
    skip_unreadable: bool,
    /// End the mix with a hard cut instead of a fade-out.
    #[arg(long)]
    cut: bool,
}

impl Cli {
    fn mix_config(&self) -> capsule_core::Result<MixConfig> {
        let mut config = match &self.config {
            Some(path) => MixConfig::load(path)?,
            None => MixConfig::default(),
        };
        if let Some(transition) = self.transition {
            config.timing.transition = transition;
        }
        if let Some(inter) = self.inter {
            config.timing.intermission = inter;
        }
        config.order |= self.order;
        config.equalize |= self.equalize;
        if self.skip_unreadable {
            config.on_analysis_error = AnalysisPolicy::Skip;
        }
        if self.cut {
            config.ending = TerminationMode::Cut;
        }
        config.validate()?;
        Ok(config)
    }
}
