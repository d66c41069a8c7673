mod shared;
mod tui;
mod audio_api;
mod audio;
mod core;
mod error;
mod loader;
mod middle;
mod pipeline;
mod render;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::EnvFilter;

use audio_api::{AudioOutput, NullOutput};
use loader::{SampleCache, SampleSource, SoundBank};
use middle::Middle;
use pipeline::library::TuneLibrary;
use pipeline::persistence::{self, Settings};
use pipeline::transport::Transport;
use pipeline::tune::Tune;
use render::RenderOptions;
use shared::{InputEvent, Instrument};

#[derive(Parser, Debug)]
#[command(name = "batuque", version, about = "Samba band rhythm trainer")]
struct Cli {
    /// Directory holding .batuque/ (settings and log)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Sample base URL or local directory
    #[arg(long, global = true)]
    samples: Option<String>,

    /// Extra tune file (one tune or a list), merged over the built-ins
    #[arg(long, global = true)]
    tunes: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available tunes and their variants
    List,

    /// Open the terminal player
    Play {
        /// Tune name, defaults to the last one played
        tune: Option<String>,
        #[arg(long)]
        variant: Option<String>,
        #[arg(long)]
        tempo: Option<f32>,
        /// Play a custom tune built from these channels, e.g. --channel "ls=X   X   "
        #[arg(long = "channel", value_name = "INST=NOTATION")]
        channels: Vec<String>,
    },

    /// Render a tune to a WAV file
    Render {
        tune: String,
        #[arg(long)]
        variant: Option<String>,
        #[arg(long)]
        tempo: Option<f32>,
        #[arg(long, default_value_t = render::DEFAULT_DURATION_SECS)]
        seconds: f64,
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Build a custom tune instead, e.g. --channel "ls=X   X   "
        #[arg(long = "channel", value_name = "INST=NOTATION")]
        channels: Vec<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let project_dir = match &cli.project {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("no current directory")?,
    };

    let log_file = matches!(cli.command, Command::Play { .. }).then(|| persistence::log_file_path(&project_dir));
    init_tracing(log_file.as_deref())?;

    let mut settings = persistence::load_settings(&project_dir).unwrap_or_default();
    if let Some(samples) = &cli.samples {
        settings.samples = samples.clone();
    }
    let mut library = TuneLibrary::builtin().context("built-in tunes are broken")?;
    if let Some(path) = &cli.tunes {
        let extra = TuneLibrary::from_file(path).with_context(|| format!("failed to load tunes from {}", path.display()))?;
        library.extend(extra);
    }

    match cli.command {
        Command::List => {
            list(&library);
            Ok(())
        }
        Command::Play { tune, variant, tempo, channels } => {
            let tune = if channels.is_empty() {
                tune
            } else {
                let custom = custom_tune(tune.unwrap_or_else(|| "custom".to_string()), tempo, &channels)?;
                let name = custom.name.clone();
                library.insert(custom);
                Some(name)
            };
            play(&project_dir, settings, library, tune, variant, tempo)
        }
        Command::Render { tune, variant, tempo, seconds, out, channels } => {
            let tune = if channels.is_empty() {
                library
                    .find(&tune)
                    .cloned()
                    .with_context(|| format!("no tune named {tune:?}, try `batuque list`"))?
            } else {
                custom_tune(tune, tempo, &channels)?
            };
            render_tune(&settings, &tune, variant, tempo, seconds, out)
        }
    }
}

// the player owns the terminal, so it logs to a file instead
fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("BATUQUE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn list(library: &TuneLibrary) {
    for tune in library.iter() {
        let variants: Vec<&str> = tune.variant_names().collect();
        println!(
            "{:<22} {:<26} {:>4.0} bpm  {}",
            tune.name,
            tune.title(),
            tune.tempo(),
            variants.join(", ")
        );
    }
}

fn parse_channel(arg: &str) -> anyhow::Result<(Instrument, String)> {
    let (code, notation) = arg
        .split_once('=')
        .with_context(|| format!("expected INST=NOTATION, got {arg:?}"))?;
    let instrument = Instrument::from_code(code.trim()).with_context(|| format!("unknown instrument {code:?}"))?;
    Ok((instrument, notation.to_string()))
}

fn custom_tune(name: String, tempo: Option<f32>, channels: &[String]) -> anyhow::Result<Tune> {
    let channels = channels.iter().map(|c| parse_channel(c)).collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Tune::custom(name, tempo.unwrap_or(shared::DEFAULT_BPM), channels))
}

fn sample_cache(settings: &Settings, sample_rate: u32) -> anyhow::Result<Arc<SampleCache>> {
    let source: Arc<dyn SampleSource> = Arc::from(settings.sample_source()?);
    tracing::info!(samples = %settings.samples, sample_rate, "sample source ready");
    Ok(Arc::new(SampleCache::new(source, sample_rate)))
}

fn render_tune(
    settings: &Settings,
    tune: &Tune,
    variant: Option<String>,
    tempo: Option<f32>,
    seconds: f64,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let cache = sample_cache(settings, settings.render_sample_rate)?;
    let bank = runtime.block_on(SoundBank::load_for_tune(&cache, tune));

    let variant = match variant {
        Some(v) => v,
        None => tune.first_variant().map(|v| v.name.clone()).unwrap_or_default(),
    };
    let options = RenderOptions {
        tempo: tempo.or(settings.tempo).unwrap_or(tune.tempo()),
        master_volume: settings.master_volume,
        duration_secs: seconds,
        sample_rate: settings.render_sample_rate,
    };
    let audio = render::render(tune, &variant, &settings.instruments, &bank, &options)?;

    let out = out.unwrap_or_else(|| PathBuf::from(format!("{}.wav", tune.name)));
    render::wav::write_file(&audio, &out)?;
    println!(
        "wrote {} ({:.1} s, peak {:.2}, {} samples from {})",
        out.display(),
        audio.duration_secs(),
        audio.peak(),
        cache.loaded_count(),
        settings.samples
    );
    Ok(())
}

fn play(
    project_dir: &Path,
    settings: Settings,
    library: TuneLibrary,
    tune: Option<String>,
    variant: Option<String>,
    tempo: Option<f32>,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let output: Arc<dyn AudioOutput> = match audio::start_audio() {
        Ok(handle) => Arc::new(handle),
        Err(e) => {
            tracing::warn!("no audio output, playing silently: {e:#}");
            Arc::new(NullOutput { sample_rate: settings.render_sample_rate })
        }
    };
    let cache = sample_cache(&settings, output.sample_rate())?;
    let mut transport = Transport::new(library, cache, output);

    if let Some(name) = tune.as_deref().or(settings.last_tune.as_deref()) {
        match runtime.block_on(transport.select_tune(name)) {
            Ok(()) => {}
            // a stale last_tune is not worth failing over
            Err(e) if tune.is_none() => tracing::warn!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }
    if let Some(variant) = &variant {
        runtime.block_on(transport.select_variant(variant))?;
    }
    if let Some(bpm) = tempo.or(settings.tempo) {
        transport.set_tempo(bpm);
    }
    transport.set_master_volume(settings.master_volume);
    transport.set_instruments(settings.instruments.clone());

    let mut middle = Middle::new(transport, runtime.handle().clone());

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let blink_start = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    // one frame with the loading header before blocking on the takes
    let ds = middle.display_state();
    term.draw(|frame| {
        let area = frame.area();
        tui::view::render(frame, area, &ds, &tui_state, true);
    })?;
    middle.preload();

    loop {
        let blink_on = (blink_start.elapsed().as_millis() / 250) % 2 == 0;
        let ds = middle.display_state();
        tui_state.playing = ds.playing;
        tui_state.editing = ds.edit_step.is_some();

        term.draw(|frame| {
            let area = frame.area();
            tui::view::render(frame, area, &ds, &tui_state, blink_on);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            let quit = event == InputEvent::Quit;
            middle.handle_input(event);
            if quit {
                // save before quitting
                if let Err(e) = persistence::save_settings(project_dir, &middle.settings(settings)) {
                    tracing::warn!("could not save settings: {e:#}");
                }
                term.clear()?;
                return Ok(());
            }
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
