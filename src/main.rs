mod actions;
mod audio;
mod cli;
mod config;
mod events;
mod gesture;
mod instrument;
mod pitch;

use anyhow::{Context, Result};
use clap::Parser;

use actions::background::BackgroundDispatcher;
use actions::console::ConsoleDispatcher;
use actions::router::ActionRouter;
use actions::ActionDispatcher;
use audio::file::FileSource;
use audio::source::{SampleClock, SampleSource};
use cli::{Cli, EventFormat};
use config::Config;
use events::{JsonObserver, LogObserver, Observer, Observers};
use gesture::table::GestureTable;
use instrument::Instrument;

/// Actions waiting for the dispatch worker before new ones are rejected.
const DISPATCH_QUEUE: usize = 8;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        return list_devices();
    }

    let config = load_config(&cli)?;

    let table = GestureTable::default();
    log::info!("whistle - {} gesture patterns", table.patterns().len());
    log::info!(
        "Detector: gate={} min_power={} band={}-{}Hz",
        config.detector.silence_gate,
        config.detector.min_power,
        config.detector.min_frequency,
        config.detector.max_frequency
    );
    log::info!(
        "Segmenter: gap={}s end_gap={}s max_error_rate={} min_len={}",
        config.segmenter.gap,
        config.gesture.end_gap,
        config.segmenter.max_error_rate,
        config.segmenter.min_segment_len
    );

    let sink: Box<dyn ActionDispatcher + Send> = if cli.dry_run {
        log::info!("Dry run: actions are printed, not performed");
        Box::new(ConsoleDispatcher::new(std::io::stdout()))
    } else {
        let router = ActionRouter::from_config(&config.actions)
            .context("Failed to set up action sinks")?;
        Box::new(router)
    };
    let dispatcher = BackgroundDispatcher::spawn(sink, DISPATCH_QUEUE)
        .context("Failed to start dispatch worker")?;

    let mut observers: Vec<Box<dyn Observer>> = vec![Box::new(LogObserver)];
    if cli.events == EventFormat::Json {
        observers.push(Box::new(JsonObserver::new(std::io::stdout())));
    }

    let mut instrument = Instrument::new(&config, table, dispatcher, Observers(observers));

    match cli.input {
        Some(ref input) => {
            if !input.exists() {
                anyhow::bail!("Input file not found: {}", input.display());
            }
            log::info!("Input: {}", input.display());
            let mut source = FileSource::open(input, config.audio.block_size)?;
            match source.duration_secs() {
                Some(secs) => log::info!(
                    "Replaying {:.1}s at {}Hz in {}-sample blocks",
                    secs,
                    source.sample_rate(),
                    config.audio.block_size
                ),
                None => log::info!(
                    "Replaying at {}Hz in {}-sample blocks",
                    source.sample_rate(),
                    config.audio.block_size
                ),
            }
            instrument.run(&mut source, &mut SampleClock::default())?;
        }
        None => run_live(&cli, &config, &mut instrument)?,
    }

    log::info!("Done");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match config::find_config(cli.config.as_deref()) {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };

    // Flags override the file
    if let Some(gap) = cli.gap {
        config.segmenter.gap = gap;
    }
    if let Some(end_gap) = cli.end_gap {
        config.gesture.end_gap = end_gap;
    }
    if let Some(rate) = cli.max_error_rate {
        config.segmenter.max_error_rate = rate;
    }
    if let Some(gate) = cli.silence_gate {
        config.detector.silence_gate = gate;
    }
    if let Some(power) = cli.min_power {
        config.detector.min_power = power;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(feature = "live")]
fn list_devices() -> Result<()> {
    let devices = audio::capture::CpalSource::list_devices()?;
    println!("Available input devices:");
    for name in &devices {
        println!("  {}", name);
    }
    Ok(())
}

#[cfg(not(feature = "live"))]
fn list_devices() -> Result<()> {
    anyhow::bail!(
        "Device listing requires the 'live' feature. \
         Rebuild with: cargo build --features live"
    );
}

#[cfg(feature = "live")]
fn run_live<D, O>(cli: &Cli, config: &Config, instrument: &mut Instrument<D, O>) -> Result<()>
where
    D: ActionDispatcher,
    O: Observer,
{
    let mut source = audio::capture::CpalSource::open(
        cli.device.as_deref(),
        config.audio.block_size,
        config.audio.sample_rate,
    )?;
    log::info!("Listening... (Ctrl+C to stop)");
    instrument.run(&mut source, &mut audio::source::MonotonicClock::new())
}

#[cfg(not(feature = "live"))]
fn run_live<D, O>(_cli: &Cli, _config: &Config, _instrument: &mut Instrument<D, O>) -> Result<()>
where
    D: ActionDispatcher,
    O: Observer,
{
    anyhow::bail!(
        "Live capture requires the 'live' feature. \
         Rebuild with: cargo build --features live, or pass an audio file to replay"
    );
}
