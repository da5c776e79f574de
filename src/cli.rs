use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EventFormat {
    /// Human-readable log lines only
    Log,
    /// Also print one JSON object per event on stdout
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "whistle", about = "Whistle short melodic gestures to trigger actions")]
pub struct Cli {
    /// Audio file to replay (WAV, FLAC, OGG, MP3). Listens to the microphone when omitted.
    pub input: Option<PathBuf>,

    /// Config file (default: ./whistle.toml or ~/.config/whistle/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input device name for live capture
    #[arg(short, long)]
    pub device: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Print recognized actions instead of performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Event output format
    #[arg(long, value_enum, default_value_t = EventFormat::Log)]
    pub events: EventFormat,

    /// Seconds without pitch that end a note
    #[arg(long)]
    pub gap: Option<f32>,

    /// Seconds without a new note that end a gesture
    #[arg(long)]
    pub end_gap: Option<f32>,

    /// Relative pitch deviation (stddev / mean) that splits a note
    #[arg(long)]
    pub max_error_rate: Option<f32>,

    /// Peak sample amplitude below which a block is silence
    #[arg(long)]
    pub silence_gate: Option<i16>,

    /// Minimum spectral peak magnitude
    #[arg(long)]
    pub min_power: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "whistle",
            "take.wav",
            "--dry-run",
            "--events",
            "json",
            "--gap",
            "0.15",
            "--silence-gate",
            "3000",
        ])
        .unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("take.wav")));
        assert!(cli.dry_run);
        assert_eq!(cli.events, EventFormat::Json);
        assert_eq!(cli.gap, Some(0.15));
        assert_eq!(cli.silence_gate, Some(3000));
        assert!(cli.end_gap.is_none());
    }

    #[test]
    fn defaults_to_live_capture() {
        let cli = Cli::try_parse_from(["whistle"]).unwrap();
        assert!(cli.input.is_none());
        assert_eq!(cli.events, EventFormat::Log);
    }
}
