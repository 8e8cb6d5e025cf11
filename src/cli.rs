use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wavepeek", about = "Extract a normalized visual waveform from an audio file")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: PathBuf,

    /// Number of waveform points to produce
    #[arg(short, long, default_value_t = 100)]
    pub points: usize,

    /// Attenuation factor applied after peak normalization
    #[arg(long, default_value_t = 0.25)]
    pub scale: f64,

    /// Emit the trailing partial bucket instead of dropping it
    #[arg(long)]
    pub flush_tail: bool,

    /// Output JSON file ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    pub output: String,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
