use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use voxclone::config::AppConfig;
use voxclone::{EngineRegistry, ParamValue, SayOptions, VoiceCloner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Clone a voice from reference audio and speak arbitrary text", long_about = None)]
struct Cli {
    /// Reference audio of the voice to clone (wav)
    #[arg(
        short = 'i',
        long,
        value_name = "WAV",
        required_unless_present = "list_engines"
    )]
    input_voice: Option<PathBuf>,

    /// Text to speak
    #[arg(short, long, required_unless_present = "list_engines")]
    text: Option<String>,

    /// Engine name (see --list-engines)
    #[arg(short, long)]
    engine: Option<String>,

    /// Language code understood by the chosen engine
    #[arg(short, long, default_value = "en")]
    language: String,

    /// Compute device: cuda, coreml or cpu (auto-detected when omitted)
    #[arg(long)]
    device: Option<String>,

    /// Playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Output wav path (timestamped name in the working directory when omitted)
    #[arg(short, long, value_name = "WAV")]
    output: Option<PathBuf>,

    /// Engine parameter override, repeatable (e.g. --param temperature=0.8)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// List registered engines and their availability, then exit
    #[arg(long)]
    list_engines: bool,
}

fn parse_override(raw: &str) -> Result<(String, ParamValue)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))?;
    let value = if let Ok(i) = value.parse::<i64>() {
        ParamValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        ParamValue::Float(f)
    } else {
        ParamValue::Text(value.to_string())
    };
    Ok((key.to_string(), value))
}

fn main() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive("info".parse()?)
        .from_env_lossy();
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if cli.list_engines {
        for listing in EngineRegistry::global().list() {
            let status = if listing.available {
                "available"
            } else {
                "unavailable"
            };
            println!("{:<22} {:<28} {status}", listing.name, listing.display_name);
        }
        return Ok(());
    }

    let reference = cli
        .input_voice
        .ok_or_else(|| anyhow!("--input-voice is required"))?;
    let text = cli.text.ok_or_else(|| anyhow!("--text is required"))?;

    let config = AppConfig::load_default();
    let engine = cli
        .engine
        .or_else(|| config.default_engine.clone())
        .unwrap_or_else(|| voxclone::cloner::DEFAULT_ENGINE.to_string());
    let device = cli.device.or_else(|| config.device.clone());
    let options = config.engine_options(&engine);

    let output = cli.output.unwrap_or_else(voxclone::cloner::timestamped_output);
    let mut say = SayOptions::default()
        .language(cli.language)
        .speed(cli.speed)
        .save_to(&output);
    for raw in &cli.params {
        let (key, value) = parse_override(raw)?;
        say = say.param(key, value);
    }

    let mut cloner = VoiceCloner::new(&reference, Some(&engine), device.as_deref(), options)?;
    info!(engine = %engine, reference = %reference.display(), "cloning voice");
    let result = cloner.say(&text, &say)?;
    info!(seconds = result.duration_seconds() as f64, "synthesis complete");
    println!("{}", output.display());
    Ok(())
}
