use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use soundsup::config::AppConfig;
use soundsup::recorder::CaptureBackend;
use soundsup::session::CaptureSession;
use soundsup::utils::format_duration;
use soundsup::{AudioUri, ConcertInfo, Recorder, Ticket, TicketStore, UploadClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "soundsup", version, about = "Record concerts and collect emotion tickets")]
struct Cli {
    /// Config file, overrides $SOUNDSUP_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Analysis service base URL, overrides the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record from the default microphone, then upload for analysis.
    /// Stops after --seconds or on Ctrl-C.
    Record {
        #[command(flatten)]
        concert: ConcertArgs,

        #[arg(long)]
        seconds: Option<u64>,
    },

    /// Upload an existing recording for analysis.
    Upload {
        file: PathBuf,

        #[command(flatten)]
        concert: ConcertArgs,
    },

    /// Check that the analysis service is reachable.
    Ping,

    /// List audio input devices.
    Devices,

    /// Print the effective configuration.
    Config,
}

#[derive(Args, Debug)]
struct ConcertArgs {
    #[arg(long)]
    artist: String,
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

impl ConcertArgs {
    fn into_info(self) -> soundsup::Result<ConcertInfo> {
        let mut info = ConcertInfo::new(self.artist)?;
        if let Some(time) = self.time {
            info = info.with_time(time);
        }
        if let Some(location) = self.location {
            info = info.with_location(location);
        }
        if let Some(name) = self.name {
            info = info.with_concert_name(name);
        }
        if let Some(description) = self.description {
            info = info.with_description(description);
        }
        Ok(info)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soundsup=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Record { concert, seconds } => record(&config, concert, seconds).await,
        Command::Upload { file, concert } => upload(&config, file, concert).await,
        Command::Ping => ping(&config).await,
        Command::Devices => devices(),
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url);
    }
    config.validate()?;
    Ok(config)
}

fn build_session(config: &AppConfig) -> Result<CaptureSession> {
    let client = UploadClient::new(config.api.clone())?;
    let recorder = Recorder::with_backend(capture_backend(config));
    Ok(CaptureSession::new(
        recorder,
        Arc::new(client),
        TicketStore::new(),
    ))
}

async fn record(config: &AppConfig, concert: ConcertArgs, seconds: Option<u64>) -> Result<()> {
    let session = build_session(config)?;
    session.set_concert_info(concert.into_info()?);
    session
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    session.start_recording().await?;
    info!("Recording, press Ctrl-C to stop");

    match seconds {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    let duration = session.recorder().status().duration;
    info!("Captured {}", format_duration(duration));

    finish(session.stop_and_submit().await)
}

async fn upload(config: &AppConfig, file: PathBuf, concert: ConcertArgs) -> Result<()> {
    let path = file
        .canonicalize()
        .with_context(|| format!("cannot open {}", file.display()))?;
    if !soundsup::utils::is_supported_audio_file(&path.to_string_lossy()) {
        warn!("{} does not look like a supported audio file", path.display());
    }

    let session = build_session(config)?;
    session.set_concert_info(concert.into_info()?);
    finish(session.submit(AudioUri::from_path(&path)).await)
}

fn finish(outcome: soundsup::Result<Ticket>) -> Result<()> {
    match outcome {
        Ok(ticket) => {
            print_ticket(&ticket);
            Ok(())
        }
        Err(e) => {
            let message = e.user_message();
            Err(anyhow::Error::new(e).context(message))
        }
    }
}

fn print_ticket(ticket: &Ticket) {
    println!("Ticket {}", ticket.id);
    println!("  {}", ticket.title);
    if let Some(dominant) = &ticket.dominant_emotion {
        println!("  Dominant emotion: {}", dominant);
    }
    for (label, pct) in ticket.emotions.percentages() {
        println!("    {:<12} {:>5.1}%", label, pct);
    }
    if let Some(text) = &ticket.text {
        println!("  {}", text);
    }
}

async fn ping(config: &AppConfig) -> Result<()> {
    let client = UploadClient::new(config.api.clone())?;
    if client.test_connection().await {
        println!("{} is reachable", config.api.base_url);
        Ok(())
    } else {
        anyhow::bail!("{} is not reachable", config.api.base_url)
    }
}

#[cfg(feature = "audio-io")]
fn capture_backend(config: &AppConfig) -> Arc<dyn CaptureBackend> {
    use soundsup::recorder::cpal_backend::{CaptureSettings, CpalBackend};

    Arc::new(CpalBackend::new(CaptureSettings {
        output_dir: config.recorder.output_dir.clone(),
        sample_rate: config.preferences.audio_quality.sample_rate(),
    }))
}

#[cfg(not(feature = "audio-io"))]
fn capture_backend(_config: &AppConfig) -> Arc<dyn CaptureBackend> {
    Arc::new(NoCapture)
}

#[cfg(feature = "audio-io")]
fn devices() -> Result<()> {
    let devices = soundsup::recorder::CpalBackend::input_devices()?;
    if devices.is_empty() {
        println!("No input devices found");
    }
    for name in devices {
        println!("{}", name);
    }
    Ok(())
}

#[cfg(not(feature = "audio-io"))]
fn devices() -> Result<()> {
    anyhow::bail!("built without audio input support")
}

/// Stand-in when built without audio input; permission is never granted
#[cfg(not(feature = "audio-io"))]
struct NoCapture;

#[cfg(not(feature = "audio-io"))]
#[async_trait::async_trait]
impl CaptureBackend for NoCapture {
    async fn request_permission(&self) -> std::result::Result<bool, soundsup::RecorderError> {
        Ok(false)
    }

    async fn begin(&self) -> std::result::Result<(), soundsup::RecorderError> {
        Err(soundsup::RecorderError::NotInitialized)
    }

    async fn pause(&self) -> std::result::Result<(), soundsup::RecorderError> {
        Err(soundsup::RecorderError::NoActiveRecording)
    }

    async fn resume(&self) -> std::result::Result<(), soundsup::RecorderError> {
        Err(soundsup::RecorderError::NoActiveRecording)
    }

    async fn finish(&self) -> std::result::Result<AudioUri, soundsup::RecorderError> {
        Err(soundsup::RecorderError::NoActiveRecording)
    }

    async fn abort(&self) -> std::result::Result<(), soundsup::RecorderError> {
        Ok(())
    }
}
