use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use voxbridge::voice::normalize_for_stt;
use voxbridge::{
    ApiServerBuilder, ChatPipeline, ChatRequest, Config, OllamaClient, SpeechRecognizer,
    SpeechSynthesizer, SpeechToText, TextToSpeech,
};

/// Voxbridge - Streaming voice assistant backend
#[derive(Parser)]
#[command(name = "voxbridge", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "VOXBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Transcribe an audio file
    Transcribe {
        /// Recording to transcribe
        file: PathBuf,
    },
    /// Synthesize text to an audio file
    Speak {
        /// Text to speak
        text: String,
        /// Voice alias or provider voice id
        #[arg(long)]
        voice: Option<String>,
        /// Output file (defaults to speech.<format>)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Send one message through the chat pipeline and print the sentences
    Chat {
        /// Message to send
        message: String,
        /// Model override
        #[arg(long)]
        model: Option<String>,
        /// Voice alias or provider voice id
        #[arg(long)]
        voice: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voxbridge=info",
        1 => "info,voxbridge=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Transcribe { file } => transcribe(&config, &file).await,
        Command::Speak { text, voice, out } => speak(&config, &text, voice.as_deref(), out).await,
        Command::Chat {
            message,
            model,
            voice,
        } => chat(config, message, model, voice).await,
    }
}

fn build_pipeline(config: Config) -> anyhow::Result<ChatPipeline> {
    let llm = Arc::new(OllamaClient::from_config(&config.llm)?);
    let tts = Arc::new(TextToSpeech::from_config(&config.tts)?);
    Ok(
        ChatPipeline::new(llm, tts, Arc::new(config.voices), config.llm.model)
            .with_segmentation(config.llm.segmentation),
    )
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let llm = Arc::new(OllamaClient::from_config(&config.llm)?);
    let tts = Arc::new(TextToSpeech::from_config(&config.tts)?);
    let stt = Arc::new(SpeechToText::from_config(&config.stt)?);

    tracing::info!(
        llm = %config.llm.base_url,
        model = %config.llm.model,
        stt = %config.stt.base_url,
        tts = %config.tts.base_url,
        "starting voxbridge"
    );

    ApiServerBuilder::new(llm, tts, stt)
        .server_config(&config.server)
        .voices(config.voices)
        .default_model(config.llm.model)
        .segmentation(config.llm.segmentation)
        .build()
        .run()
        .await?;

    Ok(())
}

async fn transcribe(config: &Config, file: &Path) -> anyhow::Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let prepared = normalize_for_stt(&data, file.file_name().and_then(|n| n.to_str()))?;
    tracing::debug!(format = %prepared.format, bytes = prepared.data.len(), "prepared audio");

    let stt = SpeechToText::from_config(&config.stt)?;
    let file_name = prepared.file_name();
    let text = stt.transcribe(prepared.data, &file_name).await?;

    println!("{text}");
    Ok(())
}

async fn speak(
    config: &Config,
    text: &str,
    voice: Option<&str>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let tts = TextToSpeech::from_config(&config.tts)?;
    let voice = config.voices.resolve(voice);
    let audio = tts.synthesize(text, voice).await?;

    let out = out.unwrap_or_else(|| {
        PathBuf::from(format!("speech.{}", tts.audio_format().extension()))
    });
    tokio::fs::write(&out, &audio)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;

    println!("wrote {} bytes to {}", audio.len(), out.display());
    Ok(())
}

async fn chat(
    config: Config,
    message: String,
    model: Option<String>,
    voice: Option<String>,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config)?;
    let request = ChatRequest {
        message,
        voice,
        model,
    };

    let mut chunks = Box::pin(pipeline.chunks(request));
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        println!("{} ({} bytes of audio)", chunk.sentence, chunk.audio_url.len());
    }

    Ok(())
}
