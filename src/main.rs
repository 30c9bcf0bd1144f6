use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_copier::cli::{Cli, Commands, OutputFormat};
use transcript_copier::config::Config;
use transcript_copier::output;
use transcript_copier::strategies::default_strategies;
use transcript_copier::utils::extract_video_id;
use transcript_copier::{
    HtmlSnapshot, HttpClient, MemoryNetworkLog, PageAccessor, ReqwestClient, TranscriptEngine, TranscriptError,
    TranscriptLine, VideoMetadata,
};

/// Options of the `fetch` command
struct FetchRequest {
    url: String,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    language: Option<String>,
    copy: bool,
    no_header: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the transcript
    let default_filter = if cli.verbose {
        "transcript_copier=debug"
    } else {
        "transcript_copier=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Fetch {
            url,
            output,
            format,
            language,
            copy,
            no_header,
        } => {
            let request = FetchRequest {
                url,
                output,
                format,
                language,
                copy,
                no_header,
            };
            run_fetch(request, cli.quiet).await?;
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
            }
        }
        Commands::Sources => {
            println!("Transcript sources, in the order they are tried:");
            for (position, strategy) in default_strategies().iter().enumerate() {
                println!("  {}. {} - {}", position + 1, strategy.name(), strategy.description());
            }
        }
    }

    Ok(())
}

async fn run_fetch(request: FetchRequest, quiet: bool) -> Result<()> {
    let video_id = extract_video_id(&request.url).ok_or(TranscriptError::NoVideoDetected)?;
    let config = Config::load().await?;

    let format = request
        .format
        .or_else(|| OutputFormat::from_name(&config.app.default_output_format))
        .unwrap_or(OutputFormat::Text);
    let language = request.language.or_else(|| config.app.preferred_language.clone());

    tracing::info!("Fetching transcript for video {}", video_id);

    let progress = (!quiet).then(|| {
        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            progress.set_style(style);
        }
        progress.enable_steady_tick(Duration::from_millis(100));
        progress.set_message("Resolving transcript...");
        progress
    });

    let resolved = resolve(&config, &video_id, language).await;
    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }
    let (lines, metadata) = resolved?;

    let content = output::render(&format, &video_id, &lines, &metadata, !request.no_header)?;

    if request.copy {
        output::copy_to_clipboard(&content).await?;
        println!("Transcript copied to clipboard ({} lines)", lines.len());
    }

    match request.output {
        Some(path) => {
            // A directory target gets the generated file name
            let path = if path.is_dir() {
                path.join(metadata.file_name())
            } else {
                path
            };
            output::save_to_file(&content, &path).await?;
            println!("Transcript saved to: {}", path.display());
        }
        None if !request.copy => output::print_to_console(&content),
        None => {}
    }

    Ok(())
}

async fn resolve(
    config: &Config,
    video_id: &str,
    language: Option<String>,
) -> Result<(Vec<TranscriptLine>, VideoMetadata)> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(&config.http)?);
    let watch_url = format!(
        "{}/watch?v={}",
        config.http.origin.trim_end_matches('/'),
        video_id
    );

    let snapshot = HtmlSnapshot::fetch(http.as_ref(), &watch_url, language.clone()).await?;
    let metadata = VideoMetadata::from_player_response(snapshot.player_response().as_ref(), &watch_url);

    let engine = TranscriptEngine::new(
        Arc::new(snapshot),
        http,
        Arc::new(MemoryNetworkLog::new()),
        config.engine.clone(),
    )
    .with_preferred_language(language);
    engine.navigate(Some(video_id));

    let lines = engine.resolve_transcript(video_id).await?;
    Ok((lines, metadata))
}
