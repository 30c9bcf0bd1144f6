use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcript-copy",
    about = "Transcript Copier - Copy or download the timestamped transcript of a YouTube video",
    version,
    long_about = "Fetches the transcript of a YouTube video with timestamps and a short metadata header. Tries the internal transcript endpoint first, then the caption track, then the rendered transcript panel."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the transcript of a video
    Fetch {
        /// Video URL (watch, shorts, embed, live or youtu.be link)
        #[arg(value_name = "URL")]
        url: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (defaults to the configured format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Preferred caption language, e.g. en or pt-BR
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Copy the transcript to the clipboard instead of printing it
        #[arg(long)]
        copy: bool,

        /// Leave out the metadata header in text output
        #[arg(long)]
        no_header: bool,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List transcript sources in the order they are tried
    Sources,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Metadata header and timestamped lines
    Text,
    /// JSON with metadata and lines
    Json,
}

impl OutputFormat {
    /// Parse a configured format name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_arguments() {
        let cli = Cli::parse_from([
            "transcript-copy",
            "fetch",
            "https://youtu.be/abc",
            "-f",
            "json",
            "--no-header",
            "-l",
            "de",
        ]);

        match cli.command {
            Commands::Fetch {
                url,
                format,
                language,
                no_header,
                copy,
                ..
            } => {
                assert_eq!(url, "https://youtu.be/abc");
                assert_eq!(format, Some(OutputFormat::Json));
                assert_eq!(language.as_deref(), Some("de"));
                assert!(no_header);
                assert!(!copy);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_format_names() {
        assert_eq!(OutputFormat::from_name(" JSON "), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_name("srt"), None);
        assert_eq!(OutputFormat::Text.to_string(), "text");
    }
}
