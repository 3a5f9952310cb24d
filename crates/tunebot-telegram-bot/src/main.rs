use dotenvy::dotenv;
use regex::Regex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};
use tunebot_core::config::CoreSettings;
use tunebot_transport_telegram::config::{BotSettings, TelegramSettings};
use tunebot_transport_telegram::runner::run_bot;

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    token_prefixed: Regex,
    audd_field: Regex,
    audd_env: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/(?:file/)?bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token_prefixed: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            audd_field: Regex::new(r#"(api_token["']?\s*[=:]\s*["']?)[A-Za-z0-9]+"#)?,
            audd_env: Regex::new(r"AUDD_API_TOKEN=[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token_bare
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token_prefixed
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .audd_field
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output = self
            .audd_env
            .replace_all(&output, "AUDD_API_TOKEN=[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may differ in size.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

/// Shared append handle to the optional log file
#[derive(Clone)]
struct LogFile(Arc<File>);

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(&patterns);

    info!("Starting TuneBot...");

    let settings = init_settings();

    run_bot(settings).await?;

    Ok(())
}

fn default_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(
                "tunebot_core=info,tunebot_transport_telegram=info,tunebot_telegram_bot=info,teloxide=warn,hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn",
            )
        }
    })
}

fn open_log_file(path: &str) -> Option<LogFile> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(LogFile(Arc::new(file))),
        Err(e) => {
            eprintln!("Failed to open LOG_FILE {path}: {e}");
            None
        }
    }
}

fn init_logging(patterns: &Arc<RedactionPatterns>) {
    let stderr_writer = RedactingMakeWriter::new(io::stderr, Arc::clone(patterns));

    // DEBUG_MODE switches the default filter to verbose
    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let file_layer = std::env::var("LOG_FILE")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .and_then(|p| open_log_file(&p))
        .map(|file| {
            let writer = RedactingMakeWriter::new(move || file.clone(), Arc::clone(patterns));
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
        });

    tracing_subscriber::registry()
        .with(default_filter(debug_mode))
        .with(tracing_subscriber::fmt::layer().with_writer(stderr_writer))
        .with(file_layer)
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let core_settings = match CoreSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load core configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    let settings = BotSettings::new(core_settings, telegram_settings);
    if let Err(e) = settings.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Configuration loaded successfully.");
    Arc::new(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> RedactionPatterns {
        RedactionPatterns::new().expect("patterns compile")
    }

    #[test]
    fn test_redacts_telegram_token_in_urls() {
        let line = "GET https://api.telegram.org/bot123456789:AAH-abcdefghijklmnopqrstuvwxyz012345/getMe failed";
        let out = patterns().redact(line);
        assert!(!out.contains("AAH-abcdefghijklmnopqrstuvwxyz012345"));
        assert!(out.contains("/bot[TELEGRAM_TOKEN]/getMe"));
    }

    #[test]
    fn test_redacts_file_download_urls() {
        let line = "https://api.telegram.org/file/bot123456789:AAHsecret/voice/file_1.oga";
        let out = patterns().redact(line);
        assert!(!out.contains("AAHsecret"));
    }

    #[test]
    fn test_redacts_audd_token() {
        let p = patterns();
        assert_eq!(
            p.redact("form api_token=abc123def&return=spotify"),
            "form api_token=[MASKED]&return=spotify"
        );
        assert_eq!(
            p.redact(r#"{"api_token": "abc123def"}"#),
            r#"{"api_token": "[MASKED]"}"#
        );
        assert_eq!(
            p.redact("AUDD_API_TOKEN=abc123 RUN_MODE=production"),
            "AUDD_API_TOKEN=[MASKED] RUN_MODE=production"
        );
    }

    #[test]
    fn test_leaves_plain_text_alone() {
        let line = "Recognized 'Queen - Bohemian Rhapsody' for user 42";
        assert_eq!(patterns().redact(line), line);
    }

    #[test]
    fn test_writer_reports_original_length() {
        let mut writer = RedactingWriter::new(Vec::new(), Arc::new(patterns()));
        let input = b"AUDD_API_TOKEN=abc123";
        assert_eq!(writer.write(input).ok(), Some(input.len()));
        assert_eq!(writer.inner, b"AUDD_API_TOKEN=[MASKED]".to_vec());
    }
}
