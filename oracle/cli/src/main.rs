//! fromheart CLI
//!
//! Terminal surface for the oracle: draws hexagrams and runs follow-up chats
//! about a stored reading.
//!
//! # Usage
//!
//! ```bash
//! # Draw a hexagram
//! fromheart hexagram 既济 --size lg
//!
//! # The 8x8 name table
//! fromheart table
//!
//! # Ask one follow-up about divination #42
//! fromheart chat --divination 42 "这件事什么时候有转机？"
//!
//! # Interactive chat about love reading #7 (Ctrl-C stops the current answer,
//! # or ends the chat at the prompt)
//! fromheart chat --love 7
//!
//! # With verbose logging
//! RUST_LOG=debug fromheart chat --love 7
//! ```
//!
//! # Environment Variables
//!
//! - `FROMHEART_API_BASE`: Oracle service base URL (default: `http://localhost:8080`)
//! - `FROMHEART_CSRF_TOKEN`: Fixed CSRF token
//! - `FROMHEART_FRAGMENT_TIMEOUT_SECS`: Longest wait for the next fragment
//! - `FROMHEART_MAX_CONTEXT_TURNS`: Prior turns sent with each message
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! # Files
//!
//! - Config: `$XDG_CONFIG_HOME/fromheart/oracle.toml`

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::signal;
use tracing::{info, warn};

use oracle_core::{
    config::{self, ConfigOverrides, OracleConfig},
    hexagram::{render_name, GlyphSize, Hexagram, RenderedHexagram, Trigram},
    Dialogue, DialogueEvent, HttpOracle, OracleTransport, ReadingRef, SubmitError,
};

/// Lines that end an interactive chat
const QUIT_COMMANDS: [&str; 3] = ["/quit", "/exit", "/q"];

#[derive(Debug, Parser)]
#[command(name = "fromheart", version, about = "Hexagrams and follow-up questions for fromheart readings")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/fromheart/oracle.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Oracle service base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Draw a hexagram by its classical name
    Hexagram {
        /// Classical name, e.g. 乾 or 既济
        name: String,
        /// Glyph size: sm, md or lg
        #[arg(long, default_value = "md", value_parser = parse_size)]
        size: GlyphSize,
    },
    /// Print the 64 names, upper trigram by row and lower by column
    Table,
    /// Check that the oracle service is reachable
    Health,
    /// Ask follow-up questions about a reading
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct ChatArgs {
    /// Divination record to ask about
    #[arg(long, conflicts_with = "love", required_unless_present = "love")]
    divination: Option<u64>,

    /// Love-match record to ask about
    #[arg(long)]
    love: Option<u64>,

    /// Seconds to wait for the next fragment
    #[arg(long)]
    fragment_timeout: Option<u64>,

    /// Ask once and exit; interactive when omitted
    message: Option<String>,
}

impl ChatArgs {
    fn reading(&self) -> Option<ReadingRef> {
        match (self.divination, self.love) {
            (Some(id), _) => Some(ReadingRef::divination(id)),
            (None, Some(id)) => Some(ReadingRef::love(id)),
            (None, None) => None,
        }
    }
}

fn parse_size(value: &str) -> Result<GlyphSize, String> {
    GlyphSize::from_short(value).ok_or_else(|| format!("unknown size {value:?}, expected sm, md or lg"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging; stdout carries answers, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fromheart=info".parse()?)
                .add_directive("oracle_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    match cli.command {
        Command::Hexagram { ref name, size } => Ok(draw_hexagram(name, size)),
        Command::Table => {
            print!("{}", name_table());
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let config = load_config(&cli, None)?;
            let oracle = HttpOracle::from_settings(&config.backend)?;
            if oracle.health_check().await {
                println!("{} is up", oracle.base_url());
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{} is not reachable", oracle.base_url());
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Chat(ref args) => {
            let config = load_config(&cli, args.fragment_timeout)?;
            run_chat(config, args).await
        }
    }
}

fn load_config(cli: &Cli, fragment_timeout: Option<u64>) -> anyhow::Result<OracleConfig> {
    let path = cli.config.clone().or_else(config::default_config_path);
    let mut config = config::load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = cli.api_base {
        overrides = overrides.with_base_url(url.clone());
    }
    if let Some(secs) = fragment_timeout {
        overrides = overrides.with_fragment_timeout_secs(secs);
    }
    overrides.apply(&mut config).context("Invalid command-line option")?;

    info!(
        source = %config.source(),
        base_url = %config.backend.base_url,
        "Configuration loaded"
    );
    Ok(config)
}

fn draw_hexagram(name: &str, size: GlyphSize) -> ExitCode {
    let rendered = render_name(name, size);
    println!("{}", rendered.to_text());
    match rendered {
        RenderedHexagram::Drawn { hexagram, .. } => {
            println!();
            println!("{}  上{}  下{}", hexagram.name(), hexagram.upper(), hexagram.lower());
            ExitCode::SUCCESS
        }
        RenderedHexagram::Unrecognized { name } => {
            warn!(name = %name, "Not a hexagram name");
            ExitCode::from(2)
        }
    }
}

/// Pad a name to two full-width cells
fn cell(name: &str) -> String {
    let mut cell = name.to_string();
    for _ in name.chars().count()..2 {
        cell.push('\u{3000}');
    }
    cell
}

fn name_table() -> String {
    let mut out = String::from("\u{3000}\u{3000}");
    for lower in Trigram::ALL {
        out.push(' ');
        out.push_str(&cell(lower.name()));
    }
    out.push('\n');
    for upper in Trigram::ALL {
        out.push_str(&cell(upper.name()));
        for lower in Trigram::ALL {
            out.push(' ');
            out.push_str(&cell(Hexagram::from_trigrams(upper, lower).name()));
        }
        out.push('\n');
    }
    out
}

async fn run_chat(config: OracleConfig, args: &ChatArgs) -> anyhow::Result<ExitCode> {
    let reading = args
        .reading()
        .context("Pass --divination ID or --love ID")?;
    let oracle = Arc::new(HttpOracle::from_settings(&config.backend)?);
    let mut dialogue = Dialogue::new(oracle, reading, config.dialogue);

    if let Some(ref message) = args.message {
        return ask(&mut dialogue, message).await;
    }

    println!("追问 {reading}，输入 /quit 或按 Ctrl-C 结束");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = prompt_line(&mut lines, signal::ctrl_c()).await? else {
            println!();
            break;
        };
        let line = line.trim();
        if QUIT_COMMANDS.contains(&line) {
            break;
        }
        if line.is_empty() {
            continue;
        }
        ask(&mut dialogue, line).await?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Next input line, or `None` on EOF or when `interrupt` fires first
///
/// The answer watcher in [`ask`] replaces default SIGINT handling, so the
/// prompt listens for Ctrl-C itself.
async fn prompt_line<R, I>(lines: &mut Lines<R>, interrupt: I) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    I: Future,
{
    tokio::select! {
        line = lines.next_line() => line,
        _ = interrupt => Ok(None),
    }
}

/// Submit one message and print the answer as it streams
async fn ask<T>(dialogue: &mut Dialogue<T>, message: &str) -> anyhow::Result<ExitCode>
where
    T: OracleTransport + ?Sized + 'static,
{
    match dialogue.submit(message) {
        Ok(_) => {}
        Err(err @ (SubmitError::EmptyMessage | SubmitError::MessageTooLong { .. })) => {
            eprintln!("{err}");
            return Ok(ExitCode::from(2));
        }
        Err(err) => return Err(err.into()),
    }

    // Ctrl-C stops this answer, not the process
    let watcher = dialogue.cancel_token().map(|token| {
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    });

    let mut stdout = std::io::stdout();
    let mut code = ExitCode::SUCCESS;
    while let Some(event) = dialogue.next_event().await {
        match event {
            DialogueEvent::Accepted { .. } => {}
            DialogueEvent::Fragment { text, .. } => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            DialogueEvent::Completed { .. } => writeln!(stdout)?,
            DialogueEvent::Failed { reason, partial, .. } => {
                if !partial.is_empty() {
                    writeln!(stdout)?;
                }
                writeln!(stdout, "{}", reason.annotation())?;
                code = ExitCode::FAILURE;
            }
            DialogueEvent::Cancelled { partial, .. } => {
                if !partial.is_empty() {
                    writeln!(stdout)?;
                }
                writeln!(stdout, "{}", oracle_core::streaming::CANCELLED_ANNOTATION)?;
            }
        }
    }

    if let Some(watcher) = watcher {
        watcher.abort();
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hexagram_size() {
        let cli = Cli::try_parse_from(["fromheart", "hexagram", "泰", "--size", "lg"]).unwrap();
        match cli.command {
            Command::Hexagram { name, size } => {
                assert_eq!(name, "泰");
                assert_eq!(size, GlyphSize::Large);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["fromheart", "hexagram", "泰", "--size", "xl"]).is_err());
    }

    #[test]
    fn test_chat_needs_exactly_one_reading() {
        assert!(Cli::try_parse_from(["fromheart", "chat"]).is_err());
        assert!(Cli::try_parse_from(["fromheart", "chat", "--divination", "1", "--love", "2"]).is_err());

        let cli = Cli::try_parse_from(["fromheart", "chat", "--love", "7", "还有呢"]).unwrap();
        let Command::Chat(args) = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(args.reading(), Some(ReadingRef::love(7)));
        assert_eq!(args.message.as_deref(), Some("还有呢"));
    }

    #[test]
    fn test_name_table_layout() {
        let table = name_table();
        let rows: Vec<&str> = table.lines().collect();
        assert_eq!(rows.len(), 9);
        assert!(rows[1].starts_with("乾\u{3000} 乾\u{3000} 履\u{3000} 同人"));
        assert!(rows[8].ends_with("坤\u{3000}"));
        assert!(rows[8].contains("泰"));
    }

    #[tokio::test]
    async fn test_prompt_line_reads_until_eof() {
        let mut lines = BufReader::new(&b"/quit\n"[..]).lines();
        let line = prompt_line(&mut lines, std::future::pending::<()>()).await.unwrap();
        assert_eq!(line.as_deref(), Some("/quit"));
        assert_eq!(prompt_line(&mut lines, std::future::pending::<()>()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prompt_line_ends_on_interrupt() {
        // Writer stays open, so the read would wait forever
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();
        let line = prompt_line(&mut lines, std::future::ready(())).await.unwrap();
        assert_eq!(line, None);
    }

    #[test]
    fn test_cell_padding() {
        assert_eq!(cell("乾"), "乾\u{3000}");
        assert_eq!(cell("同人"), "同人");
    }
}
