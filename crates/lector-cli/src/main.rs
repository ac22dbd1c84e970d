use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lector_core::api::BookApi;
use lector_core::window::Progress;
use lector_core::{Config, HttpBookApi, PlaybackState, Player, ReadingSession, config_file};

mod audio;
mod output;

use audio::RodioSink;
use output::ColorMode;

/// Terminal reader for the lector language-learning book API
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base URL of the collaborator API
    #[arg(long)]
    base_url: Option<String>,

    /// Session cookie, e.g. "session=<value>"
    #[arg(long)]
    session: Option<String>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show book metadata and reading progress
    Info {
        book_id: u64,
    },

    /// Read a book interactively, 5 paragraphs at a time
    Read {
        book_id: u64,
    },

    /// Synthesize a text snippet and play it, or write the audio to a file
    Speak {
        text: String,

        /// Write the audio payload here instead of playing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let color = ColorMode(!cli.no_color);
    let config = resolve_config(&cli);
    let api: Arc<dyn BookApi> = Arc::new(HttpBookApi::new(&config)?);

    match cli.command {
        Command::Info { book_id } => info(api, book_id, color).await,
        Command::Read { book_id } => read(api, book_id, color).await,
        Command::Speak { text, output } => speak(api, &text, output).await,
    }
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
fn resolve_config(cli: &Cli) -> Config {
    let mut config = config_file::load_config().into_config();
    if let Ok(url) = std::env::var("LECTOR_BASE_URL") {
        config.base_url = url;
    }
    if let Ok(cookie) = std::env::var("LECTOR_SESSION") {
        config.session_cookie = Some(cookie);
    }
    if let Some(ref url) = cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(ref cookie) = cli.session {
        config.session_cookie = Some(cookie.clone());
    }
    config
}

async fn info(api: Arc<dyn BookApi>, book_id: u64, color: ColorMode) -> anyhow::Result<()> {
    let meta = api.fetch_book(book_id).await?;
    let current = meta
        .current_paragraph
        .filter(|&p| p != 0)
        .unwrap_or(meta.min_paragraph_number);
    let progress = Progress::compute(
        meta.min_paragraph_number,
        meta.max_paragraph_number,
        current,
    );

    let stdout = std::io::stdout();
    let mut w = stdout.lock();
    output::print_header(&mut w, &meta, &progress, color)?;
    writeln!(
        w,
        "paragraphs {}..={}, bookmark at {}",
        meta.min_paragraph_number, meta.max_paragraph_number, current
    )?;
    Ok(())
}

async fn read(api: Arc<dyn BookApi>, book_id: u64, color: ColorMode) -> anyhow::Result<()> {
    let mut session = ReadingSession::open(Arc::clone(&api), book_id).await?;

    // The stream must outlive the player; only its handle is Send.
    let (_stream, stream_handle) = rodio::OutputStream::try_default()?;
    let player = Player::new(Arc::clone(&api), Box::new(RodioSink::new(stream_handle)));

    let mut sentences = render(&session, color)?;
    print_prompt()?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.trim().split_whitespace();
        let command = parts.next().unwrap_or("");

        player.tick();

        match command {
            "" => {}
            "n" => {
                navigate(&mut session, true).await;
                sentences = render(&session, color)?;
            }
            "p" => {
                navigate(&mut session, false).await;
                sentences = render(&session, color)?;
            }
            "s" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
                Some(n) if n >= 1 && n <= sentences.len() => {
                    if let Err(e) = player.play(&sentences[n - 1]).await {
                        eprintln!("playback failed: {e}");
                    }
                }
                _ => eprintln!("usage: s <1..{}>", sentences.len()),
            },
            "pause" => player.pause(),
            "resume" => player.resume(),
            "stop" => player.stop(),
            "q" | "quit" => break,
            _ => {
                let stdout = std::io::stdout();
                output::print_help(&mut stdout.lock())?;
            }
        }
        print_prompt()?;
    }

    player.stop();
    Ok(())
}

/// Apply one navigation step, reporting non-fatal save failures without
/// interrupting the loop.
async fn navigate(session: &mut ReadingSession, forward: bool) {
    let result = if forward {
        session.go_next().await
    } else {
        session.go_prev().await
    };
    if let Err(e) = result {
        eprintln!("could not load paragraphs: {e}");
    }
    if let Some(e) = session.take_save_error() {
        eprintln!("position not saved: {e}");
    }
}

fn render(session: &ReadingSession, color: ColorMode) -> anyhow::Result<Vec<String>> {
    let stdout = std::io::stdout();
    let mut w = stdout.lock();
    output::print_header(&mut w, session.meta(), &session.progress(), color)?;
    output::print_window(&mut w, session.window(), color)?;
    let flat = output::flatten_sentences(session.window())
        .into_iter()
        .map(str::to_owned)
        .collect();
    Ok(flat)
}

fn print_prompt() -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut w = stdout.lock();
    write!(w, "> ")?;
    w.flush()
}

async fn speak(api: Arc<dyn BookApi>, text: &str, out: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(path) = out {
        let audio = api.synthesize(text).await?;
        std::fs::write(&path, audio)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let (_stream, stream_handle) = rodio::OutputStream::try_default()?;
    let player = Player::new(Arc::clone(&api), Box::new(RodioSink::new(stream_handle)));
    player.play(text).await?;
    while player.tick() != PlaybackState::Idle {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}
