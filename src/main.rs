//! Lifestream CLI
//!
//! Usage:
//!   lifestream --serve                         # Streaming API backed by an OpenAI-compatible model
//!   lifestream --serve --offline               # Streaming API replaying a demo pattern
//!   lifestream --prompt                        # One turn with the default prompt
//!   lifestream --prompt "text" --out life.png  # One turn, save the rendered end state
//!   lifestream --interactive                   # Chat REPL (`clear`, `quit`)
//!   lifestream --simulate reply.txt --json     # Pipeline only, on a saved response

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use lifestream::core::{
    encode_png, run_server, upscale, AppConfig, ChatSession, CompletionSource, OpenAiSource,
    ScriptedSource, StreamTransport, WorkerBridge, IMAGE_ERROR_MESSAGE,
};
use lifestream::types::{Progress, TurnOutcome, TurnReport, TurnStatus};
use lifestream::{DEFAULT_PROMPT, VERSION};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    name = "lifestream",
    version = VERSION,
    about = "Lifestream - chat with a model and watch its Game of Life seed evolve",
    long_about = "Lifestream streams a chat reply from a server-sent-frame endpoint, looks for a\n\
                  fenced 0/1 matrix followed by an iteration count, simulates it with the\n\
                  B3/S23 rules on a worker thread and renders the end state as a bitmap.\n\n\
                  Modes:\n  \
                  --serve        Streaming API server\n  \
                  --prompt       Single turn\n  \
                  --interactive  Chat REPL\n  \
                  --simulate     Pipeline only, on a saved response"
)]
struct Args {
    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Serve a scripted demo instead of calling a model
    #[arg(long)]
    offline: bool,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Token clients must present to the server
    #[arg(long, env = "LIFESTREAM_ACCESS_TOKEN")]
    access_token: Option<String>,

    /// OpenAI-compatible API key used by the server
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// Model name
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Streaming endpoint used by the client modes
    #[arg(long, default_value = "http://127.0.0.1:3000/api/sse")]
    endpoint: String,

    /// Session token sent by the client modes
    #[arg(long, env = "LIFESTREAM_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Run one turn (uses the default Game of Life prompt when no text is given)
    #[arg(short, long, num_args = 0..=1, default_missing_value = DEFAULT_PROMPT)]
    prompt: Option<String>,

    /// Interactive chat mode - read prompts from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Run the pipeline on a saved response file
    #[arg(long, value_name = "FILE")]
    simulate: Option<PathBuf>,

    /// Write the rendered end state as PNG
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Pixels per cell in the written PNG
    #[arg(long, default_value_t = 1)]
    scale: u32,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing();
    if args.no_color {
        colored::control::set_override(false);
    }

    let result = if args.serve {
        run_serve(&args).await
    } else if let Some(path) = args.simulate.clone() {
        run_simulate(&path, &args).await
    } else if let Some(prompt) = args.prompt.clone() {
        run_single(&prompt, &args).await
    } else if args.interactive {
        run_interactive(&args).await
    } else {
        Args::command().print_help().map_err(Into::into)
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins, otherwise `lifestream=info`. Logs go to stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lifestream=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Run HTTP API server
async fn run_serve(args: &Args) -> CliResult<()> {
    let source: Arc<dyn CompletionSource> = if args.offline {
        Arc::new(ScriptedSource::demo())
    } else {
        let api_key = args
            .api_key
            .clone()
            .ok_or("OPENAI_API_KEY is required unless --offline is set")?;
        Arc::new(OpenAiSource::new(&args.base_url, api_key, &args.model))
    };

    print_header("API Server");
    println!("  source: {}", if args.offline { "offline demo" } else { args.model.as_str() });
    println!(
        "  auth:   {}",
        if args.access_token.is_some() { "bearer token" } else { "open" }
    );
    println!();

    let config = AppConfig::new(source).with_access_token(args.access_token.clone());
    run_server(&args.addr, config).await?;
    Ok(())
}

/// Run the pipeline on a saved response
async fn run_simulate(path: &Path, args: &Args) -> CliResult<()> {
    let text = std::fs::read_to_string(path)?;
    let bridge = WorkerBridge::spawn()?;
    let pending = bridge.submit(text.clone())?;

    let (image, message) = match pending.wait_with_progress(|p| print_progress(p, args)).await {
        Ok(result) => (result.image, result.message),
        Err(e) => (None, Some(format!("{}: {}", IMAGE_ERROR_MESSAGE, e))),
    };
    clear_progress(args);

    let outcome = TurnOutcome {
        status: TurnStatus::Completed,
        text,
        image,
        message,
    };
    report(&outcome, args)
}

/// Run a single turn
async fn run_single(prompt: &str, args: &Args) -> CliResult<()> {
    let mut session = new_session(args)?;
    let outcome = send_turn(&mut session, prompt, args).await?;
    report(&outcome, args)?;
    if !outcome.is_completed() {
        std::process::exit(2);
    }
    Ok(())
}

/// Run interactive chat mode
async fn run_interactive(args: &Args) -> CliResult<()> {
    let mut session = new_session(args)?;

    print_header("Chat");
    println!("Press Enter on an empty line to send the default Game of Life prompt.");
    println!("Type 'clear' to delete the conversation, 'quit' to exit.");
    println!();

    let stdin = io::stdin();
    loop {
        print!("{} > ", format!("[{}]", session.log().len()).dimmed());
        io::stdout().flush()?;

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            println!("\nSession ended. Messages: {}", session.log().len());
            break;
        }
        if line.eq_ignore_ascii_case("clear") {
            session.clear();
            println!("{}", "Conversation cleared.".yellow());
            continue;
        }

        let prompt = if line.is_empty() { DEFAULT_PROMPT } else { line };
        let outcome = send_turn(&mut session, prompt, args).await?;
        report(&outcome, args)?;
        session.restart_worker()?;
    }
    Ok(())
}

fn new_session(args: &Args) -> CliResult<ChatSession> {
    let transport = StreamTransport::new(&args.endpoint)?.with_token(args.token.clone());
    if !transport.is_authorized() {
        eprintln!(
            "{} no session token set (LIFESTREAM_TOKEN); requests will be rejected",
            "warning:".yellow().bold()
        );
    }
    Ok(ChatSession::new(transport, WorkerBridge::spawn()?))
}

async fn send_turn(session: &mut ChatSession, prompt: &str, args: &Args) -> CliResult<TurnOutcome> {
    let echo = !args.json;
    let outcome = session
        .send(
            prompt,
            |chunk| {
                if echo {
                    print!("{}", chunk);
                    let _ = io::stdout().flush();
                }
            },
            |p| print_progress(p, args),
        )
        .await?;
    if echo {
        println!();
    }
    clear_progress(args);
    Ok(outcome)
}

/// Save the image if asked and print the turn summary
fn report(outcome: &TurnOutcome, args: &Args) -> CliResult<()> {
    let image_path = match (&outcome.image, &args.out) {
        (Some(image), Some(path)) => {
            let png = encode_png(&upscale(image, args.scale))?;
            std::fs::write(path, png)?;
            Some(path.display().to_string())
        }
        _ => None,
    };

    let report = TurnReport::from_outcome(outcome, image_path);
    if args.json {
        let mut value = serde_json::to_value(&report)?;
        value["text"] = serde_json::Value::String(outcome.text.clone());
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if args.no_color {
        println!("{}", report.to_parseable_string());
    } else {
        println!("{}", report.to_terminal_string());
    }
    Ok(())
}

fn print_progress(progress: Progress, args: &Args) {
    if args.json {
        return;
    }
    eprint!(
        "\r  simulating {}/{} ({:.0}%)",
        progress.done,
        progress.total,
        progress.fraction() * 100.0
    );
}

fn clear_progress(args: &Args) {
    if !args.json {
        eprint!("\r\x1b[2K");
    }
}

fn print_header(mode: &str) {
    let title = format!("Lifestream v{} - {}", VERSION, mode);
    println!("{}", "=".repeat(title.len() + 4).bold());
    println!("  {}", title.bold());
    println!("{}", "=".repeat(title.len() + 4).bold());
    println!();
}
