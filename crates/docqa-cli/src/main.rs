//! CLI shell for docqa: build the index over one PDF, then answer questions about it.

use std::error::Error;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use docqa_core::{
    app_data_dir, load_chunks, load_config, load_config_from, save_config, save_config_to, Config,
    ConfigError, Embedder, Generator, OllamaClient, Pipeline,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "docqa=info,docqa_core=info";

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "docqa: ask questions about a PDF")]
struct Cli {
    /// Config file to use instead of config.toml in the app data directory.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// PDF to answer from. Overrides the config file and DOCQA_DOCUMENT.
    #[arg(long, global = true, value_name = "PATH")]
    pdf: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Read questions from stdin and answer each one (default).
    Chat,
    /// Answer a single question and exit.
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
    },
    /// Load and chunk the PDF and list the chunks. Does not call Ollama.
    Chunks,
    /// Show where docqa stores its config (app data directory).
    DataDir,
    /// Write the effective config to the config file.
    InitConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(&cli)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let pipeline = start(&config).await?;
            chat(&pipeline, &config).await;
        }
        Commands::Ask { question } => {
            let pipeline = start(&config).await?;
            println!("{}", pipeline.answer(&question).await?);
        }
        Commands::Chunks => {
            let chunks = load_chunks(&config)?;
            println!("{} chunk(s) from {}", chunks.len(), config.document_path.display());
            for c in chunks {
                let preview: String = c.text.chars().take(60).collect::<String>().replace('\n', " ");
                println!(
                    "  #{:<4} page {:<3} [{}..{}]  {}",
                    c.ordinal,
                    c.page + 1,
                    c.start,
                    c.end,
                    preview
                );
            }
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::InitConfig => {
            let path = match &cli.config {
                Some(path) => {
                    save_config_to(path, &config)?;
                    path.clone()
                }
                None => save_config(&config)?,
            };
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

/// File (or defaults), then environment, then flags.
fn resolve_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.apply_env()?;
    if let Some(pdf) = &cli.pdf {
        config.document_path = pdf.clone();
    }
    Ok(config)
}

/// Builds the index. Any failure here is fatal for the process.
async fn start(config: &Config) -> Result<Pipeline<OllamaClient, OllamaClient>, Box<dyn Error>> {
    let client = OllamaClient::from_config(config)?;
    tracing::info!(
        document = %config.document_path.display(),
        url = %config.ollama_url,
        embed_model = client.embed_model(),
        generate_model = client.generate_model(),
        "Building index"
    );
    Ok(Pipeline::initialize(config, client.clone(), client).await?)
}

/// Reads questions from stdin until EOF or `exit`.
async fn chat(pipeline: &Pipeline<OllamaClient, OllamaClient>, config: &Config) {
    println!(
        "Ask about {} (blank line skips, \"exit\" quits).",
        config.document_path.display()
    );
    let input = BufReader::new(tokio::io::stdin());
    chat_loop(pipeline, input, &mut std::io::stdout(), &mut std::io::stderr()).await;
}

/// One question per line. A failed read or answer is reported and the loop goes on;
/// only end of input, `exit` or `quit` stop it. Returns how many questions were asked.
async fn chat_loop<E, G, R>(
    pipeline: &Pipeline<E, G>,
    input: R,
    out: &mut impl Write,
    err: &mut impl Write,
) -> usize
where
    E: Embedder,
    G: Generator,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut asked = 0;
    loop {
        let _ = write!(out, "> ");
        if let Err(e) = out.flush() {
            let _ = writeln!(err, "Error: {}", e);
        }
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                let _ = writeln!(err, "Error: {}", e);
                continue;
            }
            Err(e) => {
                let _ = writeln!(err, "Error: {}", e);
                break;
            }
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }
        asked += 1;
        match pipeline.answer(question).await {
            Ok(answer) => {
                let _ = writeln!(out, "{}\n", answer);
            }
            Err(e) => {
                let _ = writeln!(err, "Error generating answer: {}\n", e);
            }
        }
    }
    asked
}
