mod catalog;
mod config;
mod output;

use clap::Parser;
use duelrank_core::constants::{DEFAULT_K_FACTOR, EXPORT_FILENAME, PERSIST_DEBOUNCE_MS};
use duelrank_core::{
    EngineError, FileStorage, ItemId, Pair, PairingError, PersistenceStore, SessionController,
    SessionError, SessionOptions,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::catalog::{Catalog, load_catalog};

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(name = "duelrank", version, about = "Rank items by voting on pairs, Elo style")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(clap::Args)]
struct GlobalArgs {
    /// Item catalog: JSON file path or http(s) URL
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Directory holding the ratings file (default: $XDG_DATA_HOME/duelrank or ~/.local/share/duelrank)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to config file (default: $XDG_CONFIG_HOME/duelrank/config.toml or ~/.config/duelrank/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Elo K-factor. Default: 24
    #[arg(long, global = true)]
    k_factor: Option<f64>,

    /// Seed for pair selection, for reproducible sessions
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Vote on pairs interactively
    Duel,
    /// Record a single vote
    Vote(VoteArgs),
    /// Show the current standings
    Leaderboard(LeaderboardArgs),
    /// Export stored ratings as JSON
    Export(ExportArgs),
    /// Replace stored ratings with an exported file
    Import(ImportArgs),
    /// Delete all stored ratings
    Reset(ResetArgs),
    /// Create a default config file at the default config path
    Init,
}

#[derive(clap::Args)]
struct VoteArgs {
    /// Id of the preferred item
    #[arg(long)]
    winner: ItemId,

    /// Id of the other item
    #[arg(long)]
    loser: ItemId,
}

#[derive(clap::Args)]
struct LeaderboardArgs {
    /// Output JSON instead of table
    #[arg(long)]
    json: bool,

    /// Only show the top N items
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Output file, or "-" for stdout
    #[arg(short, long, default_value = EXPORT_FILENAME)]
    output: PathBuf,
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Previously exported JSON file
    file: PathBuf,
}

#[derive(clap::Args)]
struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

/// CLI args merged over the config file.
struct Settings {
    catalog: Option<String>,
    data_dir: PathBuf,
    options: SessionOptions,
    seed: Option<u64>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn resolve_settings(args: &GlobalArgs) -> Settings {
    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let cfg = config::load_config(&config_path);
    debug!("Using config {}", config_path.display());

    let k_factor = args.k_factor.or(cfg.k_factor).unwrap_or(DEFAULT_K_FACTOR);
    if !k_factor.is_finite() || k_factor <= 0.0 {
        bail("--k-factor must be a positive number");
    }

    let debounce_ms = cfg.debounce_ms.unwrap_or(PERSIST_DEBOUNCE_MS);

    Settings {
        catalog: args.catalog.clone().or(cfg.catalog),
        data_dir: args
            .data_dir
            .clone()
            .or(cfg.data_dir)
            .unwrap_or_else(config::default_data_dir),
        options: SessionOptions {
            k_factor,
            debounce: Duration::from_millis(debounce_ms),
        },
        seed: args.seed,
    }
}

fn open_store(settings: &Settings) -> PersistenceStore<FileStorage> {
    debug!("Ratings directory: {}", settings.data_dir.display());
    PersistenceStore::new(FileStorage::new(&settings.data_dir))
}

type Session = SessionController<FileStorage, StdRng>;

async fn start_session(settings: &Settings) -> (Catalog, Session) {
    let source = settings.catalog.clone().unwrap_or_else(|| {
        bail(format!(
            "No catalog specified. Pass --catalog or set it in {}",
            config::config_path().display()
        ))
    });
    let catalog = load_catalog(&source)
        .await
        .unwrap_or_else(|e| bail(e));

    let rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let session = SessionController::start(catalog.ids(), open_store(settings), rng, settings.options.clone())
        .unwrap_or_else(|e| bail(format!("Catalog could not be loaded: {e}")));
    (catalog, session)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    if let Commands::Init = cli.command {
        let path = config::create_default_config();
        println!("Created config at {}", path.display());
        println!("Edit it to point at your item catalog.");
        return;
    }

    let settings = resolve_settings(&cli.global);

    match cli.command {
        Commands::Duel => run_duel(&settings).await,
        Commands::Vote(args) => run_vote(&settings, args).await,
        Commands::Leaderboard(args) => run_leaderboard(&settings, args).await,
        Commands::Export(args) => run_export(&settings, args),
        Commands::Import(args) => run_import(&settings, args),
        Commands::Reset(args) => run_reset(&settings, args),
        Commands::Init => unreachable!("handled above"),
    }
}

/// Left/right placement is cosmetic and independent of how the pair was drawn.
fn orient(pair: Pair, rng: &mut impl Rng) -> Pair {
    if rng.random::<bool>() { (pair.1, pair.0) } else { pair }
}

fn describe(catalog: &Catalog, session: &Session, id: ItemId) -> String {
    let rating = session.engine().record(id).map(|r| r.rating).unwrap_or_default();
    let mut line = format!("{} ({rating:.1})", catalog.name_of(id));
    if let Some(item) = catalog.get(id) {
        let tags: Vec<&str> = [item.classification.as_deref(), item.series.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !tags.is_empty() {
            line.push_str(&format!(" [{}]", tags.join(" / ")));
        }
    }
    line
}

/// What the user typed at the duel prompt.
#[derive(Debug, PartialEq)]
enum DuelInput {
    Left,
    Right,
    Draw,
    Skip,
    Leaderboard,
    Quit,
    Unknown,
}

fn parse_duel_input(line: &str) -> DuelInput {
    match line.trim().to_ascii_lowercase().as_str() {
        "1" | "a" | "left" => DuelInput::Left,
        "2" | "b" | "right" => DuelInput::Right,
        "=" | "d" | "draw" => DuelInput::Draw,
        "s" | "skip" | "" => DuelInput::Skip,
        "l" | "leaderboard" => DuelInput::Leaderboard,
        "q" | "quit" | "exit" => DuelInput::Quit,
        _ => DuelInput::Unknown,
    }
}

async fn run_duel(settings: &Settings) {
    let (catalog, mut session) = start_session(settings).await;
    let mut side_rng = rand::rng();

    let Some(mut pair) = session.current_pair() else {
        bail(format!("Not enough items to compare: the catalog has {}", catalog.len()));
    };
    pair = orient(pair, &mut side_rng);
    info!(items = catalog.len(), "Starting duel");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let (left, right) = pair;
        println!();
        println!("  [1] {}", describe(&catalog, &session, left));
        println!("  [2] {}", describe(&catalog, &session, right));
        print!("Pick 1 or 2 (= draw, s skip, l leaderboard, q quit) > ");
        let _ = io::stdout().flush();

        let Some(line) = lines.next() else { break };
        let line = line.unwrap_or_else(|e| bail(format!("Failed to read from stdin: {e}")));

        let next = match parse_duel_input(&line) {
            DuelInput::Left => session.record_vote(left, right),
            DuelInput::Right => session.record_vote(right, left),
            DuelInput::Draw => session.record_draw(left, right),
            DuelInput::Skip => session.record_skip(),
            DuelInput::Leaderboard => {
                output::print_table(&session.leaderboard(), &catalog, Some(10));
                continue;
            }
            DuelInput::Quit => break,
            DuelInput::Unknown => {
                println!("Unrecognized choice {:?}", line.trim());
                continue;
            }
        };

        session.flush_if_due(Instant::now());

        match next {
            Ok(next_pair) => pair = orient(next_pair, &mut side_rng),
            Err(SessionError::Pairing(PairingError::InsufficientPool { available })) => {
                println!("Not enough items to keep comparing ({available} available).");
                break;
            }
            // The session has re-synced with the catalog; draw again from the fresh state.
            Err(SessionError::Engine(e)) => {
                println!("Internal inconsistency ({e}), re-synced with the catalog.");
                match session.current_pair() {
                    Some(p) => pair = orient(p, &mut side_rng),
                    None => break,
                }
            }
        }
    }

    session.flush();
    println!();
    output::print_table(&session.leaderboard(), &catalog, Some(10));
}

async fn run_vote(settings: &Settings, args: VoteArgs) {
    let (catalog, mut session) = start_session(settings).await;

    match session.record_vote(args.winner, args.loser) {
        Ok(_) => {}
        Err(SessionError::Engine(EngineError::InvalidId(id))) => {
            bail(format!("Item {id} is not in the current catalog"))
        }
        Err(e) => bail(e),
    }
    session.flush();

    println!("{}", describe(&catalog, &session, args.winner));
    println!("{}", describe(&catalog, &session, args.loser));
}

async fn run_leaderboard(settings: &Settings, args: LeaderboardArgs) {
    let (catalog, session) = start_session(settings).await;
    let board = session.leaderboard();

    if args.json {
        output::print_json(&board, &catalog, args.limit);
    } else {
        output::print_table(&board, &catalog, args.limit);
    }
}

/// Write the document bytes exactly as stored, with no trailing newline.
fn write_export(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn run_export(settings: &Settings, args: ExportArgs) {
    let text = open_store(settings).export_text();

    if args.output.as_os_str() == "-" {
        write_export(&mut io::stdout().lock(), &text)
            .unwrap_or_else(|e| bail(format!("Failed to write export to stdout: {e}")));
        return;
    }

    std::fs::write(&args.output, &text)
        .unwrap_or_else(|e| bail(format!("Failed to write {}: {e}", args.output.display())));
    println!("Exported ratings to {}", args.output.display());
}

fn run_import(settings: &Settings, args: ImportArgs) {
    let text = std::fs::read_to_string(&args.file)
        .unwrap_or_else(|e| bail(format!("Failed to read {}: {e}", args.file.display())));

    let mut store = open_store(settings);
    if !store.import_text(&text) {
        bail(format!(
            "Import failed: {} is not a valid ratings export or has an unsupported version",
            args.file.display()
        ));
    }
    println!("Imported ratings from {}", args.file.display());
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn run_reset(settings: &Settings, args: ResetArgs) {
    if !args.yes && !confirm("Reset all stored ratings? This cannot be undone.") {
        println!("Aborted.");
        return;
    }
    open_store(settings).reset();
    println!("Ratings reset.");
}
