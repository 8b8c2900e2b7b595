use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use powstr::keys::{default_key_path, Keys};
use powstr::leaderboard::Leaderboard;
use powstr::miner::{Miner, MinerEvent};
use powstr::protocol::{Event, EventTemplate, ScoreMode};
use powstr::relay::{RelayClient, RelayConfig};

#[derive(Parser)]
#[command(name = "powstr", version, about = "Mine and publish proof-of-work notes")]
struct Cli {
    /// Relay URLs, comma separated. Defaults to the built-in relay set.
    #[arg(long, global = true, value_delimiter = ',')]
    relay: Vec<String>,

    /// Secret key file. Defaults to ~/.powstr/key.
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine a note to a target difficulty and publish it
    Mine {
        /// Note content
        content: String,
        /// Target difficulty in leading zero bits
        #[arg(short, long, default_value_t = 20)]
        difficulty: u32,
        /// Mine and print the signed event without publishing
        #[arg(long)]
        no_publish: bool,
    },
    /// Publish a previously signed event from a JSON file
    Publish {
        /// Path to the event JSON
        file: PathBuf,
    },
    /// Show the proof-of-work leaderboard
    Leaderboard {
        /// Score with time decay (one bit per three days)
        #[arg(long)]
        decayed: bool,
        /// Number of entries to show
        #[arg(short, long)]
        top: Option<usize>,
    },
    /// Generate a fresh secret key
    NewKey,
    /// Import a hex secret key
    ImportKey {
        /// 64-character hex secret key; prompted for when omitted
        secret: Option<String>,
    },
    /// Print the hex secret key
    ExportKey,
    /// Print the public key
    Pubkey,
    /// Measure the local hash rate
    Benchmark {
        /// Number of hashing iterations
        #[arg(short, long, default_value_t = 100_000)]
        count: u64,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let key_path = cli
        .key
        .clone()
        .or_else(default_key_path)
        .ok_or_else(|| anyhow!("cannot determine a home directory; pass --key"))?;

    let relay_config = if cli.relay.is_empty() {
        RelayConfig::default()
    } else {
        RelayConfig {
            relays: cli.relay.clone(),
            ..RelayConfig::default()
        }
    };

    match cli.command {
        Commands::Mine {
            content,
            difficulty,
            no_publish,
        } => cmd_mine(&key_path, relay_config, &content, difficulty, no_publish),
        Commands::Publish { file } => cmd_publish(relay_config, &file),
        Commands::Leaderboard { decayed, top } => cmd_leaderboard(relay_config, decayed, top),
        Commands::NewKey => cmd_new_key(&key_path),
        Commands::ImportKey { secret } => cmd_import_key(&key_path, secret),
        Commands::ExportKey => cmd_export_key(&key_path),
        Commands::Pubkey => cmd_pubkey(&key_path),
        Commands::Benchmark { count } => cmd_benchmark(count),
    }
}

fn cmd_mine(
    key_path: &PathBuf,
    relay_config: RelayConfig,
    content: &str,
    difficulty: u32,
    no_publish: bool,
) -> Result<()> {
    let keys = Keys::load_from_file(key_path)?;
    let template = EventTemplate::text_note(&keys.pubkey_hex(), content, difficulty, 0);

    println!("mining to {difficulty} bits...");
    let mut miner = Miner::new();
    miner.start(template, difficulty)?;

    let handle = miner
        .handle()
        .ok_or_else(|| anyhow!("mining job failed to start"))?;
    let note = loop {
        match handle.recv() {
            Some(MinerEvent::Progress(p)) => {
                print!(
                    "\r{:>12} hashes  {:>10.0} H/s  best {} bits ",
                    p.hash_count, p.hash_rate, p.best_pow
                );
                io::stdout().flush()?;
            }
            Some(MinerEvent::Result(note)) => break note,
            None => bail!("mining worker exited unexpectedly"),
        }
    };
    println!();
    println!(
        "found nonce {} after {} hashes\nid: {}",
        note.nonce, note.hash_count, note.id
    );

    let event = keys.sign(&note.template)?;
    if no_publish {
        println!("{}", serde_json::to_string_pretty(&event)?);
        return Ok(());
    }
    publish_event(relay_config, &event)
}

fn cmd_publish(relay_config: RelayConfig, file: &PathBuf) -> Result<()> {
    let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let event: Event = serde_json::from_str(&raw).context("parsing event JSON")?;
    publish_event(relay_config, &event)
}

fn publish_event(relay_config: RelayConfig, event: &Event) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut client = RelayClient::with_config(relay_config);
        let connected = client.connect().await?;
        info!("connected to {connected} relays");

        let accepted = client.publish(event).await?;
        println!("accepted by {accepted} of {connected} relays");
        println!("https://njump.me/{}", event.id);
        Ok(())
    })
}

fn cmd_leaderboard(relay_config: RelayConfig, decayed: bool, top: Option<usize>) -> Result<()> {
    let mode = if decayed {
        ScoreMode::Decayed
    } else {
        ScoreMode::Raw
    };
    let top_n = top.unwrap_or_else(|| mode.top_n());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut client = RelayClient::with_config(relay_config);
        client.connect().await?;

        let mut board = Leaderboard::new();
        let entries = board.refresh(&mut client, mode, top_n).await?;

        if entries.is_empty() {
            println!("no qualifying notes found");
            return Ok(());
        }
        for entry in entries {
            println!(
                "{:>3}{} {:>7.2}  {} bits  {:<20} {}",
                entry.rank,
                ordinal_suffix(entry.rank),
                entry.note.score,
                entry.note.pow,
                entry.display_name,
                entry.note.preview
            );
        }
        Ok(())
    })
}

fn cmd_new_key(key_path: &PathBuf) -> Result<()> {
    if key_path.exists() {
        bail!(
            "{} already exists; remove it first or pass a different --key",
            key_path.display()
        );
    }
    let keys = Keys::generate();
    keys.save_to_file(key_path)?;
    println!("wrote {}", key_path.display());
    println!("pubkey: {}", keys.pubkey_hex());
    Ok(())
}

fn cmd_import_key(key_path: &PathBuf, secret: Option<String>) -> Result<()> {
    let secret = match secret {
        Some(s) => s,
        None => {
            eprint!("secret key (hex): ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line
        }
    };
    let keys = Keys::from_hex(&secret)?;
    keys.save_to_file(key_path)?;
    println!("wrote {}", key_path.display());
    println!("pubkey: {}", keys.pubkey_hex());
    Ok(())
}

fn cmd_export_key(key_path: &PathBuf) -> Result<()> {
    let keys = Keys::load_from_file(key_path)?;
    eprintln!("WARNING: anyone holding this key can post as you");
    println!("{}", keys.secret_hex());
    Ok(())
}

fn cmd_pubkey(key_path: &PathBuf) -> Result<()> {
    let keys = Keys::load_from_file(key_path)?;
    println!("{}", keys.pubkey_hex());
    Ok(())
}

fn cmd_benchmark(count: u64) -> Result<()> {
    let mut template = EventTemplate::text_note(
        "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d",
        "benchmark note content",
        20,
        1_700_000_000,
    );

    let start = Instant::now();
    let mut best = 0u32;
    for nonce in 0..count {
        template.set_nonce(nonce)?;
        best = best.max(powstr::leading_zero_bits(&template.id()));
    }
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "{count} hashes in {elapsed:.2}s  {:.0} H/s  best {best} bits",
        count as f64 / elapsed
    );
    Ok(())
}

/// Ordinal suffix for leaderboard positions, uppercase to match the board.
fn ordinal_suffix(n: usize) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "TH",
        (1, _) => "ST",
        (2, _) => "ND",
        (3, _) => "RD",
        _ => "TH",
    }
}
