mod token;

use std::collections::HashMap;
use std::io::Write as _;

use anyhow::{bail, Context as _};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use framekv_client::{Client, ClientError};
use framekv_proto::{MetricsCommand, MetricsReport};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::token::{escape_bytes, tokenize, unescape};

#[derive(Parser)]
#[command(name = "framekv")]
#[command(about = "Command line client for the framekv server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Server host
    #[arg(long, env = "FRAMEKV_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, env = "FRAMEKV_PORT", default_value_t = 9001)]
    port: u16,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch values for the given keys
    Get {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Store key/value pairs, given as KEY VALUE [KEY VALUE]...
    Set {
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Remove the given keys
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print server metrics
    Metrics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut client = Client::new(cli.host, cli.port);

    match cli.command {
        Some(command) => run_command(&mut client, command).await,
        None => shell(&mut client).await,
    }
}

async fn run_command(client: &mut Client, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get { keys } => {
            let found = client.get(keys).await?;
            print_pairs(&found);
        }
        Command::Set { args } => {
            let keys = client.set(pairs_from_args(args)?).await?;
            for key in keys {
                println!("{key}");
            }
        }
        Command::Delete { keys } => {
            let removed = client.delete(keys).await?;
            for key in removed {
                println!("{key}");
            }
        }
        Command::Metrics => {
            let report = client.metrics(MetricsCommand::all()).await?;
            print_report(&report);
        }
    }
    Ok(())
}

fn pairs_from_args(args: Vec<String>) -> anyhow::Result<Vec<(String, Bytes)>> {
    if args.len() % 2 != 0 {
        bail!("set takes KEY VALUE pairs, got {} arguments", args.len());
    }
    let mut pairs = Vec::with_capacity(args.len() / 2);
    let mut iter = args.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let value = unescape(&value).with_context(|| format!("bad value for key '{key}'"))?;
        pairs.push((key, Bytes::from(value)));
    }
    Ok(pairs)
}

fn print_pairs(pairs: &HashMap<String, Bytes>) {
    for (key, value) in pairs {
        println!("{key} = {}", escape_bytes(value));
    }
}

fn print_report(report: &MetricsReport) {
    let fields = [
        ("key_count", report.key_count),
        ("total_store_contents_size", report.total_store_contents_size),
        ("keys_read_count", report.keys_read_count),
        ("keys_updated_count", report.keys_updated_count),
        ("keys_deleted_count", report.keys_deleted_count),
    ];
    for (name, value) in fields {
        match value {
            Some(v) => println!("{name}: {v}"),
            None => println!("{name}: -"),
        }
    }
}

async fn shell(client: &mut Client) -> anyhow::Result<()> {
    println!("framekv shell - GET, SET, DELETE, METRICS; quit to exit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        if !process_line(client, &line).await {
            return Ok(());
        }
    }
}

/// Handles one shell line; returns false when the shell should exit.
/// Command and transport errors are printed and the shell keeps going.
async fn process_line(client: &mut Client, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest),
        None => (line, ""),
    };

    let result = match word.to_ascii_uppercase().as_str() {
        "QUIT" | "EXIT" | "Q" => return false,
        "GET" => get_line(client, rest).await,
        "SET" => set_line(client, rest).await,
        "DELETE" => delete_line(client, rest).await,
        "METRICS" => metrics_line(client).await,
        other => Err(anyhow::anyhow!(
            "unknown command '{other}', expected GET, SET, DELETE or METRICS"
        )),
    };
    if let Err(err) = result {
        // Keep the shell alive on semantic and transport errors alike.
        match err.downcast_ref::<ClientError>() {
            Some(client_err) => eprintln!("error: {client_err}"),
            None => eprintln!("error: {err}"),
        }
    }
    true
}

async fn get_line(client: &mut Client, rest: &str) -> anyhow::Result<()> {
    let keys = required_keys("GET", rest)?;
    let found = client.get(keys).await?;
    if found.is_empty() {
        println!("(no values)");
    } else {
        print_pairs(&found);
    }
    Ok(())
}

async fn set_line(client: &mut Client, rest: &str) -> anyhow::Result<()> {
    let args = tokenize(rest)?;
    if args.is_empty() {
        bail!("SET requires at least one KEY VALUE pair");
    }
    let keys = client.set(pairs_from_args(args)?).await?;
    println!("stored {} key(s)", keys.len());
    Ok(())
}

async fn delete_line(client: &mut Client, rest: &str) -> anyhow::Result<()> {
    let keys = required_keys("DELETE", rest)?;
    let removed = client.delete(keys).await?;
    println!("removed {} key(s)", removed.len());
    Ok(())
}

async fn metrics_line(client: &mut Client) -> anyhow::Result<()> {
    let report = client.metrics(MetricsCommand::all()).await?;
    print_report(&report);
    Ok(())
}

fn required_keys(command: &str, rest: &str) -> anyhow::Result<Vec<String>> {
    let keys = tokenize(rest)?;
    if keys.is_empty() {
        bail!("{command} requires at least one key");
    }
    Ok(keys)
}
