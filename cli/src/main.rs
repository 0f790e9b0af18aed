mod render;

use std::ops::RangeInclusive;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use dialoguer::Confirm;
use emvinfo::pcsc::Context;
use emvinfo::session::StageError;
use emvinfo::{Card, Options, Report, Session};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Error occurred on communicating with the reader: {0}")]
    Pcsc(#[from] emvinfo::pcsc::Error),

    #[error("Could not read your answer: {0}")]
    Prompt(#[from] std::io::Error),

    #[error("Could not encode the report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Session(#[from] StageError),
}

type Result<T> = std::result::Result<T, Error>;

/// Reads applications, cardholder data and the payment log from EMV contactless cards.
#[derive(Parser)]
#[command(name = "emvinfo", version, about)]
struct Args {
    /// Priority of the application to read.
    #[arg(short, long, default_value_t = 1)]
    priority: u8,

    /// Short file identifiers to scan for records, as `FIRST-LAST`.
    #[arg(long, default_value = "1-10", value_parser = parse_range)]
    sfi: RangeInclusive<u8>,

    /// Records to read in each file, as `FIRST-LAST`.
    #[arg(long, default_value = "1-16", value_parser = parse_range)]
    records: RangeInclusive<u8>,

    /// Sends GET PROCESSING OPTIONS before reading the log.
    /// The card records it as a payment in its log.
    #[arg(long)]
    gpo: bool,

    /// Sends GET PROCESSING OPTIONS without asking.
    #[arg(short, long, requires = "gpo")]
    yes: bool,

    /// Uses the reader whose name contains this text instead of the first one.
    #[arg(short, long)]
    reader: Option<String>,

    /// Lists the readers and exits.
    #[arg(long)]
    list_readers: bool,

    /// Prints the report as JSON.
    #[arg(long)]
    json: bool,

    /// Logs every exchange with the card.
    #[arg(short, long)]
    verbose: bool,
}

/// Parses `FIRST-LAST`, or a single number.
fn parse_range(s: &str) -> std::result::Result<RangeInclusive<u8>, String> {
    let (first, last) = s.split_once('-').unwrap_or((s, s));
    let parse = |n: &str| n.trim().parse::<u8>().map_err(|e| format!("{}: {}", n, e));

    match (parse(first)?, parse(last)?) {
        (first, last) if first <= last => Ok(first..=last),
        (first, last) => Err(format!("{} is after {}", first, last)),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    failure: Option<String>,
}

fn confirm_gpo(args: &Args) -> Result<bool> {
    if !args.gpo || args.yes {
        return Ok(args.gpo);
    }

    Ok(Confirm::new()
        .with_prompt("GET PROCESSING OPTIONS inserts a payment in the log of the card. Continue?")
        .default(false)
        .interact()?)
}

fn run(args: Args) -> Result<()> {
    let ctx = Context::try_new()?;

    if args.list_readers {
        ctx.readers()?.iter().for_each(|reader| println!("{}", reader));
        return Ok(());
    }

    let options = Options {
        priority: args.priority,
        sfis: args.sfi.clone(),
        records: args.records.clone(),
        processing_options: confirm_gpo(&args)?,
    };

    let device = ctx.open(args.reader.as_deref())?;
    info!("Put your card on {}", device.name());

    let pcsc_card = device.connect(&ctx)?;
    let card = Rc::new(Card::new(Box::new(pcsc_card)));

    let mut report = Session::new(options).run(card);
    let failure = report.failure.take();

    match args.json {
        true => println!(
            "{}",
            serde_json::to_string_pretty(&JsonReport {
                report: &report,
                failure: failure.as_ref().map(ToString::to_string),
            })?
        ),
        _ => print!("{}", render::Text(&report)),
    }

    failure.map_or(Ok(()), |e| Err(e.into()))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = match args.verbose {
        true => "debug",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
