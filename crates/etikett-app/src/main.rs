// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Etikett: label printing from the command line.
//
// Entry point. Initialises logging and backend services, then runs one
// command against the print orchestrator.

mod services;
mod terminal;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;

use etikett_bridge::traits::CandidateSelector;
use etikett_core::config::DiscoveryStrategy;
use etikett_core::error::{EtikettError, Result};
use etikett_core::human_errors::humanize_error;
use etikett_core::types::{DiscoveryStatus, TransportType};

use services::app_services::AppServices;
use services::data_dir;
use terminal::{AddressSelector, TerminalSelector};

/// Print labels on paired, Bluetooth, Bluetooth LE and network printers.
#[derive(Parser, Debug)]
#[command(name = "etikett")]
#[command(version)]
struct Args {
    /// Data directory for config.json and the selection database
    #[arg(long, env = "ETIKETT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Restrict discovery to these transports (paired, bluetooth, ble, network)
    #[arg(long = "transport", value_parser = parse_transport, global = true)]
    transports: Vec<TransportType>,

    /// Scan all transports at once instead of one after another
    #[arg(long, global = true)]
    concurrent: bool,

    /// Only accept generic paired devices that advertise a serial port
    #[arg(long, global = true)]
    strict: bool,

    /// Pick this printer address when discovery finds it instead of asking
    #[arg(long, global = true)]
    choose: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a label file (or stdin with "-") to the selected printer
    Print {
        file: PathBuf,

        /// Fail instead of searching for another printer
        #[arg(long)]
        fail_fast: bool,
    },

    /// Recall a format stored on the printer and fill its fields
    PrintFormat {
        /// Stored format name, e.g. SHIPPING or R:LABEL.ZPL
        name: String,

        /// Field values as NUMBER=VALUE
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(u32, String)>,

        #[arg(long)]
        fail_fast: bool,
    },

    /// Search for printers and store the one you choose
    Select,

    /// Show the stored printer
    Show,

    /// Search for printers and list what was found
    Discover,
}

fn parse_transport(value: &str) -> std::result::Result<TransportType, String> {
    TransportType::ALL
        .into_iter()
        .find(|t| t.id() == value)
        .ok_or_else(|| format!("unknown transport '{value}' (expected paired, bluetooth, ble or network)"))
}

fn parse_field(value: &str) -> std::result::Result<(u32, String), String> {
    let (number, text) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NUMBER=VALUE, got '{value}'"))?;
    let number = number
        .trim()
        .parse()
        .map_err(|_| format!("field number '{number}' is not a number"))?;
    Ok((number, text.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            let human = humanize_error(&e);
            eprintln!("{}", human.message);
            eprintln!("{}", human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let dir = data_dir::data_dir(args.data_dir.as_deref())?;
    let selector: Arc<dyn CandidateSelector> = match &args.choose {
        Some(address) => Arc::new(AddressSelector::new(address.clone())),
        None => Arc::new(TerminalSelector::new()),
    };
    let bridge = etikett_bridge::platform_bridge();

    let services = AppServices::init(dir, bridge.as_ref(), selector, |config| {
        if !args.transports.is_empty() {
            config.transports = args.transports.clone();
        }
        if args.concurrent {
            config.discovery_strategy = DiscoveryStrategy::Concurrent;
        }
        if args.strict {
            config.strict_generic_filtering = true;
        }
    })?;
    tracing::info!(
        data_dir = %services.data_dir().display(),
        transports = ?services.config().transports,
        "etikett starting"
    );

    let outcome = execute(&services, args.command).await;
    services.orchestrator().close_connections().await;
    outcome
}

async fn execute(services: &AppServices, command: Command) -> Result<()> {
    let orchestrator = services.orchestrator();
    match command {
        Command::Print { file, fail_fast } => {
            let label = read_label(&file)?;
            let response = orchestrator.print_bytes(&label, fail_fast).await?;
            println!("Printed on {}", response.printer_name.as_deref().unwrap_or(&response.printer_address));
        }
        Command::PrintFormat { name, fields, fail_fast } => {
            let fields: BTreeMap<u32, String> = fields.into_iter().collect();
            let response = orchestrator.print_stored_format(&name, fields, fail_fast).await?;
            println!("Printed on {}", response.printer_name.as_deref().unwrap_or(&response.printer_address));
        }
        Command::Select => {
            let printer = orchestrator.search_printer_and_save().await?;
            println!("Selected {printer}");
        }
        Command::Show => match orchestrator.load_selected_printer().await? {
            Some(printer) => println!("{}", serde_json::to_string_pretty(&printer)?),
            None => println!("No printer selected"),
        },
        Command::Discover => discover(services).await?,
    }
    Ok(())
}

async fn discover(services: &AppServices) -> Result<()> {
    let mut statuses = services.discover();
    while let Some(status) = statuses.next().await {
        match status {
            DiscoveryStatus::InProgress => eprintln!("Searching for printers..."),
            DiscoveryStatus::Updated(printers) => eprintln!("{} found so far", printers.len()),
            DiscoveryStatus::Completed(printers) => {
                for printer in printers {
                    println!("{}\t{}\t{}", printer.transport.id(), printer.address, printer.display_name());
                }
            }
            DiscoveryStatus::Error(message) => return Err(EtikettError::Discovery(message)),
        }
    }
    Ok(())
}

fn read_label(file: &Path) -> Result<Vec<u8>> {
    if file.as_os_str() == "-" {
        let mut label = Vec::new();
        std::io::stdin().read_to_end(&mut label)?;
        return Ok(label);
    }
    Ok(std::fs::read(file)?)
}
