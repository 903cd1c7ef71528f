//! Northwind sample reader.
//!
//! Reads the service metadata, the `Customers` feed, one customer and one
//! order with its customer expanded, and prints each entry.
//!
//! # Usage
//!
//! ```bash
//! # Public Northwind V2 service, JSON
//! northwind-demo
//!
//! # Local mock server, Atom, with raw payload logging
//! northwind-demo --service-url http://127.0.0.1:3000 --format atom --raw
//! ```

// CLI tools are expected to print to stdout
#![allow(clippy::print_stdout)]

mod transport;

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use odata_core::{render_entry, DecodeOptions, Format, ODataClient, ODataError};
use tracing::error;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::transport::UreqClient;

const NORTHWIND_V2: &str = "http://services.odata.org/V2/Northwind/Northwind.svc";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WireFormat {
    Json,
    Atom,
}

impl From<WireFormat> for Format {
    fn from(value: WireFormat) -> Self {
        match value {
            WireFormat::Json => Format::Json,
            WireFormat::Atom => Format::Atom,
        }
    }
}

/// Read a Northwind OData v2 service and print what comes back.
#[derive(Parser, Debug)]
#[command(name = "northwind-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Service root URL
    #[arg(long, env = "ODATA_SERVICE_URL", default_value = NORTHWIND_V2)]
    service_url: String,

    /// Payload format requested for feeds and entries
    #[arg(long, env = "ODATA_FORMAT", value_enum, default_value_t = WireFormat::Json)]
    format: WireFormat,

    /// Yield null for missing non-nullable properties instead of failing
    #[arg(long)]
    relaxed: bool,

    /// Keep following next links until the last customer page
    #[arg(long)]
    all_pages: bool,

    /// Log raw response bodies
    #[arg(long)]
    raw: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.raw);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(status = ?e.status(), "{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(raw: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let filter = if raw {
        match "odata_core=trace".parse::<Directive>() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    } else {
        filter
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<(), ODataError> {
    let http = UreqClient::new();
    let format = Format::from(cli.format);
    let options = if cli.relaxed {
        DecodeOptions::relaxed()
    } else {
        DecodeOptions::default()
    };
    let client = ODataClient::new(&cli.service_url).with_options(options);

    println!("\n----- Read Edm ------------------------------");
    let model = client.read_metadata(&http)?;
    println!("Read default EntityContainer: {}", model.default_container_name());

    println!("\n----- Read Feed ------------------------------");
    let mut page = client.read_feed(&http, &model, format, "Customers")?;
    loop {
        println!("Read: {} entries: ", page.entries.len());
        for entry in &page.entries {
            println!("##########");
            println!("Entry:\n{}", render_entry(entry));
            println!("##########");
        }
        if !cli.all_pages {
            break;
        }
        match client.read_next_page(&http, &model, format, "Customers", &page)? {
            Some(next) => page = next,
            None => break,
        }
    }

    println!("\n----- Read Entry ------------------------------");
    let entry = client.read_entry(&http, &model, format, "Customers", "'ERNSH'", &[])?;
    println!("Single Entry:\n{}", render_entry(&entry));

    println!("\n----- Read Entry with $expand  ------------------------------");
    let expanded = client.read_entry(&http, &model, format, "Orders", "10248", &["Customer"])?;
    println!(
        "Single Entry with expanded Customer relation:\n{}",
        render_entry(&expanded)
    );
    Ok(())
}
