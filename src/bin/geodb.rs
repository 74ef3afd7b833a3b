//! Thin command-line wrapper around the `geodb` library: build a
//! database from a simple line-oriented text format, look up a single
//! address, or dump every network in a database.

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use geodb::{Context, Flags, Network, Reader, Writer};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "geodb", about = "Build and query compact geolocation databases")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a database from a line-oriented source file.
    Build {
        /// Path to the source file.
        source: PathBuf,
        /// Path to write the database to.
        output: PathBuf,
        /// Vendor name recorded in the database header.
        #[arg(long)]
        vendor: Option<String>,
        /// Description recorded in the database header.
        #[arg(long)]
        description: Option<String>,
    },
    /// Look up a single address.
    Query {
        /// Path to a database file.
        database: PathBuf,
        /// Address to look up.
        address: String,
    },
    /// List every network in a database.
    Dump {
        /// Path to a database file.
        database: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            source,
            output,
            vendor,
            description,
        } => build(&source, &output, vendor.as_deref(), description.as_deref()),
        Command::Query { database, address } => query(&database, &address),
        Command::Dump { database } => dump(&database),
    }
}

/// Source file format: one directive per line.
///
/// ```text
/// as <number> <name...>
/// country <code> <continent> <name...>
/// network <cidr> <country|-> <asn> <flags|->
/// ```
fn build(source: &PathBuf, output: &PathBuf, vendor: Option<&str>, description: Option<&str>) -> Result<()> {
    let mut writer = Writer::new(Context::new());
    if let Some(vendor) = vendor {
        writer.set_vendor(vendor)?;
    }
    if let Some(description) = description {
        writer.set_description(description)?;
    }

    let file = File::open(source).with_context(|| format!("opening {}", source.display()))?;
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["as", number, rest @ ..] => {
                let number: u32 = number.parse().with_context(|| format!("line {}", lineno + 1))?;
                let name = (!rest.is_empty()).then(|| rest.join(" "));
                writer.add_as(number, name.as_deref())?;
            }
            ["country", code, continent, rest @ ..] => {
                let continent = (*continent != "-").then_some(*continent);
                let name = (!rest.is_empty()).then(|| rest.join(" "));
                writer.add_country(code, continent, name.as_deref())?;
            }
            [cidr_kw @ "network", cidr, country, asn, flags] if *cidr_kw == "network" => {
                let country = (*country != "-").then_some(*country);
                let asn: u32 = asn.parse().with_context(|| format!("line {}", lineno + 1))?;
                let flags = parse_flags(flags)?;
                writer.add_network(cidr, country, asn, flags)?;
            }
            _ => bail!("line {}: unrecognized directive: {}", lineno + 1, line),
        }
    }

    let mut out = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    writer.write(&mut out)?;
    Ok(())
}

fn parse_flags(spec: &str) -> Result<Flags> {
    if spec == "-" {
        return Ok(Flags::NONE);
    }
    let mut flags = Flags::NONE;
    for part in spec.split(',') {
        flags = flags.union(match part {
            "proxy" => Flags::ANONYMOUS_PROXY,
            "satellite" => Flags::SATELLITE_PROVIDER,
            "anycast" => Flags::ANYCAST,
            "drop" => Flags::DROP,
            other => bail!("unknown flag: {}", other),
        });
    }
    Ok(flags)
}

fn query(database: &PathBuf, address: &str) -> Result<()> {
    let reader = Reader::open(Context::new(), database)?;
    match reader.lookup(address)? {
        Some(network) => print_network(&network),
        None => println!("{}: no match", address),
    }
    Ok(())
}

fn dump(database: &PathBuf) -> Result<()> {
    let reader = Reader::open(Context::new(), database)?;
    for network in reader.enumerate_networks(|_| true)? {
        print_network(&network);
    }
    Ok(())
}

fn print_network(network: &Network) {
    println!(
        "{}\tAS{}\t{}",
        network,
        network.asn(),
        network.country_code().unwrap_or("--")
    );
}
