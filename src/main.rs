use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use swift_registry::{
    is_headquarters_code, logging, Config, ImportDriver, ImportLog, ImportReport, NewBankCode,
    NewCountry, RegistryService, SqliteStore,
};

#[derive(Debug, Parser)]
#[command(name = "swift-registry", about = "SWIFT/BIC code registry grouped by country")]
struct Cli {
    /// SQLite database path (overrides SWIFT_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Skip the startup import pass
    #[arg(long, global = true)]
    no_startup_import: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile a CSV file into the registry
    Import {
        /// CSV path (overrides SWIFT_CSV_PATH)
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Show one SWIFT code (head offices list their branches)
    Code { code: String },
    /// List the SWIFT codes of one country
    Country { iso2: String },
    /// List all countries
    Countries,
    /// Show recent import passes
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    CreateCountry { iso2: String, name: String },
    RenameCountry { iso2: String, name: String },
    /// Delete a country and all of its codes
    DeleteCountry { iso2: String },
    CreateCode {
        code: String,
        #[arg(long)]
        bank_name: String,
        #[arg(long)]
        country: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        branch_name: Option<String>,
    },
    DeleteCode { code: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    logging::init_tracing();

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    let store = SqliteStore::open(&db_path, config.busy_timeout)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let is_import = matches!(cli.command, Command::Import { .. });
    if config.import_on_start && !cli.no_startup_import && !is_import {
        ImportDriver::new(&store).import_path(&config.csv_path);
    }

    run(&cli, &config, &store)
}

fn run(cli: &Cli, config: &Config, store: &SqliteStore) -> Result<()> {
    let service = RegistryService::new(store);

    match &cli.command {
        Command::Import { csv } => {
            let csv_path = csv.clone().unwrap_or_else(|| config.csv_path.clone());
            let report = ImportDriver::new(store).import_path(&csv_path);
            print_report(cli.json, &report)?;
        }
        Command::Code { code } => {
            let details = service.get_bank_code(code)?;
            if cli.json {
                print_json(&details)?;
            } else {
                println!(
                    "{}  {}  [{} {}]{}",
                    details.swift_code,
                    details.bank_name,
                    details.country_iso2,
                    details.country_name,
                    if details.is_headquarters { "  HQ" } else { "" }
                );
                if let Some(address) = &details.address {
                    println!("   {}", address);
                }
                for branch in details.branches.iter().flatten() {
                    println!("   └─ {}  {}", branch.swift_code, branch.bank_name);
                }
            }
        }
        Command::Country { iso2 } => {
            let listing = service.get_bank_codes_by_country(iso2)?;
            if cli.json {
                print_json(&listing)?;
            } else {
                println!("{} {}", listing.country_iso2, listing.country_name);
                for code in &listing.swift_codes {
                    println!(
                        "   {}  {}{}",
                        code.swift_code,
                        code.bank_name,
                        if code.is_headquarters { "  HQ" } else { "" }
                    );
                }
                println!("✓ {} codes", listing.swift_codes.len());
            }
        }
        Command::Countries => {
            let countries = service.list_countries()?;
            if cli.json {
                print_json(&countries)?;
            } else {
                for country in &countries {
                    println!("{}  {}", country.iso_code, country.name);
                }
            }
        }
        Command::History { limit } => {
            let runs = store.recent_import_runs(*limit)?;
            if cli.json {
                print_json(&runs)?;
            } else {
                for run in &runs {
                    println!("{}  {}", run.started_at.to_rfc3339(), run.summary());
                }
            }
        }
        Command::CreateCountry { iso2, name } => {
            let country = service.create_country(&NewCountry {
                iso_code: iso2.clone(),
                name: name.clone(),
            })?;
            println!("✓ Country {} successfully created", country.iso_code);
        }
        Command::RenameCountry { iso2, name } => {
            let country = service.rename_country(iso2, name)?;
            println!("✓ Country {} renamed to {}", country.iso_code, country.name);
        }
        Command::DeleteCountry { iso2 } => {
            service.delete_country(iso2)?;
            println!("✓ Country successfully deleted");
        }
        Command::CreateCode {
            code,
            bank_name,
            country,
            address,
            branch_name,
        } => {
            let saved = service.create_bank_code(&NewBankCode {
                swift_code: code.clone(),
                bank_name: bank_name.clone(),
                address: address.clone(),
                branch_name: branch_name.clone(),
                country_iso2: country.clone(),
                is_headquarters: is_headquarters_code(&code.trim().to_uppercase()),
            })?;
            println!("✓ SwiftCode {} successfully created", saved.code);
        }
        Command::DeleteCode { code } => {
            service.delete_bank_code(code)?;
            println!("✓ SwiftCode {} successfully deleted", code);
        }
    }

    Ok(())
}

fn print_report(json: bool, report: &ImportReport) -> Result<()> {
    if json {
        return print_json(report);
    }

    println!("{}", report.summary());
    if let Some(digest) = &report.source_sha256 {
        println!("   sha256: {}", digest);
    }
    if let Some(error) = &report.error {
        println!("   ✗ {}", error);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
