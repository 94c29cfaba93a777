/*
* hostspec Command Line Interface
* -------------------------------
*
* Git-style subcommands on top of clap:
*
* hostspec
* ├── list                          // every host spec in the catalog
* ├── show <name>                   // one host spec, as JSON
* ├── assign                        // pin guest cores on a hypervisor
* │   ├── --hypervisor <name>
* │   ├── --guest <name>...         // repeat, order matters
* │   ├── --numa-node <cpulist>...  // optional ad-hoc topology override
* │   ├── --strict                  // reject polite/greedy core sharing
* │   └── --json
* └── init [--force]                // write config/default.toml + catalog.toml
*
* Usage:
* ------
* ```bash
* hostspec assign --hypervisor sm_2023_1_hypervisor --guest g_2023_1 --guest c_2023_1
* ```
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::allocation::{Allocator, CoreAllocation};
use crate::catalog::{Catalog, HostSpecEntry};
use crate::config::{generate_default_config, Settings};
use crate::spec::{AllocationStrategy, CoreId};
use crate::utils::{format_cpulist, parse_cpulist};
use crate::with_context;

#[derive(Parser)]
#[command(name = "hostspec")]
#[command(about = "NUMA-aware CPU pinning for hypervisor guests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List host specs in the catalog
    List,
    /// Print a host spec as JSON
    Show { name: String },
    /// Assign hypervisor cores to guests
    Assign {
        #[arg(long)]
        hypervisor: String,
        /// Guest spec name, repeat once per guest
        #[arg(short, long = "guest", required = true)]
        guests: Vec<String>,
        /// Replace the hypervisor's NUMA map, one cpulist per node
        #[arg(long = "numa-node", value_name = "CPULIST")]
        numa_nodes: Vec<String>,
        /// Fail if polite and greedy guests would share cores
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        json: bool,
    },
    /// Generate default configuration and catalog
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
struct GuestAssignment<'a> {
    guest: &'a str,
    strategy: AllocationStrategy,
    cores: &'a [CoreId],
}

pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::new_from_file(path),
        None => Settings::new(),
    };
    settings.context("Failed to load configuration")
}

pub fn load_catalog(settings: &Settings) -> Result<Catalog> {
    match &settings.catalog.path {
        Some(path) if path.exists() => Catalog::builtin_with_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display())),
        Some(path) => {
            warn!("Catalog file {} not found, using built-in specs", path.display());
            Ok(Catalog::builtin())
        }
        None => Ok(Catalog::builtin()),
    }
}

pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::List => handle_list_command(&load_catalog(&settings)?),
        Commands::Show { name } => handle_show_command(&load_catalog(&settings)?, &name),
        Commands::Assign {
            hypervisor,
            guests,
            numa_nodes,
            strict,
            json,
        } => {
            let catalog = load_catalog(&settings)?;
            let mut allocation = settings.allocation.clone();
            allocation.strict_isolation |= strict;
            let allocator = Allocator::new(allocation);
            handle_assign_command(&catalog, &allocator, &hypervisor, &guests, &numa_nodes, json)
                .await
        }
        Commands::Init { force } => handle_init_command(force),
    }
}

fn handle_list_command(catalog: &Catalog) -> Result<()> {
    println!("{}", "Host specs:".bold());
    for (name, entry) in catalog.hosts() {
        let cpus = entry.cpus();
        let role = match entry {
            HostSpecEntry::Hypervisor(_) => "hypervisor".cyan(),
            HostSpecEntry::Virtual(_) => "virtual".green(),
        };
        let detail = match entry {
            HostSpecEntry::Hypervisor(spec) => format!(
                "{} NUMA nodes, {} reserved/node",
                cpus.numa_nodes_count().unwrap_or(0),
                spec.cpus.reserved_cores_per_node
            ),
            HostSpecEntry::Virtual(spec) => format!("{}", spec.strategy()),
        };
        println!(
            "- {} [{}] {}x {} ({} cores) {}",
            name,
            role,
            cpus.cpu_count,
            cpus.cpu.name,
            cpus.cpu.cores,
            detail.dimmed()
        );
    }
    Ok(())
}

fn handle_show_command(catalog: &Catalog, name: &str) -> Result<()> {
    let entry = catalog.get_host_spec(name)?;
    println!("{}", serde_json::to_string_pretty(entry)?);
    Ok(())
}

async fn handle_assign_command(
    catalog: &Catalog,
    allocator: &Allocator,
    hypervisor: &str,
    guest_names: &[String],
    numa_nodes: &[String],
    json: bool,
) -> Result<()> {
    let mut h_spec = catalog.hypervisor(hypervisor)?.clone();
    if !numa_nodes.is_empty() {
        let numa_map = numa_nodes
            .iter()
            .map(|cpulist| parse_cpulist(cpulist))
            .collect::<Result<Vec<_>>>()?;
        h_spec.cpus.base.numa_map = Some(numa_map);
        h_spec.cpus.base.validate()?;
        info!("Using {} NUMA nodes from the command line", numa_nodes.len());
    }
    let g_specs = catalog.guests(guest_names)?;

    let allocations: Vec<CoreAllocation> = with_context!(
        allocator.assign_concurrent(&h_spec, &g_specs).await,
        format!("assign cpus on {}", hypervisor)
    )?;

    let report: Vec<GuestAssignment<'_>> = guest_names
        .iter()
        .zip(&g_specs)
        .zip(&allocations)
        .map(|((guest, spec), cores)| GuestAssignment {
            guest,
            strategy: spec.strategy(),
            cores,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", "Allocations on".bold(), hypervisor.bold());
    for (index, assignment) in report.iter().enumerate() {
        println!(
            "#{} {} ({}): {} [{} cores]",
            index,
            assignment.guest,
            assignment.strategy,
            format_cpulist(assignment.cores).green(),
            assignment.cores.len()
        );
    }
    Ok(())
}

fn handle_init_command(force: bool) -> Result<()> {
    let config_dir = PathBuf::from("config");
    if config_dir.exists() && !force {
        error!("Configuration directory already exists. Use --force to overwrite.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    let default_config = generate_default_config();
    write_file(
        &config_dir.join("default.toml"),
        &toml::to_string_pretty(&default_config)?,
    )?;
    write_file(
        &config_dir.join("catalog.toml"),
        &Catalog::builtin().to_toml_string()?,
    )?;

    println!("{} Default configuration generated", "✓".green());
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}
