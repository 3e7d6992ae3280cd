//! Taskhub access CLI
//!
//! Resolves facility roles against the Taskhub API and evaluates the
//! permission matrix.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use taskhub_access::permissions::permissions_for;
use taskhub_access::{
    Config, HttpFacilityApi, Permission, Resolution, Role, RoleHandle, RoleResolver, TtlCache,
};

/// Facility role and permission tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a user's role in a facility and list its permissions.
    Resolve {
        #[arg(long)]
        facility: String,
        #[arg(long)]
        user: String,
        /// Print the resolution as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Exit 0 if the user holds the permission, 1 otherwise.
    Check {
        #[arg(long)]
        facility: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        permission: Permission,
    },

    /// Re-resolve on an interval, serving from cache while entries are fresh.
    Watch {
        #[arg(long)]
        facility: String,
        #[arg(long)]
        user: String,
        /// Seconds between resolutions.
        #[arg(long, default_value = "5")]
        interval: u64,
        /// Stop after this many resolutions (default: run forever).
        #[arg(long)]
        count: Option<u64>,
    },

    /// Print the role/permission matrix.
    Matrix,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    if let Command::Matrix = cli.command {
        print_matrix();
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::from_env().context("failed to load configuration")?;
    info!(api_url = %config.api_url, "configuration loaded");

    let mut api = HttpFacilityApi::new(
        &config.api_url,
        config.api_token.clone(),
        config.http_timeout,
    )
    .context("failed to build API client")?;
    if let Some(user_id) = &config.api_user_id {
        api = api.with_principal(user_id.as_str());
    }
    let cache = TtlCache::new(config.cache_max_entries);
    let resolver = RoleResolver::new(Arc::new(api), cache, config.resolver_config());

    match cli.command {
        Command::Resolve {
            facility,
            user,
            json,
        } => {
            let handle = RoleHandle::new(resolver, facility, Some(user))?;
            let resolution = handle.refresh().await.unwrap_or_else(|| handle.snapshot());
            if json {
                println!("{}", serde_json::to_string_pretty(&resolution)?);
            } else {
                print_resolution(&resolution);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check {
            facility,
            user,
            permission,
        } => {
            let handle = RoleHandle::new(resolver, facility, Some(user))?;
            handle.refresh().await;
            let granted = handle.gate().can(permission);
            println!("{permission}: {}", if granted { "granted" } else { "denied" });
            Ok(if granted {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Watch {
            facility,
            user,
            interval,
            count,
        } => {
            let sweeper = resolver.cache().spawn_sweeper(config.cache_sweep_interval);
            let handle = RoleHandle::new(resolver.clone(), facility, Some(user))?;
            let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
            let mut runs = 0u64;

            loop {
                ticker.tick().await;
                if let Some(resolution) = handle.refresh().await {
                    print_resolution(&resolution);
                }
                runs += 1;
                if count.is_some_and(|c| runs >= c) {
                    break;
                }
            }

            let stats = resolver.cache().stats();
            info!(
                hits = stats.hits,
                misses = stats.misses,
                entries = stats.entries,
                "cache statistics"
            );
            sweeper.stop().await;
            Ok(ExitCode::SUCCESS)
        }
        Command::Matrix => Ok(ExitCode::SUCCESS),
    }
}

fn print_resolution(resolution: &Resolution) {
    let role = resolution.role.map_or("-", |r| r.as_str());
    let source = resolution
        .source
        .map_or_else(|| "-".to_string(), |s| format!("{s:?}").to_lowercase());
    println!(
        "role: {role}  status: {:?}  source: {source}",
        resolution.status
    );
    if let Some(error) = &resolution.error {
        println!("error: {error}");
    }
    if let Some(role) = resolution.role {
        let perms: Vec<&str> = permissions_for(role).iter().map(|p| p.as_str()).collect();
        println!("permissions: {}", perms.join(", "));
    }
}

fn print_matrix() {
    print!("{:<22}", "PERMISSION");
    for role in Role::ALL {
        print!(" {:<8}", role.as_str());
    }
    println!();
    println!("{}", "-".repeat(22 + 9 * Role::ALL.len()));

    for permission in Permission::ALL {
        print!("{:<22}", permission.as_str());
        for role in Role::ALL {
            let mark = if permissions_for(role).contains(&permission) {
                "x"
            } else {
                ""
            };
            print!(" {mark:<8}");
        }
        println!();
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,taskhub_access=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
