//! Search compiler CLI
//!
//! Compiles one FHIR search query string and prints its canonical form, or
//! the issues that reject it.
//!
//! # Usage
//!
//! ```bash
//! # Type-level search against the embedded R4 registry
//! search-compile -t Patient '_has:Procedure:subject:status=completed&name=Smith'
//!
//! # Tenant policies and extra SearchParameter definitions
//! search-compile --registry extra-params.json --policies tenants.json \
//!     --tenant tenant7 -t Patient 'multiple-birth-count=eq2,eq3'
//!
//! # System-level search
//! search-compile '_id=abc'
//! ```
//!
//! # Environment Variables
//!
//! - `SEARCH_REGISTRY` - Additional registry document or SearchParameter JSON
//! - `SEARCH_POLICIES` - Tenant policy file
//! - `SEARCH_TENANT` - Tenant id (default: the configured default tenant)
//! - `SEARCH_LOG_LEVEL` - Log level (default: warn)
//! - `SEARCH_MAX_CHAIN_DEPTH`, `SEARCH_DEFAULT_TENANT`, `SEARCH_AGGREGATE_ERRORS`
//!   - see [`CompilerConfig`]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use helios_search_compiler::{
    CompilerConfig, RawQuery, SearchParameterLoader, SearchService, TenantId, TenantPolicies,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Compile a FHIR search query.
#[derive(Debug, Parser)]
#[command(name = "search-compile")]
#[command(about = "Validate and canonicalize FHIR search parameters")]
struct Args {
    /// Registry document or SearchParameter JSON layered over the embedded R4 registry.
    #[arg(long, env = "SEARCH_REGISTRY")]
    registry: Option<PathBuf>,

    /// Tenant policy file.
    #[arg(long, env = "SEARCH_POLICIES")]
    policies: Option<PathBuf>,

    /// Tenant id.
    #[arg(long, env = "SEARCH_TENANT")]
    tenant: Option<String>,

    /// Searched resource type; omit for a system-level search.
    #[arg(short = 't', long)]
    resource_type: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "SEARCH_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// The query string, with or without a leading `?`.
    query: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_search_compiler={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_service(args: &Args) -> anyhow::Result<SearchService> {
    let loader = SearchParameterLoader::new();
    let mut builder = loader.embedded_builder()?;
    if let Some(path) = &args.registry {
        loader
            .load_file(path, &mut builder)
            .with_context(|| format!("loading registry {}", path.display()))?;
    }
    let registry = builder.build()?;

    let policies = match &args.policies {
        Some(path) => TenantPolicies::load_file(path)
            .with_context(|| format!("loading policies {}", path.display()))?,
        None => TenantPolicies::new(),
    };

    Ok(SearchService::new(registry, policies, CompilerConfig::from_env())?)
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let service = build_service(&args)?;
    let tenant = args.tenant.as_deref().map(TenantId::new);
    let query = RawQuery::from_query_string(&args.query);
    info!(
        resource_type = args.resource_type.as_deref().unwrap_or("(system)"),
        keys = query.groups().len(),
        "Compiling search"
    );

    match service.compile(tenant.as_ref(), args.resource_type.as_deref(), &query) {
        Ok(compiled) => {
            let pairs = compiled.to_query_pairs();
            if args.json {
                let pairs: Vec<_> = pairs
                    .iter()
                    .map(|(key, value)| serde_json::json!({ "name": key, "value": value }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "parameters": pairs }))?);
            } else {
                for (key, value) in pairs {
                    println!("{}={}", key, value);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(errors) => {
            if args.json {
                let outcome = serde_json::json!({
                    "resourceType": "OperationOutcome",
                    "status": errors.http_status(),
                    "issue": errors.issues(),
                });
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                for error in errors.errors() {
                    eprintln!("error [{}]: {}", error.http_status(), error);
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
