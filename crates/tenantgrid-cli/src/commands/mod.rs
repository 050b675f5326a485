pub mod compose;
pub mod diff;
pub mod init;
pub mod plan;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tenantgrid_core::TenantGridConfig;
use tenantgrid_graph::{Composition, Rejection, compose_subset};
use tracing::debug;

pub fn load_config(path: &str) -> Result<TenantGridConfig> {
    let config = TenantGridConfig::from_file(Path::new(path))
        .with_context(|| format!("failed to load config {path}"))?;
    debug!(
        path,
        tenants = config.tenants.len(),
        policy_version = %config.policy.version,
        "loaded config"
    );
    Ok(config)
}

/// Compose the whole roster, or only `tenants` when any are given.
///
/// Rejections are printed to stderr; an aborted run becomes an error.
pub fn run(config: &TenantGridConfig, tenants: &[String]) -> Result<Composition> {
    let result = if tenants.is_empty() {
        tenantgrid_graph::compose(config)
    } else {
        let selectors: Vec<&str> = tenants.iter().map(String::as_str).collect();
        compose_subset(config, &selectors)
    };

    match result {
        Ok(composition) => {
            print_rejections(&composition.rejected);
            Ok(composition)
        }
        Err(aborted) => {
            print_rejections(&aborted.rejected);
            Err(anyhow!(aborted))
        }
    }
}

pub fn print_rejections(rejected: &[Rejection]) {
    for rejection in rejected {
        eprintln!("✗ {}: {}", rejection.tenant, rejection.error);
    }
}
