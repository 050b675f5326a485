use anyhow::Result;
use tenantgrid_graph::{DeploymentGraph, DryRunExecutor, ResourceGraphExecutor};

use super::{load_config, run};

pub fn plan(config: &str, tenants: &[String], format: &str) -> Result<()> {
    let config = load_config(config)?;
    let composition = run(&config, tenants)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&composition.graph.apply_waves())?),
        _ => print!("{}", format_plan(&composition.graph)?),
    }

    Ok(())
}

/// Human-readable wave listing followed by a dry-run summary.
pub fn format_plan(graph: &DeploymentGraph) -> Result<String> {
    let mut out = String::new();
    for (index, wave) in graph.apply_waves().iter().enumerate() {
        out.push_str(&format!("wave {index} ({} nodes)\n", wave.len()));
        for key in wave {
            out.push_str(&format!("  {key}\n"));
        }
    }

    let report = DryRunExecutor.apply(graph);
    out.push_str(&format!(
        "{} nodes planned in {} waves, fingerprint {}\n",
        report.succeeded().count(),
        report.waves,
        graph.fingerprint()?
    ));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgrid_core::TenantGridConfig;

    #[test]
    fn test_plan_lists_namespaces_first() {
        let graph = tenantgrid_graph::compose(&TenantGridConfig::scaffold())
            .unwrap()
            .graph;
        let text = format_plan(&graph).unwrap();

        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("wave 0"));
        let wave0: Vec<&str> = lines.take_while(|l| l.starts_with("  ")).collect();
        assert!(wave0.contains(&"  namespace/_cluster/basic-pool"));
        assert!(wave0.iter().all(|l| !l.contains("workload/")));
        assert!(text.contains(&format!("{} nodes planned", graph.len())));
    }
}
