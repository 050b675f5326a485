use anyhow::{Context, Result};
use tenantgrid_graph::{DeploymentGraph, GraphDiff};

use super::{load_config, run};

pub fn diff(config: &str, previous: &str, format: &str) -> Result<()> {
    let diff = compute(config, previous)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&diff)?),
        _ => print!("{diff}"),
    }

    Ok(())
}

fn compute(config: &str, previous: &str) -> Result<GraphDiff> {
    let json = std::fs::read_to_string(previous)
        .with_context(|| format!("failed to read previous graph {previous}"))?;
    let before = DeploymentGraph::from_json(&json)
        .with_context(|| format!("{previous} is not a deployment graph"))?;

    let config = load_config(config)?;
    let after = run(&config, &[])?.graph;
    Ok(GraphDiff::between(&before, &after))
}
