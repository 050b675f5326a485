use anyhow::Result;

use super::{load_config, run};

pub fn compose(config: &str, tenants: &[String], output: Option<&str>) -> Result<()> {
    let config = load_config(config)?;
    let composition = run(&config, tenants)?;
    let json = composition.graph.to_json()?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)?;
            println!(
                "✓ Wrote {} nodes to {path} (fingerprint {})",
                composition.graph.len(),
                composition.graph.fingerprint()?
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tenantgrid_core::TenantGridConfig;
    use tenantgrid_graph::DeploymentGraph;

    fn write_scaffold(dir: &std::path::Path) -> String {
        let path = dir.join("tenantgrid.toml");
        fs::write(&path, TenantGridConfig::scaffold().to_toml_string().unwrap()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_compose_writes_graph_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_scaffold(dir.path());
        let output = dir.path().join("graph.json");

        compose(&config, &[], Some(output.to_str().unwrap())).unwrap();

        let graph = DeploymentGraph::from_json(&fs::read_to_string(&output).unwrap()).unwrap();
        assert!(graph.is_acyclic());
        assert!(graph.len() > 10);
    }

    #[test]
    fn test_compose_subset_only_contains_selected_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_scaffold(dir.path());
        let output = dir.path().join("graph.json");

        compose(&config, &["tenant-c".to_string()], Some(output.to_str().unwrap())).unwrap();

        let json = fs::read_to_string(&output).unwrap();
        assert!(json.contains("namespace/_cluster/tenant-c"));
        assert!(!json.contains("namespace/_cluster/tenant-b"));
    }

    #[test]
    fn test_compose_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = compose(missing.to_str().unwrap(), &[], None).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }
}
