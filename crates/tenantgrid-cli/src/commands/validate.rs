use anyhow::{Result, bail};

use super::{load_config, run};

/// Compose the full roster and fail if any entry was rejected.
pub fn validate(config: &str) -> Result<()> {
    let config = load_config(config)?;
    let composition = run(&config, &[])?;

    let total = config.tenants.len();
    let rejected = composition.rejected.len();
    if rejected > 0 {
        bail!("{rejected} of {total} roster entries rejected");
    }

    println!(
        "✓ {total} roster entries compose into {} nodes (policy {})",
        composition.graph.len(),
        config.policy.version
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &std::path::Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_validate_accepts_good_roster() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "tenantgrid.toml",
            "[[tenants]]\ntier = \"basic\"\n\n[[tenants]]\ntenant_id = \"acme\"\ntier = \"advanced\"\n",
        );
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_counts_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "tenantgrid.toml",
            "[[tenants]]\ntier = \"basic\"\n\n[[tenants]]\ntier = \"advanced\"\n",
        );
        let err = validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 roster entries rejected");
    }

    #[test]
    fn test_validate_reads_json_roster() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "roster.json",
            r#"{"tenants": [{"tenant_id": "tenant-c", "tier": "premium"}]}"#,
        );
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_surfaces_abort() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "tenantgrid.toml",
            "[policy]\ntenant_tag_key = \"\"\n\n[[tenants]]\ntier = \"basic\"\n",
        );
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().starts_with("composition aborted"));
    }
}
