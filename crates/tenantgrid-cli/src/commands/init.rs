use std::path::Path;

use anyhow::{Result, bail};
use tenantgrid_core::TenantGridConfig;

pub fn init(path: &str, force: bool) -> Result<()> {
    let output = Path::new(path).join("tenantgrid.toml");
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let config = TenantGridConfig::scaffold();
    std::fs::write(&output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path().to_str().unwrap(), false).unwrap();

        let config = TenantGridConfig::from_file(&dir.path().join("tenantgrid.toml")).unwrap();
        assert_eq!(config.tenants.len(), 3);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path().to_str().unwrap(), false).unwrap();
        let err = init(dir.path().to_str().unwrap(), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(init(dir.path().to_str().unwrap(), true).is_ok());
    }
}
