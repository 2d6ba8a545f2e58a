//! Per-invocation prover workspaces.
//!
//! Each proving run gets a fresh temporary directory holding the embedded
//! guest-project template with the emitted assembly written to
//! `src/risc.asm`. The directory is removed when the workspace is dropped,
//! panic paths included.

use crate::{ProverError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Embedded guest-project template. The manifest is stored with a `.tmpl`
/// suffix so the host workspace's cargo never picks it up.
const TEMPLATE_FILES: &[(&str, &str)] = &[
    ("Cargo.toml", include_str!("../template/Cargo.toml.tmpl")),
    ("openvm.toml", include_str!("../template/openvm.toml")),
    ("src/main.rs", include_str!("../template/main.rs")),
];

/// Relative path the toolchain expects the assembly at.
pub const ASSEMBLY_PATH: &str = "src/risc.asm";

/// A materialized guest project in a temporary directory.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Extract the template and write `assembly` into it.
    pub fn create(assembly: &str) -> Result<Self> {
        let dir = TempDir::with_prefix("zevm-prover-")
            .map_err(|err| ProverError::Setup(err.to_string()))?;

        for (rel, content) in TEMPLATE_FILES {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
        }
        fs::write(dir.path().join(ASSEMBLY_PATH), assembly)?;

        debug!(root = %dir.path().display(), "prover workspace ready");
        Ok(Self { dir })
    }

    /// Root directory of the guest project.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a file inside the workspace.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_extraction() {
        let workspace = Workspace::create("\tnop\n").unwrap();
        assert!(workspace.join("Cargo.toml").is_file());
        assert!(workspace.join("openvm.toml").is_file());
        assert!(workspace.join("src/main.rs").is_file());
        let asm = fs::read_to_string(workspace.join(ASSEMBLY_PATH)).unwrap();
        assert_eq!(asm, "\tnop\n");
        // The extracted manifest carries its real name.
        let manifest = fs::read_to_string(workspace.join("Cargo.toml")).unwrap();
        assert!(manifest.contains("name = \"prover\""));
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = {
            let workspace = Workspace::create("").unwrap();
            workspace.root().to_path_buf()
        };
        assert!(!root.exists());
    }
}
