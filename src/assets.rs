use std::path::PathBuf;

/// Answers whether an image file is actually available to serve.
pub trait AssetCheck: Send + Sync {
    fn exists(&self, filename: &str) -> bool;
}

/// Images live on local disk under `root`, e.g. `root/real/cat.jpg`.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        AssetDir { root: root.into() }
    }
}

impl AssetCheck for AssetDir {
    fn exists(&self, filename: &str) -> bool {
        // Reject anything trying to climb out of the asset root.
        if filename.split('/').any(|part| part == "..") {
            return false;
        }
        self.root.join(filename).is_file()
    }
}

/// For deployments where a CDN serves every registered image.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllAssets;

impl AssetCheck for AllAssets {
    fn exists(&self, _filename: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_dir_checks_files() {
        let root = std::env::temp_dir().join(format!("realvsai_assets_{}", std::process::id()));
        std::fs::create_dir_all(root.join("real")).unwrap();
        std::fs::write(root.join("real/a.jpg"), b"jpg").unwrap();

        let assets = AssetDir::new(&root);
        assert!(assets.exists("real/a.jpg"));
        assert!(!assets.exists("real/missing.jpg"));
        assert!(!assets.exists("../real/a.jpg"));

        let _ = std::fs::remove_dir_all(&root);
    }
}
