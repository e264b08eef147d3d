//! Subcommand implementations
//!
//! Each command returns its report as a string; `main` decides how to print it.

pub mod inspect;
pub mod layout;

use std::path::Path;

use anyhow::Context;
use heapscope_engine::DumpImage;

fn load_image(path: &Path) -> anyhow::Result<DumpImage> {
    log::debug!("loading image {}", path.display());
    DumpImage::from_file(path).with_context(|| format!("loading image {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heap.json");
        let mut image = DumpImage::new();
        image.set_type_size("address", 8);
        std::fs::write(&path, image.to_json().unwrap()).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.types().count(), 0);
        assert!(loaded.segments().is_empty());
    }

    #[test]
    fn test_load_image_names_path_on_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        let err = load_image(&path).unwrap_err();
        assert_eq!(err.to_string(), format!("loading image {}", path.display()));
    }
}
