//! Removal of archived product files.
//!
//! The product is first renamed into a fresh `.remove-*` directory next to
//! it, and that directory is then deleted with everything in it. A failed
//! rename leaves the product where it was.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::CoreError;

/// The parts of a product that locate its file.
#[derive(Debug, Clone)]
pub struct ProductFile {
    pub uuid: Uuid,
    pub product_name: String,
    pub archive_path: Option<String>,
    pub physical_name: String,
}

impl ProductFile {
    /// `archive_path / physical_name`, absent without an archive path.
    pub fn product_path(&self) -> Option<PathBuf> {
        self.archive_path
            .as_ref()
            .map(|dir| Path::new(dir).join(&self.physical_name))
    }
}

/// Remove the product file under `root`. Returns whether anything was removed.
///
/// Nothing happens without a root, without an archive path, or when the
/// path does not exist (a dangling symlink still counts as existing).
pub fn remove_product_file(root: Option<&Path>, product: &ProductFile) -> Result<bool, CoreError> {
    let Some(root) = root else {
        return Ok(false);
    };
    let Some(relative) = product.product_path() else {
        return Ok(false);
    };
    let path = root.join(relative);
    if path.symlink_metadata().is_err() {
        return Ok(false);
    }

    move_and_delete(&path, product).map_err(|err| {
        tracing::error!(
            uuid = %product.uuid,
            path = %path.display(),
            error = %err,
            "Product file removal failed"
        );
        CoreError::BadRequest(format!(
            "unable to remove product '{}' ({}) [{}]",
            product.product_name, product.uuid, err
        ))
    })?;

    tracing::info!(uuid = %product.uuid, path = %path.display(), "Product file removed");
    Ok(true)
}

fn move_and_delete(path: &Path, product: &ProductFile) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "product path has no file name"))?;

    let staging = tempfile::Builder::new()
        .prefix(".remove-")
        .suffix(&format!("-{}", product.uuid.simple()))
        .tempdir_in(parent)?;

    std::fs::rename(path, staging.path().join(file_name))?;
    staging.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn product(archive_path: Option<&str>, physical_name: &str) -> ProductFile {
        ProductFile {
            uuid: Uuid::new_v4(),
            product_name: "name".into(),
            archive_path: archive_path.map(str::to_string),
            physical_name: physical_name.into(),
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn no_root_no_action() {
        assert!(!remove_product_file(None, &product(Some("a"), "b")).unwrap());
    }

    #[test]
    fn no_archive_path_no_action() {
        let root = tempfile::tempdir().unwrap();
        assert!(!remove_product_file(Some(root.path()), &product(None, "b")).unwrap());
    }

    #[test]
    fn missing_file_no_action() {
        let root = tempfile::tempdir().unwrap();
        assert!(!remove_product_file(Some(root.path()), &product(Some("a"), "b.dat")).unwrap());
    }

    #[test]
    fn removes_file_and_staging_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("2020/01");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("p.dat"), b"data").unwrap();
        fs::write(dir.join("other.dat"), b"keep").unwrap();

        let removed = remove_product_file(Some(root.path()), &product(Some("2020/01"), "p.dat")).unwrap();

        assert!(removed);
        assert_eq!(entries(&dir), vec!["other.dat".to_string()]);
    }

    #[test]
    fn removes_directory_products() {
        let root = tempfile::tempdir().unwrap();
        let product_dir = root.path().join("a/p");
        fs::create_dir_all(product_dir.join("inner")).unwrap();
        fs::write(product_dir.join("inner/x"), b"x").unwrap();

        assert!(remove_product_file(Some(root.path()), &product(Some("a"), "p")).unwrap());
        assert!(entries(&root.path().join("a")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn removes_dangling_symlink() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("a")).unwrap();
        std::os::unix::fs::symlink(root.path().join("missing"), root.path().join("a/p")).unwrap();

        assert!(remove_product_file(Some(root.path()), &product(Some("a"), "p")).unwrap());
        assert!(entries(&root.path().join("a")).is_empty());
    }
}
