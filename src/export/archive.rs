//! Distribution archives.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder;
use walkdir::WalkDir;

use crate::util::fs::{ensure_dir, relative_path};

/// Write `<parent>/<dir_name>` into a gzipped tarball at `out`.
///
/// Entries are rooted at `dir_name/` and added in sorted order, so the same
/// tree always produces the same entry list.
pub fn write_tgz(parent: &Path, dir_name: &str, out: &Path) -> Result<()> {
    let root = parent.join(dir_name);
    if let Some(dir) = out.parent() {
        ensure_dir(dir)?;
    }

    let file =
        File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let name = Path::new(dir_name).join(relative_path(&root, entry.path()));

        if entry.file_type().is_dir() {
            builder
                .append_dir(&name, entry.path())
                .with_context(|| format!("failed to archive {}", entry.path().display()))?;
        } else if entry.file_type().is_file() {
            builder
                .append_path_with_name(entry.path(), &name)
                .with_context(|| format!("failed to archive {}", entry.path().display()))?;
        }
    }

    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .with_context(|| format!("failed to finish {}", out.display()))?;
    Ok(())
}
