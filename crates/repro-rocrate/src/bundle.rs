//! Deterministic `.tar.gz` packing of a crate folder.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use tar::{Builder, Header};

use crate::error::{ArchiveError, ArchiveResult};

fn create_deterministic_tar<W: Write>(writer: W) -> Builder<GzEncoder<W>> {
    let encoder = GzBuilder::new()
        .mtime(0)
        .operating_system(255)
        .write(writer, Compression::best());

    let mut tar = Builder::new(encoder);
    tar.mode(tar::HeaderMode::Deterministic);
    tar
}

/// Append a file entry; paths over 100 bytes get a GNU long-name record.
fn write_entry<T: Write>(tar: &mut Builder<T>, path: &str, data: &[u8]) -> std::io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);

    tar.append_data(&mut header, path, data)
}

/// Pack `crate_dir` into `<crate_dir>.tar.gz` beside it.
///
/// Entries are stored as `<crate name>/<relative path>`, sorted, with zeroed
/// timestamps and ownership, so identical folders give identical bundles.
pub fn bundle_archive(crate_dir: &Path) -> ArchiveResult<PathBuf> {
    let crate_name = crate_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ArchiveError::UnnamedSource(crate_dir.to_path_buf()))?;
    let bundle_path = crate_dir.with_file_name(format!("{}.tar.gz", crate_name));

    let mut files = Vec::new();
    collect_files(crate_dir, crate_dir, &mut files)?;
    files.sort();

    let file = File::create(&bundle_path).map_err(|e| ArchiveError::write(&bundle_path, e))?;
    let mut tar = create_deterministic_tar(file);

    for relative in &files {
        let source = crate_dir.join(relative);
        let data = fs::read(&source).map_err(|e| ArchiveError::read(&source, e))?;
        let entry = format!("{}/{}", crate_name, relative);
        write_entry(&mut tar, &entry, &data).map_err(|e| ArchiveError::write(&bundle_path, e))?;
    }

    tar.into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| ArchiveError::write(&bundle_path, e))?;

    tracing::info!("Bundled {} files into {}", files.len(), bundle_path.display());
    Ok(bundle_path)
}

/// Relative, `/`-separated paths of every regular file under `dir`.
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> ArchiveResult<()> {
    for entry in fs::read_dir(dir).map_err(|e| ArchiveError::read(dir, e))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if path.is_file() {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| ArchiveError::read(&path, e))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            out.push(relative);
        }
    }
    Ok(())
}
