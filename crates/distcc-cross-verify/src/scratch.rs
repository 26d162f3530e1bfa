//! Scratch directory handling for the compile smoke test
//!
//! The scratch directory is wiped and recreated before every use so repeated
//! verification runs start from the same state.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tar::Archive;

/// Remove `dir` if present and recreate it empty
pub fn reset(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Archive layouts the compile check can unpack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarZst,
}

impl ArchiveFormat {
    /// Detect the format from the file name; None for anything else
    pub fn from_path(archive: &Path) -> Option<Self> {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Some(ArchiveFormat::TarZst)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }
}

/// Unpack a `.tar` or `.tar.zst` archive into `dest`
pub fn unpack(archive: &Path, dest: &Path) -> io::Result<()> {
    let format = ArchiveFormat::from_path(archive).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "unsupported archive format (expected .tar or .tar.zst)",
        )
    })?;
    let file = fs::File::open(archive)?;
    match format {
        ArchiveFormat::Tar => unpack_from(Archive::new(file), dest),
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::Decoder::new(file)?;
            unpack_from(Archive::new(decoder), dest)
        }
    }
}

fn unpack_from<R: Read>(mut archive: Archive<R>, dest: &Path) -> io::Result<()> {
    archive.set_preserve_permissions(true);
    archive.unpack(dest)
}

/// Directory to run make in after unpacking
///
/// A tarball holding a single top-level directory yields that directory,
/// anything else yields `dest` itself.
pub fn project_root(dest: &Path) -> io::Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(dest)?.collect::<Result<_, _>>()?;
    if let [only] = entries.as_slice() {
        if only.file_type()?.is_dir() {
            return Ok(only.path());
        }
    }
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_project_tar(path: &Path, top: Option<&str>) {
        let file = fs::File::create(path).unwrap();
        append_project(tar::Builder::new(file), top);
    }

    fn append_project<W: std::io::Write>(mut builder: tar::Builder<W>, top: Option<&str>) -> W {
        let prefix = top.map(|t| format!("{}/", t)).unwrap_or_default();
        let body = b"test:\n\ttrue\nclean:\n\ttrue\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}Makefile", prefix), &body[..])
            .unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_reset_wipes_existing_contents() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        fs::create_dir_all(scratch.join("stale")).unwrap();
        fs::write(scratch.join("stale/file.o"), b"old").unwrap();

        reset(&scratch).unwrap();

        assert!(scratch.is_dir());
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn test_reset_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("a/b/c");
        reset(&scratch).unwrap();
        assert!(scratch.is_dir());
    }

    #[test]
    fn test_archive_format_detection() {
        assert_eq!(ArchiveFormat::from_path(Path::new("project.tar")), Some(ArchiveFormat::Tar));
        assert_eq!(
            ArchiveFormat::from_path(Path::new("/tmp/project.TAR.ZST")),
            Some(ArchiveFormat::TarZst)
        );
        assert_eq!(ArchiveFormat::from_path(Path::new("project.tgz")), None);
    }

    #[test]
    fn test_unpack_zstd_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("project.tar.zst");
        let encoder = zstd::stream::Encoder::new(fs::File::create(&archive).unwrap(), 3).unwrap();
        append_project(tar::Builder::new(encoder), Some("hello"))
            .finish()
            .unwrap();
        let dest = dir.path().join("out");
        reset(&dest).unwrap();

        unpack(&archive, &dest).unwrap();

        assert!(dest.join("hello/Makefile").is_file());
    }

    #[test]
    fn test_unpack_rejects_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("project.tar.gz");
        fs::write(&archive, b"not really gzip").unwrap();
        let dest = dir.path().join("out");
        reset(&dest).unwrap();

        let err = unpack(&archive, &dest).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_unpack_single_top_level_dir() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("project.tar");
        write_project_tar(&archive, Some("hello"));
        let dest = dir.path().join("out");
        reset(&dest).unwrap();

        unpack(&archive, &dest).unwrap();

        let root = project_root(&dest).unwrap();
        assert_eq!(root, dest.join("hello"));
        assert!(root.join("Makefile").is_file());
    }

    #[test]
    fn test_unpack_flat_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("project.tar");
        write_project_tar(&archive, None);
        let dest = dir.path().join("out");
        reset(&dest).unwrap();

        unpack(&archive, &dest).unwrap();

        assert_eq!(project_root(&dest).unwrap(), dest);
    }
}
