//! Archive extraction.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::{ConvertError, Result};

/// Supported archive containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
}

impl ArchiveKind {
    pub fn from_filename(name: &str) -> Option<Self> {
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }

    /// File name without the archive extension.
    pub fn strip_extension<'a>(&self, name: &'a str) -> &'a str {
        let suffixes: &[&str] = match self {
            ArchiveKind::Tar => &[".tar"],
            ArchiveKind::TarGz => &[".tar.gz", ".tgz"],
        };
        suffixes
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix))
            .unwrap_or(name)
    }
}

/// Unpack `archive_path` into `dest_dir`. Blocking.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let kind = ArchiveKind::from_filename(&name).ok_or_else(|| ConvertError::ExtractionFailed {
        archive: archive_path.to_path_buf(),
        message: "unsupported archive type".to_string(),
    })?;

    info!("Extracting {} to {}", name, dest_dir.display());

    let file = File::open(archive_path)
        .map_err(|e| ConvertError::io("opening archive", archive_path, e))?;
    let reader = BufReader::new(file);

    let unpacked = match kind {
        ArchiveKind::Tar => tar::Archive::new(reader).unpack(dest_dir),
        ArchiveKind::TarGz => {
            tar::Archive::new(flate2::read::GzDecoder::new(reader)).unpack(dest_dir)
        }
    };

    unpacked.map_err(|e| ConvertError::ExtractionFailed {
        archive: archive_path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_tar(path: &Path, dir_name: &str) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        for (name, body) in [
            ("inference.pdmodel", b"graph".as_slice()),
            ("inference.pdiparams", b"weights".as_slice()),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{dir_name}/{name}"), body)
                .unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn test_archive_kind() {
        assert_eq!(ArchiveKind::from_filename("a.tar"), Some(ArchiveKind::Tar));
        assert_eq!(ArchiveKind::from_filename("a.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_filename("a.tgz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_filename("a.zip"), None);
        assert_eq!(ArchiveKind::TarGz.strip_extension("a.tgz"), "a");
    }

    #[test]
    fn test_extract_tar() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("det_infer.tar");
        write_tar(&archive, "det_infer");

        extract_archive(&archive, temp_dir.path()).unwrap();

        let extracted = temp_dir.path().join("det_infer");
        assert!(extracted.join("inference.pdmodel").is_file());
        assert!(extracted.join("inference.pdiparams").is_file());
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.tar");
        std::fs::write(&archive, b"definitely not a tarball, but long enough to be read").unwrap();

        let result = extract_archive(&archive, temp_dir.path());
        assert!(matches!(result, Err(ConvertError::ExtractionFailed { .. })));
    }
}
