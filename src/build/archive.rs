//! ZIP packaging of the built binary
//!
//! The `package` trait bundles the binary and the configured dist files into
//! a single archive, everything nested under a directory named like the
//! archive itself:
//!
//! ```text
//! tool-v1.2.3-windows-amd64.zip
//! └── tool-v1.2.3-windows-amd64/
//!     ├── README.md
//!     ├── LICENSE
//!     └── tool.exe
//! ```
//!
//! Without a known version the archive is just `tool.zip`.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::config::BuildConfig;
use crate::error::{hints, GobuError};
use crate::utils::terminal::create_progress_bar;

/// Everything the packager needs to know about one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Binary name without platform suffix
    pub binary: String,
    /// Version string, empty when unknown
    pub version: String,
    /// Target OS in Go naming
    pub os: String,
    /// Target architecture in Go naming
    pub arch: String,
    /// Globs of extra files, relative to the package directory
    pub patterns: Vec<String>,
}

impl PackageSpec {
    /// Take naming and target from a build configuration
    pub fn from_config(config: &BuildConfig, patterns: Vec<String>) -> Self {
        Self {
            binary: config.binary_name(),
            version: config.version().to_string(),
            os: config.target_os().to_string(),
            arch: config.target_arch().to_string(),
            patterns,
        }
    }

    /// `<binary>-<version>-<os>-<arch>`, or `<binary>` without a version
    pub fn archive_stem(&self) -> String {
        if self.version.is_empty() {
            self.binary.clone()
        } else {
            format!("{}-{}-{}-{}", self.binary, self.version, self.os, self.arch)
        }
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.archive_stem())
    }

    /// Binary file name on the target OS
    pub fn binary_file(&self) -> String {
        if self.os == "windows" {
            format!("{}.exe", self.binary)
        } else {
            self.binary.clone()
        }
    }
}

/// Resolve the files to bundle, relative to `dir`.
///
/// Invalid globs and globs without matches are skipped, as are matches outside
/// `dir`. The binary is always last and must exist.
pub fn collect_files(spec: &PackageSpec, dir: &Path) -> Result<Vec<PathBuf>> {
    let archive_name = spec.archive_name();
    let binary = PathBuf::from(spec.binary_file());
    let base = glob::Pattern::escape(&dir.to_string_lossy());

    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for pattern in &spec.patterns {
        let full = format!("{}/{}", base, pattern);
        let Ok(paths) = glob::glob(&full) else {
            continue;
        };
        for path in paths.filter_map(|p| p.ok()) {
            if !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            if relative.components().any(|c| c == Component::ParentDir) {
                continue;
            }
            let relative = relative.to_path_buf();
            if relative == binary || relative.as_os_str() == archive_name.as_str() {
                continue;
            }
            if seen.insert(relative.clone()) {
                files.push(relative);
            }
        }
    }

    if !dir.join(&binary).is_file() {
        return Err(GobuError::package_error(
            format!("binary '{}' not found", binary.display()),
            Some(hints::binary_not_found(&spec.binary_file())),
        )
        .into());
    }
    files.push(binary);

    Ok(files)
}

/// Create the distribution archive in `dir` and return its path
pub fn create_package(spec: &PackageSpec, dir: &Path) -> Result<PathBuf> {
    let files = collect_files(spec, dir)?;
    let stem = spec.archive_stem();
    let archive_path = dir.join(spec.archive_name());

    let file = File::create(&archive_path)
        .with_context(|| format!("Failed to create archive: {}", archive_path.display()))?;
    let mut zip = ZipWriter::new(file);

    let pb = create_progress_bar(files.len() as u64, "Packaging");
    for relative in &files {
        let source = dir.join(relative);
        let entry = format!("{}/{}", stem, relative.to_string_lossy().replace('\\', "/"));

        zip.start_file(entry.as_str(), file_options(&source))
            .with_context(|| format!("Failed to start file in archive: {}", entry))?;
        let mut input = File::open(&source)
            .with_context(|| format!("Failed to open file: {}", source.display()))?;
        std::io::copy(&mut input, &mut zip)
            .with_context(|| format!("Failed to write file to archive: {}", entry))?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    zip.finish().context("Failed to finish ZIP archive")?;
    Ok(archive_path)
}

fn file_options(source: &Path) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(source) {
            return options.unix_permissions(metadata.permissions().mode());
        }
    }
    #[cfg(not(unix))]
    let _ = source;

    options
}

/// Entry names stored in an archive, in archive order
pub fn archive_entries(archive_path: &Path) -> Result<Vec<String>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut zip = ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", archive_path.display()))?;

    let mut names = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        names.push(zip.by_index(i)?.name().to_string());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn spec(version: &str, os: &str) -> PackageSpec {
        PackageSpec {
            binary: "tool".to_string(),
            version: version.to_string(),
            os: os.to_string(),
            arch: "amd64".to_string(),
            patterns: vec!["README*".to_string(), "LICENSE".to_string()],
        }
    }

    #[test]
    fn test_archive_naming() {
        let s = spec("v1.2.3", "windows");
        assert_eq!(s.archive_name(), "tool-v1.2.3-windows-amd64.zip");
        assert_eq!(s.binary_file(), "tool.exe");

        let s = spec("", "linux");
        assert_eq!(s.archive_name(), "tool.zip");
        assert_eq!(s.binary_file(), "tool");
    }

    #[test]
    fn test_create_windows_package() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("tool.exe"), b"MZ binary").unwrap();
        fs::write(dir.join("README.md"), "# tool").unwrap();
        fs::write(dir.join("LICENSE"), "MIT").unwrap();
        fs::write(dir.join("main.go"), "package main").unwrap();

        let archive = create_package(&spec("v1.2.3", "windows"), dir).unwrap();
        assert_eq!(archive, dir.join("tool-v1.2.3-windows-amd64.zip"));

        let entries = archive_entries(&archive).unwrap();
        assert_eq!(
            entries,
            vec![
                "tool-v1.2.3-windows-amd64/README.md",
                "tool-v1.2.3-windows-amd64/LICENSE",
                "tool-v1.2.3-windows-amd64/tool.exe",
            ]
        );

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name("tool-v1.2.3-windows-amd64/tool.exe")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "MZ binary");
    }

    #[test]
    fn test_package_without_version() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("tool"), b"\x7fELF").unwrap();

        let archive = create_package(&spec("", "linux"), dir).unwrap();
        assert_eq!(archive, dir.join("tool.zip"));
        assert_eq!(archive_entries(&archive).unwrap(), vec!["tool/tool"]);
    }

    #[test]
    fn test_missing_binary_is_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("README"), "readme").unwrap();

        let err = create_package(&spec("v1", "linux"), temp_dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GobuError>(),
            Some(GobuError::Package { .. })
        ));
        assert!(!temp_dir.path().join("tool-v1-linux-amd64.zip").exists());
    }

    #[test]
    fn test_collect_files_skips_duplicates_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("tool"), b"bin").unwrap();
        fs::write(dir.join("README.md"), "readme").unwrap();
        fs::create_dir_all(dir.join("docs")).unwrap();
        fs::write(dir.join("docs").join("guide.md"), "guide").unwrap();

        let mut s = spec("v1", "linux");
        s.patterns = vec![
            "README*".to_string(),
            "*".to_string(),
            "docs/*.md".to_string(),
            "[".to_string(),
            "missing*".to_string(),
        ];
        let files = collect_files(&s, dir).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("docs").join("guide.md"),
                PathBuf::from("tool"),
            ]
        );
    }

    #[test]
    fn test_collect_files_stays_inside_package_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("project");
        fs::create_dir_all(&dir).unwrap();
        fs::write(temp_dir.path().join("outside.txt"), "secret").unwrap();
        fs::write(dir.join("tool"), b"bin").unwrap();
        fs::write(dir.join("NOTES.txt"), "notes").unwrap();

        let mut s = spec("v1", "linux");
        s.patterns = vec![
            "../outside.txt".to_string(),
            "../project/NOTES.txt".to_string(),
            "../*.txt".to_string(),
        ];
        let files = collect_files(&s, &dir).unwrap();
        assert_eq!(files, vec![PathBuf::from("tool")]);

        let archive = create_package(&s, &dir).unwrap();
        let entries = archive_entries(&archive).unwrap();
        assert!(entries.iter().all(|e| !e.contains("..")));
    }

    #[cfg(unix)]
    #[test]
    fn test_binary_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let binary = temp_dir.path().join("tool");
        fs::write(&binary, b"bin").unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();

        let archive = create_package(&spec("", "linux"), temp_dir.path()).unwrap();
        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let entry = zip.by_name("tool/tool").unwrap();
        assert_eq!(entry.unix_mode().map(|m| m & 0o777), Some(0o755));
    }
}
