//! Purpose: Resolve the on-disk path of the version-pinned libyamlscript shared library.
//! Exports: `Locator`, `Platform`, `LIBYAMLSCRIPT_VERSION`, `library_filename`.
//! Role: Leaf component run before any native call; no dynamic loading happens here.
//! Invariants: Filenames are `libyamlscript.<ext>.<LIBYAMLSCRIPT_VERSION>`; other versions never match.
//! Invariants: Platform is checked before any filesystem access.
//! Invariants: Search order is `LD_LIBRARY_PATH`, `/usr/local/lib`, `$HOME/.local/lib`; first hit wins.
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

/// The one libyamlscript release this binding is built against.
pub const LIBYAMLSCRIPT_VERSION: &str = "0.1.69";

pub const LIBRARY_NAME: &str = "yamlscript";

pub const SEARCH_PATH_ENV: &str = "LD_LIBRARY_PATH";

const SYSTEM_LIB_DIR: &str = "/usr/local/lib";

const INSTALL_URL: &str = "https://yamlscript.org/install";
const INSTALL_DOCS_URL: &str = "https://github.com/yaml/yamlscript/wiki/Installing-YAMLScript";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Platform {
    Linux,
    MacOs,
}

impl Platform {
    pub fn current() -> Result<Self, Error> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS identifier as reported by `std::env::consts::OS`.
    pub fn from_os(os: &str) -> Result<Self, Error> {
        match os {
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::MacOs),
            other => Err(Error::new(ErrorKind::UnsupportedPlatform)
                .with_message(format!("unsupported platform '{other}' for yamlscript"))
                .with_hint("libyamlscript is only published for Linux and macOS.")),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Platform::Linux => "so",
            Platform::MacOs => "dylib",
        }
    }
}

pub fn library_filename(platform: Platform) -> String {
    format!(
        "lib{LIBRARY_NAME}.{}.{LIBYAMLSCRIPT_VERSION}",
        platform.extension()
    )
}

#[derive(Clone, Debug)]
pub struct Locator {
    os: String,
    search_dirs: Vec<PathBuf>,
}

impl Locator {
    /// A locator for the running OS with no search directories.
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            search_dirs: Vec::new(),
        }
    }

    /// A locator using the process environment for its search order.
    pub fn from_env() -> Self {
        let search_path = std::env::var_os(SEARCH_PATH_ENV);
        let home = std::env::var_os("HOME");
        Self::new().with_search_dirs(default_search_dirs(
            search_path.as_deref(),
            home.as_deref(),
        ))
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    pub fn with_search_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn push_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn platform(&self) -> Result<Platform, Error> {
        Platform::from_os(&self.os)
    }

    pub fn filename(&self) -> Result<String, Error> {
        self.platform().map(library_filename)
    }

    pub fn locate(&self) -> Result<PathBuf, Error> {
        let filename = self.filename()?;

        for dir in &self.search_dirs {
            let candidate = dir.join(&filename);
            tracing::debug!(candidate = %candidate.display(), "probing for libyamlscript");
            if candidate.is_file() {
                return absolute(&candidate);
            }
        }

        Err(not_found(&filename))
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn default_search_dirs(search_path: Option<&OsStr>, home: Option<&OsStr>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = search_path
        .map(|value| {
            std::env::split_paths(value)
                .filter(|dir| !dir.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default();
    dirs.push(PathBuf::from(SYSTEM_LIB_DIR));
    if let Some(home) = home.filter(|home| !home.is_empty()) {
        dirs.push(PathBuf::from(home).join(".local").join("lib"));
    }
    dirs
}

fn absolute(path: &Path) -> Result<PathBuf, Error> {
    std::path::absolute(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to resolve absolute library path")
            .with_path(path)
            .with_source(err)
    })
}

fn not_found(filename: &str) -> Error {
    Error::new(ErrorKind::LibraryNotFound)
        .with_message(format!("shared library file '{filename}' not found"))
        .with_hint(format!(
            "Try: curl {INSTALL_URL} | VERSION={LIBYAMLSCRIPT_VERSION} LIB=1 bash\n\
             See: {INSTALL_DOCS_URL}"
        ))
}

#[cfg(test)]
mod tests {
    use super::{
        LIBYAMLSCRIPT_VERSION, Locator, Platform, default_search_dirs, library_filename,
    };
    use crate::core::error::ErrorKind;
    use std::ffi::OsStr;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn touch(dir: &Path, name: &str) -> PathBuf {
        fs::create_dir_all(dir).expect("mkdir");
        let path = dir.join(name);
        fs::write(&path, b"").expect("write");
        path
    }

    #[test]
    fn filename_uses_platform_extension_and_exact_version() {
        assert_eq!(
            library_filename(Platform::Linux),
            format!("libyamlscript.so.{LIBYAMLSCRIPT_VERSION}")
        );
        assert_eq!(
            library_filename(Platform::MacOs),
            format!("libyamlscript.dylib.{LIBYAMLSCRIPT_VERSION}")
        );
    }

    #[test]
    fn default_matches_new_and_ignores_environment() {
        let locator = Locator::default();
        assert!(locator.search_dirs().is_empty());
        assert_eq!(
            locator.platform().ok(),
            Locator::new().platform().ok()
        );
        assert_eq!(
            locator.locate().expect_err("no dirs").kind(),
            if locator.platform().is_ok() {
                ErrorKind::LibraryNotFound
            } else {
                ErrorKind::UnsupportedPlatform
            }
        );
    }

    #[test]
    fn unsupported_platform_fails_before_search() {
        let temp = tempfile::tempdir().expect("tempdir");
        touch(temp.path(), &library_filename(Platform::Linux));
        let locator = Locator::new()
            .with_os("windows")
            .with_search_dirs([temp.path()]);
        let err = locator.locate().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    }

    #[test]
    fn first_matching_directory_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        let name = library_filename(Platform::Linux);
        let expected = touch(&first, &name);
        touch(&second, &name);

        let locator = Locator::new()
            .with_os("linux")
            .with_search_dirs([&first, &second]);
        assert_eq!(locator.locate().expect("path"), expected);

        let reversed = Locator::new()
            .with_os("linux")
            .with_search_dirs([&second, &first]);
        assert_eq!(reversed.locate().expect("path"), second.join(&name));
    }

    #[test]
    fn later_directory_used_when_earlier_lacks_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let empty = temp.path().join("empty");
        fs::create_dir_all(&empty).expect("mkdir");
        let expected = touch(&temp.path().join("lib"), &library_filename(Platform::MacOs));

        let locator = Locator::new()
            .with_os("macos")
            .with_search_dirs([empty, temp.path().join("lib")]);
        let path = locator.locate().expect("path");
        assert_eq!(path, expected);
        assert!(path.is_absolute());
    }

    #[test]
    fn other_versions_do_not_match() {
        let temp = tempfile::tempdir().expect("tempdir");
        touch(temp.path(), "libyamlscript.so.0.0.1");
        touch(temp.path(), "libyamlscript.so");

        let locator = Locator::new()
            .with_os("linux")
            .with_search_dirs([temp.path()]);
        let err = locator.locate().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::LibraryNotFound);
        assert!(err.message().unwrap().contains(&library_filename(Platform::Linux)));
        assert!(err.hint().unwrap().contains(LIBYAMLSCRIPT_VERSION));
    }

    #[test]
    fn directory_with_library_name_is_not_a_match() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join(library_filename(Platform::Linux))).expect("mkdir");
        let locator = Locator::new()
            .with_os("linux")
            .with_search_dirs([temp.path()]);
        assert_eq!(
            locator.locate().expect_err("err").kind(),
            ErrorKind::LibraryNotFound
        );
    }

    #[test]
    fn default_search_dirs_keep_env_order_then_fallbacks() {
        let dirs = default_search_dirs(
            Some(OsStr::new("/opt/a::/opt/b")),
            Some(OsStr::new("/home/ys")),
        );
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/opt/a"),
                PathBuf::from("/opt/b"),
                PathBuf::from("/usr/local/lib"),
                PathBuf::from("/home/ys/.local/lib"),
            ]
        );
    }

    #[test]
    fn default_search_dirs_without_env_or_home() {
        let dirs = default_search_dirs(None, None);
        assert_eq!(dirs, vec![PathBuf::from("/usr/local/lib")]);
    }

    #[test]
    fn default_search_dirs_do_not_deduplicate() {
        let dirs = default_search_dirs(Some(OsStr::new("/usr/local/lib")), None);
        assert_eq!(
            dirs,
            vec![PathBuf::from("/usr/local/lib"), PathBuf::from("/usr/local/lib")]
        );
    }
}
