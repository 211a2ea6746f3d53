mod settings;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::{env, fs, io};

pub use settings::{Gateway, Logger, Pipeline, Record, Settings, Source};

/// Expand a leading `~/` to the home directory.
pub fn normalize_path(path: &str) -> io::Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = env::var_os("HOME")
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "HOME is not set"))?;

            Ok(PathBuf::from(home).join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Open a log file for appending, creating missing parent directories.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    OpenOptions::new().create(true).append(true).open(path)
}

pub fn hostname() -> String {
    env::var("HOSTNAME")
        .ok()
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
