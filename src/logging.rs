//! File logging for the chat client.
//!
//! The terminal belongs to the UI while it runs, so log output goes to a file,
//! by default `<cache dir>/firefingers/firefingers.log`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{Config, ConfigBuilder, WriteLogger};

pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("firefingers").join("firefingers.log"))
}

/// Installs the global file logger. Failure to create the file only costs
/// us the log, so it is reported on stderr and otherwise ignored.
pub fn initialize(path: Option<&Path>, verbose: bool) -> Option<PathBuf> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_path = path.map(Path::to_path_buf).or_else(default_log_path)?;
    let file = match create_log_file(&log_path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            return None;
        }
    };

    match WriteLogger::init(level, build_config(), file) {
        Ok(()) => Some(log_path),
        Err(_) => None,
    }
}

fn create_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_log_file_makes_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("firefingers.log");
        create_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
