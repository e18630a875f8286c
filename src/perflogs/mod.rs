//! Discovery and ingestion of ReFrame performance logs.
//!
//! The primary entrypoint for this module is [`load`], which finds every perflog under a path, parses each one with
//! [`read_perflog`], and stacks the results into a single [`Frame`].
//!
//! # Examples
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use perflog_post::perflogs::load;
//!
//! let path = PathBuf::from("perflogs");
//!
//! let perflogs = load(&path, None).expect("could not load perflogs");
//! println!("{}", perflogs.frame.to_table());
//! ```

use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    frame::Frame,
};

mod parse;

pub use parse::{parse_display_name, read_perflog, DELIMITER, NULL_TOKENS, REQUIRED_FIELDS};

/// Extension every perflog file carries.
pub const FILE_EXTENSION: &str = "log";

/// Glob pattern for perflog files below a directory.
pub const FILE_PATTERN: &str = "**/*.log";

/// Parsed contents of every perflog under a path.
#[derive(Debug)]
pub struct Perflogs {
    /// Path the logs were searched for in.
    pub log_path: PathBuf,
    /// Files that were found and parsed successfully.
    pub log_files: Vec<PathBuf>,
    /// Files that were found but were not valid perflogs.
    pub discarded: Vec<PathBuf>,
    /// All records of all valid files.
    pub frame: Frame,
}

/// Finds all perflog files at a path.
///
/// A file path must have the [`FILE_EXTENSION`] extension. A directory is searched recursively with [`FILE_PATTERN`].
/// If `test_pattern` is given, only files whose stem matches the glob pattern are kept; ReFrame names perflogs after
/// the test that produced them, so `"Sombrero*"` selects every Sombrero variant.
///
/// # Errors
///
/// Returns [`Error::NoPerflogs`] if the file has the wrong extension or the directory holds no perflogs, and
/// [`Error::NotFound`] if the path does not exist.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
///
/// use perflog_post::perflogs::find_log_files;
///
/// let files = find_log_files(&PathBuf::from("perflogs"), Some("Sombrero*")).unwrap();
/// ```
pub fn find_log_files(path: &Path, test_pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    log::info!("finding all perflogs under {}...", path.display());

    let files = if path.is_file() {
        if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
            return Err(Error::NoPerflogs {
                path: path.to_path_buf(),
                reason: format!("perflog file name should have a .{FILE_EXTENSION} extension"),
            });
        }
        vec![path.to_path_buf()]
    } else if path.is_dir() {
        let directory = path.to_str().ok_or_else(|| Error::NoPerflogs {
            path: path.to_path_buf(),
            reason: "path is not valid unicode".to_string(),
        })?;
        let pattern = Path::new(&glob::Pattern::escape(directory)).join(FILE_PATTERN);
        let pattern = pattern.to_string_lossy();
        let mut files: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|err| Error::NoPerflogs {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?
            .filter_map(|r| {
                r.map_err(|err| {
                    log::warn!("could not get globbed path: {err}, skipping...");
                })
                .ok()
            })
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(Error::NoPerflogs {
                path: path.to_path_buf(),
                reason: format!("perflogs should have a .{FILE_EXTENSION} extension"),
            });
        }
        files
    } else {
        return Err(Error::NotFound(path.to_path_buf()));
    };

    let files = match test_pattern {
        Some(pattern) => {
            let pattern = glob::Pattern::new(pattern).map_err(|err| Error::NoPerflogs {
                path: path.to_path_buf(),
                reason: format!("invalid test pattern '{pattern}': {err}"),
            })?;
            let kept: Vec<PathBuf> = files
                .into_iter()
                .filter(|f| {
                    f.file_stem()
                        .and_then(|s| s.to_str())
                        .is_some_and(|stem| pattern.matches(stem))
                })
                .collect();
            if kept.is_empty() {
                return Err(Error::NoPerflogs {
                    path: path.to_path_buf(),
                    reason: format!("no perflog matches test pattern '{pattern}'"),
                });
            }
            kept
        }
        None => files,
    };

    log::info!("found {} perflogs", files.len());
    for file in &files {
        log::debug!("found {}", file.display());
    }
    Ok(files)
}

/// Loads every perflog at a path into one frame.
///
/// Files whose header lacks a required field are discarded with a warning, all other errors abort loading. Records
/// of logs with different field sets are merged, fields absent from a log are null for its records.
///
/// # Errors
///
/// Returns any error from [`find_log_files`] or [`read_perflog`] other than [`Error::MissingFields`], and
/// [`Error::NoPerflogs`] if no valid perflog remains.
pub fn load(path: &Path, test_pattern: Option<&str>) -> Result<Perflogs> {
    let files = find_log_files(path, test_pattern)?;

    let mut log_files = Vec::new();
    let mut discarded = Vec::new();
    let mut frames = Vec::new();
    for file in files {
        match read_perflog(&file) {
            Ok(frame) => {
                frames.push(frame);
                log_files.push(file);
            }
            Err(err @ Error::MissingFields { .. }) => {
                log::warn!("discarding {}: {err}", file.display());
                discarded.push(file);
            }
            Err(err) => return Err(err),
        }
    }

    let frame = Frame::concat(frames);
    if frame.is_empty() {
        return Err(Error::NoPerflogs {
            path: path.to_path_buf(),
            reason: "could not find a valid perflog".to_string(),
        });
    }
    log::info!(
        "loaded {} records from {} perflogs",
        frame.len(),
        log_files.len()
    );

    Ok(Perflogs {
        log_path: path.to_path_buf(),
        log_files,
        discarded,
        frame,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data")
    }

    #[test]
    fn finds_logs_recursively_in_order() {
        let files = find_log_files(&fixtures(), None).unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|f| f.file_name()?.to_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "SombreroBenchmark.log",
                "SombreroBenchmarkChanged.log",
                "SombreroBenchmarkIncomplete.log"
            ]
        );
    }

    #[test]
    fn rejects_missing_paths_and_other_files() {
        assert!(matches!(
            find_log_files(&fixtures().join("nowhere"), None),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            find_log_files(&fixtures().join("sombrero_config.yaml"), None),
            Err(Error::NoPerflogs { .. })
        ));
        assert!(matches!(
            find_log_files(&fixtures(), Some("Stream*")),
            Err(Error::NoPerflogs { .. })
        ));
    }

    #[test]
    fn directory_names_are_not_patterns() {
        let root = std::env::temp_dir().join(format!("perflog-post-{}-glob", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        let bracketed = root.join("runs[2024]").join("archer2");
        fs::create_dir_all(&bracketed).unwrap();
        fs::copy(
            fixtures().join("perflogs/archer2/compute/SombreroBenchmark.log"),
            bracketed.join("SombreroBenchmark.log"),
        )
        .unwrap();
        // would match runs[2024] as a pattern, but is not that directory
        fs::create_dir_all(root.join("runs2")).unwrap();
        fs::write(root.join("runs2").join("Other.log"), "").unwrap();

        let files = find_log_files(&root.join("runs[2024]"), None).unwrap();
        assert_eq!(files, vec![bracketed.join("SombreroBenchmark.log")]);

        fs::remove_dir_all(&root).unwrap();
    }
}
