//! Filesystem, logging, table and subprocess helpers shared by the pipeline stages.

pub mod runlog;
pub mod table;
pub mod tool;
pub mod verbosity;

use color_eyre::eyre::{eyre, ContextCompat, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use std::fmt::Debug;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Get delimiter based on file extension.
///
/// ## Arguments
///
/// - `path` - File path.
///
/// ## Examples
///
/// - `.tsv` => `\t`
/// - `.txt` => `\t`
/// - `.csv` => `,`
///
/// Note that `.txt` is assumed to be tab-delimited!
///
/// ```rust
/// use arts::utils::get_delimiter;
///
/// assert_eq!(get_delimiter(&"file.tsv")?, '\t');
/// assert_eq!(get_delimiter(&"file.csv")?, ',');
/// assert_eq!(get_delimiter(&"genematrix.txt")?, '\t');
/// assert!(get_delimiter(&"file").is_err());
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn get_delimiter<P>(path: &P) -> Result<char, Report>
where
    P: AsRef<Path> + Debug,
{
    let ext = path
        .as_ref()
        .extension()
        .wrap_err_with(|| format!("Failed to get file extension: {path:?}"))?
        .to_str()
        .wrap_err_with(|| format!("Failed to convert file extension to str: {path:?}"))?;
    // convert extension to the expected delimiter
    match ext {
        "tsv" | "txt" => Ok('\t'),
        "csv" => Ok(','),
        _ext => {
            Err(eyre!("Unknown file extension: {_ext:?}").suggestion("Options: tsv, csv, or txt"))
        }
    }
}

/// Create a directory (and its parents), with a clear error if the location is not writable.
pub fn create_dir<P>(path: &P) -> Result<PathBuf, Report>
where
    P: AsRef<Path> + Debug,
{
    let path = path.as_ref();
    std::fs::create_dir_all(path)
        .wrap_err_with(|| format!("Failed to create directory: {path:?}"))
        .suggestion("Check that the result directory is writable.")?;
    Ok(path.to_path_buf())
}

/// Returns the files in a directory whose name ends with `suffix`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn list_files<P>(dir: &P, suffix: &str) -> Result<Vec<PathBuf>, Report>
where
    P: AsRef<Path> + Debug,
{
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let files = std::fs::read_dir(dir)
        .wrap_err_with(|| format!("Failed to read directory: {dir:?}"))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(suffix)))
        .sorted()
        .collect_vec();
    Ok(files)
}

/// Returns the file name of a path as a [`String`], ex. `trees/rpoB.tree` => `rpoB.tree`.
pub fn file_name<P>(path: &P) -> Result<String, Report>
where
    P: AsRef<Path> + Debug,
{
    let name = path
        .as_ref()
        .file_name()
        .wrap_err_with(|| format!("Failed to get file name: {path:?}"))?
        .to_str()
        .wrap_err_with(|| format!("Failed to convert file name to str: {path:?}"))?;
    Ok(name.to_string())
}

/// Returns the file stem of a path as a [`String`], ex. `trees/rpoB.tree` => `rpoB`.
pub fn file_stem<P>(path: &P) -> Result<String, Report>
where
    P: AsRef<Path> + Debug,
{
    let stem = path
        .as_ref()
        .file_stem()
        .wrap_err_with(|| format!("Failed to get file stem: {path:?}"))?
        .to_str()
        .wrap_err_with(|| format!("Failed to convert file stem to str: {path:?}"))?;
    Ok(stem.to_string())
}

/// Write a serializable value as pretty JSON.
pub fn write_json<P, T>(path: &P, value: &T) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
    T: serde::Serialize,
{
    let json = serde_json::to_string_pretty(value)
        .wrap_err_with(|| format!("Failed to serialize JSON for: {path:?}"))?;
    std::fs::write(path, json).wrap_err_with(|| format!("Failed to write file: {path:?}"))?;
    Ok(())
}

/// Read a JSON file into a deserializable value.
pub fn read_json<P, T>(path: &P) -> Result<T, Report>
where
    P: AsRef<Path> + Debug,
    T: serde::de::DeserializeOwned,
{
    let content =
        std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read file: {path:?}"))?;
    let value = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse JSON from: {path:?}"))?;
    Ok(value)
}

/// Zip every regular file of `dir` (not recursive) into `output`, returns the number of files archived.
///
/// ## Arguments
///
/// - `dir` - Directory whose files are archived, entries are stored as `<dir name>/<file name>`.
/// - `output` - Path of the zip archive to create.
pub fn archive_dir<P, Q>(dir: &P, output: &Q) -> Result<usize, Report>
where
    P: AsRef<Path> + Debug,
    Q: AsRef<Path> + Debug,
{
    let files = list_files(dir, "")?;
    let prefix = file_name(dir)?;

    let file = File::create(output).wrap_err_with(|| format!("Failed to create archive: {output:?}"))?;
    let mut archive = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &files {
        let name = format!("{prefix}/{}", file_name(path)?);
        let mut buffer = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut buffer))
            .wrap_err_with(|| format!("Failed to read file for archive: {path:?}"))?;
        archive.start_file(name, options).wrap_err_with(|| eyre!("Failed to add {path:?} to {output:?}"))?;
        archive.write_all(&buffer)?;
    }
    archive.finish().wrap_err_with(|| eyre!("Failed to finish archive: {output:?}"))?;

    Ok(files.len())
}

/// Remove a file or directory if it exists.
pub fn remove_path<P>(path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    let path = path.as_ref();
    if path.is_dir() {
        std::fs::remove_dir_all(path).wrap_err_with(|| format!("Failed to remove directory: {path:?}"))?;
    } else if path.exists() {
        std::fs::remove_file(path).wrap_err_with(|| format!("Failed to remove file: {path:?}"))?;
    }
    Ok(())
}

/// Remove the files directly inside `dir` whose name starts with `prefix` and ends with `suffix`.
pub fn remove_matching<P>(dir: &P, prefix: &str, suffix: &str) -> Result<usize, Report>
where
    P: AsRef<Path> + Debug,
{
    let matches = list_files(dir, suffix)?
        .into_iter()
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(prefix)))
        .collect_vec();
    for path in &matches {
        remove_path(path)?;
    }
    Ok(matches.len())
}

/// Copy a directory tree into `dst`, which is created if needed. Returns the number of files copied.
pub fn copy_dir<P, Q>(src: &P, dst: &Q) -> Result<usize, Report>
where
    P: AsRef<Path> + Debug,
    Q: AsRef<Path> + Debug,
{
    let dst = create_dir(dst)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(src).wrap_err_with(|| format!("Failed to read directory: {src:?}"))? {
        let path = entry?.path();
        let target = dst.join(file_name(&path)?);
        if path.is_dir() {
            copied += copy_dir(&path, &target)?;
        } else {
            std::fs::copy(&path, &target).wrap_err_with(|| format!("Failed to copy {path:?} to {target:?}"))?;
            copied += 1;
        }
    }
    Ok(copied)
}
