use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

pub fn file_open(filename: impl AsRef<Path>) -> Result<File> {
    let f = File::open(&filename).with_context(|| {
        format!(
            "failed to read file: {s} cwd: {cur}",
            s = filename.as_ref().display(),
            cur = std::env::current_dir().unwrap_or_default().display()
        )
    })?;
    Ok(f)
}

pub fn file_create(filename: impl AsRef<Path>) -> Result<File> {
    let f = File::create(&filename).with_context(|| {
        format!(
            "failed to create file: {s} cwd: {cur}",
            s = filename.as_ref().display(),
            cur = std::env::current_dir().unwrap_or_default().display()
        )
    })?;
    Ok(f)
}

pub fn file_append(filename: impl AsRef<Path>) -> Result<File> {
    let f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&filename)
        .with_context(|| format!("failed to open for append: {}", filename.as_ref().display()))?;
    Ok(f)
}

pub fn read_file(filename: impl AsRef<Path>) -> Result<Vec<String>> {
    debug!(
        "reading lines from file {file} with current dir {pwd}",
        file = filename.as_ref().display(),
        pwd = std::env::current_dir().unwrap_or_default().display()
    );
    let file = file_open(filename)?;
    let lines = std::io::BufReader::new(file).lines();
    let vec = lines.collect::<Result<Vec<String>, _>>()?;
    Ok(vec)
}

pub trait ToStringOr {
    fn to_string_or(&self, s: &str) -> String;
}

impl<T: ToString> ToStringOr for Option<T> {
    fn to_string_or(&self, s: &str) -> String {
        match self {
            Some(t) => t.to_string(),
            None => s.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_or() {
        assert_eq!(Some(3).to_string_or("-"), "3");
        assert_eq!(None::<i32>.to_string_or("-"), "-");
    }

    #[test]
    fn test_file_open_missing() {
        let err = file_open("no/such/file.pgn").unwrap_err();
        assert!(err.to_string().contains("no/such/file.pgn"));
    }
}
