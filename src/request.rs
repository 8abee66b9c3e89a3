//! Package list loading.
//!
//! A list holds one entry per line, either a bare package identifier or an
//! identifier followed by `" | "` and an output directory for that package.

use crate::errors::*;
use error_chain::bail;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

const DIRECTORY_DELIMITER: &str = " | ";

/// One requested package and, once resolved, its download URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    name: String,
    output_dir: PathBuf,
    url: Option<String>,
}

impl PackageRequest {
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> PackageRequest {
        PackageRequest {
            name: name.into(),
            output_dir: output_dir.into(),
            url: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `None` until resolved, and after a resolution miss.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url;
    }
}

/// Requests keyed by package identifier, in package list order.
#[derive(Debug, Default, Clone)]
pub struct RequestTable {
    requests: Vec<PackageRequest>,
    index: HashMap<String, usize>,
}

impl RequestTable {
    pub fn new() -> RequestTable {
        RequestTable::default()
    }

    /// Reads a package list from disk.
    pub fn load(path: &Path, default_dir: &Path) -> Result<RequestTable> {
        let contents = fs::read_to_string(path)
            .chain_err(|| ErrorKind::InputFile(path.to_path_buf()))?;
        let table = RequestTable::parse(&contents, default_dir)?;
        debug!(path = %path.display(), packages = table.len(), "package list loaded");
        Ok(table)
    }

    pub fn parse(contents: &str, default_dir: &Path) -> Result<RequestTable> {
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        let mut table = RequestTable::new();

        for (number, line) in contents.lines().enumerate() {
            if let Some(request) = parse_line(number + 1, line, default_dir)? {
                table.insert(request);
            }
        }

        Ok(table)
    }

    /// A repeated name replaces the earlier request but keeps its position.
    pub fn insert(&mut self, request: PackageRequest) {
        match self.index.get(request.name()) {
            Some(&position) => self.requests[position] = request,
            None => {
                self.index
                    .insert(request.name().to_string(), self.requests.len());
                self.requests.push(request);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageRequest> {
        self.index.get(name).map(|&position| &self.requests[position])
    }

    /// Returns false when no request carries that name.
    pub fn set_resolution(&mut self, name: &str, url: Option<String>) -> bool {
        match self.index.get(name) {
            Some(&position) => {
                self.requests[position].set_url(url);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageRequest> {
        self.requests.iter()
    }

    pub fn resolved(&self) -> impl Iterator<Item = &PackageRequest> {
        self.requests.iter().filter(|request| request.url().is_some())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

fn parse_line(number: usize, line: &str, default_dir: &Path) -> Result<Option<PackageRequest>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parts: Vec<&str> = line.split(DIRECTORY_DELIMITER).map(str::trim).collect();
    let (name, output_dir) = match parts.as_slice() {
        [name] => (*name, default_dir.to_path_buf()),
        [name, dir] if !name.is_empty() && !dir.is_empty() => (*name, PathBuf::from(*dir)),
        _ => bail!(ErrorKind::MalformedLine(number, line.to_string())),
    };

    if !is_valid_identifier(name) {
        bail!(ErrorKind::InvalidIdentifier(number, name.to_string()));
    }

    Ok(Some(PackageRequest::new(name, output_dir)))
}

/// Identifiers double as catalog element names, so they must be XML names.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
