//! Background-map catalog.
//!
//! Basemaps used to contextualize cube footprints are listed in a small
//! markdown-style catalog file: a `## Name` heading per map followed by
//! `* Filename:`, `* Source:`, `* Extent:` and `* Projection:` bullets.
//! The catalog is an explicit value object; nothing here is process-global.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// One registered background map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    /// Display title from the catalog heading.
    pub title: String,
    /// Image file name.
    pub file_name: String,
    /// Source citation, when given.
    pub source: Option<String>,
    /// Source URL, when given.
    pub url: Option<String>,
    /// Map extent `[lon_min, lon_max, lat_min, lat_max]`, when given.
    pub extent: Option<[f64; 4]>,
    /// Map projection name, lowercased, when given.
    pub projection: Option<String>,
}

impl MapEntry {
    /// Catalog key: the image file name without its extension.
    pub fn key(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(idx) => &self.file_name[..idx],
            None => &self.file_name,
        }
    }
}

/// A catalog of background maps, keyed by file basename.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapCatalog {
    entries: Vec<MapEntry>,
}

impl MapCatalog {
    /// An empty catalog.
    pub fn new() -> MapCatalog {
        MapCatalog::default()
    }

    /// Load a catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MapCatalog> {
        let text = fs::read_to_string(path.as_ref()).map_err(Error::Io)?;
        MapCatalog::parse(&text)
    }

    /// Parse catalog text.
    pub fn parse(text: &str) -> Result<MapCatalog> {
        let mut catalog = MapCatalog::new();
        let mut title: Option<String> = None;
        let mut open: Option<MapEntry> = None;

        for line in text.lines() {
            let line = line.trim_end();
            if let Some(heading) = line.strip_prefix("##") {
                if let Some(entry) = open.take() {
                    catalog.register(entry, true)?;
                }
                title = Some(heading.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("* Filename:") {
                if let Some(entry) = open.take() {
                    catalog.register(entry, true)?;
                }
                let file_name = backticked(rest)
                    .ok_or_else(|| Error::Catalog(format!("invalid filename line: {line}")))?;
                open = Some(MapEntry {
                    title: title.clone().unwrap_or_else(|| file_name.clone()),
                    file_name,
                    source: None,
                    url: None,
                    extent: None,
                    projection: None,
                });
            } else if let Some(rest) = line.strip_prefix("* Source:") {
                if let Some(entry) = open.as_mut() {
                    let (source, url) = linked(rest)
                        .ok_or_else(|| Error::Catalog(format!("invalid source line: {line}")))?;
                    entry.source = Some(source);
                    entry.url = Some(url);
                }
            } else if let Some(rest) = line.strip_prefix("* Extent:") {
                if let Some(entry) = open.as_mut() {
                    entry.extent = Some(parse_extent(rest).ok_or_else(|| {
                        Error::Catalog(format!("invalid extent line: {line}"))
                    })?);
                }
            } else if let Some(rest) = line.strip_prefix("* Projection:") {
                if let Some(entry) = open.as_mut() {
                    let projection = backticked(rest).ok_or_else(|| {
                        Error::Catalog(format!("invalid projection line: {line}"))
                    })?;
                    entry.projection = Some(projection.to_lowercase());
                }
            }
        }

        if let Some(entry) = open.take() {
            catalog.register(entry, true)?;
        }
        Ok(catalog)
    }

    /// Look up a map by key (file basename without extension).
    pub fn get(&self, key: &str) -> Option<&MapEntry> {
        self.entries.iter().find(|entry| entry.key() == key)
    }

    /// Number of registered maps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no maps.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all registered maps.
    pub fn iter(&self) -> impl Iterator<Item = &MapEntry> {
        self.entries.iter()
    }

    /// Register a map.
    ///
    /// A map with the same key must not already exist unless `overwrite`
    /// is set, in which case it is replaced.
    pub fn register(&mut self, entry: MapEntry, overwrite: bool) -> Result<()> {
        if let Some(idx) = self.entries.iter().position(|e| e.key() == entry.key()) {
            if !overwrite {
                return Err(Error::Catalog(format!(
                    "a map is already registered with the name `{}`",
                    entry.key()
                )));
            }
            self.entries[idx] = entry;
        } else {
            self.entries.push(entry);
        }
        Ok(())
    }

    /// Remove a map by key, returning it. Missing keys are an error.
    pub fn remove(&mut self, key: &str) -> Result<MapEntry> {
        match self.entries.iter().position(|e| e.key() == key) {
            Some(idx) => Ok(self.entries.remove(idx)),
            None => Err(Error::Catalog(format!("unknown map `{key}`"))),
        }
    }
}

/// Content of the first backtick-delimited span, if any.
fn backticked(text: &str) -> Option<String> {
    let start = text.find('`')? + 1;
    let len = text[start..].find('`')?;
    Some(text[start..start + len].to_string())
}

/// `[source](url)` pair from a markdown link.
fn linked(text: &str) -> Option<(String, String)> {
    let open = text.find('[')? + 1;
    let close = open + text[open..].find(']')?;
    let url_open = close + text[close..].find('(')? + 1;
    let url_close = url_open + text[url_open..].find(')')?;
    Some((
        text[open..close].to_string(),
        text[url_open..url_close].to_string(),
    ))
}

/// Four floats from an extent bullet, degree signs and backticks ignored.
fn parse_extent(text: &str) -> Option<[f64; 4]> {
    let mut values = [0.0f64; 4];
    let mut count = 0;
    for token in text.split_whitespace() {
        let token = token.trim_matches(|c: char| c == '`' || c == '\u{00b0}');
        if token.is_empty() {
            continue;
        }
        let value: f64 = token.parse().ok()?;
        if count == 4 {
            return None;
        }
        values[count] = value;
        count += 1;
    }
    if count == 4 {
        Some(values)
    } else {
        None
    }
}
