use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::config::FactorScheme;
use crate::error::{Error, Result};

/// Factor given to words missing from the factor file
pub const NO_FACTOR: &str = "-1";

/// A `key -> factor` table read from a factor or cluster file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactorMap {
    map: HashMap<String, String>,
}

impl FactorMap {
    /// Read `key<delim>factor` lines. Each key may appear only once, and a
    /// blank line is malformed like any other line without two fields.
    pub fn load(path: &Path, delimiter: char) -> Result<Self> {
        let fh = File::open(path)?;
        Self::from_reader(BufReader::new(fh), path, delimiter)
    }

    /// Read factor lines from any reader; `path` is only used in messages.
    pub fn from_reader<R: BufRead>(reader: R, path: &Path, delimiter: char) -> Result<Self> {
        let mut map = HashMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let fields: Vec<&str> = line.trim().split(delimiter).collect();
            if fields.len() != 2 {
                return Err(Error::MalformedFactorLine {
                    path: PathBuf::from(path),
                    line: idx + 1,
                    parts: fields.len(),
                });
            }
            if map.contains_key(fields[0]) {
                return Err(Error::DuplicateFactorKey {
                    path: PathBuf::from(path),
                    line: idx + 1,
                    key: fields[0].to_string(),
                });
            }
            map.insert(fields[0].to_string(), fields[1].to_string());
        }
        debug!("read {} factors from {}", map.len(), path.display());
        Ok(Self { map })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FactorMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Two factor labels and the maps that supply them
#[derive(Debug, Clone, Copy)]
pub struct FactorLayers<'a> {
    /// word -> first factor
    pub first: &'a FactorMap,
    pub first_label: char,
    /// first factor -> second factor
    pub second: &'a FactorMap,
    pub second_label: char,
}

/// Rewrite each word of a plain corpus as `W-word|A-first|B-second`.
///
/// A word without a first factor gets [`NO_FACTOR`] for both.
pub fn add_factors<R: BufRead, W: Write>(
    input: R,
    output: &mut W,
    layers: FactorLayers<'_>,
    scheme: &FactorScheme,
) -> Result<()> {
    let delim = scheme.word_delimiter.to_string();
    for line in input.lines() {
        let line = line?;
        let mut sentence = Vec::new();
        for word in scheme.tokens(&line) {
            let (first, second) = match layers.first.get(word) {
                Some(first) => {
                    let second = layers.second.get(first).ok_or_else(|| Error::MissingMapping {
                        what: "second factor",
                        key: first.to_string(),
                    })?;
                    (first, second)
                }
                None => (NO_FACTOR, NO_FACTOR),
            };
            sentence.push(scheme.format_token(
                word,
                (layers.first_label, first),
                (layers.second_label, second),
            ));
        }
        writeln!(output, "{}", sentence.join(&delim))?;
    }
    output.flush()?;
    Ok(())
}

/// Replace each word with its cluster; words without one are kept.
pub fn substitute_clusters<R: BufRead, W: Write>(
    input: R,
    output: &mut W,
    clusters: &FactorMap,
    scheme: &FactorScheme,
) -> Result<()> {
    let delim = scheme.word_delimiter.to_string();
    for line in input.lines() {
        let line = line?;
        let sentence: Vec<&str> = scheme
            .tokens(&line)
            .map(|word| clusters.get(word).unwrap_or(word))
            .collect();
        writeln!(output, "{}", sentence.join(&delim))?;
    }
    output.flush()?;
    Ok(())
}
