use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// How factors are written into a corpus token, e.g. `W-cat|S-animal|L-organism`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorScheme {
    /// Label of the word itself
    pub word_label: char,
    /// Label of the small cluster
    pub small_label: char,
    /// Label of the large cluster
    pub large_label: char,
    /// Separates a label from its value
    pub label_separator: char,
    /// Separates the factors of one token
    pub factor_delimiter: char,
    /// Separates tokens on a line
    pub word_delimiter: char,
}

impl Default for FactorScheme {
    fn default() -> Self {
        Self {
            word_label: 'W',
            small_label: 'S',
            large_label: 'L',
            label_separator: '-',
            factor_delimiter: '|',
            word_delimiter: ' ',
        }
    }
}

impl FactorScheme {
    /// Write one factor as `<label><separator><value>`.
    pub fn factor(&self, label: char, value: &str) -> String {
        let mut s = String::with_capacity(value.len() + 2);
        s.push(label);
        s.push(self.label_separator);
        s.push_str(value);
        s
    }

    /// Join the factors of a token in word, first, second order.
    pub fn format_token(
        &self,
        word: &str,
        first: (char, &str),
        second: (char, &str),
    ) -> String {
        [
            self.factor(self.word_label, word),
            self.factor(first.0, first.1),
            self.factor(second.0, second.1),
        ]
        .join(&self.factor_delimiter.to_string())
    }

    /// Split a line into tokens, ignoring empty fields.
    pub fn tokens<'a>(&self, line: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let delim = self.word_delimiter;
        line.trim_end_matches(&['\n', '\r'][..])
            .split(delim)
            .filter(|t| !t.trim().is_empty())
    }
}

/// What a bigram count is divided by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalizer {
    /// Total count of bigrams leaving the context
    #[default]
    Outgoing,
    /// Unigram count of the context at its own level
    ContextUnigram,
}

/// What to do with a log-probability or weight that is not finite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UndefinedPolicy {
    /// Stop with a numerical error
    #[default]
    Fail,
    /// Warn, leave the entry out, and count it
    Skip,
}

/// Configuration for building a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheme: FactorScheme,
    pub normalizer: Normalizer,
    /// Context symbol for the first token of each sentence (none by default)
    pub sentence_start: Option<String>,
    /// Word appended to each sentence (none by default)
    pub sentence_end: Option<String>,
    pub undefined: UndefinedPolicy,
    /// Key written on the unknown-word line
    pub unk_symbol: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme: FactorScheme::default(),
            normalizer: Normalizer::default(),
            sentence_start: None,
            sentence_end: None,
            undefined: UndefinedPolicy::default(),
            unk_symbol: "<unk>".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Labels must be distinct and must not collide with the delimiters;
    /// sentence boundary symbols must be distinct and non-empty.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scheme;
        let labels = [s.word_label, s.small_label, s.large_label];
        let delims = [s.label_separator, s.factor_delimiter, s.word_delimiter];
        for (i, a) in labels.iter().enumerate() {
            if labels[i + 1..].contains(a) {
                return Err(Error::Config(format!("factor label {:?} used twice", a)));
            }
            if delims.contains(a) {
                return Err(Error::Config(format!(
                    "factor label {:?} is also a delimiter",
                    a
                )));
            }
        }
        if s.factor_delimiter == s.word_delimiter || s.label_separator == s.factor_delimiter {
            return Err(Error::Config("delimiters must differ".into()));
        }
        let boundaries = [&self.sentence_start, &self.sentence_end];
        if boundaries.iter().any(|b| b.as_deref() == Some("")) {
            return Err(Error::Config("sentence boundary symbols must not be empty".into()));
        }
        if self.sentence_start.is_some() && self.sentence_start == self.sentence_end {
            return Err(Error::Config("sentence start and end symbols must differ".into()));
        }
        if self.unk_symbol.is_empty() {
            return Err(Error::Config("unk_symbol must not be empty".into()));
        }
        Ok(())
    }
}
