use crate::config::FactorScheme;
use crate::error::{Error, Result};

/// Granularity of a context: the word itself or one of its clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Word,
    SmallCluster,
    LargeCluster,
}

impl Level {
    /// All levels, most specific first
    pub const ALL: [Level; 3] = [Level::Word, Level::SmallCluster, Level::LargeCluster];

    /// Position in per-level arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Factor label for this level in the given scheme
    pub fn label(self, scheme: &FactorScheme) -> char {
        match self {
            Level::Word => scheme.word_label,
            Level::SmallCluster => scheme.small_label,
            Level::LargeCluster => scheme.large_label,
        }
    }

    /// Next level to back off to, `None` meaning the plain unigram distribution
    pub fn coarser(self) -> Option<Level> {
        match self {
            Level::Word => Some(Level::SmallCluster),
            Level::SmallCluster => Some(Level::LargeCluster),
            Level::LargeCluster => None,
        }
    }

    /// Short tag used in section headers
    pub fn tag(self) -> &'static str {
        match self {
            Level::Word => "w",
            Level::SmallCluster => "s",
            Level::LargeCluster => "l",
        }
    }
}

/// One corpus position: a word with its small and large cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub word: &'a str,
    pub small: &'a str,
    pub large: &'a str,
}

impl<'a> Token<'a> {
    /// Parse `W-word|S-small|L-large`, in any label order.
    pub fn parse(raw: &'a str, scheme: &FactorScheme) -> Result<Self> {
        Ok(Self {
            word: get_part(raw, scheme.word_label, scheme)?,
            small: get_part(raw, scheme.small_label, scheme)?,
            large: get_part(raw, scheme.large_label, scheme)?,
        })
    }

    /// Factor at the given level
    pub fn at(&self, level: Level) -> &'a str {
        match level {
            Level::Word => self.word,
            Level::SmallCluster => self.small,
            Level::LargeCluster => self.large,
        }
    }
}

/// Return the value of the factor labelled `label` in `raw`, i.e. the text
/// between `<label>-` and the next factor delimiter (or the end of the token).
pub fn get_part<'a>(raw: &'a str, label: char, scheme: &FactorScheme) -> Result<&'a str> {
    let mut found: Option<&'a str> = None;
    for field in raw.split(scheme.factor_delimiter) {
        let mut chars = field.chars();
        if chars.next() != Some(label) || chars.next() != Some(scheme.label_separator) {
            continue;
        }
        if found.is_some() {
            return Err(Error::Parse {
                token: raw.to_string(),
                reason: format!("label {:?} appears more than once", label),
                location: None,
            });
        }
        found = Some(chars.as_str());
    }
    found.ok_or_else(|| Error::Parse {
        token: raw.to_string(),
        reason: format!("missing label {:?}", label),
        location: None,
    })
}
