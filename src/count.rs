use log::{debug, info};
use rustfst::{Label, SymbolTable, EPS_LABEL};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::{Config, FactorScheme, Normalizer};
use crate::error::{Error, Location, Result};
use crate::token::{Level, Token};

/// Type for counts
pub type Count = u64;

/// Context under which unigrams are counted
pub const UNIGRAM_CONTEXT: Label = EPS_LABEL;

/// Counts of words following each context.
///
/// Unigram tables use the single context [`UNIGRAM_CONTEXT`]. Both levels of
/// the map are ordered by label, which is first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountTable {
    entries: BTreeMap<Label, BTreeMap<Label, Count>>,
}

impl CountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `word` after `context`.
    pub fn increment(&mut self, context: Label, word: Label) {
        *self
            .entries
            .entry(context)
            .or_default()
            .entry(word)
            .or_insert(0) += 1;
    }

    /// Count of `word` after `context`, zero if never seen
    pub fn get(&self, context: Label, word: Label) -> Count {
        self.entries
            .get(&context)
            .and_then(|following| following.get(&word))
            .copied()
            .unwrap_or(0)
    }

    /// Words seen after `context`
    pub fn following(&self, context: Label) -> Option<&BTreeMap<Label, Count>> {
        self.entries.get(&context)
    }

    /// Total count of everything seen after `context`
    pub fn context_total(&self, context: Label) -> Count {
        self.following(context)
            .map(|following| following.values().sum())
            .unwrap_or(0)
    }

    /// Iterate over contexts and their followers
    pub fn contexts(&self) -> btree_map::Iter<'_, Label, BTreeMap<Label, Count>> {
        self.entries.iter()
    }

    /// Iterate over all `(context, word, count)` entries
    pub fn iter(&self) -> impl Iterator<Item = (Label, Label, Count)> + '_ {
        self.entries.iter().flat_map(|(&context, following)| {
            following
                .iter()
                .map(move |(&word, &count)| (context, word, count))
        })
    }

    /// Number of distinct `(context, word)` entries
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of observations, i.e. the sum of all counts
    pub fn total(&self) -> Count {
        self.entries
            .values()
            .flat_map(BTreeMap::values)
            .sum()
    }
}

/// A function from one kind of symbol to a coarser one (word to small
/// cluster, small cluster to large cluster).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMap {
    kind: &'static str,
    map: BTreeMap<Label, Label>,
}

impl ClusterMap {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            map: BTreeMap::new(),
        }
    }

    /// Record `key -> value`; a different value for a known key is fatal.
    pub(crate) fn insert(&mut self, key: Label, value: Label, syms: &SymbolTable) -> Result<()> {
        match self.map.entry(key) {
            btree_map::Entry::Vacant(e) => {
                e.insert(value);
                Ok(())
            }
            btree_map::Entry::Occupied(e) if *e.get() == value => Ok(()),
            btree_map::Entry::Occupied(e) => Err(Error::Consistency {
                kind: self.kind,
                key: symbol_or_label(syms, key),
                existing: symbol_or_label(syms, *e.get()),
                conflicting: symbol_or_label(syms, value),
                location: None,
            }),
        }
    }

    pub fn get(&self, key: Label) -> Option<Label> {
        self.map.get(&key).copied()
    }

    /// Description used in messages, e.g. "word to small cluster"
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn symbol_or_label(syms: &SymbolTable, label: Label) -> String {
    syms.get_symbol(label)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", label))
}

/// Everything gathered in one pass over the corpus.
#[derive(Debug, Clone)]
pub struct NGramCounts {
    /// Interned words and cluster names
    syms: SymbolTable,
    /// Unigram counts of words, small and large clusters
    unigrams: [CountTable; 3],
    /// Bigram counts of words, keyed by the previous token at each level
    bigrams: [CountTable; 3],
    word_to_small: ClusterMap,
    small_to_large: ClusterMap,
    /// Number of counted word tokens
    total_words: Count,
    /// Number of non-empty sentences
    sentences: Count,
    /// Label of the sentence-start context, if any
    start: Option<Label>,
}

impl NGramCounts {
    fn new() -> Self {
        Self {
            syms: SymbolTable::new(),
            unigrams: Default::default(),
            bigrams: Default::default(),
            word_to_small: ClusterMap::new("word to small cluster"),
            small_to_large: ClusterMap::new("small to large cluster"),
            total_words: 0,
            sentences: 0,
            start: None,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.syms
    }

    /// Name of an interned label
    pub fn symbol(&self, label: Label) -> Result<&str> {
        self.syms
            .get_symbol(label)
            .ok_or_else(|| Error::MissingMapping {
                what: "symbol",
                key: format!("#{}", label),
            })
    }

    pub fn label(&self, symbol: &str) -> Option<Label> {
        self.syms.get_label(symbol)
    }

    /// Unigram counts at a level
    pub fn unigrams(&self, level: Level) -> &CountTable {
        &self.unigrams[level.index()]
    }

    /// Bigram counts whose context is at `level`
    pub fn bigrams(&self, level: Level) -> &CountTable {
        &self.bigrams[level.index()]
    }

    /// Map from contexts at `level` to the next coarser level
    pub fn cluster_map(&self, level: Level) -> Option<&ClusterMap> {
        match level {
            Level::Word => Some(&self.word_to_small),
            Level::SmallCluster => Some(&self.small_to_large),
            Level::LargeCluster => None,
        }
    }

    pub fn total_words(&self) -> Count {
        self.total_words
    }

    pub fn sentences(&self) -> Count {
        self.sentences
    }

    /// Number of distinct words
    pub fn vocab_size(&self) -> usize {
        self.unigrams(Level::Word).len()
    }

    /// Unigram count of a symbol at a level, zero if unseen
    pub fn unigram_count(&self, level: Level, symbol: &str) -> Count {
        self.label(symbol)
            .map(|l| self.unigrams(level).get(UNIGRAM_CONTEXT, l))
            .unwrap_or(0)
    }

    /// Bigram count of `word` after `context` at a level, zero if unseen
    pub fn bigram_count(&self, level: Level, context: &str, word: &str) -> Count {
        match (self.label(context), self.label(word)) {
            (Some(c), Some(w)) => self.bigrams(level).get(c, w),
            _ => 0,
        }
    }

    /// What bigram counts after `context` are divided by.
    pub fn normalizer(&self, level: Level, context: Label, mode: Normalizer) -> Count {
        match mode {
            Normalizer::Outgoing => self.bigrams(level).context_total(context),
            Normalizer::ContextUnigram if Some(context) == self.start => self.sentences,
            Normalizer::ContextUnigram => self.unigrams(level).get(UNIGRAM_CONTEXT, context),
        }
    }
}

/// Count unigrams and bigrams of a factored corpus at every level.
#[derive(Debug)]
pub struct NGramCounter {
    scheme: FactorScheme,
    /// Label of the sentence-end word, if any
    end: Option<Label>,
    /// Boundary symbols the corpus may not use, with their role
    reserved: Vec<(Label, &'static str)>,
    counts: NGramCounts,
}

impl NGramCounter {
    pub fn new(config: &Config) -> Self {
        let mut counts = NGramCounts::new();
        let mut reserved = Vec::new();
        if let Some(start) = &config.sentence_start {
            let label = counts.syms.add_symbol(start.as_str());
            // the start symbol is its own small and large cluster
            counts.word_to_small.map.insert(label, label);
            counts.small_to_large.map.insert(label, label);
            counts.start = Some(label);
            reserved.push((label, "sentence start"));
        }
        let end = config
            .sentence_end
            .as_ref()
            .map(|end| counts.syms.add_symbol(end.as_str()));
        if let Some(label) = end {
            reserved.push((label, "sentence end"));
        }
        Self {
            scheme: config.scheme,
            end,
            reserved,
            counts,
        }
    }

    fn intern(&mut self, token: &Token) -> [Label; 3] {
        let syms = &mut self.counts.syms;
        [
            syms.add_symbol(token.word),
            syms.add_symbol(token.small),
            syms.add_symbol(token.large),
        ]
    }

    /// Count one sentence (one line of the corpus).
    pub fn count_sentence(&mut self, line: &str) -> Result<()> {
        let scheme = self.scheme;
        let mut prev: Option<[Label; 3]> = self.counts.start.map(|s| [s; 3]);
        let mut seen = 0;
        for raw in scheme.tokens(line) {
            let token = Token::parse(raw, &scheme)?;
            let labels = self.intern(&token);
            for level in Level::ALL {
                let label = labels[level.index()];
                if let Some(&(_, role)) = self.reserved.iter().find(|(l, _)| *l == label) {
                    return Err(Error::ReservedSymbol {
                        symbol: token.at(level).to_string(),
                        role,
                        level,
                        location: None,
                    });
                }
            }
            let NGramCounts {
                syms,
                word_to_small,
                small_to_large,
                ..
            } = &mut self.counts;
            word_to_small.insert(labels[0], labels[1], syms)?;
            small_to_large.insert(labels[1], labels[2], syms)?;

            self.counts.total_words += 1;
            for level in Level::ALL {
                let label = labels[level.index()];
                self.counts.unigrams[level.index()].increment(UNIGRAM_CONTEXT, label);
            }
            if let Some(prev) = prev {
                self.count_bigrams(&prev, labels[0]);
            }
            prev = Some(labels);
            seen += 1;
        }
        if seen == 0 {
            debug!("skipping empty sentence");
            return Ok(());
        }
        self.counts.sentences += 1;
        if let (Some(end), Some(prev)) = (self.end, prev) {
            self.counts.total_words += 1;
            self.counts.unigrams[Level::Word.index()].increment(UNIGRAM_CONTEXT, end);
            self.count_bigrams(&prev, end);
        }
        Ok(())
    }

    fn count_bigrams(&mut self, prev: &[Label; 3], word: Label) {
        for level in Level::ALL {
            self.counts.bigrams[level.index()].increment(prev[level.index()], word);
        }
    }

    /// Count every line of a reader, one sentence per line.
    pub fn count_from_reader<R: BufRead>(&mut self, reader: R, path: Option<&Path>) -> Result<()> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            self.count_sentence(&line).map_err(|e| {
                e.at(Location {
                    path: path.map(Path::to_path_buf),
                    line: idx + 1,
                })
            })?;
        }
        Ok(())
    }

    /// Count a corpus file.
    pub fn count_from_path(&mut self, path: &Path) -> Result<()> {
        let fh = File::open(path)?;
        self.count_from_reader(BufReader::new(fh), Some(path))?;
        info!(
            "counted {} words in {} sentences of {}",
            self.counts.total_words,
            self.counts.sentences,
            path.display()
        );
        Ok(())
    }

    /// Finish counting; the counts are read-only from here on.
    pub fn finish(self) -> NGramCounts {
        self.counts
    }
}
