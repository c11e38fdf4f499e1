use std::collections::BTreeMap;

use crate::count::{Count, CountTable};

/// Count-of-count bins for Good-Turing discounting: for each observed
/// count `c`, the number of distinct n-grams seen exactly `c` times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NGramCountOfCounts {
    bins: BTreeMap<Count, u64>,
}

impl NGramCountOfCounts {
    /// Tally the entries of a count table by their count.
    pub fn from_table(table: &CountTable) -> Self {
        let mut bins = BTreeMap::new();
        for (_, _, count) in table.iter() {
            *bins.entry(count).or_insert(0) += 1;
        }
        Self { bins }
    }

    /// Number of n-grams seen exactly `count` times
    pub fn get(&self, count: Count) -> Option<u64> {
        self.bins.get(&count).copied()
    }

    /// N-grams seen exactly once
    pub fn singletons(&self) -> u64 {
        self.get(1).unwrap_or(0)
    }

    /// Iterate over `(count, number of n-grams)` in increasing count order
    pub fn iter(&self) -> impl Iterator<Item = (Count, u64)> + '_ {
        self.bins.iter().map(|(&c, &n)| (c, n))
    }

    /// Total observations represented, the sum of `count * bin size`
    pub fn observations(&self) -> u64 {
        self.iter().map(|(c, n)| c * n).sum()
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}
