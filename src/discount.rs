use std::collections::BTreeMap;

use crate::coc::NGramCountOfCounts;
use crate::count::Count;
use crate::error::{Error, Result};
use crate::model::{checked, LogProb};

/// Log10 discount factor for each observed count.
///
/// The discount depends only on the count, never on which n-gram
/// produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discounts {
    table: BTreeMap<Count, LogProb>,
}

impl Discounts {
    /// Good-Turing re-estimate in log space:
    /// `log(c+1) + log(N[c+1]) - log(c) - log(N[c])` when `c+1` was
    /// observed, otherwise `log(c) - log(c+1)`.
    ///
    /// This is not the curve-fitted "simple Good-Turing"; there is no
    /// smoothing over sparse or missing bins beyond that one fallback.
    pub fn good_turing(coc: &NGramCountOfCounts) -> Result<Self> {
        let mut table = BTreeMap::new();
        for (count, n) in coc.iter() {
            let c = count as f64;
            let discount = match coc.get(count + 1) {
                Some(next) => {
                    (c + 1.0).log10() + (next as f64).log10() - c.log10() - (n as f64).log10()
                }
                None => c.log10() - (c + 1.0).log10(),
            };
            table.insert(count, checked(discount, "discount", || count.to_string())?);
        }
        Ok(Self { table })
    }

    /// Discount for a raw count
    pub fn get(&self, count: Count) -> Result<LogProb> {
        self.table
            .get(&count)
            .copied()
            .ok_or_else(|| Error::MissingMapping {
                what: "discount",
                key: count.to_string(),
            })
    }

    /// Iterate over `(count, discount)` in increasing count order
    pub fn iter(&self) -> impl Iterator<Item = (Count, LogProb)> + '_ {
        self.table.iter().map(|(&c, &d)| (c, d))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
