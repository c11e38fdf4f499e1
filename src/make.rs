use log::{debug, info};
use rustfst::Label;
use std::collections::BTreeMap;

use crate::backoff::{backoff_weights, Fallback};
use crate::coc::NGramCountOfCounts;
use crate::config::{Config, Normalizer};
use crate::count::{Count, NGramCounts};
use crate::discount::Discounts;
use crate::error::Result;
use crate::model::{
    checked, BackoffWeights, BigramProbs, LogProb, ModelDiagnostics, NGramModel, UnigramProbs,
};
use crate::token::Level;

/// `discount + log10(count) - log10(normalizer)`
fn discounted_log_prob(discount: LogProb, count: Count, normalizer: Count) -> f64 {
    discount.into_inner() + (count as f64).log10() - (normalizer as f64).log10()
}

/// Make a multidimensional-backoff bigram model from counts, with
/// Good-Turing discounting.
#[derive(Debug)]
pub struct NGramMaker<'a> {
    config: &'a Config,
    counts: &'a NGramCounts,
    /// Count-of-count bins for word unigrams
    unigram_coc: NGramCountOfCounts,
    /// Count-of-count bins for bigrams, by context level
    bigram_coc: [NGramCountOfCounts; 3],
    unigram_discounts: Discounts,
    bigram_discounts: [Discounts; 3],
    diagnostics: ModelDiagnostics,
}

impl<'a> NGramMaker<'a> {
    /// Build counts-of-counts and discounts for all four count tables.
    pub fn new(config: &'a Config, counts: &'a NGramCounts) -> Result<Self> {
        let unigram_coc = NGramCountOfCounts::from_table(counts.unigrams(Level::Word));
        let bigram_coc =
            Level::ALL.map(|level| NGramCountOfCounts::from_table(counts.bigrams(level)));
        info!("built counts of counts");
        debug!("{} distinct unigram counts", unigram_coc.len());

        let unigram_discounts = Discounts::good_turing(&unigram_coc)?;
        let mut bigram_discounts: [Discounts; 3] = Default::default();
        for level in Level::ALL {
            bigram_discounts[level.index()] = Discounts::good_turing(&bigram_coc[level.index()])?;
        }
        for (count, discount) in unigram_discounts.iter() {
            debug!("unigram discount for count {}: {}", count, discount);
        }
        info!("computed Good-Turing discounts");

        Ok(Self {
            config,
            counts,
            unigram_coc,
            bigram_coc,
            unigram_discounts,
            bigram_discounts,
            diagnostics: ModelDiagnostics::default(),
        })
    }

    pub fn unigram_count_of_counts(&self) -> &NGramCountOfCounts {
        &self.unigram_coc
    }

    pub fn bigram_count_of_counts(&self, level: Level) -> &NGramCountOfCounts {
        &self.bigram_coc[level.index()]
    }

    fn name(&self, label: Label) -> String {
        self.counts
            .symbol(label)
            .map(str::to_string)
            .unwrap_or_else(|_| format!("#{}", label))
    }

    /// Unknown-word log-probability, `log10(N[1]) - log10(|V|)`.
    pub fn unk_prob(&mut self) -> Result<Option<LogProb>> {
        let singletons = self.unigram_coc.singletons() as f64;
        let vocab = self.counts.vocab_size() as f64;
        let unk = checked(singletons.log10() - vocab.log10(), "unknown-word probability", || {
            self.config.unk_symbol.clone()
        });
        self.diagnostics.admit(self.config.undefined, unk)
    }

    /// Log-probability of every word, normalized by the total word count.
    pub fn unigram_probs(&mut self) -> Result<UnigramProbs> {
        let total = self.counts.total_words();
        let mut probs = UnigramProbs::new();
        for (_, word, count) in self.counts.unigrams(Level::Word).iter() {
            let discount = self.unigram_discounts.get(count)?;
            let p = checked(discounted_log_prob(discount, count, total), "unigram probability", || {
                self.name(word)
            });
            if let Some(p) = self.diagnostics.admit(self.config.undefined, p)? {
                probs.insert(word, p);
            }
        }
        Ok(probs)
    }

    /// Log-probability of every bigram whose context is at `level`.
    pub fn bigram_probs(&mut self, level: Level) -> Result<BigramProbs> {
        let table = self.counts.bigrams(level);
        let mode: Normalizer = self.config.normalizer;
        let mut probs = BigramProbs::new();
        for (&context, following) in table.contexts() {
            let normalizer = self.counts.normalizer(level, context, mode);
            let mut row = BTreeMap::new();
            for (&word, &count) in following {
                let discount = self.bigram_discounts[level.index()].get(count)?;
                let p = checked(
                    discounted_log_prob(discount, count, normalizer),
                    "bigram probability",
                    || format!("{} {}", self.name(context), self.name(word)),
                );
                if let Some(p) = self.diagnostics.admit(self.config.undefined, p)? {
                    row.insert(word, p);
                }
            }
            if !row.is_empty() {
                probs.insert(context, row);
            }
        }
        Ok(probs)
    }

    /// Normalize and smooth the counts into a model.
    pub fn make_ngram_model(mut self) -> Result<NGramModel> {
        let unk = self.unk_prob()?;
        let unigrams = self.unigram_probs()?;
        let mut bigrams: [BigramProbs; 3] = Default::default();
        for level in Level::ALL {
            bigrams[level.index()] = self.bigram_probs(level)?;
        }
        info!("computed probabilities");

        let syms = self.counts.symbols();
        let mut backoffs: [BackoffWeights; 3] = Default::default();
        for level in Level::ALL {
            let fallback = match (level.coarser(), self.counts.cluster_map(level)) {
                (Some(coarser), Some(map)) => Fallback::Cluster {
                    map,
                    probs: &bigrams[coarser.index()],
                },
                _ => Fallback::Unigram(&unigrams),
            };
            backoffs[level.index()] = backoff_weights(
                &bigrams[level.index()],
                fallback,
                syms,
                self.config.undefined,
                &mut self.diagnostics,
            )?;
            info!(
                "computed {} backoff weights out of {:?} contexts",
                backoffs[level.index()].len(),
                level
            );
        }

        let diagnostics = self.diagnostics;
        if diagnostics != ModelDiagnostics::default() {
            info!(
                "{} undefined values left out, {} backoff weights above zero",
                diagnostics.undefined, diagnostics.positive_backoffs
            );
        }
        Ok(NGramModel {
            syms: syms.clone(),
            unk_symbol: self.config.unk_symbol.clone(),
            unk,
            unigrams,
            bigrams,
            backoffs,
            diagnostics,
        })
    }
}
