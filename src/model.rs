use log::warn;
use ordered_float::NotNan;
use rustfst::{Label, SymbolTable};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::UndefinedPolicy;
use crate::error::{Error, Result};
use crate::token::Level;

/// Base-10 log-probability or log-weight, always finite
pub type LogProb = NotNan<f64>;
/// word -> log P(word)
pub type UnigramProbs = BTreeMap<Label, LogProb>;
/// context -> word -> log P(word | context)
pub type BigramProbs = BTreeMap<Label, BTreeMap<Label, LogProb>>;
/// context -> log backoff weight
pub type BackoffWeights = BTreeMap<Label, LogProb>;

/// Wrap a computed value, rejecting NaN and infinities.
pub fn checked(value: f64, what: &'static str, key: impl FnOnce() -> String) -> Result<LogProb> {
    NotNan::new(value)
        .ok()
        .filter(|v| v.into_inner().is_finite())
        .ok_or_else(|| Error::Numerical {
            what,
            key: key(),
            detail: format!("value is {}", value),
        })
}

/// Questionable values seen while building a model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelDiagnostics {
    /// Entries left out because they were not finite
    pub undefined: usize,
    /// Backoff weights above zero, i.e. more unseen mass at the specific
    /// level than at the coarser one
    pub positive_backoffs: usize,
}

impl ModelDiagnostics {
    /// Apply the undefined-value policy to a computed value.
    pub(crate) fn admit(
        &mut self,
        policy: UndefinedPolicy,
        value: Result<LogProb>,
    ) -> Result<Option<LogProb>> {
        match (value, policy) {
            (Ok(v), _) => Ok(Some(v)),
            (Err(e @ Error::Numerical { .. }), UndefinedPolicy::Skip) => {
                warn!("leaving out {}", e);
                self.undefined += 1;
                Ok(None)
            }
            (Err(e), _) => Err(e),
        }
    }
}

/// Section header for bigrams whose context is at `level`
fn bigram_header(level: Level) -> String {
    format!("\\2-grams {}w:", level.tag())
}

/// Section header for backoff weights out of `level`
fn backoff_header(level: Level) -> String {
    let to = level.coarser().map(Level::tag).unwrap_or("unigram");
    format!("\\backoff {} to {}:", level.tag(), to)
}

/// A bigram model with multidimensional backoff over a factored vocabulary.
#[derive(Debug, Clone)]
pub struct NGramModel {
    pub(crate) syms: SymbolTable,
    pub(crate) unk_symbol: String,
    /// Unknown-word log-probability
    pub(crate) unk: Option<LogProb>,
    pub(crate) unigrams: UnigramProbs,
    /// Bigram tables by context level
    pub(crate) bigrams: [BigramProbs; 3],
    /// Backoff weights by the level backed off from
    pub(crate) backoffs: [BackoffWeights; 3],
    pub(crate) diagnostics: ModelDiagnostics,
}

impl NGramModel {
    fn symbol(&self, label: Label) -> Result<&str> {
        self.syms
            .get_symbol(label)
            .ok_or_else(|| Error::MissingMapping {
                what: "symbol",
                key: format!("#{}", label),
            })
    }

    pub fn unk(&self) -> Option<f64> {
        self.unk.map(NotNan::into_inner)
    }

    /// log P(word)
    pub fn unigram(&self, word: &str) -> Option<f64> {
        let w = self.syms.get_label(word)?;
        self.unigrams.get(&w).map(|p| p.into_inner())
    }

    /// log P(word | context) with the context at `level`
    pub fn bigram(&self, level: Level, context: &str, word: &str) -> Option<f64> {
        let c = self.syms.get_label(context)?;
        let w = self.syms.get_label(word)?;
        self.bigrams[level.index()]
            .get(&c)?
            .get(&w)
            .map(|p| p.into_inner())
    }

    /// Weight for backing off from `context` at `level` to the next level
    pub fn backoff(&self, level: Level, context: &str) -> Option<f64> {
        let c = self.syms.get_label(context)?;
        self.backoffs[level.index()]
            .get(&c)
            .map(|p| p.into_inner())
    }

    pub fn unigrams(&self) -> &UnigramProbs {
        &self.unigrams
    }

    pub fn bigrams(&self, level: Level) -> &BigramProbs {
        &self.bigrams[level.index()]
    }

    pub fn backoffs(&self, level: Level) -> &BackoffWeights {
        &self.backoffs[level.index()]
    }

    pub fn diagnostics(&self) -> ModelDiagnostics {
        self.diagnostics
    }

    /// Write the model as text, one section after another:
    /// unknown word, unigrams, bigrams from the coarsest context to the
    /// word context, then backoff weights in the same order.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "\\unks:")?;
        if let Some(unk) = self.unk {
            writeln!(out, "{}\t{}", unk, self.unk_symbol)?;
        }

        writeln!(out, "\\1-grams:")?;
        for (&w, p) in &self.unigrams {
            writeln!(out, "{}\t{}", p, self.symbol(w)?)?;
        }

        for level in Level::ALL.iter().rev() {
            writeln!(out, "{}", bigram_header(*level))?;
            for (&c, following) in &self.bigrams[level.index()] {
                let context = self.symbol(c)?;
                for (&w, p) in following {
                    writeln!(out, "{}\t{} {}", p, context, self.symbol(w)?)?;
                }
            }
        }

        for level in Level::ALL.iter().rev() {
            writeln!(out, "{}", backoff_header(*level))?;
            for (&c, weight) in &self.backoffs[level.index()] {
                writeln!(out, "{}\t{}", weight, self.symbol(c)?)?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Write the model to a file.
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write(&mut out)
    }

    /// The serialized model as a string
    pub fn to_text(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lp(x: f64) -> LogProb {
        checked(x, "test", String::new).unwrap()
    }

    fn tiny_model() -> NGramModel {
        let mut syms = SymbolTable::new();
        let a = syms.add_symbol("a");
        let b = syms.add_symbol("b");
        let x = syms.add_symbol("x");
        let p = syms.add_symbol("p");
        let mut model = NGramModel {
            syms,
            unk_symbol: "<unk>".into(),
            unk: Some(lp(-0.5)),
            unigrams: [(a, lp(-0.25)), (b, lp(-0.75))].into_iter().collect(),
            bigrams: Default::default(),
            backoffs: Default::default(),
            diagnostics: ModelDiagnostics::default(),
        };
        for (level, ctx) in [(Level::Word, a), (Level::SmallCluster, x), (Level::LargeCluster, p)] {
            model.bigrams[level.index()].insert(ctx, [(b, lp(-1.0))].into_iter().collect());
            model.backoffs[level.index()].insert(ctx, lp(0.0));
        }
        model
    }

    #[test]
    fn it_writes_sections_in_order() {
        let text = tiny_model().to_text().unwrap();
        let expected = "\\unks:\n-0.5\t<unk>\n\
                        \\1-grams:\n-0.25\ta\n-0.75\tb\n\
                        \\2-grams lw:\n-1\tp b\n\
                        \\2-grams sw:\n-1\tx b\n\
                        \\2-grams ww:\n-1\ta b\n\
                        \\backoff l to unigram:\n0\tp\n\
                        \\backoff s to l:\n0\tx\n\
                        \\backoff w to s:\n0\ta\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn it_looks_up_by_symbol() {
        let model = tiny_model();
        assert_eq!(model.unigram("a"), Some(-0.25));
        assert_eq!(model.unigram("zzz"), None);
        assert_eq!(model.bigram(Level::SmallCluster, "x", "b"), Some(-1.0));
        assert_eq!(model.bigram(Level::Word, "x", "b"), None);
        assert_eq!(model.backoff(Level::LargeCluster, "p"), Some(0.0));
        assert_eq!(model.unk(), Some(-0.5));
    }

    #[test]
    fn it_rejects_non_finite_values() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0f64.log10()] {
            let err = checked(bad, "backoff weight", || "a".into()).unwrap_err();
            assert_eq!(err.exit_code(), 5);
        }
        assert_eq!(checked(-3.5, "x", String::new).unwrap().into_inner(), -3.5);
    }

    #[test]
    fn skip_policy_counts_undefined_values() {
        let mut diagnostics = ModelDiagnostics::default();
        let bad = || checked(f64::NAN, "unigram probability", || "a".into());
        assert!(diagnostics.admit(UndefinedPolicy::Skip, bad()).unwrap().is_none());
        assert_eq!(diagnostics.undefined, 1);
        assert!(diagnostics.admit(UndefinedPolicy::Fail, bad()).is_err());
        let missing = Err(Error::MissingMapping {
            what: "discount",
            key: "3".into(),
        });
        assert!(diagnostics.admit(UndefinedPolicy::Skip, missing).is_err());
    }
}
