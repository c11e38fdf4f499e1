use log::warn;
use rustfst::{Label, SymbolTable};

use crate::config::UndefinedPolicy;
use crate::count::ClusterMap;
use crate::error::{Error, Result};
use crate::model::{checked, BackoffWeights, BigramProbs, ModelDiagnostics, UnigramProbs};

/// The distribution a context backs off to
#[derive(Debug, Clone, Copy)]
pub enum Fallback<'a> {
    /// Bigrams of the coarser context the specific one maps to
    Cluster {
        map: &'a ClusterMap,
        probs: &'a BigramProbs,
    },
    /// The plain unigram distribution, dropping the context entirely
    Unigram(&'a UnigramProbs),
}

impl<'a> Fallback<'a> {
    /// Coarser distribution over followers of a specific context
    fn for_context(&self, context: Label, syms: &SymbolTable) -> Result<&'a UnigramProbs> {
        match *self {
            Fallback::Cluster { map, probs } => {
                let coarse = map.get(context).ok_or_else(|| Error::MissingMapping {
                    what: map.kind(),
                    key: symbol_name(syms, context),
                })?;
                probs.get(&coarse).ok_or_else(|| Error::MissingMapping {
                    what: "coarser bigram context",
                    key: symbol_name(syms, coarse),
                })
            }
            Fallback::Unigram(probs) => Ok(probs),
        }
    }
}

/// Unseen mass at or below this counts as none left
const MASS_EPS: f64 = 1e-6;

fn mass_detail(prev_mass: f64, curr_mass: f64) -> String {
    format!(
        "observed mass {} here against {} after backing off",
        prev_mass, curr_mass
    )
}

fn symbol_name(syms: &SymbolTable, label: Label) -> String {
    syms.get_symbol(label)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", label))
}

/// Compute the backoff weight (alpha) of every context in `specific`.
///
/// For a context with observed followers `w`, the weight is
/// `log10(1 - sum P_specific(w)) - log10(1 - sum P_coarser(w))`, the ratio
/// of mass left for unseen followers at the two levels. A context with
/// (almost) no unseen mass left at either level has no defined weight.
pub fn backoff_weights(
    specific: &BigramProbs,
    fallback: Fallback<'_>,
    syms: &SymbolTable,
    policy: UndefinedPolicy,
    diagnostics: &mut ModelDiagnostics,
) -> Result<BackoffWeights> {
    let mut weights = BackoffWeights::new();
    for (&context, following) in specific {
        let coarser = fallback.for_context(context, syms)?;
        let mut prev_mass = 0.0;
        let mut curr_mass = 0.0;
        for (&w, p) in following {
            prev_mass += 10f64.powf(p.into_inner());
            let coarse = coarser.get(&w).ok_or_else(|| Error::MissingMapping {
                what: "coarser probability",
                key: symbol_name(syms, w),
            })?;
            curr_mass += 10f64.powf(coarse.into_inner());
        }
        let name = || symbol_name(syms, context);
        let weight = if 1.0 - prev_mass <= MASS_EPS || 1.0 - curr_mass <= MASS_EPS {
            Err(Error::Numerical {
                what: "backoff weight",
                key: name(),
                detail: mass_detail(prev_mass, curr_mass),
            })
        } else {
            let weight = (1.0 - prev_mass).log10() - (1.0 - curr_mass).log10();
            checked(weight, "backoff weight", name).map_err(|e| match e {
                Error::Numerical { what, key, .. } => Error::Numerical {
                    what,
                    key,
                    detail: mass_detail(prev_mass, curr_mass),
                },
                other => other,
            })
        };
        if let Some(weight) = diagnostics.admit(policy, weight)? {
            if weight.into_inner() > 0.0 {
                warn!(
                    "backoff weight {} for {:?} is above zero (mass {} against {})",
                    weight,
                    name(),
                    prev_mass,
                    curr_mass
                );
                diagnostics.positive_backoffs += 1;
            }
            weights.insert(context, weight);
        }
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogProb;

    fn lp(x: f64) -> LogProb {
        checked(x, "test", String::new).unwrap()
    }

    fn bigrams(entries: &[(Label, Label, f64)]) -> BigramProbs {
        let mut probs = BigramProbs::new();
        for &(c, w, p) in entries {
            probs.entry(c).or_default().insert(w, lp(p));
        }
        probs
    }

    fn syms() -> SymbolTable {
        let mut syms = SymbolTable::new();
        for s in ["a", "b", "c", "x", "y"] {
            syms.add_symbol(s);
        }
        syms
    }

    #[test]
    fn it_backs_off_to_unigrams() {
        // a=1 b=2 c=3
        let specific = bigrams(&[(1, 2, 0.5f64.log10()), (1, 3, 0.25f64.log10())]);
        let unigrams: UnigramProbs = [(2, lp(0.2f64.log10())), (3, lp(0.3f64.log10()))]
            .into_iter()
            .collect();
        let mut diagnostics = ModelDiagnostics::default();
        let weights = backoff_weights(
            &specific,
            Fallback::Unigram(&unigrams),
            &syms(),
            UndefinedPolicy::Fail,
            &mut diagnostics,
        )
        .unwrap();
        let expected = 0.25f64.log10() - 0.5f64.log10();
        assert!((weights[&1].into_inner() - expected).abs() < 1e-12);
        assert_eq!(diagnostics, ModelDiagnostics::default());
    }

    #[test]
    fn it_backs_off_through_cluster_maps() {
        let syms = syms();
        let mut map = ClusterMap::new("word to small cluster");
        // a -> x, b -> x
        map.insert(1, 4, &syms).unwrap();
        map.insert(2, 4, &syms).unwrap();
        let specific = bigrams(&[(1, 3, 0.5f64.log10()), (2, 3, 0.9f64.log10())]);
        let coarse = bigrams(&[(4, 3, 0.8f64.log10())]);
        let mut diagnostics = ModelDiagnostics::default();
        let weights = backoff_weights(
            &specific,
            Fallback::Cluster {
                map: &map,
                probs: &coarse,
            },
            &syms,
            UndefinedPolicy::Fail,
            &mut diagnostics,
        )
        .unwrap();
        assert!((weights[&1].into_inner() - (0.5f64.log10() - 0.2f64.log10())).abs() < 1e-12);
        // a keeps more unseen mass than x does, which gets flagged
        assert!(weights[&1].into_inner() > 0.0);
        assert!(weights[&2].into_inner() < 0.0);
        assert_eq!(diagnostics.positive_backoffs, 1);
    }

    #[test]
    fn saturated_mass_is_an_error() {
        let specific = bigrams(&[(1, 2, 0.0)]);
        let unigrams: UnigramProbs = [(2, lp(0.5f64.log10()))].into_iter().collect();
        let mut diagnostics = ModelDiagnostics::default();
        let err = backoff_weights(
            &specific,
            Fallback::Unigram(&unigrams),
            &syms(),
            UndefinedPolicy::Fail,
            &mut diagnostics,
        )
        .unwrap_err();
        match err {
            Error::Numerical { key, detail, .. } => {
                assert_eq!(key, "a");
                assert!(detail.contains("observed mass 1"), "{}", detail);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn nearly_saturated_mass_is_an_error() {
        // five followers at 1/5 each sum to just under 1
        let fifth = 0.2f64.log10();
        let specific = bigrams(&[
            (1, 2, fifth),
            (1, 3, fifth),
            (1, 4, fifth),
            (1, 5, fifth),
            (1, 6, fifth),
        ]);
        let unigrams: UnigramProbs = (2..=6).map(|w| (w, lp(0.1f64.log10()))).collect();
        let mut syms = syms();
        syms.add_symbol("z");
        let mut diagnostics = ModelDiagnostics::default();
        let err = backoff_weights(
            &specific,
            Fallback::Unigram(&unigrams),
            &syms,
            UndefinedPolicy::Fail,
            &mut diagnostics,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Numerical { what: "backoff weight", .. }));
    }

    #[test]
    fn saturated_mass_can_be_skipped() {
        let specific = bigrams(&[(1, 2, 0.0), (3, 2, 0.5f64.log10())]);
        let unigrams: UnigramProbs = [(2, lp(0.25f64.log10()))].into_iter().collect();
        let mut diagnostics = ModelDiagnostics::default();
        let weights = backoff_weights(
            &specific,
            Fallback::Unigram(&unigrams),
            &syms(),
            UndefinedPolicy::Skip,
            &mut diagnostics,
        )
        .unwrap();
        assert!(!weights.contains_key(&1));
        assert!(weights.contains_key(&3));
        assert_eq!(diagnostics.undefined, 1);
    }

    #[test]
    fn empty_specific_table_gives_no_weights() {
        let map = ClusterMap::new("word to small cluster");
        let mut diagnostics = ModelDiagnostics::default();
        let weights = backoff_weights(
            &BigramProbs::new(),
            Fallback::Cluster {
                map: &map,
                probs: &BigramProbs::new(),
            },
            &syms(),
            UndefinedPolicy::Fail,
            &mut diagnostics,
        )
        .unwrap();
        assert!(weights.is_empty());
    }

    #[test]
    fn unmapped_context_is_an_internal_error() {
        let map = ClusterMap::new("word to small cluster");
        let specific = bigrams(&[(1, 2, -1.0)]);
        let mut diagnostics = ModelDiagnostics::default();
        let err = backoff_weights(
            &specific,
            Fallback::Cluster {
                map: &map,
                probs: &BigramProbs::new(),
            },
            &syms(),
            UndefinedPolicy::Skip,
            &mut diagnostics,
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }
}
