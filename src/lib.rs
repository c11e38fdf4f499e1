//! Factored bigram language models with multidimensional backoff.
//!
//! Every corpus token carries a word, a small cluster and a large cluster,
//! written `W-word|S-small|L-large`. The model estimates word bigrams
//! conditioned on the previous word, its small cluster and its large
//! cluster, and backs off from each level to the next coarser one and
//! finally to unigrams.
use log::info;
use std::io::BufRead;
use std::path::Path;

/// Backoff weights between adjacent levels
pub mod backoff;
/// Count-of-count bins
pub mod coc;
/// Build configuration and factor scheme
pub mod config;
/// Functions for counting factored N-Grams from text
pub mod count;
/// Good-Turing discounts
pub mod discount;
pub mod error;
/// Factor files and corpus preprocessing
pub mod factors;
/// Probability estimation
pub mod make;
/// The estimated model and its text format
pub mod model;
/// Factored tokens and context levels
pub mod token;

pub use config::{Config, FactorScheme};
pub use count::{NGramCounter, NGramCounts};
pub use error::{Error, Result};
pub use make::NGramMaker;
pub use model::NGramModel;
pub use token::{Level, Token};

/// Estimate a model from counts.
pub fn make_model(config: &Config, counts: &NGramCounts) -> Result<NGramModel> {
    NGramMaker::new(config, counts)?.make_ngram_model()
}

/// Count a corpus read from `reader` and estimate a model from it.
pub fn build_model_from_reader<R: BufRead>(reader: R, config: &Config) -> Result<NGramModel> {
    let mut counter = NGramCounter::new(config);
    counter.count_from_reader(reader, None)?;
    let counts = counter.finish();
    info!("counted {} words", counts.total_words());
    make_model(config, &counts)
}

/// Count a corpus file and estimate a model from it.
pub fn build_model(input: &Path, config: &Config) -> Result<NGramModel> {
    let mut counter = NGramCounter::new(config);
    counter.count_from_path(input)?;
    make_model(config, &counter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UndefinedPolicy;
    use std::path::PathBuf;

    const TWO_LINES: &str = "W-a|S-x|L-p\nW-a|S-x|L-p W-b|S-y|L-p\n";

    #[test]
    fn it_writes_a_model() {
        let model = build_model_from_reader(TWO_LINES.as_bytes(), &Config::default()).unwrap();
        let text = model.to_text().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let ww = lines.iter().position(|l| *l == "\\2-grams ww:").unwrap();
        assert!(lines[ww + 1].ends_with("\ta b"), "{}", lines[ww + 1]);
        let headers: Vec<&str> = lines.iter().copied().filter(|l| l.starts_with('\\')).collect();
        assert_eq!(
            headers,
            vec![
                "\\unks:",
                "\\1-grams:",
                "\\2-grams lw:",
                "\\2-grams sw:",
                "\\2-grams ww:",
                "\\backoff l to unigram:",
                "\\backoff s to l:",
                "\\backoff w to s:",
            ]
        );
        assert_eq!(lines[1], format!("{}\t<unk>", -(2f64.log10())));
    }

    #[test]
    fn it_is_deterministic() {
        let config = Config {
            undefined: UndefinedPolicy::Skip,
            ..Config::default()
        };
        let first = build_model(&PathBuf::from("testdata/austen.txt"), &config)
            .unwrap()
            .to_text()
            .unwrap();
        let second = build_model(&PathBuf::from("testdata/austen.txt"), &config)
            .unwrap()
            .to_text()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn inconsistent_corpus_writes_nothing() {
        let corpus = "W-a|S-x|L-p\nW-a|S-y|L-p\n";
        let result = build_model_from_reader(corpus.as_bytes(), &Config::default());
        assert!(matches!(result, Err(Error::Consistency { .. })));
    }

    #[test]
    fn it_builds_from_the_fixture() {
        let config = Config {
            undefined: UndefinedPolicy::Skip,
            ..Config::default()
        };
        let model = build_model(&PathBuf::from("testdata/austen.txt"), &config).unwrap();
        assert!(model.unigram("dashwood").is_some());
        assert!(model.bigram(Level::Word, "was", "not").is_some());
        assert!(model.bigram(Level::SmallCluster, "V_AUX", "not").is_some());
        assert!(model.bigram(Level::LargeCluster, "V", "not").is_some());
        assert!(model.bigram(Level::Word, "not", "was").is_none());
        let text = model.to_text().unwrap();
        assert!(text.contains("\tthe family\n"));
        assert!(text.contains("\tDET_DEF family\n"));
        assert!(text.contains("\tD family\n"));
        for line in text.lines().filter(|l| !l.starts_with('\\')) {
            let (value, _) = line.split_once('\t').unwrap();
            assert!(value.parse::<f64>().unwrap().is_finite(), "{}", line);
        }
        // 19 singletons in a vocabulary of 29
        let unk = 19f64.log10() - 29f64.log10();
        assert!((model.unk().unwrap() - unk).abs() < 1e-12);
        // "he" and PRON are both followed by "was" three times
        assert_eq!(model.backoff(Level::Word, "he"), Some(0.0));
    }

    #[test]
    fn fixture_saturates_one_backoff() {
        // "estate was" is seen twice, and with three bigrams seen three
        // times Good-Turing scales it to more than the whole mass
        let err = build_model(&PathBuf::from("testdata/austen.txt"), &Config::default())
            .unwrap_err();
        match &err {
            Error::Numerical { what, key, .. } => {
                assert_eq!((*what, key.as_str()), ("backoff weight", "estate"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let config = Config {
            undefined: UndefinedPolicy::Skip,
            ..Config::default()
        };
        let model = build_model(&PathBuf::from("testdata/austen.txt"), &config).unwrap();
        assert_eq!(model.backoff(Level::Word, "estate"), None);
        assert!(model.bigram(Level::Word, "estate", "was").unwrap() > 0.0);
        let diagnostics = model.diagnostics();
        assert_eq!(diagnostics.undefined, 1);
        assert_eq!(diagnostics.positive_backoffs, 20);
        assert_eq!(model.backoffs(Level::Word).len(), 26);
        assert_eq!(model.backoffs(Level::SmallCluster).len(), 14);
        assert_eq!(model.backoffs(Level::LargeCluster).len(), 6);
    }

    #[test]
    fn nearly_saturated_context_is_reported() {
        // every follower of "A" is a singleton at 1/5, which sums to 1 up to
        // rounding, and "H" has one follower at probability 1
        let path = PathBuf::from("testdata/saturated.txt");
        let err = build_model(&path, &Config::default()).unwrap_err();
        match &err {
            Error::Numerical { what, key, .. } => {
                assert_eq!((*what, key.as_str()), ("backoff weight", "A"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let config = Config {
            undefined: UndefinedPolicy::Skip,
            ..Config::default()
        };
        let model = build_model(&path, &config).unwrap();
        assert_eq!(model.backoff(Level::Word, "A"), None);
        assert_eq!(model.backoff(Level::Word, "H"), None);
        assert!(model.backoff(Level::Word, "B").is_some());
        assert_eq!(model.backoffs(Level::Word).len(), 3);
        assert_eq!(model.diagnostics().undefined, 2);
        let text = model.to_text().unwrap();
        let (_, word_backoffs) = text.split_once("\\backoff w to s:\n").unwrap();
        assert!(!word_backoffs.contains("\tA\n"), "{}", word_backoffs);
    }
}
