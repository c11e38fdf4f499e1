use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info, LevelFilter};

use factored_ngram::config::{Normalizer, UndefinedPolicy};
use factored_ngram::factors::{add_factors, substitute_clusters, FactorLayers, FactorMap};
use factored_ngram::{build_model, Config};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Factored bigram language models with multidimensional backoff",
    long_about = None
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a model from a factored training corpus
    Build(BuildArgs),
    /// Add two layers of factors to a plain corpus
    AddFactors(AddFactorsArgs),
    /// Replace words with their clusters
    Word2cluster(Word2ClusterArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum NormalizerArg {
    Outgoing,
    ContextUnigram,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Training corpus, one sentence per line of `W-word|S-small|L-large` tokens
    training_file: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the model here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Leave out undefined values with a warning instead of failing
    #[arg(long)]
    allow_undefined: bool,

    /// Context symbol for the first word of each sentence
    #[arg(long, value_name = "SYMBOL")]
    sentence_start: Option<String>,

    /// Word appended to the end of each sentence
    #[arg(long, value_name = "SYMBOL")]
    sentence_end: Option<String>,

    /// What bigram counts are divided by
    #[arg(long, value_enum)]
    normalizer: Option<NormalizerArg>,
}

#[derive(Args, Debug)]
struct AddFactorsArgs {
    /// Plain corpus, one sentence per line
    infile: PathBuf,
    /// Word to first factor file
    factor1: PathBuf,
    /// Label for the first factor
    label1: char,
    /// First factor to second factor file
    factor2: PathBuf,
    /// Label for the second factor
    label2: char,
}

#[derive(Args, Debug)]
struct Word2ClusterArgs {
    /// Plain corpus, one sentence per line
    infile: PathBuf,
    /// Word to cluster file
    cluster_file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Build(args) => run_build(args),
        Commands::AddFactors(args) => run_add_factors(args),
        Commands::Word2cluster(args) => run_word2cluster(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<factored_ngram::Error>()
                .map(factored_ngram::Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

/// Level forced by the verbosity flags; `None` leaves it to `RUST_LOG`
fn verbosity_level(verbose: u8, quiet: u8) -> Option<LevelFilter> {
    match (quiet, verbose) {
        (0, 0) => None,
        (0, 1) => Some(LevelFilter::Debug),
        (0, _) => Some(LevelFilter::Trace),
        (1, _) => Some(LevelFilter::Warn),
        _ => Some(LevelFilter::Error),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(level) = verbosity_level(verbose, quiet) {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}

fn run_build(args: BuildArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load_toml(path)?,
        None => Config::default(),
    };
    if args.allow_undefined {
        config.undefined = UndefinedPolicy::Skip;
    }
    if args.sentence_start.is_some() {
        config.sentence_start = args.sentence_start;
    }
    if args.sentence_end.is_some() {
        config.sentence_end = args.sentence_end;
    }
    match args.normalizer {
        Some(NormalizerArg::Outgoing) => config.normalizer = Normalizer::Outgoing,
        Some(NormalizerArg::ContextUnigram) => config.normalizer = Normalizer::ContextUnigram,
        None => {}
    }
    config.validate()?;

    let model = build_model(&args.training_file, &config)?;
    match &args.output {
        Some(path) => {
            model.write_to_path(path)?;
            info!("wrote model to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            model.write(&mut out)?;
        }
    }
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let fh = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    Ok(BufReader::new(fh))
}

fn run_add_factors(args: AddFactorsArgs) -> Result<()> {
    let config = Config::default();
    let scheme = &config.scheme;
    if [args.label1, args.label2].contains(&scheme.word_label) || args.label1 == args.label2 {
        return Err(anyhow!(
            "factor labels must differ from each other and from {:?}",
            scheme.word_label
        ));
    }
    let first = FactorMap::load(&args.factor1, ' ')?;
    let second = FactorMap::load(&args.factor2, ' ')?;
    let layers = FactorLayers {
        first: &first,
        first_label: args.label1,
        second: &second,
        second_label: args.label2,
    };
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    add_factors(open(&args.infile)?, &mut out, layers, scheme)?;
    out.flush()?;
    Ok(())
}

fn run_word2cluster(args: Word2ClusterArgs) -> Result<()> {
    let config = Config::default();
    let clusters = FactorMap::load(&args.cluster_file, ' ')?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    substitute_clusters(open(&args.infile)?, &mut out, &clusters, &config.scheme)?;
    out.flush()?;
    Ok(())
}
