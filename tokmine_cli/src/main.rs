mod subjects;

use subjects::calc::Calc;
use subjects::sexpr::Sexpr;
use subjects::{Subject, SubjectName};
use tokmine_core::config::{DEFAULT_CONFIG_PATH, HarnessConfig, Strategy};
use tokmine_core::{
    CampaignReport, HarnessError, MiningReport, ReplayDriver, RestrictionProfile, TokenMiner,
};

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Status for failures outside a harness run: unreadable or invalid
/// configuration.
const CONFIG_EXIT_CODE: i32 = 3;
const ARGUMENT_EXIT_CODE: i32 = 1;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Input length in bytes, terminator included.
    length: Option<usize>,
    /// Character-class profile: none, letters, digits or punctuation.
    profile: Option<String>,
    /// Explore the subject's parser over mined token identifiers.
    #[clap(long)]
    replay: bool,
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,
    #[clap(long, value_enum)]
    subject: Option<SubjectName>,
    #[clap(long)]
    allow_list: Option<PathBuf>,
    #[clap(long)]
    strategy: Option<Strategy>,
    #[clap(long)]
    max_paths: Option<u64>,
    #[clap(long)]
    seed: Option<u64>,
    #[clap(long, value_enum, default_value = "human")]
    format: Format,
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Mine {
        length: usize,
        profile: RestrictionProfile,
    },
    Explore {
        length: usize,
    },
    Replay,
}

impl Mode {
    fn from_cli(cli: &Cli) -> Result<Self, HarnessError> {
        match (cli.replay, cli.length, cli.profile.as_deref()) {
            (true, None, None) => Ok(Mode::Replay),
            (true, _, _) => Err(HarnessError::Argument(
                "--replay takes no positional arguments".to_string(),
            )),
            (false, Some(length), Some(profile)) => Ok(Mode::Mine {
                length,
                profile: profile.parse()?,
            }),
            (false, Some(length), None) => Ok(Mode::Explore { length }),
            (false, None, _) => Err(HarnessError::Argument(
                "usage: harness <length> [profile] | harness --replay".to_string(),
            )),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig, anyhow::Error> {
    match path {
        Some(config_path) => {
            info!("Loading configuration from {config_path:?}");
            HarnessConfig::load_from_file(config_path)
        }
        None => {
            let default_config_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_config_path.exists() {
                info!("Loading default configuration from {default_config_path:?}");
                HarnessConfig::load_from_file(default_config_path)
            } else {
                debug!("No {DEFAULT_CONFIG_PATH} found, using built-in defaults");
                Ok(HarnessConfig::default())
            }
        }
    }
}

fn apply_overrides(config: &mut HarnessConfig, cli: &Cli) -> Result<(), HarnessError> {
    if let Some(path) = &cli.allow_list {
        config.allow_list.path = path.clone();
    }
    if let Some(strategy) = cli.strategy {
        config.explorer.strategy = strategy;
    }
    if let Some(max_paths) = cli.max_paths {
        if max_paths == 0 {
            return Err(HarnessError::Argument(
                "--max-paths must be at least 1".to_string(),
            ));
        }
        config.explorer.max_paths = max_paths;
    }
    if let Some(seed) = cli.seed {
        config.explorer.seed = seed;
    }
    Ok(())
}

fn print_mining(report: &MiningReport, format: Format) -> Result<(), anyhow::Error> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for profile in &report.profiles {
        let stats = &profile.stats;
        println!(
            "Profile {}: {} paths ({} succeeded, {} discarded){}",
            profile.profile,
            stats.paths,
            stats.successes,
            stats.discards,
            if stats.exhausted { ", all covered" } else { "" }
        );
    }
    for (id, samples) in &report.tokens {
        println!(
            "  token {id}: samples {:?}, alphabet {:?}",
            samples.samples,
            samples.alphabet_string()
        );
    }
    println!("New token identifiers: {:?}", report.new_ids);
    if !report.dropped_ids.is_empty() {
        println!("Dropped (allow-list full): {:?}", report.dropped_ids);
    }
    println!(
        "Allow-list {:?}: {} identifiers{}",
        report.allow_list_path,
        report.allow_list_len,
        if report.persisted { "" } else { " (unchanged)" }
    );
    Ok(())
}

fn print_campaign(report: &CampaignReport, format: Format) -> Result<(), anyhow::Error> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let stats = &report.stats;
    println!(
        "{} exploration: {} paths, {} succeeded, {} discarded, {} stopped by harness limits{}",
        report.mode,
        stats.paths,
        stats.successes,
        stats.discards,
        stats.limits,
        if stats.exhausted { ", all covered" } else { "" }
    );
    for bug in &report.defects {
        println!("\n!!! DEFECT FOUND !!!");
        println!("  Decisions: {:?}", bug.decisions);
        println!("  Description: {}", bug.description);
        println!("  Exit status: {}", bug.exit_code);
        println!("  Paths with this cause: {}", bug.occurrences);
        println!("  Hash: {}", bug.input_hash);
    }
    println!(
        "Defects found: {} distinct, over {} faulting paths",
        report.defects.len(),
        report.faulting_paths()
    );
    Ok(())
}

fn run_subject<S: Subject>(
    mode: Mode,
    config: &HarnessConfig,
    format: Format,
) -> Result<i32, anyhow::Error> {
    let single_path = config.explorer.max_paths == 1;
    let last_exit_code = match mode {
        Mode::Mine { length, profile } => {
            let miner = TokenMiner::new(&config.allow_list.path, config.explorer.clone());
            let report = miner.mine(length, &[profile], |stream| {
                S::next_token(stream).map(|token| S::kind_id(&token))
            })?;
            print_mining(&report, format)?;
            report.last_exit_code()
        }
        Mode::Explore { length } => {
            let driver = ReplayDriver::new(&config.allow_list.path, config.explorer.clone());
            let report = driver.run_lexed(length, S::next_token, S::parse)?;
            print_campaign(&report, format)?;
            report.last_exit_code()
        }
        Mode::Replay => {
            let driver = ReplayDriver::new(&config.allow_list.path, config.explorer.clone());
            let report = driver.run_pooled(S::parse)?;
            print_campaign(&report, format)?;
            report.last_exit_code()
        }
    };
    Ok(if single_path { last_exit_code } else { 0 })
}

fn run(cli: Cli) -> Result<i32, anyhow::Error> {
    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli)?;
    let mode = Mode::from_cli(&cli)?;
    let subject = match cli.subject {
        Some(subject) => subject,
        None => config.subject.name.parse()?,
    };
    debug!("Effective configuration: {config:?}");
    info!("Running {mode:?} against {subject:?}");
    match subject {
        SubjectName::Calc => run_subject::<Calc>(mode, &config, cli.format),
        SubjectName::Sexpr => run_subject::<Sexpr>(mode, &config, cli.format),
    }
}

/// Harness failures carry their own status; anything else happened while
/// reading configuration.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<HarnessError>() {
        Some(harness_err) => harness_err.exit_code(),
        None => CONFIG_EXIT_CODE,
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                ARGUMENT_EXIT_CODE
            } else {
                0
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            exit_code(&err)
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokmine_core::AllowListError;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("harness").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn positional_arity_selects_the_mode() {
        assert_eq!(
            Mode::from_cli(&cli(&["5", "letters"])).unwrap(),
            Mode::Mine {
                length: 5,
                profile: RestrictionProfile::Letters
            }
        );
        assert_eq!(
            Mode::from_cli(&cli(&["3"])).unwrap(),
            Mode::Explore { length: 3 }
        );
        assert_eq!(Mode::from_cli(&cli(&["--replay"])).unwrap(), Mode::Replay);
    }

    #[test]
    fn bad_arguments_map_to_their_exit_codes() {
        let err = Mode::from_cli(&cli(&[])).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        let err = Mode::from_cli(&cli(&["--replay", "4"])).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        let err = Mode::from_cli(&cli(&["5", "vowels"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(Cli::try_parse_from(["harness", "1", "2", "3"]).is_err());
    }

    #[test]
    fn overrides_win_over_config() {
        let mut config = HarnessConfig::default();
        let args = cli(&[
            "--replay",
            "--allow-list",
            "mined.txt",
            "--strategy",
            "random",
            "--max-paths",
            "1",
            "--seed",
            "11",
        ]);
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.allow_list.path, PathBuf::from("mined.txt"));
        assert_eq!(config.explorer.strategy, Strategy::Random);
        assert_eq!(config.explorer.max_paths, 1);
        assert_eq!(config.explorer.seed, 11);

        let zero = cli(&["--replay", "--max-paths", "0"]);
        assert!(apply_overrides(&mut config, &zero).is_err());
    }

    #[test]
    fn exit_codes_follow_the_error_kind() {
        let missing: anyhow::Error = HarnessError::from(AllowListError::Empty {
            path: PathBuf::from("token_constraint.txt"),
        })
        .into();
        assert_eq!(exit_code(&missing), 3);
        let bad_toml = HarnessConfig::parse("[explorer\n").unwrap_err();
        assert_eq!(exit_code(&bad_toml), CONFIG_EXIT_CODE);
        let discard: anyhow::Error = HarnessError::Discarded.into();
        assert_eq!(exit_code(&discard), 1);
    }

    #[test]
    fn single_path_run_exits_with_that_path_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HarnessConfig::default();
        config.allow_list.path = dir.path().join("token_constraint.txt");
        // Only '+' tokens: the parser rejects the very first one.
        std::fs::write(&config.allow_list.path, "2\n").unwrap();

        config.explorer.max_paths = 1;
        let code = run_subject::<Calc>(Mode::Replay, &config, Format::Json).unwrap();
        assert_eq!(code, 1, "A rejected single path exits like a discard");

        config.explorer.max_paths = 10;
        let code = run_subject::<Calc>(Mode::Replay, &config, Format::Json).unwrap();
        assert_eq!(code, 0, "Completed explorations exit 0");
    }
}
