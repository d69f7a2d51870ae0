mod result;
mod sas_parser;

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use clap::Parser;
use convert_case::Case;
use itertools::Itertools;
use log::error;
use log::info;
use log::LevelFilter;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use result::SquashError;
use result::SquashResult;
use squash::pdbs::CegarGenerator;
use squash::pdbs::CegarOptions;
use squash::pdbs::InitialCollectionType;
use squash::statistics::StatisticsLogger;
use squash::task::VariableId;
use squash::termination::TimeBudget;

#[derive(Debug, Parser)]
#[command(author, version, about, arg_required_else_help = true)]
struct Args {
    /// The planning task to build a pattern collection for, given as a translator SAS file
    /// (version 3, typically named 'output.sas').
    #[clap(verbatim_doc_comment)]
    instance_path: PathBuf,

    /// Hard cap on the number of refinement steps; unbounded when absent.
    ///
    /// Possible values: usize
    #[arg(long = "max-refinements", verbatim_doc_comment)]
    max_refinements: Option<usize>,

    /// Cap on the size of a single pattern database.
    ///
    /// The cap is not applied to the initial collection of singleton goal patterns, so the
    /// produced collection is never empty.
    ///
    /// Possible values: usize
    #[arg(long = "max-pdb-size", default_value_t = 1_000_000, verbatim_doc_comment)]
    max_pdb_size: usize,

    /// Cap on the summed sizes of all pattern databases; unbounded when absent. Like the
    /// per-database cap, it is not applied to the initial collection.
    ///
    /// Possible values: usize
    #[arg(long = "max-collection-size", verbatim_doc_comment)]
    max_collection_size: Option<usize>,

    /// Store a single operator per abstract plan step instead of the whole class of
    /// interchangeable operators.
    ///
    /// Possible values: bool
    #[arg(long = "no-wildcard-plans", verbatim_doc_comment)]
    no_wildcard_plans: bool,

    /// Mark a pattern as finished when its plan executes but misses the goal; only a single
    /// pattern is produced this way.
    ///
    /// Possible values: bool
    #[arg(long = "ignore-goal-violations", verbatim_doc_comment)]
    ignore_goal_violations: bool,

    /// The number of randomly selected non-goal variables to ignore during plan replay.
    ///
    /// Possible values: usize
    #[arg(long = "blacklist-size", default_value_t = 0, verbatim_doc_comment)]
    blacklist_size: usize,

    /// How the initial pattern collection is seeded.
    #[arg(long = "initial-collection", value_enum, default_value_t)]
    initial_collection: InitialCollectionType,

    /// The goal variable to seed with; required when the initial collection is 'given-goal'.
    ///
    /// Possible values: u32
    #[arg(long = "given-goal", verbatim_doc_comment)]
    given_goal: Option<u32>,

    /// Wall-clock budget for the refinement loop in seconds; unbounded when absent. The budget
    /// is checked between operations, so a single long-running refinement may overrun it.
    ///
    /// Possible values: f64
    #[arg(long = "max-time", verbatim_doc_comment)]
    max_time: Option<f64>,

    /// The seed of the random generator which drives all tie-breaking decisions.
    ///
    /// Possible values: u64
    #[arg(long = "random-seed", default_value_t = 42, verbatim_doc_comment)]
    random_seed: u64,

    /// Enables log message output from the generator.
    ///
    /// Possible values: bool
    #[arg(short = 'v', long = "verbose", verbatim_doc_comment)]
    verbose: bool,

    /// Enables logging of statistics about the final collection.
    ///
    /// Possible values: bool
    #[arg(short = 's', long = "log-statistics", verbatim_doc_comment)]
    log_statistics: bool,
}

fn configure_logging(verbose: bool) {
    let level_filter = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .format(move |buf, record| writeln!(buf, "{}", record.args()))
        .filter_level(level_filter)
        .target(env_logger::Target::Stdout)
        .init();
}

fn main() {
    let args = Args::parse();
    configure_logging(args.verbose);

    if let Err(error) = run(args) {
        error!("{error}");
        std::process::exit(error.exit_code());
    }
}

fn run(args: Args) -> SquashResult<()> {
    let statistics = args.log_statistics.then(|| {
        StatisticsLogger::new("%%%squash-stat:", Some("%%%squash-stat-end"), Some(Case::Camel))
    });

    let instance = fs::read_to_string(&args.instance_path).map_err(|error| {
        SquashError::FileReadingError(error, args.instance_path.display().to_string())
    })?;
    let task = sas_parser::parse_sas(&instance)?;
    info!(
        "parsed a task with {} variable(s) and {} operator(s)",
        task.num_variables(),
        task.num_operators()
    );

    let options = CegarOptions {
        max_refinements: args.max_refinements.unwrap_or(usize::MAX),
        max_pdb_size: args.max_pdb_size,
        max_collection_size: args.max_collection_size.unwrap_or(usize::MAX),
        wildcard_plans: !args.no_wildcard_plans,
        ignore_goal_violations: args.ignore_goal_violations,
        blacklist_size: args.blacklist_size,
        initial_collection: args.initial_collection,
        given_goal: args.given_goal.map(VariableId::new),
    };

    let start_time = Instant::now();
    let mut rng = SmallRng::seed_from_u64(args.random_seed);
    let mut termination = args
        .max_time
        .map(|seconds| TimeBudget::starting_now(Duration::from_secs_f64(seconds)));
    let collection = CegarGenerator::new(&task, options, &mut rng).generate(&mut termination)?;

    info!(
        "generated {} pattern(s): {}",
        collection.len(),
        collection.patterns().map(|pattern| pattern.to_string()).join(", ")
    );

    if let Some(mut statistics) = statistics {
        statistics.log("number_of_patterns", collection.len());
        statistics.log("total_pdb_size", collection.total_size());
        statistics.log(
            "generation_time_seconds",
            format!("{:.3}", start_time.elapsed().as_secs_f64()),
        );
        statistics.finish();
    }
    Ok(())
}
