use argh::FromArgs;
use git_revgraph::shell::ShellRunner;
use git_revgraph::visualize::{print_graph, state_line};
use git_revgraph::{
    BuildStrategy, GradleStrategy, HistoryGraph, MavenStrategy, Repository, StrategyKind,
    VcsClient,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/**
Git RevGraph
*/
#[derive(FromArgs)]
struct Args {
    #[argh(subcommand)]
    subcommand: SubCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommands {
    Graph(GraphOptions),
    Build(BuildOptions),
    Test(TestOptions),
}

#[derive(FromArgs, Debug)]
/// print the revision graph between two commits
#[argh(subcommand, name = "graph")]
struct GraphOptions {
    /// newest commit of the window
    #[argh(option, short = 's')]
    start: String,

    /// oldest commit of the window
    #[argh(option, short = 'e')]
    end: String,

    /// print the graph as JSON
    #[argh(switch)]
    json: bool,

    /// key revisions by full commit hashes instead of abbreviated ones
    #[argh(switch)]
    full_hashes: bool,

    /// set the current working directory
    #[argh(option, short = 'C', default = "PathBuf::from(\".\")")]
    repo_path: PathBuf,
}

#[derive(FromArgs, Debug)]
/// build every revision between two commits
#[argh(subcommand, name = "build")]
struct BuildOptions {
    /// newest commit of the window
    #[argh(option, short = 's')]
    start: String,

    /// oldest commit of the window
    #[argh(option, short = 'e')]
    end: String,

    /// build tool of the project: gradle or maven
    #[argh(option, default = "StrategyKind::Gradle")]
    strategy: StrategyKind,

    /// seconds after which a build is killed
    #[argh(option, short = 't')]
    timeout: Option<u64>,

    /// key revisions by full commit hashes instead of abbreviated ones
    #[argh(switch)]
    full_hashes: bool,

    /// set the current working directory
    #[argh(option, short = 'C', default = "PathBuf::from(\".\")")]
    repo_path: PathBuf,
}

#[derive(FromArgs, Debug)]
/// run tests on every revision between two commits
#[argh(subcommand, name = "test")]
struct TestOptions {
    /// newest commit of the window
    #[argh(option, short = 's')]
    start: String,

    /// oldest commit of the window
    #[argh(option, short = 'e')]
    end: String,

    /// only run this test, eg. "com.example.MathTest.adds"
    #[argh(option, short = 'n')]
    name: Option<String>,

    /// build tool of the project: gradle or maven
    #[argh(option, default = "StrategyKind::Gradle")]
    strategy: StrategyKind,

    /// seconds after which a test run is killed
    #[argh(option, short = 't')]
    timeout: Option<u64>,

    /// key revisions by full commit hashes instead of abbreviated ones
    #[argh(switch)]
    full_hashes: bool,

    /// set the current working directory
    #[argh(option, short = 'C', default = "PathBuf::from(\".\")")]
    repo_path: PathBuf,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "git_revgraph=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open<S: BuildStrategy>(
    repo_path: &Path,
    strategy: S,
    timeout: Option<u64>,
    full_hashes: bool,
) -> Result<Repository<git_revgraph::GitClient, S>, String> {
    let root = fs::canonicalize(repo_path)
        .map_err(|err| format!("Cannot open repository `{}`: {err}", repo_path.display()))?;
    let runner = ShellRunner::with_timeout(timeout.map(Duration::from_secs));

    Ok(Repository::git(&root, strategy, runner, full_hashes))
}

/// Leave the worktree at the tip again once evaluation has moved it around.
fn restore<S: BuildStrategy>(repo: &Repository<git_revgraph::GitClient, S>, start: &str) {
    match repo.vcs().checkout(start) {
        Ok(true) => {}
        Ok(false) => warn!(commit = start, "Could not restore checkout"),
        Err(err) => warn!(commit = start, error = %err, "Could not restore checkout"),
    }
}

fn build_graph<S: BuildStrategy>(
    repo: &Repository<git_revgraph::GitClient, S>,
    start: &str,
    end: &str,
) -> Result<HistoryGraph, String> {
    repo.build_history_graph(start, end)
        .map_err(|err| err.to_string())
}

fn run_build<S: BuildStrategy>(opts: &BuildOptions, strategy: S) -> Result<(), String> {
    let repo = open(&opts.repo_path, strategy, opts.timeout, opts.full_hashes)?;
    let graph = build_graph(&repo, &opts.start, &opts.end)?;

    for revision in graph.resolved() {
        match revision.compile_state(&repo) {
            Ok(state) => info!(commit = revision.id(), ?state, "Built revision"),
            Err(err) => warn!(commit = revision.id(), error = %err, "Could not build revision"),
        }
        println!("{}", state_line(&graph));
    }

    restore(&repo, graph.tip().map_or(opts.start.as_str(), |tip| tip.id()));
    print_graph(&graph);
    Ok(())
}

fn run_tests<S: BuildStrategy>(opts: &TestOptions, strategy: S) -> Result<(), String> {
    let repo = open(&opts.repo_path, strategy, opts.timeout, opts.full_hashes)?;
    let graph = build_graph(&repo, &opts.start, &opts.end)?;

    for revision in graph.resolved() {
        match &opts.name {
            Some(name) => match repo.run_single_test(revision, name) {
                Ok(passed) => println!(
                    "{} {} {}",
                    revision.id(),
                    name,
                    if passed { "passed" } else { "failed" }
                ),
                Err(err) => warn!(commit = revision.id(), error = %err, "Could not run test"),
            },
            None => match revision.test_result(&repo) {
                Ok(result) => {
                    println!(
                        "{} {} tests, {} failed",
                        revision.id(),
                        result.all_tests().len(),
                        result.failure_count()
                    );
                    for failed in result.failed_tests() {
                        println!("    {failed}");
                    }
                }
                Err(err) => warn!(commit = revision.id(), error = %err, "Could not run tests"),
            },
        }
    }

    restore(&repo, graph.tip().map_or(opts.start.as_str(), |tip| tip.id()));
    Ok(())
}

fn main() -> Result<(), String> {
    init_logging();
    let args: Args = argh::from_env();

    match args.subcommand {
        SubCommands::Graph(graph_opts) => {
            let repo = open(
                &graph_opts.repo_path,
                GradleStrategy::default(),
                None,
                graph_opts.full_hashes,
            )?;
            let graph = build_graph(&repo, &graph_opts.start, &graph_opts.end)?;

            if graph_opts.json {
                let json = serde_json::to_string_pretty(&graph).map_err(|err| err.to_string())?;
                println!("{json}");
            } else {
                print_graph(&graph);
            }
        }
        SubCommands::Build(build_opts) => match build_opts.strategy {
            StrategyKind::Gradle => run_build(&build_opts, GradleStrategy::default())?,
            StrategyKind::Maven => run_build(&build_opts, MavenStrategy::default())?,
        },
        SubCommands::Test(test_opts) => match test_opts.strategy {
            StrategyKind::Gradle => run_tests(&test_opts, GradleStrategy::default())?,
            StrategyKind::Maven => run_tests(&test_opts, MavenStrategy::default())?,
        },
    }

    Ok(())
}
