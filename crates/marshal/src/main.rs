use clap::Parser;
use marshal_client::HttpCoordinator;
use marshal_core::config::CoordinationConfig;
use marshal_core::error::InterceptError;
use marshal_core::intercept::Interceptor;
use marshal_core::invocation::CommandInvocation;
use marshal_core::runner::{ProcessRunner, SystemRunner};
use std::path::{Path, PathBuf};

mod render;

const CONFIG_ENV: &str = "MARSHAL_CONFIG";
const DEFAULT_TRACKER_BIN: &str = "bd";

/// Coordination wrapper around the issue tracker. Every argument after
/// the program name is forwarded to the tracker once the invocation is
/// approved; the two `--:`-prefixed flags are consumed here.
#[derive(Parser)]
#[command(name = "marshal", version, disable_help_subcommand = true)]
struct Cli {
    /// Tracker command line, e.g. `marshal close bd-42`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(&cli.args));
}

fn run(args: &[String]) -> i32 {
    let invocation = match CommandInvocation::parse(args) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };

    let repo_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("error: cannot determine working directory: {err}");
            return 2;
        }
    };

    let explicit = invocation
        .local_config
        .clone()
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

    let config = match CoordinationConfig::load(&repo_root, explicit.as_deref()) {
        Ok(Some(config)) => config,
        Ok(None) => {
            render::warn("no coordination config found; running uncoordinated");
            return passthrough(DEFAULT_TRACKER_BIN, &invocation, &repo_root);
        }
        Err(err) => {
            render::warn(&format!("{err}; running uncoordinated"));
            return passthrough(DEFAULT_TRACKER_BIN, &invocation, &repo_root);
        }
    };

    let api = match HttpCoordinator::new(&config.service_url, config.timeout_secs) {
        Ok(api) => api,
        Err(err) => {
            render::warn(&format!("{err}; running uncoordinated"));
            return passthrough(&config.tracker_bin, &invocation, &repo_root);
        }
    };

    let runner = SystemRunner;
    let interceptor = Interceptor::new(&api, &runner, &config, &repo_root);
    match interceptor.intercept(&invocation) {
        Ok(outcome) => {
            render::render(&outcome);
            outcome.exit_code
        }
        Err(err @ InterceptError::IdentityGone) => {
            eprintln!("error: {err}");
            2
        }
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

/// Run the tracker directly when no coordination is possible. The
/// tool's behavior is unchanged, only the safety net is gone.
fn passthrough(tracker_bin: &str, invocation: &CommandInvocation, repo_root: &Path) -> i32 {
    match SystemRunner.run(tracker_bin, &invocation.cleaned, repo_root) {
        Ok(output) => {
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            output.exit_code
        }
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}
