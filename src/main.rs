//! stormctl CLI
//!
//! Entry point for the `stormctl` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use stormctl::cluster::{parse_listing, wait_until_absent, NimbusClient};
use stormctl::config::DEFAULT_CONFIG_PATH;
use stormctl::hooks::CommandHooks;
use stormctl::options::resolve_parallelism;
use stormctl::pipeline::{with_coordinator, PipelineResult};
use stormctl::sync::ConfiguredSync;
use stormctl::{Config, KillPolicy, ShellRunner, SubmissionOption, SubmitArgs, SubmitPipeline};

#[derive(Parser)]
#[command(name = "stormctl")]
#[command(about = "Deploy Storm topologies to a Nimbus coordinator", version)]
struct Cli {
    /// Path to the project config file
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the topology uberjar and submit it to Nimbus
    Submit {
        /// Topology name (defaults to the only definition in topology_specs)
        #[arg(long)]
        name: Option<String>,

        /// Deployment environment from the config file
        #[arg(long, short = 'e', default_value = "prod")]
        environment: String,

        /// Number of topology workers (defaults to --par)
        #[arg(long)]
        workers: Option<u32>,

        /// Number of acker executors (defaults to --par)
        #[arg(long)]
        ackers: Option<u32>,

        /// Parallelism used for --workers/--ackers when not given
        #[arg(long, default_value_t = 2)]
        par: u32,

        /// Runtime option passed through to the submit command (repeatable key=value)
        #[arg(long = "option", short = 'o')]
        options: Vec<String>,

        /// Kill any running topology with the same name before submitting
        #[arg(long, short = 'f')]
        force: bool,

        /// Submit with topology-level debug logging
        #[arg(long)]
        debug: bool,

        /// Seconds the cluster may spend draining the killed topology
        #[arg(long)]
        wait: Option<u64>,

        /// Accepted for compatibility; has no effect on remote submission
        #[arg(long, short = 't', default_value_t = 0)]
        time: u64,
    },

    /// Print the cluster's topology listing
    List {
        /// Deployment environment from the config file
        #[arg(long, short = 'e', default_value = "prod")]
        environment: String,

        /// Output parsed rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Kill a running topology
    Kill {
        /// Topology name
        name: String,

        /// Deployment environment from the config file
        #[arg(long, short = 'e', default_value = "prod")]
        environment: String,

        /// Seconds the cluster may spend draining the topology
        #[arg(long)]
        wait: Option<u64>,

        /// Poll the listing until the topology is fully gone
        #[arg(long)]
        block: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Submit {
            name,
            environment,
            workers,
            ackers,
            par,
            options,
            force,
            debug,
            wait,
            time: _,
        } => run_submit(
            &cli.config,
            SubmitCliArgs {
                name,
                environment,
                workers,
                ackers,
                par,
                options,
                force,
                debug,
                wait,
            },
        ),
        Commands::List { environment, json } => run_list(&cli.config, &environment, json),
        Commands::Kill {
            name,
            environment,
            wait,
            block,
        } => run_kill(&cli.config, &name, &environment, wait, block),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

struct SubmitCliArgs {
    name: Option<String>,
    environment: String,
    workers: Option<u32>,
    ackers: Option<u32>,
    par: u32,
    options: Vec<String>,
    force: bool,
    debug: bool,
    wait: Option<u64>,
}

fn run_submit(config_path: &PathBuf, args: SubmitCliArgs) -> PipelineResult<()> {
    let config = Config::load(config_path)?;
    let env = config.env(&args.environment)?;

    let options = args
        .options
        .iter()
        .map(|raw| SubmissionOption::parse_cli(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let (workers, ackers) = resolve_parallelism(args.par, args.workers, args.ackers);

    let runner = ShellRunner;
    let hooks = CommandHooks::new(&runner, config.hooks.clone());
    let sync = ConfiguredSync::new(&runner, env.virtualenv_sync_command.clone());

    let pipeline = SubmitPipeline::new(&config, &runner, &hooks, &sync);
    pipeline.run(&SubmitArgs {
        name: args.name,
        env_name: args.environment,
        workers,
        ackers,
        options,
        force: args.force,
        debug: args.debug,
        wait: args.wait,
    })
}

fn run_list(config_path: &PathBuf, environment: &str, json: bool) -> PipelineResult<()> {
    let config = Config::load(config_path)?;
    let env = config.env(environment)?;
    let runner = ShellRunner;

    let listing = with_coordinator(env, |endpoint| {
        Ok(NimbusClient::new(&runner).list_topologies(endpoint)?)
    })?;

    if json {
        let rows = parse_listing(&listing);
        match serde_json::to_string_pretty(&rows) {
            Ok(encoded) => println!("{}", encoded),
            Err(e) => {
                eprintln!("Error serializing listing: {}", e);
                process::exit(1);
            }
        }
    } else {
        print!("{}", listing);
    }
    Ok(())
}

fn run_kill(
    config_path: &PathBuf,
    name: &str,
    environment: &str,
    wait: Option<u64>,
    block: bool,
) -> PipelineResult<()> {
    let config = Config::load(config_path)?;
    let env = config.env(environment)?;
    let runner = ShellRunner;

    with_coordinator(env, |endpoint| {
        NimbusClient::new(&runner).kill_topology(name, wait, endpoint)?;
        println!("Kill requested for topology '{}'.", name);
        if block {
            wait_until_absent(&runner, name, endpoint, KillPolicy::default())?;
            println!("Topology '{}' is gone.", name);
        }
        Ok(())
    })
}
