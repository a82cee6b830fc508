// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use autotest_runner::{
    config::{RemoteTestsConfig, resolve_program},
    fanout::FanoutRunnerBuilder,
    plan::{ExecutionPlan, PlanStyles, ResolutionContext},
    reporter::ReporterBuilder,
    request::TestRequests,
    runner::{TestExecutor, TestRunnerBuilder},
    signal::SignalHandlerKind,
    suite::ExternalSuiteEnumerator,
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use tracing::{debug, info};

/// Runs autotest control files and suites against a remote Chrome OS device.
///
/// Tests are named by regular expressions matched against control file paths, or as
/// `suite:<name>`.
#[derive(Debug, Parser)]
#[command(version, name = "run-remote-tests", max_term_width = 100)]
pub struct RemoteTestsApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    common: CommonOpts,

    #[clap(subcommand)]
    command: Command,
}

impl RemoteTestsApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let base = BaseApp::new(output, self.common)?;
        match self.command {
            Command::Run(opts) => base.exec_run(opts, output_writer),
            Command::List(opts) => base.exec_list(opts, output_writer),
            Command::Parallel(opts) => base.exec_parallel(opts, output_writer),
        }
    }
}

#[derive(Debug, Args)]
struct CommonOpts {
    /// The autotest directory control files are found in
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "AUTOTEST_DIR",
        default_value = "."
    )]
    autotest_dir: Utf8PathBuf,

    /// Config file [default: <autotest-dir>/.config/remote-tests.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve tests and run them against a remote device
    ///
    /// Every request is resolved before anything runs. Control files named by pattern run
    /// first, followed by each suite in the order given.
    Run(RunOpts),

    /// Resolve tests and print the execution plan without running anything
    List(ListOpts),

    /// Run each test against its own VM, in parallel
    ///
    /// Each VM is reached through its own SSH port, allocated incrementally from the base port.
    Parallel(ParallelOpts),
}

#[derive(Debug, Args)]
struct ResolveOpts {
    /// Additional directory to search for control files
    #[arg(long, value_name = "DIR")]
    external_root: Option<Utf8PathBuf>,

    /// Run every control file on its own instead of combining compatible ones
    #[arg(long)]
    no_combine: bool,

    /// Regular expressions matching control file paths, or `suite:<name>`
    #[arg(required = true, value_name = "TESTS")]
    tests: Vec<String>,
}

#[derive(Debug, Args)]
struct RunOpts {
    /// The address of the device under test
    #[arg(long, value_name = "HOST")]
    remote: String,

    /// The SSH port of the device under test
    #[arg(long, value_name = "PORT")]
    ssh_port: Option<u16>,

    /// Number of passes over the plan [default: from config]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    iterations: Option<u32>,

    /// Directory to write results under [default: a new temporary directory]
    #[arg(long, value_name = "DIR")]
    results_dir_root: Option<Utf8PathBuf>,

    /// Arguments passed through to each test
    #[arg(long = "args", value_name = "ARGS", allow_hyphen_values = true)]
    test_args: Option<String>,

    #[clap(flatten)]
    resolve: ResolveOpts,

    /// Extra arguments passed to the executor, before the control file
    #[arg(last = true)]
    extra_args: Vec<String>,
}

#[derive(Debug, Args)]
struct ListOpts {
    /// Output format
    #[arg(short = 'T', long, value_enum, default_value_t, value_name = "FMT")]
    message_format: MessageFormat,

    #[clap(flatten)]
    resolve: ResolveOpts,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    /// A human-readable description of the plan
    #[default]
    Human,

    /// Machine-readable JSON
    Json,
}

#[derive(Debug, Args)]
struct ParallelOpts {
    /// Board to pass to the runner
    #[arg(long)]
    board: Option<String>,

    /// Image to boot each VM from
    #[arg(long, value_name = "PATH")]
    image_path: Option<Utf8PathBuf>,

    /// The first SSH port to allocate [default: from config]
    #[arg(long, value_name = "PORT")]
    base_ssh_port: Option<u16>,

    /// Root directory for per-test results, written to `<root>/<test>.<port>`
    #[arg(long, value_name = "DIR")]
    results_dir_root: Option<Utf8PathBuf>,

    /// Print each test's output after it finishes, in the order tests were given
    #[arg(long)]
    order_output: bool,

    /// Discard test output. Requires --results-dir-root
    #[arg(long, short)]
    quiet: bool,

    /// Tests to run, one per VM
    #[arg(required = true, value_name = "TESTS")]
    tests: Vec<String>,
}

struct BaseApp {
    output: OutputContext,
    autotest_dir: Utf8PathBuf,
    current_dir: Utf8PathBuf,
    config: RemoteTestsConfig,
}

impl BaseApp {
    fn new(output: OutputContext, common: CommonOpts) -> Result<Self> {
        let CommonOpts {
            autotest_dir,
            config_file,
        } = common;
        if !autotest_dir.is_dir() {
            return Err(ExpectedError::AutotestDirNotFound { path: autotest_dir });
        }
        let autotest_dir = autotest_dir
            .canonicalize_utf8()
            .unwrap_or_else(|_| autotest_dir.clone());
        let current_dir = std::env::current_dir()
            .and_then(|dir| Utf8PathBuf::try_from(dir).map_err(|err| err.into_io_error()))
            .map_err(|err| ExpectedError::CurrentDirError { err })?;

        let config = RemoteTestsConfig::from_sources(&autotest_dir, config_file.as_deref())?;
        Ok(Self {
            output,
            autotest_dir,
            current_dir,
            config,
        })
    }

    fn should_colorize(&self) -> bool {
        self.output
            .color
            .should_colorize(supports_color::Stream::Stderr)
    }

    fn build_plan(&self, opts: &ResolveOpts) -> Result<ExecutionPlan> {
        let requests = TestRequests::parse(opts.tests.iter().map(String::as_str)).map_err(
            |token| ExpectedError::InvalidRequest {
                token: token.to_owned(),
            },
        )?;

        let search = self.config.search();
        let roots = search.search_roots(
            &self.autotest_dir,
            &self.current_dir,
            opts.external_root.as_deref(),
        );
        let enumerator = ExternalSuiteEnumerator::new(self.config.run().suite_enumerator());

        let mut cx = ResolutionContext::new(&self.autotest_dir, roots, &enumerator);
        let resolved = cx.resolve(&requests)?;
        debug!("resolved {} control files", resolved.len());

        let combine = self.config.run().combine() && !opts.no_combine;
        Ok(cx.build_plan(resolved, combine)?)
    }

    fn exec_run(&self, opts: RunOpts, output_writer: &mut OutputWriter) -> Result<i32> {
        let plan = self.build_plan(&opts.resolve)?;
        let run_config = self.config.run();

        let mut executor = TestExecutor::new(
            resolve_program(&self.autotest_dir, run_config.executor()),
            &opts.remote,
        );
        if let Some(port) = opts.ssh_port {
            executor.set_ssh_port(port);
        }
        if let Some(test_args) = opts.test_args {
            executor.set_test_args(test_args);
        }
        executor
            .extend_extra_args(run_config.extra_args().iter().cloned())
            .extend_extra_args(opts.extra_args);

        let results_root = match opts.results_dir_root {
            Some(root) => root,
            None => make_results_root()?,
        };
        let iterations = opts.iterations.unwrap_or(run_config.iterations());

        let mut reporter = ReporterBuilder::default()
            .set_colorize(self.should_colorize())
            .set_verbose(self.output.verbose)
            .set_write_summary(true)
            .build(&opts.remote, output_writer.reporter_output());

        let runner = TestRunnerBuilder::default()
            .set_iterations(iterations)
            .build(&plan, executor, &results_root, SignalHandlerKind::Standard)?;
        let stats = runner
            .try_execute(|event| reporter.report_event(event))
            .map_err(ExpectedError::execute_error)?;
        plan.cleanup();

        info!("results are in {results_root}");
        if let Some(event) = stats.cancelled {
            Err(ExpectedError::TestRunCancelled {
                reason: event.description(),
            })
        } else if !stats.is_success() {
            Err(ExpectedError::TestRunFailed)
        } else {
            Ok(0)
        }
    }

    fn exec_list(&self, opts: ListOpts, output_writer: &mut OutputWriter) -> Result<i32> {
        let plan = self.build_plan(&opts.resolve)?;

        let mut writer = output_writer.stdout();
        match opts.message_format {
            MessageFormat::Human => {
                let mut styles = PlanStyles::default();
                if self
                    .output
                    .color
                    .should_colorize(supports_color::Stream::Stdout)
                {
                    styles.colorize();
                }
                plan.write_human(&mut writer, &styles)
                    .map_err(ExpectedError::write_output)?;
            }
            MessageFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, &plan.to_summary())
                    .map_err(|err| ExpectedError::PlanSerializeError { err })?;
                writeln!(writer).map_err(ExpectedError::write_output)?;
            }
        }
        writer.flush().map_err(ExpectedError::write_output)?;

        plan.cleanup();
        Ok(0)
    }

    fn exec_parallel(&self, opts: ParallelOpts, output_writer: &mut OutputWriter) -> Result<i32> {
        let fanout_config = self.config.fanout();
        let mut builder = FanoutRunnerBuilder::new(
            resolve_program(&self.autotest_dir, fanout_config.runner()),
            opts.base_ssh_port.unwrap_or(fanout_config.base_ssh_port()),
        );
        if let Some(board) = opts.board {
            builder.set_board(board);
        }
        if let Some(image_path) = opts.image_path {
            builder.set_image_path(image_path);
        }
        if let Some(root) = opts.results_dir_root {
            builder.set_results_dir_root(root);
        }
        builder
            .set_order_output(opts.order_output)
            .set_quiet(opts.quiet);

        let runner = builder.build(opts.tests)?;
        for job in runner.jobs() {
            info!("{} will run on localhost:{}", job.test(), job.ssh_port());
        }

        let outcome = runner.run(output_writer.stdout())?;
        if outcome.is_success() {
            Ok(0)
        } else {
            Err(ExpectedError::FanoutFailed {
                failed: outcome.failed().to_vec(),
            })
        }
    }
}

fn make_results_root() -> Result<Utf8PathBuf> {
    let dir = camino_tempfile::Builder::new()
        .prefix("run_remote_tests.")
        .tempdir()
        .map_err(|err| ExpectedError::ResultsDirCreate { err })?;
    Ok(dir.keep())
}
