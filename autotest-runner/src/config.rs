// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for remote test runs.
//!
//! Configuration is layered, lowest precedence first:
//!
//! 1. The default config embedded in the binary (`default-config.toml`).
//! 2. `.config/remote-tests.toml` under the autotest directory, or an explicitly specified
//!    config file.
//! 3. Environment variables prefixed with `REMOTE_TESTS_`, with `__` separating table and key,
//!    e.g. `REMOTE_TESTS_RUN__ITERATIONS=3`.
//!
//! Command-line options take precedence over all of these, and are applied by the caller.

use crate::{errors::ConfigParseError, pattern::SearchRoots};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Overall configuration for run-remote-tests.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteTestsConfig {
    run: RunConfig,
    search: SearchConfig,
    fanout: FanoutConfig,
}

impl RemoteTestsConfig {
    /// The default location of the config within the autotest directory.
    pub const CONFIG_PATH: &'static str = ".config/remote-tests.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Environment variable prefix for config overrides.
    pub const ENV_PREFIX: &'static str = "REMOTE_TESTS";

    /// Reads the config from the autotest directory, the given config file (if specified) and
    /// the environment.
    ///
    /// If `config_file` is specified, it must exist and `.config/remote-tests.toml` is not
    /// read.
    pub fn from_sources(
        autotest_dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let env = Self::environment();
        Self::from_sources_impl(autotest_dir, config_file, env, |config_file, unknown| {
            let file_desc = match config_file {
                Some(file) => format!(" in `{file}`"),
                None => String::new(),
            };
            warn!(
                "ignoring unknown configuration keys{file_desc}: {}",
                unknown.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
            );
        })
    }

    /// Returns the default configuration.
    pub fn default_config() -> Self {
        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");
        config
            .try_deserialize()
            .expect("default config is always valid")
    }

    fn from_sources_impl(
        autotest_dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
        env: Environment,
        mut unknown_callback: impl FnMut(Option<&Utf8Path>, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let (file, required) = match config_file {
            Some(file) => (file.to_owned(), true),
            None => (autotest_dir.join(Self::CONFIG_PATH), false),
        };
        let report_file = (required || file.is_file()).then(|| file.clone());

        let config = Self::make_default_config()
            .add_source(File::new(file.as_str(), FileFormat::Toml).required(required))
            .add_source(env)
            .build()
            .map_err(|err| ConfigParseError::new(report_file.clone(), err))?;

        let mut unknown = BTreeSet::new();
        let this: Self = serde_ignored::deserialize(config, |path: serde_ignored::Path| {
            unknown.insert(path.to_string());
        })
        .map_err(|err| ConfigParseError::new(report_file.clone(), err))?;

        if !unknown.is_empty() {
            unknown_callback(report_file.as_deref(), &unknown);
        }

        Ok(this)
    }

    fn environment() -> Environment {
        Environment::with_prefix(Self::ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// Returns the run configuration.
    pub fn run(&self) -> &RunConfig {
        &self.run
    }

    /// Returns the search configuration.
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }

    /// Returns the fan-out configuration.
    pub fn fanout(&self) -> &FanoutConfig {
        &self.fanout
    }
}

/// The `[run]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    executor: Utf8PathBuf,
    suite_enumerator: Utf8PathBuf,
    iterations: u32,
    combine: bool,
    #[serde(default)]
    extra_args: Vec<String>,
}

impl RunConfig {
    /// The autoserv-compatible executor.
    pub fn executor(&self) -> &Utf8Path {
        &self.executor
    }

    /// The suite enumerator program.
    pub fn suite_enumerator(&self) -> &Utf8Path {
        &self.suite_enumerator
    }

    /// The number of passes over the plan.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Whether compatible control files are combined.
    pub fn combine(&self) -> bool {
        self.combine
    }

    /// Extra arguments for every executor invocation.
    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }
}

/// The `[search]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    roots: Vec<Utf8PathBuf>,
    #[serde(default)]
    external_root: Option<Utf8PathBuf>,
}

impl SearchConfig {
    /// Search roots, relative to the autotest directory.
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    /// The external root, if configured.
    pub fn external_root(&self) -> Option<&Utf8Path> {
        self.external_root.as_deref()
    }

    /// Builds search roots for `autotest_dir`. `cli_external_root` overrides the configured
    /// external root.
    ///
    /// A relative root from the command line is resolved against `cwd`. A relative root from
    /// the config is resolved against the autotest directory.
    pub fn search_roots(
        &self,
        autotest_dir: &Utf8Path,
        cwd: &Utf8Path,
        cli_external_root: Option<&Utf8Path>,
    ) -> SearchRoots {
        let external_root = match cli_external_root {
            Some(root) => Some(cwd.join(root)),
            None => self
                .external_root
                .as_deref()
                .map(|root| autotest_dir.join(root)),
        };
        SearchRoots::new(autotest_dir, &self.roots, external_root.as_deref())
    }
}

/// The `[fanout]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FanoutConfig {
    runner: Utf8PathBuf,
    base_ssh_port: u16,
}

impl FanoutConfig {
    /// The per-VM runner program.
    pub fn runner(&self) -> &Utf8Path {
        &self.runner
    }

    /// The first SSH port handed out.
    pub fn base_ssh_port(&self) -> u16 {
        self.base_ssh_port
    }
}

/// Resolves a configured program path.
///
/// A relative path with more than one component, such as `server/autoserv`, is resolved against
/// the autotest directory. Bare program names are looked up on `PATH`.
pub fn resolve_program(autotest_dir: &Utf8Path, program: &Utf8Path) -> Utf8PathBuf {
    if program.is_relative() && program.components().count() > 1 {
        autotest_dir.join(program)
    } else {
        program.to_owned()
    }
}
