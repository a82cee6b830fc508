// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use autotest_runner::{
    errors::ResolveError,
    pattern::SearchRoots,
    plan::{ExecutionPlan, ResolutionContext},
    request::TestRequests,
    runner::TestExecutor,
    suite::ExternalSuiteEnumerator,
};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, eyre};
use indoc::formatdoc;

pub(crate) static FAKE_AUTOSERV: &str = env!("CARGO_BIN_EXE_fake-autoserv");
pub(crate) static FAKE_SUITE_ENUMERATOR: &str = env!("CARGO_BIN_EXE_fake-suite-enumerator");

/// The server test resolved by pattern in the worked example.
pub(crate) const BOOT_PERF_SERVER: &str = "server/site_tests/platform_BootPerfServer/control";

/// The client tests making up the `bvt` suite.
pub(crate) const BVT_TESTS: [&str; 3] = [
    "client/site_tests/login_Cryptohome/control",
    "client/site_tests/desktopui_ChromeFirstRender/control",
    "client/site_tests/platform_OSLimits/control",
];

/// A temporary autotest tree.
pub(crate) struct AutotestTree {
    dir: Utf8TempDir,
}

impl AutotestTree {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            dir: camino_tempfile::Builder::new().prefix("autotest.").tempdir()?,
        })
    }

    /// The tree from the worked example: a server test, and a `bvt` suite of three
    /// zero-retry client tests.
    pub(crate) fn worked_example() -> Result<Self> {
        let tree = Self::new()?;
        tree.add_control(BOOT_PERF_SERVER, "server", None)?;
        for test in BVT_TESTS {
            tree.add_control(test, "client", None)?;
        }
        tree.add_suite("bvt", &BVT_TESTS)?;
        Ok(tree)
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn join(&self, rel: &str) -> Utf8PathBuf {
        self.dir.path().join(rel)
    }

    /// Writes a control file declaring `test_type`, and `RETRIES` if specified.
    pub(crate) fn add_control(
        &self,
        rel: &str,
        test_type: &str,
        retries: Option<u32>,
    ) -> Result<Utf8PathBuf> {
        let name = Utf8Path::new(rel)
            .parent()
            .and_then(Utf8Path::file_name)
            .ok_or_else(|| eyre!("control file {rel} has no parent directory"))?;
        let retries = retries
            .map(|retries| format!("RETRIES = {retries}\n"))
            .unwrap_or_default();
        self.add_raw(
            rel,
            &formatdoc! {r#"
                AUTHOR = "Chrome OS Team"
                NAME = "{name}"
                TEST_TYPE = "{test_type}"
                {retries}
                job.run_test('{name}')
            "#},
        )
    }

    /// Writes a file with arbitrary contents.
    pub(crate) fn add_raw(&self, rel: &str, contents: &str) -> Result<Utf8PathBuf> {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(&path, contents)?;
        Ok(path)
    }

    /// Defines a suite read by the fake suite enumerator.
    pub(crate) fn add_suite(&self, suite: &str, tests: &[&str]) -> Result<()> {
        let mut contents = tests.join("\n");
        contents.push('\n');
        self.add_raw(&format!("suites/{suite}.list"), &contents)?;
        Ok(())
    }

    pub(crate) fn enumerator(&self) -> ExternalSuiteEnumerator {
        ExternalSuiteEnumerator::new(FAKE_SUITE_ENUMERATOR)
    }

    /// Resolves `tokens` and builds a plan.
    pub(crate) fn plan(&self, tokens: &[&str], combine: bool) -> Result<ExecutionPlan> {
        let enumerator = self.enumerator();
        let mut cx = ResolutionContext::new(
            self.path(),
            SearchRoots::with_defaults(self.path(), None),
            &enumerator,
        );
        let resolved = cx.resolve(&requests(tokens)?)?;
        Ok(cx.build_plan(resolved, combine)?)
    }

    /// Resolves `tokens`, returning the resolution error.
    pub(crate) fn resolve_err(&self, tokens: &[&str]) -> Result<ResolveError> {
        let enumerator = self.enumerator();
        let mut cx = ResolutionContext::new(
            self.path(),
            SearchRoots::with_defaults(self.path(), None),
            &enumerator,
        );
        match cx.resolve(&requests(tokens)?) {
            Ok(resolved) => Err(eyre!("expected resolution to fail, got {resolved:?}")),
            Err(err) => Ok(err),
        }
    }
}

pub(crate) fn requests(tokens: &[&str]) -> Result<TestRequests> {
    TestRequests::parse(tokens.iter().copied())
        .map_err(|token| eyre!("invalid test request `{token}`"))
}

/// A fake autoserv executor that logs its invocations.
pub(crate) struct FakeAutoserv {
    log: Utf8PathBuf,
    _dir: Utf8TempDir,
}

impl FakeAutoserv {
    pub(crate) fn new() -> Result<Self> {
        let dir = camino_tempfile::Builder::new()
            .prefix("fake-autoserv.")
            .tempdir()?;
        Ok(Self {
            log: dir.path().join("invocations.log"),
            _dir: dir,
        })
    }

    pub(crate) fn executor(&self, remote: &str) -> TestExecutor {
        let mut executor = TestExecutor::new(FAKE_AUTOSERV, remote);
        executor.extend_extra_args([format!("--fake-log={}", self.log)]);
        executor
    }

    /// Returns the arguments of each invocation, in order.
    pub(crate) fn invocations(&self) -> Result<Vec<Vec<String>>> {
        if !self.log.exists() {
            return Ok(Vec::new());
        }
        fs_err::read_to_string(&self.log)?
            .lines()
            .map(|line| Ok(shell_words::split(line)?))
            .collect()
    }
}

/// Returns the value following `flag` in `args`.
pub(crate) fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}
