// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving test patterns against the control file tree.

use crate::errors::ResolveError;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

/// The default search roots, relative to the autotest directory.
pub const DEFAULT_SEARCH_ROOTS: [&str; 4] = [
    "client/tests",
    "client/site_tests",
    "server/tests",
    "server/site_tests",
];

/// Control files are looked for at most this many levels below a search root.
const MAX_DEPTH: usize = 2;

/// The ordered set of directories scanned for control files.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SearchRoots {
    roots: Vec<Utf8PathBuf>,
}

impl SearchRoots {
    /// Creates search roots from `relative_roots` joined onto `autotest_dir`, followed by
    /// `external_root` if specified.
    ///
    /// Absolute entries in `relative_roots` are used as is.
    pub fn new(
        autotest_dir: &Utf8Path,
        relative_roots: impl IntoIterator<Item = impl AsRef<Utf8Path>>,
        external_root: Option<&Utf8Path>,
    ) -> Self {
        let mut roots: Vec<_> = relative_roots
            .into_iter()
            .map(|root| autotest_dir.join(root))
            .collect();
        roots.extend(external_root.map(Utf8Path::to_owned));
        Self { roots }
    }

    /// Creates the default search roots for `autotest_dir`.
    pub fn with_defaults(autotest_dir: &Utf8Path, external_root: Option<&Utf8Path>) -> Self {
        Self::new(autotest_dir, DEFAULT_SEARCH_ROOTS, external_root)
    }

    /// Returns the roots, in search order.
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    /// Returns every control file under the roots, in search order.
    ///
    /// Within a root, entries are visited in file name order. Roots that don't exist are
    /// skipped.
    pub fn control_files(&self) -> Result<Vec<Utf8PathBuf>, ResolveError> {
        let mut control_files = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                debug!("skipping search root {root}: not a directory");
                continue;
            }

            let walker = WalkDir::new(root)
                .min_depth(1)
                .max_depth(MAX_DEPTH)
                .follow_links(true)
                .sort_by_file_name();
            for entry in walker {
                let entry = entry.map_err(|err| ResolveError::ScanRoot {
                    root: root.clone(),
                    err,
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = match Utf8PathBuf::from_path_buf(entry.into_path()) {
                    Ok(path) => path,
                    Err(path) => {
                        debug!("skipping non-UTF-8 path {}", path.display());
                        continue;
                    }
                };
                if path.file_name().is_some_and(is_control_file_name) {
                    control_files.push(path);
                }
            }
        }

        Ok(control_files)
    }
}

/// Returns true for `control` and `control.*`, excluding editor backups ending in `~`.
pub fn is_control_file_name(name: &str) -> bool {
    (name == "control" || name.starts_with("control.")) && !name.ends_with('~')
}

/// Resolves patterns to single control files.
///
/// The candidate list is computed once and reused for every pattern.
#[derive(Clone, Debug)]
pub struct PatternMatcher {
    candidates: Vec<Utf8PathBuf>,
}

impl PatternMatcher {
    /// Scans `roots` and creates a new matcher over the control files found.
    pub fn new(roots: &SearchRoots) -> Result<Self, ResolveError> {
        let candidates = roots.control_files()?;
        debug!("found {} candidate control files", candidates.len());
        Ok(Self { candidates })
    }

    /// Creates a matcher over an explicit candidate list.
    pub fn from_candidates(candidates: Vec<Utf8PathBuf>) -> Self {
        Self { candidates }
    }

    /// Returns the candidate control files.
    pub fn candidates(&self) -> &[Utf8PathBuf] {
        &self.candidates
    }

    /// Returns the single control file whose full path matches `pattern`.
    ///
    /// The pattern is an unanchored regular expression. It's an error for it to match zero
    /// control files, or more than one.
    pub fn resolve(&self, pattern: &str) -> Result<Utf8PathBuf, ResolveError> {
        let regex = Regex::new(pattern).map_err(|err| ResolveError::InvalidPattern {
            pattern: pattern.to_owned(),
            err,
        })?;

        let mut matches: Vec<_> = self
            .candidates
            .iter()
            .filter(|path| regex.is_match(path.as_str()))
            .cloned()
            .collect();

        match matches.len() {
            0 => Err(ResolveError::NoMatch {
                pattern: pattern.to_owned(),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(ResolveError::AmbiguousPattern {
                pattern: pattern.to_owned(),
                matches,
            }),
        }
    }
}
