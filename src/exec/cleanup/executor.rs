// src/exec/cleanup/executor.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::exec::cleanup::config::{CleanupConfig, CleanupGroup};
use crate::exec::cleanup::model::{CleanupReport, CleanupRequest};
use crate::exec::env_expand::expand_env;
use crate::fs::FileSystem;

/// Pattern-driven filesystem cleanup.
///
/// `run` never fails: every problem ends up in [`CleanupReport::errors`].
/// Simulation walks exactly the same paths and skips the mutations. Its
/// counters match a real run only when every deletion in that run succeeds,
/// since a real run counts nothing it failed to delete.
///
/// Symbolic links are removed as links and never followed, so nothing
/// outside the configured paths is touched.
#[derive(Debug, Clone)]
pub struct CleanupExecutor {
    fs: Arc<dyn FileSystem>,
    targets: Vec<PathBuf>,
    force_simulate: bool,
}

impl CleanupExecutor {
    /// `targets` are the candidate locations of the targets document, most
    /// specific first (see [`crate::exec::cleanup::target_candidates`]).
    pub fn new(fs: Arc<dyn FileSystem>, targets: Vec<PathBuf>) -> Self {
        Self {
            fs,
            targets,
            force_simulate: false,
        }
    }

    /// Treat every request as a simulation (agent-wide dry run).
    pub fn with_forced_simulation(mut self, force: bool) -> Self {
        self.force_simulate = force;
        self
    }

    pub fn is_simulating(&self, request: &CleanupRequest) -> bool {
        self.force_simulate || request.simulate
    }

    pub fn run(&self, request: &CleanupRequest, cancel: &CancellationToken) -> CleanupReport {
        let mut report = CleanupReport::default();

        let config = match CleanupConfig::load(self.fs.as_ref(), &self.targets) {
            Ok((config, _)) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "unusable cleanup targets; nothing cleaned");
                report.errors.push(format!("config: {e:#}"));
                return report;
            }
        };

        self.run_with_config(&config, request, cancel, report)
    }

    /// Run against an already loaded config.
    pub fn run_with_config(
        &self,
        config: &CleanupConfig,
        request: &CleanupRequest,
        cancel: &CancellationToken,
        mut report: CleanupReport,
    ) -> CleanupReport {
        let simulate = self.is_simulating(request);
        let groups = config.select(request.groups.as_deref());

        info!(
            level = %request.level,
            simulate,
            groups = groups.len(),
            "cleanup started"
        );

        let exclusions = build_exclusions(&config.exclusions, &mut report.errors);
        let mut sweep = Sweep {
            fs: self.fs.as_ref(),
            simulate,
            exclusions,
            report: &mut report,
        };

        for group in groups {
            if cancel.is_cancelled() {
                sweep.report.errors.push(format!("{}: cancelled", group.name));
                break;
            }
            if sweep.run_group(group, cancel) {
                sweep.report.groups_done.push(group.name.clone());
            }
        }

        info!(
            files = report.files_deleted,
            bytes = report.bytes_freed,
            groups_done = report.groups_done.len(),
            errors = report.errors.len(),
            simulate,
            "cleanup finished"
        );
        report
    }
}

/// Compile exclusion patterns; bad patterns are reported and skipped.
fn build_exclusions(patterns: &[String], errors: &mut Vec<String>) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for raw in patterns {
        let mut expanded = expand_env(raw);
        if cfg!(windows) {
            // Candidate paths are matched with `/` separators.
            expanded = expanded.replace('\\', "/");
        }
        match GlobBuilder::new(&expanded)
            .case_insensitive(cfg!(windows))
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => errors.push(format!("exclusion {raw}: {e}")),
        }
    }
    builder.build().unwrap_or_else(|e| {
        errors.push(format!("exclusions: {e}"));
        GlobSet::empty()
    })
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

fn mask_matcher(mask: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(mask)
        .case_insensitive(cfg!(windows))
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid mask {mask:?}"))?;
    Ok(glob.compile_matcher())
}

struct Sweep<'a> {
    fs: &'a dyn FileSystem,
    simulate: bool,
    exclusions: GlobSet,
    report: &'a mut CleanupReport,
}

impl Sweep<'_> {
    /// Process every pattern of `group`. Returns `false` when cancelled
    /// part-way, in which case the group is not reported as done.
    fn run_group(&mut self, group: &CleanupGroup, cancel: &CancellationToken) -> bool {
        debug!(group = %group.name, patterns = group.paths.len(), "cleaning group");

        for pattern in &group.paths {
            if cancel.is_cancelled() {
                self.report.errors.push(format!("{}: cancelled", group.name));
                return false;
            }
            if let Err(e) = self.run_pattern(pattern) {
                self.report.errors.push(format!("{}: {e:#}", group.name));
            }
        }
        true
    }

    fn run_pattern(&mut self, pattern: &str) -> Result<()> {
        let expanded = expand_env(pattern);
        let path = PathBuf::from(&expanded);

        if !is_wildcard(&expanded) {
            if self.fs.is_symlink(&path) {
                self.delete_link(&path);
            } else if self.fs.is_file(&path) {
                self.delete_file(&path);
            } else if self.fs.is_dir(&path) {
                self.delete_dir(&path);
            }
            return Ok(());
        }

        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let Some(mask) = path.file_name().and_then(|m| m.to_str()) else {
            return Ok(());
        };
        if !self.fs.is_dir(dir) {
            debug!(dir = ?dir, "wildcard directory does not exist; skipping");
            return Ok(());
        }

        let matcher = mask_matcher(mask)?;
        let mut entries = self.fs.read_dir(dir)?;
        entries.sort();

        let matching: Vec<PathBuf> = entries
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| matcher.is_match(n))
            })
            .collect();

        let (links, entries): (Vec<&PathBuf>, Vec<&PathBuf>) =
            matching.iter().partition(|p| self.fs.is_symlink(p));
        for link in links {
            self.delete_link(link);
        }
        for file in entries.iter().filter(|p| self.fs.is_file(p)) {
            self.delete_file(file);
        }
        for sub in entries.iter().filter(|p| self.fs.is_dir(p)) {
            self.delete_dir(sub);
        }
        Ok(())
    }

    fn is_excluded(&self, path: &Path) -> bool {
        !self.exclusions.is_empty() && self.exclusions.is_match(path)
    }

    /// Returns `true` when the file was (or would be) deleted.
    fn delete_file(&mut self, path: &Path) -> bool {
        if self.is_excluded(path) {
            debug!(path = ?path, "excluded; keeping file");
            return false;
        }
        match self.try_delete_file(path) {
            Ok(()) => true,
            Err(e) => {
                self.report
                    .errors
                    .push(format!("file {}: {e:#}", path.display()));
                false
            }
        }
    }

    fn try_delete_file(&mut self, path: &Path) -> Result<()> {
        let len = self.fs.file_len(path)?;
        if !self.simulate {
            self.fs.clear_readonly(path)?;
            self.fs.remove_file(path)?;
        }
        self.report.files_deleted += 1;
        self.report.bytes_freed += i64::try_from(len).unwrap_or(i64::MAX);
        Ok(())
    }

    /// Remove a symbolic link, never what it points to. Counts as one file
    /// of zero bytes. Returns `true` when the link was (or would be) removed.
    fn delete_link(&mut self, link: &Path) -> bool {
        if self.is_excluded(link) {
            debug!(path = ?link, "excluded; keeping link");
            return false;
        }
        if !self.simulate {
            // A link to a directory is a directory entry on Windows.
            let removed = self.fs.remove_file(link).or_else(|e| {
                if cfg!(windows) && self.fs.is_dir(link) {
                    self.fs.remove_dir(link)
                } else {
                    Err(e)
                }
            });
            if let Err(e) = removed {
                self.report
                    .errors
                    .push(format!("link {}: {e:#}", link.display()));
                return false;
            }
        }
        self.report.files_deleted += 1;
        true
    }

    fn delete_dir(&mut self, dir: &Path) {
        if self.is_excluded(dir) {
            debug!(dir = ?dir, "excluded; keeping directory");
            return;
        }
        if let Err(e) = self.try_delete_dir(dir) {
            self.report
                .errors
                .push(format!("dir {}: {e:#}", dir.display()));
        }
    }

    fn try_delete_dir(&mut self, dir: &Path) -> Result<()> {
        let kept = self.sweep_tree(dir)?;
        if !self.simulate && !kept {
            self.fs.remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Delete every file below `dir`, then prune emptied subdirectories.
    ///
    /// Returns `true` when something below `dir` had to stay (excluded or
    /// failed), meaning `dir` itself must not be removed.
    fn sweep_tree(&mut self, dir: &Path) -> Result<bool> {
        let mut entries = self.fs.read_dir(dir)?;
        entries.sort();

        let mut kept = false;
        for entry in entries {
            if self.fs.is_symlink(&entry) {
                if !self.delete_link(&entry) {
                    kept = true;
                }
            } else if self.fs.is_dir(&entry) {
                if self.is_excluded(&entry) {
                    kept = true;
                    continue;
                }
                let sub_kept = self.sweep_tree(&entry)?;
                if sub_kept {
                    kept = true;
                } else if !self.simulate {
                    self.fs.remove_dir(&entry)?;
                }
            } else if !self.delete_file(&entry) {
                kept = true;
            }
        }
        Ok(kept)
    }
}
