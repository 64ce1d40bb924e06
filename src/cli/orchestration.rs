//! Build and release orchestration
//!
//! Reads the project's changelog, picks the latest entry, runs the build or
//! release script with `<project> <version>`, and for releases creates an
//! annotated tag from the entry's bullets and pushes it. Every external
//! command goes through a [`CommandRunner`], one at a time, and each step must
//! succeed before the next one starts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::changelog::{self, VersionEntry};
use crate::config::Config;
use crate::error::{Result, ShipitError};
use crate::git_ops::{self, TagMessage};
use crate::supervisor::{resolve_program, CommandRunner, CommandSpec, LineSink, ProcessOutcome};
use crate::ui::{self, BusyIndicator};

/// Which script to run and whether to tag afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    /// Run the build script only
    Build,
    /// Run the release script, then tag and push
    Release,
}

impl ReleaseKind {
    pub fn creates_tag(self) -> bool {
        matches!(self, ReleaseKind::Release)
    }

    fn script<'a>(self, config: &'a Config) -> &'a str {
        match self {
            ReleaseKind::Build => &config.scripts.build,
            ReleaseKind::Release => &config.scripts.release,
        }
    }
}

/// Arguments for one orchestrator run
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    pub script: PathBuf,
    pub project_name: String,
    pub working_dir: PathBuf,
    pub create_tag: bool,
    pub verbose: bool,
}

impl ReleaseRequest {
    /// Builds a request for the project rooted at `project_dir`.
    ///
    /// The project name is the directory's final path component and the script
    /// path comes from the configuration.
    pub fn for_project(
        kind: ReleaseKind,
        project_dir: &Path,
        config: &Config,
        verbose: bool,
    ) -> Result<Self> {
        let project_name = project_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ShipitError::orchestration(format!(
                    "Cannot derive a project name from '{}'",
                    project_dir.display()
                ))
            })?;

        Ok(ReleaseRequest {
            script: resolve_program(project_dir, Path::new(kind.script(config))),
            project_name,
            working_dir: project_dir.to_path_buf(),
            create_tag: kind.creates_tag(),
            verbose,
        })
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseReport {
    /// The changelog entry that was built
    pub entry: VersionEntry,
    /// Whether a tag was created and pushed
    pub tagged: bool,
    /// Output captured from every command, in execution order
    pub log: Vec<String>,
}

/// Runs builds and releases through a [`CommandRunner`]
pub struct ReleaseOrchestrator<R: CommandRunner> {
    runner: R,
    config: Config,
    echo: LineSink,
    show_progress: bool,
}

impl<R: CommandRunner> ReleaseOrchestrator<R> {
    pub fn new(runner: R, config: Config) -> Self {
        ReleaseOrchestrator {
            runner,
            config,
            echo: Arc::new(|line: &str| ui::display_output_line(line)),
            show_progress: true,
        }
    }

    /// Replaces the sink that receives output lines in verbose mode
    pub fn with_echo(mut self, echo: LineSink) -> Self {
        self.echo = echo;
        self
    }

    /// Enables or disables the busy indicator for non-verbose runs
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Runs the build, and the tag and push steps when requested.
    ///
    /// Changelog, process and precondition errors are returned as they are.
    /// Anything else is reported as [`ShipitError::Unhandled`] together with
    /// all output captured before the failure.
    pub fn execute(&self, request: &ReleaseRequest) -> Result<ReleaseReport> {
        let mut log = Vec::new();

        match self.execute_steps(request, &mut log) {
            Ok(entry) => Ok(ReleaseReport {
                entry,
                tagged: request.create_tag,
                log,
            }),
            Err(
                e @ (ShipitError::Format(_)
                | ShipitError::Execution(_)
                | ShipitError::Orchestration(_)),
            ) => Err(e),
            Err(other) => Err(ShipitError::Unhandled {
                message: other.to_string(),
                log,
            }),
        }
    }

    fn execute_steps(&self, request: &ReleaseRequest, log: &mut Vec<String>) -> Result<VersionEntry> {
        if !request.script.is_file() {
            return Err(ShipitError::orchestration(missing_script_message(
                &request.script,
            )));
        }

        self.print_if_verbose(
            request,
            &format!(
                "Building '{}' in '{}'",
                request.project_name,
                request.working_dir.display()
            ),
        );

        let entries = read_changelog(&self.config.changelog_path(&request.working_dir))?;
        self.print_if_verbose(request, &format!("Found {} versions", entries.len()));

        let entry = select_latest(&entries)?.clone();
        self.print_if_verbose(request, &format!("Building version:\n\n{}\n", entry));

        let build = CommandSpec::new(&request.script, &request.working_dir)
            .args([request.project_name.clone(), entry.version.to_string()]);
        ui::display_exec(&build.to_string());

        // Verbose output and the busy indicator are mutually exclusive
        let busy = (!request.verbose && self.show_progress)
            .then(|| BusyIndicator::start(&format!("Building {}", entry.version)));

        self.run_step(&build, request, log)?;

        if request.create_tag {
            if let Some(busy) = &busy {
                busy.set_message(&format!("Tagging {}", entry.version));
            }
            self.tag_and_push(&entry, request, busy.as_ref(), log)?;
        }

        Ok(entry)
    }

    fn tag_and_push(
        &self,
        entry: &VersionEntry,
        request: &ReleaseRequest,
        busy: Option<&BusyIndicator>,
        log: &mut Vec<String>,
    ) -> Result<()> {
        let program = &self.config.vcs.program;
        let dir = &request.working_dir;

        {
            let message = TagMessage::write(entry)?;
            let notice = format!("Tag message written to {}", message.path().display());
            match busy {
                Some(busy) => busy.println(&notice),
                None => println!("{}", notice),
            }

            let tag = git_ops::tag_command(program, dir, &entry.version, message.path());
            self.print_if_verbose(request, &format!("EXEC> {}", tag));
            self.run_step(&tag, request, log)?;
        }

        let push = git_ops::push_tags_command(program, dir);
        self.print_if_verbose(request, &format!("EXEC> {}", push));
        self.run_step(&push, request, log)?;

        info!(version = %entry.version, "tag created and pushed");
        Ok(())
    }

    fn run_step(
        &self,
        command: &CommandSpec,
        request: &ReleaseRequest,
        log: &mut Vec<String>,
    ) -> Result<ProcessOutcome> {
        let echo = request.verbose.then(|| Arc::clone(&self.echo));

        match self.runner.run(command, echo) {
            Ok(outcome) => {
                log.extend(outcome.captured_lines.iter().cloned());
                Ok(outcome)
            }
            Err(e) => {
                log.extend(e.log().iter().cloned());
                Err(e.into())
            }
        }
    }

    fn print_if_verbose(&self, request: &ReleaseRequest, text: &str) {
        if request.verbose {
            (self.echo)(text);
        }
    }
}

/// Reads and parses the changelog at `path`
pub fn read_changelog(path: &Path) -> Result<Vec<VersionEntry>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ShipitError::orchestration(missing_changelog_message(path)));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(changelog::parse(&text)?)
}

/// Picks the entry to build: the last one in file order.
///
/// Warns when another entry has a higher version, since that usually means
/// the changelog was written newest-first.
pub fn select_latest(entries: &[VersionEntry]) -> Result<&VersionEntry> {
    let latest = changelog::latest_entry(entries)
        .ok_or_else(|| ShipitError::orchestration("The changelog contains no versions"))?;

    if let Some(highest) = changelog::newest_by_precedence(entries) {
        if highest.version > latest.version {
            warn!(
                selected = %latest.version,
                highest = %highest.version,
                "last changelog entry is not the highest version"
            );
            ui::display_warning(&format!(
                "Building {} (last entry in the changelog), but {} is a higher version. \
                 Versions are expected oldest first, newest at the bottom.",
                latest.version, highest.version
            ));
        }
    }

    debug!(version = %latest.version, bullets = latest.bullets.len(), "selected version");
    Ok(latest)
}

fn missing_script_message(script: &Path) -> String {
    format!(
        "Could not find script: '{}'.

Please create the script at the path shown above, and make it so that
it correctly accepts a project name and a version as its arguments.",
        script.display()
    )
}

fn missing_changelog_message(path: &Path) -> String {
    format!(
        "Could not find changelog '{}'.

Please create a changelog at the path shown above, and use a format where
versions are added like this:

    ## <version>

    * changelog line 1
    * changelog line 2

e.g. like this:

    ## 1.0.4

    * Fix subtle bug
    * Fix another thing

    ## 1.1.0

    * Add some function

etc.",
        path.display()
    )
}
