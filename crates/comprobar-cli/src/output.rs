//! Report output
//!
//! Artifact paths go to stdout, errors to stderr.

use comprobar::{Artifact, FailureInfo, Outcome, RunReport};
use console::{style, Term};
use std::path::Path;

/// Line announcing the success artifact
#[must_use]
pub fn success_line(artifact: &Artifact) -> String {
    format!("Screenshot saved to {}", artifact.path.display())
}

/// Lines describing a failed run
#[must_use]
pub fn failure_lines(error: &FailureInfo, artifact: Option<&Artifact>) -> Vec<String> {
    let mut lines = vec![format!("{}: {}", error.kind, error.message)];
    match artifact {
        Some(a) => lines.push(format!("Failure screenshot saved to {}", a.path.display())),
        None => lines.push("No failure screenshot could be taken".to_string()),
    }
    lines
}

/// Console reporter for runs and subcommands
#[derive(Debug)]
pub struct Reporter {
    out: Term,
    err: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// Per-step detail
    pub verbose: bool,
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool, verbose: bool) -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            use_color,
            quiet,
            verbose,
        }
    }

    /// Print the outcome of a run
    pub fn report(&self, report: &RunReport) {
        if self.verbose {
            for step in &report.steps {
                self.info(&format!(
                    "step {} {} ({:.0?})",
                    step.index, step.description, step.elapsed
                ));
            }
            let served = report.intercepts.iter().filter(|r| r.fulfilled()).count();
            self.info(&format!(
                "{served} of {} request(s) served by fixtures",
                report.intercepts.len()
            ));
        }

        match &report.outcome {
            Outcome::Passed { artifact } => {
                self.success(&format!(
                    "Scenario '{}' passed in {:.2}s",
                    report.scenario,
                    report.elapsed.as_secs_f64()
                ));
                // The artifact path is the run's product; quiet mode keeps it.
                let _ = self.out.write_line(&success_line(artifact));
            }
            Outcome::Failed { error, artifact } => {
                self.failure(&format!("Scenario '{}' failed", report.scenario));
                for line in failure_lines(error, artifact.as_ref()) {
                    let _ = self.err.write_line(&line);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.out.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.err.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        let _ = self.out.write_line(&format!("{prefix} {message}"));
    }

    /// Print a fixture body under a header
    pub fn fixture(&self, name: &str, pattern: &str, body: &str) {
        let header = format!("── {name} ({pattern}) ──");
        let header = if self.use_color {
            style(header).bold().to_string()
        } else {
            header
        };
        let _ = self.out.write_line(&header);
        let _ = self.out.write_line(body);
    }

    /// Raw line on stdout
    pub fn line(&self, text: &str) {
        let _ = self.out.write_line(text);
    }

    /// Announce a written file
    pub fn wrote(&self, path: &Path) {
        self.success(&format!("Wrote {}", path.display()));
    }
}
