// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Result bookkeeping and report output.
//!
//! The driver prints progress to the serial console as the run proceeds;
//! everything goes through a `core::fmt::Write` sink so host tests capture
//! the output in a plain `String`. Two formats are supported: a plain text
//! format for humans and a tagged format a host-side harness can parse
//! line by line.

use core::fmt::{self, Write};
use testrig_abi::TestOutcome;
use testrig_abi::fault::FaultReport;

/// How reports are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable progress lines.
    PlainText,
    /// Machine-parsable `<testsuite>`/`<testcase>` lines.
    Tagged,
}

/// Final verdict over a whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunVerdict {
    /// Every selected test ran and passed.
    AllPassed,
    /// The run stopped before every selected test ran.
    NotAllRun,
    /// Every selected test ran, at least one failed.
    FailuresDetected,
}

impl RunVerdict {
    /// The closing line printed for this verdict.
    #[must_use]
    pub const fn line(self) -> &'static str {
        match self {
            Self::AllPassed => "All is well in the universe",
            Self::NotAllRun => "ALL tests not run",
            Self::FailuresDetected => "FAILURES DETECTED",
        }
    }
}

/// Counters accumulated over one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunState {
    /// Number of tests selected for the run.
    pub selected: usize,
    /// Number of tests that ran to an outcome.
    pub done: usize,
    /// Number of tests that failed or aborted.
    pub failed: usize,
    /// Number of tests that matched the pattern but were disabled.
    pub skipped: usize,
    /// Whether the run stopped early.
    pub halted: bool,
}

impl RunState {
    /// Creates counters for a run of `selected` tests.
    #[must_use]
    pub const fn new(selected: usize, skipped: usize) -> Self {
        Self {
            selected,
            done: 0,
            failed: 0,
            skipped,
            halted: false,
        }
    }

    /// Records one finished test.
    pub const fn record(&mut self, outcome: TestOutcome) {
        self.done += 1;
        match outcome {
            TestOutcome::Success => {}
            TestOutcome::Failure | TestOutcome::Abort => self.failed += 1,
        }
    }

    /// Number of tests that passed.
    #[must_use]
    pub const fn passed(&self) -> usize {
        self.done - self.failed
    }

    /// Computes the verdict for the current counters.
    ///
    /// An incomplete run dominates: a halt with tests remaining is reported
    /// as such even when the tests that did run all passed.
    #[must_use]
    pub const fn verdict(&self) -> RunVerdict {
        if self.halted || self.done < self.selected {
            RunVerdict::NotAllRun
        } else if self.failed > 0 {
            RunVerdict::FailuresDetected
        } else {
            RunVerdict::AllPassed
        }
    }
}

/// Writes run progress and results to a sink.
pub struct Reporter<'w> {
    sink: &'w mut dyn Write,
    format: OutputFormat,
}

impl<'w> Reporter<'w> {
    /// Creates a reporter over the given sink.
    pub fn new(sink: &'w mut dyn Write, format: OutputFormat) -> Self {
        Self { sink, format }
    }

    /// Announces the start of the run.
    ///
    /// # Errors
    ///
    /// Propagates sink write failures.
    pub fn suite_started(&mut self, suite: &str, state: &RunState) -> fmt::Result {
        match self.format {
            OutputFormat::PlainText => {
                writeln!(self.sink, "=== {suite} TEST RUN ===")?;
                writeln!(
                    self.sink,
                    "Selected {} tests ({} skipped)",
                    state.selected, state.skipped
                )
            }
            OutputFormat::Tagged => writeln!(
                self.sink,
                "<testsuite name=\"{suite}\" tests=\"{}\" skipped=\"{}\">",
                state.selected, state.skipped
            ),
        }
    }

    /// Announces one test starting.
    ///
    /// # Errors
    ///
    /// Propagates sink write failures.
    pub fn test_started(&mut self, name: &str, type_name: &str, index: usize, total: usize) -> fmt::Result {
        match self.format {
            OutputFormat::PlainText => {
                writeln!(self.sink, "[TEST] {name} ({type_name}) {index}/{total}")
            }
            OutputFormat::Tagged => Ok(()),
        }
    }

    /// Reports one finished test.
    ///
    /// # Errors
    ///
    /// Propagates sink write failures.
    pub fn test_finished(&mut self, name: &str, outcome: TestOutcome, duration_ns: u64) -> fmt::Result {
        match self.format {
            OutputFormat::PlainText => {
                writeln!(
                    self.sink,
                    "[TEST] {name} ... {} ({} us)",
                    outcome.name(),
                    duration_ns / 1_000
                )
            }
            OutputFormat::Tagged => writeln!(
                self.sink,
                "  <testcase name=\"{name}\" result=\"{}\" time_ns=\"{duration_ns}\"/>",
                outcome.name()
            ),
        }
    }

    /// Dumps a fault received on the control channel.
    ///
    /// # Errors
    ///
    /// Propagates sink write failures.
    pub fn fault_dump(&mut self, name: &str, fault: &FaultReport) -> fmt::Result {
        match self.format {
            OutputFormat::PlainText => {
                writeln!(self.sink, "[FAULT] {name}: {fault}")
            }
            OutputFormat::Tagged => writeln!(
                self.sink,
                "  <fault testcase=\"{name}\" kind=\"{}\" ip=\"0x{:x}\" addr=\"0x{:x}\"/>",
                fault.name(),
                fault.ip,
                fault.addr
            ),
        }
    }

    /// Prints the final counters and verdict.
    ///
    /// # Errors
    ///
    /// Propagates sink write failures.
    pub fn summary(&mut self, state: &RunState) -> fmt::Result {
        let verdict = state.verdict();
        match self.format {
            OutputFormat::PlainText => {
                writeln!(
                    self.sink,
                    "Results: {} run, {} passed, {} failed, {} skipped",
                    state.done,
                    state.passed(),
                    state.failed,
                    state.skipped
                )?;
                writeln!(self.sink, "=== VERDICT: {} ===", verdict.line())
            }
            OutputFormat::Tagged => {
                writeln!(
                    self.sink,
                    "  <summary run=\"{}\" passed=\"{}\" failed=\"{}\" skipped=\"{}\"/>",
                    state.done,
                    state.passed(),
                    state.failed,
                    state.skipped
                )?;
                writeln!(self.sink, "</testsuite>")?;
                writeln!(self.sink, "{}", verdict.line())
            }
        }
    }
}

#[cfg(test)]
mod report_test;
