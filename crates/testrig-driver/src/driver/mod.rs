// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The test-run orchestrator.
//!
//! Owns every driver service (slot allocator, resource pool, timers, RPC
//! inventory, context manager, control channel, reporter) and drives the
//! whole run: resolve the plan, run the tests type by type, and print the
//! verdict. Bootstrap tests run inside the driver; isolated tests get a
//! fresh execution context each and are watched through the dispatch loop.

use crate::context::{ContextError, ContextManager, ContextOps};
use crate::dispatch::{ControlChannel, Dispatcher, TestVerdict};
use crate::pool::ResourcePool;
use crate::registry::{RegistryError, RunPlan, TestDescriptor, TestEnv, TestType, collect_tests};
use crate::report::{OutputFormat, Reporter, RunState, RunVerdict};
use crate::rpc::RpcService;
use crate::slots::SlotAllocator;
use crate::timer::{Clock, TimerCallback, TimerSubsystem};
use core::fmt;
use testrig_abi::TimerId;
use testrig_abi::types::TestOutcome;

/// Handle space size of every execution context, in bits.
pub const CONTEXT_CSPACE_SIZE_BITS: u8 = 12;

/// Run-wide configuration.
#[derive(Clone, Copy, Debug)]
pub struct RunConfig {
    /// Suite name printed in the run header.
    pub suite_name: &'static str,
    /// Selection pattern (`*` and `?` wildcards).
    pub pattern: &'static str,
    /// Stop the run at the first failure instead of continuing.
    pub halt_on_failure: bool,
    /// Report rendering.
    pub format: OutputFormat,
    /// Priority for isolated test threads.
    pub priority: u8,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            suite_name: "testrig",
            pattern: "*",
            halt_on_failure: false,
            format: OutputFormat::PlainText,
            priority: 100,
        }
    }
}

/// Fatal error ending a run early.
///
/// Test failures are results, not errors; this type covers broken
/// registration, a context the driver cannot build or tear down, and an
/// unwritable report sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverError {
    /// Run-plan resolution failed.
    Registry(RegistryError),
    /// Context setup, start, or teardown failed.
    Context(ContextError),
    /// The report sink rejected a write.
    Report,
}

impl From<RegistryError> for DriverError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<ContextError> for DriverError {
    fn from(err: ContextError) -> Self {
        Self::Context(err)
    }
}

impl From<fmt::Error> for DriverError {
    fn from(_: fmt::Error) -> Self {
        Self::Report
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(err) => write!(f, "registry: {err}"),
            Self::Context(err) => write!(f, "context: {err}"),
            Self::Report => write!(f, "report sink failed"),
        }
    }
}

/// The test driver.
pub struct Driver<'w, O: ContextOps, C: Clock, Ch: ControlChannel> {
    config: RunConfig,
    slots: SlotAllocator,
    pool: ResourcePool,
    timers: TimerSubsystem<C>,
    rpc: RpcService,
    contexts: ContextManager<O>,
    channel: Ch,
    reporter: Reporter<'w>,
    /// Wakes a test blocked on an expired timeout.
    wake: TimerCallback,
    wake_token: u64,
}

impl<'w, O: ContextOps, C: Clock, Ch: ControlChannel> Driver<'w, O, C, Ch> {
    /// Assembles a driver from its services.
    ///
    /// `wake` runs whenever a timeout armed by a running test expires; on
    /// target it signals the test's context.
    #[allow(clippy::too_many_arguments)] // Assembly point for all services
    pub fn new(
        config: RunConfig,
        slots: SlotAllocator,
        pool: ResourcePool,
        timers: TimerSubsystem<C>,
        rpc: RpcService,
        contexts: ContextManager<O>,
        channel: Ch,
        reporter: Reporter<'w>,
        wake: TimerCallback,
        wake_token: u64,
    ) -> Self {
        Self {
            config,
            slots,
            pool,
            timers,
            rpc,
            contexts,
            channel,
            reporter,
            wake,
            wake_token,
        }
    }

    /// Runs every selected test and prints the summary.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] for fatal conditions: broken test
    /// registration, a context the driver cannot build or tear down, or a
    /// failing report sink. Individual test failures are reflected in the
    /// returned verdict instead.
    pub fn run(
        &mut self,
        catalogs: &[&'static [TestDescriptor]],
    ) -> Result<RunVerdict, DriverError> {
        let plan = collect_tests(catalogs, self.config.pattern)?;

        if plan.is_empty() {
            return self.report_empty_suite(&plan);
        }

        let mut state = RunState::new(plan.len(), plan.skipped());
        self.reporter.suite_started(self.config.suite_name, &state)?;

        let total = plan.len();
        let mut index = 0;

        'run: for ty in TestType::ALL {
            for test in plan.tests_of(ty) {
                index += 1;
                self.reporter.test_started(test.name, ty.name(), index, total)?;

                let start_ns = self.timers.timestamp();
                let verdict = self.run_one(test)?;
                let duration_ns = self.timers.timestamp().saturating_sub(start_ns);

                state.record(verdict.outcome);
                self.reporter
                    .test_finished(test.name, verdict.outcome, duration_ns)?;

                self.reset_between_tests();

                let halt = matches!(verdict.outcome, TestOutcome::Abort)
                    || (self.config.halt_on_failure
                        && matches!(verdict.outcome, TestOutcome::Failure));
                if halt {
                    state.halted = state.done < state.selected;
                    break 'run;
                }
            }
        }

        self.reporter.summary(&state)?;
        Ok(state.verdict())
    }

    /// A suite without a single matching test is itself a failure; report
    /// it as one synthetic failing check so it cannot be mistaken for a
    /// clean run.
    fn report_empty_suite(&mut self, plan: &RunPlan) -> Result<RunVerdict, DriverError> {
        let mut state = RunState::new(1, plan.skipped());
        self.reporter.suite_started(self.config.suite_name, &state)?;
        self.reporter
            .test_started("suite_has_tests", TestType::Bootstrap.name(), 1, 1)?;
        state.record(TestOutcome::Failure);
        self.reporter
            .test_finished("suite_has_tests", TestOutcome::Failure, 0)?;
        self.reporter.summary(&state)?;
        Ok(state.verdict())
    }

    /// Runs one test to its verdict.
    fn run_one(&mut self, test: &TestDescriptor) -> Result<TestVerdict, DriverError> {
        match test.ty {
            TestType::Bootstrap => Ok(self.run_bootstrap(test)),
            TestType::IsolatedProcess => self.run_isolated(test),
        }
    }

    /// Bootstrap tests call straight into the driver's address space.
    fn run_bootstrap(&mut self, test: &TestDescriptor) -> TestVerdict {
        let env = TestEnv {
            name: test.name,
            start_ns: self.timers.timestamp(),
            pool_blocks: self.pool.block_count(),
            free_slots: self.slots.remaining(),
        };
        TestVerdict {
            outcome: (test.entry)(&env),
            fault: None,
        }
    }

    /// Isolated tests get a context, a spawned thread, and the dispatch
    /// loop; the context is torn down whatever happened.
    fn run_isolated(&mut self, test: &TestDescriptor) -> Result<TestVerdict, DriverError> {
        let mut ctx = self.contexts.setup(
            &mut self.slots,
            &mut self.pool,
            test.name,
            self.config.priority,
        )?;

        let started = self.contexts.start(&mut ctx);
        let verdict = match started {
            Ok(()) => {
                let mut dispatcher = Dispatcher::new(
                    &mut self.channel,
                    &mut self.timers,
                    &mut self.rpc,
                    self.wake,
                    self.wake_token,
                );
                dispatcher.run_test(test.name, &mut self.reporter)
            }
            Err(err) => {
                // The context never ran; reclaim before surfacing the error
                self.contexts
                    .teardown(ctx, &mut self.slots, &mut self.pool)?;
                return Err(err.into());
            }
        };

        self.contexts
            .teardown(ctx, &mut self.slots, &mut self.pool)?;
        Ok(verdict?)
    }

    /// Clears every piece of per-test state.
    fn reset_between_tests(&mut self) {
        self.timers.reset(TimerId::NULL);
        self.rpc.reset_issued();
    }
}

#[cfg(test)]
mod driver_test;
