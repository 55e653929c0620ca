// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Test registry and run-order resolution.
//!
//! Suites contribute static catalogs of [`TestDescriptor`] entries. At
//! startup the driver collects every catalog, filters by the selection
//! pattern, and resolves a deterministic run order: tests are grouped by
//! type, and sorted by name within each type. The resulting [`RunPlan`] is
//! fixed for the whole run.

use testrig_abi::TestOutcome;
use testrig_abi::control::MAX_TEST_NAME_LEN;

/// Maximum number of tests in a single run plan.
pub const MAX_PLAN_TESTS: usize = 256;

/// Environment handed to a test entry point.
///
/// For tests running inside the driver this is filled directly; for
/// isolated tests the same information travels via the control page.
pub struct TestEnv {
    /// Name of the running test.
    pub name: &'static str,
    /// Timestamp taken when the test was started, in nanoseconds.
    pub start_ns: u64,
    /// Number of memory blocks available to the test.
    pub pool_blocks: usize,
    /// Number of free capability slots available to the test.
    pub free_slots: u64,
}

/// Entry point of a test.
pub type TestFn = fn(&TestEnv) -> TestOutcome;

/// How a test is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TestType {
    /// Runs inside the driver itself, without an execution context.
    Bootstrap = 0,
    /// Runs in its own isolated execution context.
    IsolatedProcess = 1,
}

impl TestType {
    /// All types, in run order.
    pub const ALL: [Self; 2] = [Self::Bootstrap, Self::IsolatedProcess];

    /// Numeric ordering key. Lower runs earlier.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Human-readable type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::IsolatedProcess => "isolated",
        }
    }

    /// Whether tests of this type need an execution context.
    #[must_use]
    pub const fn needs_context(self) -> bool {
        match self {
            Self::Bootstrap => false,
            Self::IsolatedProcess => true,
        }
    }
}

/// A single registered test.
pub struct TestDescriptor {
    /// Unique test name.
    pub name: &'static str,
    /// Short description, for reports.
    pub description: &'static str,
    /// How the test is executed.
    pub ty: TestType,
    /// Disabled tests match patterns but are skipped, and counted as such.
    pub enabled: bool,
    /// Entry point.
    pub entry: TestFn,
}

/// Error during run-plan resolution. All of these are fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Two registered tests share a name.
    DuplicateName,
    /// More matching tests than the plan can hold.
    TooManyTests,
    /// A test name exceeds the control-page name limit.
    NameTooLong,
}

impl core::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateName => write!(f, "duplicate test name"),
            Self::TooManyTests => write!(f, "too many tests selected"),
            Self::NameTooLong => write!(f, "test name too long"),
        }
    }
}

/// The resolved, ordered set of tests for one run.
pub struct RunPlan {
    tests: [Option<&'static TestDescriptor>; MAX_PLAN_TESTS],
    count: usize,
    skipped: usize,
}

impl core::fmt::Debug for RunPlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunPlan")
            .field("count", &self.count)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

impl RunPlan {
    /// All selected tests, in run order.
    pub fn tests(&self) -> impl Iterator<Item = &'static TestDescriptor> + '_ {
        self.tests[..self.count].iter().flatten().copied()
    }

    /// The selected tests of one type, in run order.
    pub fn tests_of(&self, ty: TestType) -> impl Iterator<Item = &'static TestDescriptor> + '_ {
        self.tests().filter(move |test| test.ty == ty)
    }

    /// Number of selected tests.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no tests were selected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of tests that matched the pattern but are disabled.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Collects every catalog into a run plan for the given selection pattern.
///
/// The order is deterministic regardless of catalog registration order:
/// type-major (bootstrap before isolated), name-minor within each type.
///
/// # Errors
///
/// Returns `RegistryError::DuplicateName` if two tests share a name,
/// `RegistryError::TooManyTests` if the plan overflows, or
/// `RegistryError::NameTooLong` if a selected name does not fit the
/// control page. All are registration bugs and abort the run.
pub fn collect_tests(
    catalogs: &[&'static [TestDescriptor]],
    pattern: &str,
) -> Result<RunPlan, RegistryError> {
    let mut plan = RunPlan {
        tests: [None; MAX_PLAN_TESTS],
        count: 0,
        skipped: 0,
    };

    for catalog in catalogs {
        for test in *catalog {
            if !name_matches(pattern, test.name) {
                continue;
            }
            if test.name.len() > MAX_TEST_NAME_LEN {
                return Err(RegistryError::NameTooLong);
            }
            if !test.enabled {
                plan.skipped += 1;
                continue;
            }
            if plan.count >= MAX_PLAN_TESTS {
                return Err(RegistryError::TooManyTests);
            }
            plan.tests[plan.count] = Some(test);
            plan.count += 1;
        }
    }

    sort_plan(&mut plan);

    // Sorting is type-major, so a repeated name can sit in another type
    // with other names in between; compare every pair.
    for i in 0..plan.count {
        for j in (i + 1)..plan.count {
            let (Some(a), Some(b)) = (plan.tests[i], plan.tests[j]) else {
                continue;
            };
            if a.name == b.name {
                return Err(RegistryError::DuplicateName);
            }
        }
    }

    Ok(plan)
}

/// Sorts the plan type-major, name-minor.
fn sort_plan(plan: &mut RunPlan) {
    // Simple insertion sort - plans are small and mostly ordered already
    for i in 1..plan.count {
        let mut j = i;
        while j > 0 {
            let (Some(prev), Some(curr)) = (plan.tests[j - 1], plan.tests[j]) else {
                break;
            };
            if (curr.ty.id(), curr.name) < (prev.ty.id(), prev.name) {
                plan.tests.swap(j, j - 1);
                j -= 1;
            } else {
                break;
            }
        }
    }
}

/// Matches a test name against a selection pattern.
///
/// Supports `*` (any run of characters, including none) and `?` (exactly
/// one character). Everything else matches literally. The empty pattern
/// matches nothing; `*` matches everything.
#[must_use]
pub fn name_matches(pattern: &str, name: &str) -> bool {
    let pat = pattern.as_bytes();
    let text = name.as_bytes();

    // Iterative matcher with single-star backtracking
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            // Let the last star swallow one more character and retry
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }
    p == pat.len()
}
