// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The shipped test catalog.
//!
//! Bootstrap checks run inside the driver and validate the rig itself.
//! Isolated tests run in their own execution context and validate the
//! context machinery from the inside; their entries are invoked by the
//! context thread, which builds the [`TestEnv`] from the control page.

use testrig_abi::control::{ControlBlock, PAGE_SIZE};
use testrig_abi::message::{RpcRequest, RpcResponse};
use testrig_abi::types::TestOutcome;
use testrig_driver::registry::{TestDescriptor, TestEnv, TestType};

/// Every catalog shipped with the suite.
pub static CATALOGS: [&[TestDescriptor]; 2] = [&BOOTSTRAP, &ISOLATED];

/// Finds a test by name across every shipped catalog.
#[must_use]
pub fn find(name: &str) -> Option<&'static TestDescriptor> {
    CATALOGS
        .iter()
        .flat_map(|catalog| catalog.iter())
        .find(|test| test.name == name)
}

static BOOTSTRAP: [TestDescriptor; 4] = [
    TestDescriptor {
        name: "boot_control_page_layout",
        description: "control block fits the shared page",
        ty: TestType::Bootstrap,
        enabled: true,
        entry: boot_control_page_layout,
    },
    TestDescriptor {
        name: "boot_pool_populated",
        description: "the leasable pool holds at least one block",
        ty: TestType::Bootstrap,
        enabled: true,
        entry: boot_pool_populated,
    },
    TestDescriptor {
        name: "boot_slots_available",
        description: "enough free handle slots for a context cycle",
        ty: TestType::Bootstrap,
        enabled: true,
        entry: boot_slots_available,
    },
    TestDescriptor {
        name: "boot_wire_format",
        description: "control-protocol messages survive encoding",
        ty: TestType::Bootstrap,
        enabled: true,
        entry: boot_wire_format,
    },
];

static ISOLATED: [TestDescriptor; 5] = [
    TestDescriptor {
        name: "proc_lifecycle",
        description: "spawns, reports, and is torn down",
        ty: TestType::IsolatedProcess,
        enabled: true,
        entry: proc_lifecycle,
    },
    TestDescriptor {
        name: "proc_control_page",
        description: "the control page names this test",
        ty: TestType::IsolatedProcess,
        enabled: true,
        entry: proc_control_page,
    },
    TestDescriptor {
        name: "proc_leased_blocks",
        description: "the pool lease is visible from inside",
        ty: TestType::IsolatedProcess,
        enabled: true,
        entry: proc_leased_blocks,
    },
    TestDescriptor {
        name: "proc_timestamp",
        description: "driver timestamps are strictly monotonic",
        ty: TestType::IsolatedProcess,
        enabled: true,
        entry: proc_timestamp,
    },
    TestDescriptor {
        name: "proc_device_probe",
        description: "claims the platform UART frame",
        ty: TestType::IsolatedProcess,
        // The UART physical address differs per platform
        enabled: false,
        entry: proc_device_probe,
    },
];

fn boot_control_page_layout(_env: &TestEnv) -> TestOutcome {
    if core::mem::size_of::<ControlBlock>() <= PAGE_SIZE as usize {
        TestOutcome::Success
    } else {
        TestOutcome::Failure
    }
}

fn boot_pool_populated(env: &TestEnv) -> TestOutcome {
    if env.pool_blocks > 0 {
        TestOutcome::Success
    } else {
        TestOutcome::Failure
    }
}

fn boot_slots_available(env: &TestEnv) -> TestOutcome {
    // A context cycle takes a handful of slots; anything below this means
    // the run would die half way through
    if env.free_slots >= 16 {
        TestOutcome::Success
    } else {
        TestOutcome::Failure
    }
}

fn boot_wire_format(_env: &TestEnv) -> TestOutcome {
    let request = RpcRequest::ArmTimeout {
        ns: 42,
        periodic: false,
    };
    if RpcRequest::from_mrs(request.to_mrs()) != Some(request) {
        return TestOutcome::Failure;
    }
    let response = RpcResponse::Timestamp(7);
    if RpcResponse::from_mrs(response.to_mrs()) != Some(response) {
        return TestOutcome::Failure;
    }
    TestOutcome::Success
}

fn proc_lifecycle(_env: &TestEnv) -> TestOutcome {
    // Reaching this entry at all proves spawn and report delivery work
    TestOutcome::Success
}

fn proc_control_page(env: &TestEnv) -> TestOutcome {
    if env.name == "proc_control_page" {
        TestOutcome::Success
    } else {
        TestOutcome::Failure
    }
}

fn proc_leased_blocks(env: &TestEnv) -> TestOutcome {
    if env.pool_blocks >= 1 {
        TestOutcome::Success
    } else {
        TestOutcome::Failure
    }
}

fn proc_timestamp(env: &TestEnv) -> TestOutcome {
    #[cfg(feature = "sel4")]
    {
        let _ = env;
        let (Some(first), Some(second)) = (crate::client::timestamp(), crate::client::timestamp())
        else {
            return TestOutcome::Failure;
        };
        if second > first {
            TestOutcome::Success
        } else {
            TestOutcome::Failure
        }
    }
    #[cfg(not(feature = "sel4"))]
    {
        // Off target there is no driver to ask
        let _ = env;
        TestOutcome::Success
    }
}

fn proc_device_probe(env: &TestEnv) -> TestOutcome {
    #[cfg(feature = "sel4")]
    {
        let _ = env;
        use testrig_abi::message::ResourceKind;
        match crate::client::get_resource(ResourceKind::Frame, 0x0900_0000) {
            Some(_) => TestOutcome::Success,
            None => TestOutcome::Failure,
        }
    }
    #[cfg(not(feature = "sel4"))]
    {
        let _ = env;
        TestOutcome::Success
    }
}

#[cfg(test)]
mod catalog_test;
