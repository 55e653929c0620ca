// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Driver-side RPC service.
//!
//! Holds the fixed inventory of privileged device resources (device frames,
//! I/O ports, interrupt lines) that tests may request over the control
//! channel. Each resource is identified by kind plus physical address and
//! backed by one driver-side handle slot; the handle is issued at most once
//! per test, and a repeated request for the same resource answers with the
//! same slot instead of a second grant.

use testrig_abi::CapSlot;
use testrig_abi::message::{ResourceKind, RpcResponse};

/// Maximum number of device resources in the inventory.
pub const MAX_DEVICE_RESOURCES: usize = 32;

/// One privileged resource in the driver's inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceResource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Physical address (or port/IRQ number) identifying the resource.
    pub paddr: u64,
    /// Driver-side handle slot backing the resource.
    pub slot: CapSlot,
    /// Whether the current test has been issued this handle.
    pub issued: bool,
}

/// Error while populating the inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcError {
    /// The fixed inventory table is full.
    InventoryFull,
    /// A resource with this kind and address is already registered.
    DuplicateResource,
}

/// The RPC service state.
pub struct RpcService {
    resources: [Option<DeviceResource>; MAX_DEVICE_RESOURCES],
    count: usize,
    protocol_errors: u64,
}

impl RpcService {
    /// Creates a service with an empty inventory.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resources: [None; MAX_DEVICE_RESOURCES],
            count: 0,
            protocol_errors: 0,
        }
    }

    /// Registers a device resource during startup.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InventoryFull` if the table is full, or
    /// `RpcError::DuplicateResource` if the kind/address pair is already
    /// registered.
    pub fn add_resource(
        &mut self,
        kind: ResourceKind,
        paddr: u64,
        slot: CapSlot,
    ) -> Result<(), RpcError> {
        if self.find(kind, paddr).is_some() {
            return Err(RpcError::DuplicateResource);
        }
        if self.count >= MAX_DEVICE_RESOURCES {
            return Err(RpcError::InventoryFull);
        }
        self.resources[self.count] = Some(DeviceResource {
            kind,
            paddr,
            slot,
            issued: false,
        });
        self.count += 1;
        Ok(())
    }

    /// Services a resource request from the current test.
    ///
    /// The first request marks the resource as issued; any repeat request
    /// for the same resource answers with the same slot, so a test cannot
    /// multiply its grants by asking twice. Unknown resources answer with
    /// [`RpcResponse::ErrorNoResource`].
    pub fn handle_get_resource(&mut self, kind: ResourceKind, paddr: u64) -> RpcResponse {
        let Some(index) = self.find(kind, paddr) else {
            return RpcResponse::ErrorNoResource;
        };
        let Some(resource) = &mut self.resources[index] else {
            return RpcResponse::ErrorNoResource;
        };
        resource.issued = true;
        RpcResponse::ResourceHandle(resource.slot)
    }

    /// Clears the issued flags between tests.
    ///
    /// The handles themselves were revoked with the context; this resets
    /// the bookkeeping so the next test starts with a full inventory.
    pub fn reset_issued(&mut self) {
        for resource in self.resources[..self.count].iter_mut().flatten() {
            resource.issued = false;
        }
    }

    /// Records a request that could not be decoded.
    pub const fn note_protocol_error(&mut self) {
        self.protocol_errors += 1;
    }

    /// Number of undecodable requests seen so far.
    #[must_use]
    pub const fn protocol_errors(&self) -> u64 {
        self.protocol_errors
    }

    /// Number of registered resources.
    #[must_use]
    pub const fn resource_count(&self) -> usize {
        self.count
    }

    /// Number of resources issued to the current test.
    #[must_use]
    pub fn issued_count(&self) -> usize {
        self.resources[..self.count]
            .iter()
            .flatten()
            .filter(|r| r.issued)
            .count()
    }

    /// The registered resources, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &DeviceResource> {
        self.resources[..self.count].iter().flatten()
    }

    fn find(&self, kind: ResourceKind, paddr: u64) -> Option<usize> {
        self.resources[..self.count]
            .iter()
            .position(|r| matches!(r, Some(res) if res.kind == kind && res.paddr == paddr))
    }
}

impl Default for RpcService {
    fn default() -> Self {
        Self::new()
    }
}
