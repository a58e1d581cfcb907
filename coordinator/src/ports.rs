//! Deterministic port allocation for parallel test workers
//!
//! Every worker owns a contiguous block of `stride` ports starting at
//! `base_port + worker_index * stride`; each service role owns one fixed
//! offset inside that block. Two sessions with different worker indices can
//! therefore never collide, and no socket is bound to find a free port.

use serde::{Deserialize, Serialize};

use crate::error::{CoordinatorError, CoordinatorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAllocator {
    base_port: u16,
    stride: u16,
}

impl PortAllocator {
    pub const DEFAULT_BASE_PORT: u16 = 55000;
    pub const DEFAULT_STRIDE: u16 = 100;

    pub fn new(base_port: u16, stride: u16) -> Self {
        Self { base_port, stride }
    }

    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    pub fn stride(&self) -> u16 {
        self.stride
    }

    /// `base_port + worker_index * stride + role_offset`
    pub fn allocate(&self, worker_index: u16, role_offset: u16) -> CoordinatorResult<u16> {
        if role_offset >= self.stride {
            return Err(CoordinatorError::InvalidPortOffset {
                offset: role_offset,
                stride: self.stride,
            });
        }

        let port = u32::from(self.base_port) + u32::from(worker_index) * u32::from(self.stride) + u32::from(role_offset);

        u16::try_from(port).map_err(|_| CoordinatorError::PortOutOfRange {
            worker_index,
            offset: role_offset,
        })
    }

    /// Bind the allocator to one worker so callers only pass offsets
    pub fn for_worker(&self, worker_index: u16) -> WorkerPorts {
        WorkerPorts {
            allocator: *self,
            worker_index,
        }
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_PORT, Self::DEFAULT_STRIDE)
    }
}

/// Port block belonging to a single worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPorts {
    allocator: PortAllocator,
    worker_index: u16,
}

impl WorkerPorts {
    pub fn worker_index(&self) -> u16 {
        self.worker_index
    }

    pub fn port(&self, role_offset: u16) -> CoordinatorResult<u16> {
        self.allocator.allocate(self.worker_index, role_offset)
    }
}
