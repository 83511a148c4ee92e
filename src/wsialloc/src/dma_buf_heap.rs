// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! DMA-BUF heap backed allocation.

use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::bindings::{dma_heap_allocation_data, dma_heap_ioctl_alloc};
use crate::{AllocError, AllocFlags, AllocResult, KernelHeap};

/// Name of the DMA-BUF heap used for window-system memory, fixed at
/// compile time.
pub const MEMORY_HEAP_NAME: &str = match option_env!("WSIALLOC_MEMORY_HEAP_NAME") {
    Some(name) => name,
    None => "system",
};

/// Kernel heap adaptor over `/dev/dma_heap`.
///
/// Holds one descriptor for the window-system memory heap and, when one
/// was registered, a second descriptor for a protected-memory heap.
pub struct DmaBufHeap {
    memory: OwnedFd,
    protected: Option<OwnedFd>,
}

fn open_heap_node(name: &str) -> AllocResult<OwnedFd> {
    let path = format!("/dev/dma_heap/{name}");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| {
            error!("failed to open dma-buf heap {path}: {e}");
            AllocError::NoResource
        })?;
    Ok(file.into())
}

impl DmaBufHeap {
    /// Opens the compile-time configured memory heap.
    pub fn new() -> AllocResult<DmaBufHeap> {
        Self::open(MEMORY_HEAP_NAME)
    }

    /// Opens the named heap under `/dev/dma_heap`.
    pub fn open(name: &str) -> AllocResult<DmaBufHeap> {
        Ok(DmaBufHeap {
            memory: open_heap_node(name)?,
            protected: None,
        })
    }

    /// Registers a protected-memory heap. Without this, protected
    /// allocations are refused.
    pub fn with_protected_heap(mut self, name: &str) -> AllocResult<DmaBufHeap> {
        self.protected = Some(open_heap_node(name)?);
        Ok(self)
    }
}

impl KernelHeap for DmaBufHeap {
    fn allocate(&self, size: u64, flags: AllocFlags) -> AllocResult<OwnedFd> {
        let heap = if flags.protected() {
            self.protected.as_ref().ok_or(AllocError::NoResource)?
        } else {
            &self.memory
        };

        let mut data = dma_heap_allocation_data {
            len: size,
            fd: 0,
            fd_flags: (libc::O_RDWR | libc::O_CLOEXEC) as u32,
            heap_flags: 0,
        };
        // SAFETY: `heap` is a dma-buf heap chardev and `data` matches the
        // ioctl's argument layout.
        unsafe { dma_heap_ioctl_alloc(heap.as_raw_fd(), &mut data) }.map_err(|e| {
            error!("dma-buf heap allocation of {size} bytes failed: {e}");
            AllocError::NoResource
        })?;

        // SAFETY: the ioctl returned a freshly created descriptor that we
        // now own.
        Ok(unsafe { OwnedFd::from_raw_fd(data.fd as RawFd) })
    }
}
