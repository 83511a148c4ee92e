// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! ION backed allocation, for kernels predating DMA-BUF heaps.

use std::fs::OpenOptions;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use crate::bindings::{
    ion_allocation_data, ion_heap_data, ion_heap_query, ion_ioctl_alloc, ion_ioctl_heap_query,
    ION_HEAP_TYPE_DMA, ION_NUM_HEAP_IDS,
};
use crate::{AllocError, AllocFlags, AllocResult, KernelHeap};

/// Kernel heap adaptor over `/dev/ion`.
///
/// One device descriptor serves every heap; individual heaps are selected
/// by id. The allocation heap is the first `ION_HEAP_TYPE_DMA` heap the
/// kernel reports. A protected heap id may additionally be registered;
/// without one, protected allocations are refused.
pub struct IonHeap {
    fd: OwnedFd,
    alloc_heap_id: u32,
    protected_heap_id: Option<u32>,
}

fn find_alloc_heap_id(fd: BorrowedFd) -> AllocResult<u32> {
    let mut heaps = [ion_heap_data::default(); ION_NUM_HEAP_IDS];
    let mut query = ion_heap_query {
        cnt: ION_NUM_HEAP_IDS as u32,
        heaps: heaps.as_mut_ptr() as u64,
        ..Default::default()
    };

    // SAFETY: `heaps` outlives the call and `query.cnt` bounds how many
    // entries the kernel may write.
    unsafe { ion_ioctl_heap_query(fd.as_raw_fd(), &mut query) }.map_err(|e| {
        error!("ion heap query failed: {e}");
        AllocError::NoResource
    })?;

    heaps
        .iter()
        .take(query.cnt as usize)
        .find(|heap| heap.type_ == ION_HEAP_TYPE_DMA)
        .map(|heap| heap.heap_id)
        .ok_or(AllocError::NoResource)
}

impl IonHeap {
    /// Opens `/dev/ion` and locates the allocation heap.
    pub fn new() -> AllocResult<IonHeap> {
        let file = OpenOptions::new().read(true).open("/dev/ion").map_err(|e| {
            error!("failed to open /dev/ion: {e}");
            AllocError::NoResource
        })?;
        let fd: OwnedFd = file.into();

        // On failure the device descriptor is dropped here; nothing leaks.
        let alloc_heap_id = find_alloc_heap_id(fd.as_fd())?;

        Ok(IonHeap {
            fd,
            alloc_heap_id,
            protected_heap_id: None,
        })
    }

    /// Registers the heap id used for protected allocations.
    pub fn with_protected_heap_id(mut self, heap_id: u32) -> IonHeap {
        self.protected_heap_id = Some(heap_id);
        self
    }
}

impl KernelHeap for IonHeap {
    fn allocate(&self, size: u64, flags: AllocFlags) -> AllocResult<OwnedFd> {
        let heap_id = if flags.protected() {
            self.protected_heap_id.ok_or(AllocError::NoResource)?
        } else {
            self.alloc_heap_id
        };

        let mut alloc = ion_allocation_data {
            len: size,
            heap_id_mask: 1u32 << heap_id,
            ..Default::default()
        };
        // SAFETY: `self.fd` is the ion chardev and `alloc` matches the
        // ioctl's argument layout.
        unsafe { ion_ioctl_alloc(self.fd.as_raw_fd(), &mut alloc) }.map_err(|e| {
            error!("ion allocation of {size} bytes failed: {e}");
            AllocError::NoResource
        })?;

        // SAFETY: the ioctl returned a freshly created descriptor that we
        // now own.
        Ok(unsafe { OwnedFd::from_raw_fd(alloc.fd as RawFd) })
    }
}
