// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Raw kernel ABIs for the DMA-BUF heap and ION allocation interfaces.
//!
//! Struct layouts and ioctl numbers mirror the Linux uapi headers
//! `linux/dma-heap.h` and the (staging) `linux/ion.h`.

#![allow(non_camel_case_types)]

use nix::ioctl_readwrite;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct dma_heap_allocation_data {
    pub len: u64,
    pub fd: u32,
    pub fd_flags: u32,
    pub heap_flags: u64,
}

// DMA_HEAP_IOCTL_ALLOC = _IOWR('H', 0x0, struct dma_heap_allocation_data)
ioctl_readwrite!(dma_heap_ioctl_alloc, b'H', 0x0, dma_heap_allocation_data);

pub const ION_NUM_HEAP_IDS: usize = 32;
pub const MAX_HEAP_NAME: usize = 32;

/// `type` field values of `ion_heap_data` for the heap kinds we care
/// about. The windowing system needs contiguous device-addressable
/// memory, i.e. `ION_HEAP_TYPE_DMA`.
pub const ION_HEAP_TYPE_DMA: u32 = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ion_allocation_data {
    pub len: u64,
    pub heap_id_mask: u32,
    pub flags: u32,
    pub fd: u32,
    pub unused: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ion_heap_data {
    pub name: [u8; MAX_HEAP_NAME],
    pub type_: u32,
    pub heap_id: u32,
    pub reserved0: u32,
    pub reserved1: u32,
    pub reserved2: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ion_heap_query {
    pub cnt: u32,
    pub reserved0: u32,
    pub heaps: u64,
    pub reserved1: u32,
    pub reserved2: u32,
}

// ION_IOC_ALLOC = _IOWR('I', 0, struct ion_allocation_data)
ioctl_readwrite!(ion_ioctl_alloc, b'I', 0, ion_allocation_data);
// ION_IOC_HEAP_QUERY = _IOWR('I', 8, struct ion_heap_query)
ioctl_readwrite!(ion_ioctl_heap_query, b'I', 8, ion_heap_query);
