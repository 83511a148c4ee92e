// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Window-system image allocation.
//!
//! Presentation back-ends need buffers the display controller and the
//! compositor can both address: single DMA-BUF allocations with known
//! pixel layouts. This crate picks the first supported layout from a
//! caller-supplied preference list, computes strides and plane offsets,
//! and allocates one shareable buffer from an injectable kernel heap.
//!
//! Two heap adaptors are provided: [`DmaBufHeap`] for `/dev/dma_heap`
//! and [`IonHeap`] for legacy `/dev/ion` kernels. Anything else can be
//! plugged in through the [`KernelHeap`] trait.

#[macro_use]
extern crate log;

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use remain::sorted;
use thiserror::Error;

mod bindings;
mod dma_buf_heap;
pub mod formats;
mod ion;

pub use dma_buf_heap::{DmaBufHeap, MEMORY_HEAP_NAME};
pub use formats::{Fourcc, FormatSpec, DRM_FORMAT_MOD_LINEAR, MAX_PLANES};
pub use ion::IonHeap;

/// Version of the allocation interface described by this crate's API.
pub const INTERFACE_VERSION: u32 = 3;

/// Version of the allocation interface this implementation provides.
/// Consumers may compare it against [`INTERFACE_VERSION`] at their own
/// build time.
pub const IMPLEMENTATION_VERSION: u32 = 3;

const _: () = assert!(
    IMPLEMENTATION_VERSION == INTERFACE_VERSION,
    "allocator implementation does not match the interface version it was built against"
);

/// Maximum image size allowed for each dimension.
pub const MAX_IMAGE_SIZE: u32 = 128000;

/// An error generated while allocating a window-system image.
#[sorted]
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Caller-supplied arguments violate the contract.
    #[error("invalid allocation parameters")]
    Invalid,
    /// Out of memory, or the requested heap was not registered.
    #[error("no heap resource available")]
    NoResource,
    /// No candidate format is expressible under the current restrictions.
    #[error("no requested format is supported")]
    NotSupported,
}

/// The result of an allocation operation.
pub type AllocResult<T> = std::result::Result<T, AllocError>;

const ALLOC_PROTECTED: u32 = 1 << 0;
const ALLOC_NO_MEMORY: u32 = 1 << 1;

/// Allocation behaviour flags.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct AllocFlags(pub u32);

impl AllocFlags {
    /// Returns empty set of flags.
    #[inline(always)]
    pub fn empty() -> AllocFlags {
        AllocFlags(0)
    }

    /// Sets the protected-memory flag's presence.
    #[inline(always)]
    pub fn use_protected(self, e: bool) -> AllocFlags {
        if e {
            AllocFlags(self.0 | ALLOC_PROTECTED)
        } else {
            AllocFlags(self.0 & !ALLOC_PROTECTED)
        }
    }

    /// Sets the no-memory flag's presence. With it set, format selection
    /// and layout calculation run but no buffer is allocated.
    #[inline(always)]
    pub fn use_no_memory(self, e: bool) -> AllocFlags {
        if e {
            AllocFlags(self.0 | ALLOC_NO_MEMORY)
        } else {
            AllocFlags(self.0 & !ALLOC_NO_MEMORY)
        }
    }

    /// Returns true if the protected-memory flag is set.
    #[inline(always)]
    pub fn protected(self) -> bool {
        self.0 & ALLOC_PROTECTED != 0
    }

    /// Returns true if the no-memory flag is set.
    #[inline(always)]
    pub fn no_memory(self) -> bool {
        self.0 & ALLOC_NO_MEMORY != 0
    }
}

/// One candidate pixel layout in an allocation request.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatRequest {
    pub fourcc: Fourcc,
    pub modifier: u64,
    pub flags: u64,
}

/// An allocation request: candidate formats in preference order plus the
/// image dimensions.
#[derive(Copy, Clone, Debug)]
pub struct AllocateInfo<'a> {
    pub formats: &'a [FormatRequest],
    pub width: u32,
    pub height: u32,
    pub flags: AllocFlags,
}

/// A successful allocation.
///
/// All planes of the selected format share a single buffer; per-plane
/// byte positions are described by `strides` and `offsets`. Plane slots
/// past `nr_planes` are zero.
#[derive(Debug)]
pub struct Allocation {
    /// The candidate that was selected from the request.
    pub format: FormatRequest,
    /// Number of planes `format` describes.
    pub nr_planes: u32,
    /// Per-plane row stride in bytes.
    pub strides: [u32; MAX_PLANES],
    /// Per-plane byte offset within the buffer.
    pub offsets: [u64; MAX_PLANES],
    /// Total size of the buffer in bytes.
    pub size: u64,
    /// Whether planes live in separate buffers. Always false for the
    /// currently supported formats.
    pub is_disjoint: bool,
    buffer: Option<OwnedFd>,
}

impl Allocation {
    /// Returns the buffer descriptor backing `plane`. Every plane of a
    /// non-disjoint allocation shares the same descriptor. None when the
    /// allocation was metadata-only or the plane does not exist.
    pub fn plane_fd(&self, plane: usize) -> Option<BorrowedFd<'_>> {
        if plane >= self.nr_planes as usize {
            return None;
        }
        self.buffer.as_ref().map(|fd| fd.as_fd())
    }

    /// Consumes the allocation, handing the buffer to the caller.
    pub fn into_buffer(self) -> Option<OwnedFd> {
        self.buffer
    }
}

/// A kernel memory heap that can produce shareable buffers.
///
/// Implementations perform exactly one kernel allocation per call and
/// return the new descriptor. The only reportable failure is lack of
/// resources; parameter validation happens during format selection.
pub trait KernelHeap: Send {
    fn allocate(&self, size: u64, flags: AllocFlags) -> AllocResult<OwnedFd>;
}

/// The window-system image allocator.
pub struct Allocator {
    heap: Box<dyn KernelHeap>,
}

impl Allocator {
    /// Returns an allocator over the default DMA-BUF memory heap.
    pub fn new() -> AllocResult<Allocator> {
        Ok(Allocator {
            heap: Box::new(DmaBufHeap::new()?),
        })
    }

    /// Returns an allocator over the given heap.
    pub fn with_heap(heap: Box<dyn KernelHeap>) -> Allocator {
        Allocator { heap }
    }

    /// Selects the first supported candidate format and allocates one
    /// buffer large enough for it.
    ///
    /// Candidate errors are superseded by later candidates; when the whole
    /// list is exhausted the last observed error is returned.
    pub fn alloc(&self, info: &AllocateInfo) -> AllocResult<Allocation> {
        if !validate_parameters(info) {
            return Err(AllocError::Invalid);
        }

        let mut selected = None;
        let mut last_err = AllocError::NotSupported;
        for candidate in info.formats {
            let spec = match formats::find_format(candidate.fourcc) {
                Some(spec) => spec,
                None => {
                    last_err = AllocError::NotSupported;
                    continue;
                }
            };

            match formats::compute_linear_layout(spec, candidate.modifier, info.width, info.height)
            {
                Ok(layout) => {
                    selected = Some((*candidate, spec, layout));
                    break;
                }
                Err(e) => {
                    last_err = e;
                    continue;
                }
            }
        }

        let (format, spec, layout) = match selected {
            Some(s) => s,
            None => return Err(last_err),
        };

        let buffer = if info.flags.no_memory() {
            None
        } else {
            Some(self.heap.allocate(layout.size, info.flags)?)
        };

        Ok(Allocation {
            format,
            nr_planes: spec.nr_planes,
            strides: layout.strides,
            offsets: layout.offsets,
            size: layout.size,
            is_disjoint: false,
            buffer,
        })
    }
}

fn validate_parameters(info: &AllocateInfo) -> bool {
    if info.formats.is_empty() {
        return false;
    }
    if info.width < 1 || info.height < 1 || info.width > MAX_IMAGE_SIZE || info.height > MAX_IMAGE_SIZE
    {
        return false;
    }
    true
}
