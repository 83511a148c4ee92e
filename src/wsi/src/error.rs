// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

use remain::sorted;
use thiserror::Error;

/// An error generated by the swapchain, mapped 1:1 onto the presentation
/// API's result codes. Device and platform errors are surfaced through
/// these same codes, unchanged.
#[sorted]
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// An output array was too small for the full result set.
    #[error("fewer items were returned than exist")]
    Incomplete,
    /// The requested configuration cannot be brought up.
    #[error("swapchain initialization failed")]
    InitializationFailed,
    /// A non-blocking wait found no free image.
    #[error("no image is ready")]
    NotReady,
    /// The swapchain has been deprecated and its replacement has taken
    /// over presentation.
    #[error("the swapchain is out of date")]
    OutOfDate,
    /// Host-side allocation failed, or the swapchain was invalidated by
    /// an earlier device failure.
    #[error("out of host memory")]
    OutOfHostMemory,
    /// The presentation surface is no longer available.
    #[error("the surface has been lost")]
    SurfaceLost,
    /// A bounded wait expired before a free image appeared.
    #[error("timed out waiting for a free image")]
    Timeout,
}

/// The result of a swapchain operation.
pub type Result<T> = std::result::Result<T, Error>;
