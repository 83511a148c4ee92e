// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Presentation-engine core for a window-system integration shim.
//!
//! Sits between a graphics application and the platform's display or
//! compositor. The application side sees a swapchain: acquire an image,
//! render into it, queue it back for presentation. The display side is a
//! pluggable [`Presenter`] back-end, driven FIFO by a per-swapchain
//! page-flip worker; the graphics device itself is reached through the
//! [`DeviceAdaptor`] seam, so no graphics API types appear here.

#[macro_use]
extern crate log;

pub mod device;
mod error;
pub mod presenter;
pub mod swapchain;
#[cfg(test)]
mod test_utils;

pub use device::DeviceAdaptor;
pub use error::{Error, Result};
pub use presenter::{
    DeviceFence, DeviceImage, DeviceQueue, DeviceSemaphore, Extent2d, ImageCreateDesc,
    ImageTiling, PresentMode, Presenter, SharingMode, SwapchainCreateInfo,
};
pub use swapchain::{ImageState, Swapchain};
