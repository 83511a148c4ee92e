// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The platform presenter contract.
//!
//! A presenter is the pluggable back-end that turns a swapchain image into
//! pixels on a display: direct-to-display, a compositor surface, or a
//! headless sink. The swapchain drives it from the page-flip worker and
//! from initialisation/teardown; everything platform-private (buffer
//! export, display state, per-image bookkeeping) stays inside the
//! presenter, keyed by image index.

use crate::device::DeviceAdaptor;
use crate::Result;

/// Image handle type of a presenter's device.
pub type DeviceImage<P> = <<P as Presenter>::Device as DeviceAdaptor>::Image;
/// Fence type of a presenter's device.
pub type DeviceFence<P> = <<P as Presenter>::Device as DeviceAdaptor>::Fence;
/// Semaphore type of a presenter's device.
pub type DeviceSemaphore<P> = <<P as Presenter>::Device as DeviceAdaptor>::Semaphore;
/// Queue type of a presenter's device.
pub type DeviceQueue<P> = <<P as Presenter>::Device as DeviceAdaptor>::Queue;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    Concurrent,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

/// Configuration for a new swapchain.
///
/// `image_format` and `image_usage` are opaque to the swapchain and
/// forwarded to the device adaptor as-is.
#[derive(Clone, Debug)]
pub struct SwapchainCreateInfo {
    pub min_image_count: u32,
    pub image_format: u32,
    pub image_extent: Extent2d,
    pub image_array_layers: u32,
    pub image_usage: u32,
    pub image_sharing_mode: SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub present_mode: PresentMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageTiling {
    Optimal,
    Linear,
}

/// Description of one 2D swapchain image, handed to the device adaptor.
/// The initial layout is undefined.
#[derive(Clone, Debug)]
pub struct ImageCreateDesc {
    pub format: u32,
    pub extent: Extent2d,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: u32,
    pub tiling: ImageTiling,
    pub usage: u32,
    pub sharing_mode: SharingMode,
    pub queue_family_indices: Vec<u32>,
}

impl ImageCreateDesc {
    /// Builds the image description for a swapchain's images: single
    /// sampled, one mip level, optimal tiling, everything else forwarded
    /// from `info`.
    pub fn for_swapchain(info: &SwapchainCreateInfo) -> ImageCreateDesc {
        ImageCreateDesc {
            format: info.image_format,
            extent: info.image_extent,
            mip_levels: 1,
            array_layers: info.image_array_layers,
            samples: 1,
            tiling: ImageTiling::Optimal,
            usage: info.image_usage,
            sharing_mode: info.image_sharing_mode,
            queue_family_indices: info.queue_family_indices.clone(),
        }
    }
}

/// A platform presentation back-end.
pub trait Presenter: Send + 'static {
    type Device: DeviceAdaptor;

    /// One-time platform setup, before any image exists. Failures abort
    /// swapchain initialisation and are reported to the caller unchanged.
    fn init_platform(
        &mut self,
        device: &Self::Device,
        create_info: &SwapchainCreateInfo,
    ) -> Result<()>;

    /// Creates the backing image and presentation fence for slot `index`.
    fn create_image(
        &mut self,
        device: &Self::Device,
        index: u32,
        desc: &ImageCreateDesc,
    ) -> Result<(DeviceImage<Self>, DeviceFence<Self>)>;

    /// Releases the backing image of slot `index`.
    fn destroy_image(&mut self, device: &Self::Device, index: u32, image: DeviceImage<Self>);

    /// Puts image `index` on screen. Synchronous: the page-flip worker is
    /// blocked until this returns. Returns the index of the image the
    /// flip displaced from the display, if any; the swapchain releases
    /// the displaced image.
    fn present_image(&mut self, index: u32) -> Result<Option<u32>>;

    /// Gives the platform a chance to produce a free buffer without
    /// blocking, possibly shortening the caller's remaining wait. The
    /// default does nothing.
    fn get_free_buffer(&mut self, _timeout_ns: &mut u64) -> Result<()> {
        Ok(())
    }
}
