// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The abstract device consumed by the swapchain.

use crate::presenter::ImageCreateDesc;
use crate::Result;

/// Operations the swapchain needs from the graphics device.
///
/// The swapchain never talks to a graphics API directly; everything
/// device-side goes through this adaptor. Handle types are opaque to the
/// swapchain, which only stores, clones and hands them back.
pub trait DeviceAdaptor: Send + Sync + 'static {
    /// An image object handle.
    type Image: Clone + Send + 'static;
    /// A fence that a queue submission can signal.
    type Fence: Send + Sync + 'static;
    /// A semaphore that a queue submission can wait on or signal.
    type Semaphore: Sync;
    /// A device queue handle.
    type Queue;

    /// Allocates an image object described by `desc`.
    fn create_image(&self, desc: &ImageCreateDesc) -> Result<Self::Image>;

    /// Releases an image object.
    fn destroy_image(&self, image: &Self::Image);

    /// Creates an unsignalled fence.
    fn create_fence(&self) -> Result<Self::Fence>;

    /// Returns `fence` to the unsignalled state.
    fn reset_fence(&self, fence: &Self::Fence) -> Result<()>;

    /// Blocks until `fence` signals. There is no timeout; forward
    /// progress is the device's responsibility, and a failure here means
    /// the device is lost.
    fn wait_for_fence(&self, fence: &Self::Fence) -> Result<()>;

    /// Submits a batch with no command buffers: waits for
    /// `wait_semaphores`, then signals `signal_semaphore` and `fence`
    /// when everything submitted before it has completed.
    fn submit(
        &self,
        queue: &Self::Queue,
        wait_semaphores: &[Self::Semaphore],
        signal_semaphore: Option<&Self::Semaphore>,
        fence: Option<&Self::Fence>,
    ) -> Result<()>;

    /// Blocks until `queue` has drained.
    fn queue_wait_idle(&self, queue: &Self::Queue) -> Result<()>;

    /// Resolves the queue at (`family`, `index`).
    fn get_queue(&self, family: u32, index: u32) -> Result<Self::Queue>;

    /// Tags `queue` with the loader dispatch data of this device.
    fn tag_queue(&self, queue: &Self::Queue) -> Result<()>;
}
