// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fake device and presenter used by the swapchain tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::device::DeviceAdaptor;
use crate::presenter::{ImageCreateDesc, Presenter, SwapchainCreateInfo};
use crate::{Error, Result};

/// A fence whose submissions signal instantly.
pub struct FakeFence {
    signalled: Mutex<bool>,
    cond: Condvar,
}

impl FakeFence {
    fn new() -> FakeFence {
        FakeFence {
            signalled: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn signal(&self) {
        *self.signalled.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn reset(&self) {
        *self.signalled.lock().unwrap() = false;
    }

    fn wait(&self) {
        let mut signalled = self.signalled.lock().unwrap();
        while !*signalled {
            signalled = self.cond.wait(signalled).unwrap();
        }
    }

    pub fn is_signalled(&self) -> bool {
        *self.signalled.lock().unwrap()
    }
}

#[derive(Default)]
pub struct FakeSemaphore {
    signalled: AtomicBool,
}

impl FakeSemaphore {
    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FakeQueue;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FakeImage(pub u32);

/// A device whose renders complete the moment they are submitted.
#[derive(Default)]
pub struct FakeDevice {
    next_image: AtomicU32,
    /// When set, fence waits report a lost device.
    pub fail_fence_waits: AtomicBool,
}

impl FakeDevice {
    pub fn new() -> FakeDevice {
        FakeDevice::default()
    }

    pub fn make_fence(&self) -> FakeFence {
        FakeFence::new()
    }

    pub fn make_semaphore(&self) -> FakeSemaphore {
        FakeSemaphore::default()
    }
}

impl DeviceAdaptor for FakeDevice {
    type Image = FakeImage;
    type Fence = FakeFence;
    type Semaphore = FakeSemaphore;
    type Queue = FakeQueue;

    fn create_image(&self, _desc: &ImageCreateDesc) -> Result<FakeImage> {
        Ok(FakeImage(self.next_image.fetch_add(1, Ordering::SeqCst)))
    }

    fn destroy_image(&self, _image: &FakeImage) {}

    fn create_fence(&self) -> Result<FakeFence> {
        Ok(FakeFence::new())
    }

    fn reset_fence(&self, fence: &FakeFence) -> Result<()> {
        fence.reset();
        Ok(())
    }

    fn wait_for_fence(&self, fence: &FakeFence) -> Result<()> {
        if self.fail_fence_waits.load(Ordering::SeqCst) {
            return Err(Error::OutOfHostMemory);
        }
        fence.wait();
        Ok(())
    }

    fn submit(
        &self,
        _queue: &FakeQueue,
        _wait_semaphores: &[FakeSemaphore],
        signal_semaphore: Option<&FakeSemaphore>,
        fence: Option<&FakeFence>,
    ) -> Result<()> {
        if let Some(semaphore) = signal_semaphore {
            semaphore.signalled.store(true, Ordering::SeqCst);
        }
        if let Some(fence) = fence {
            fence.signal();
        }
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: &FakeQueue) -> Result<()> {
        Ok(())
    }

    fn get_queue(&self, _family: u32, _index: u32) -> Result<FakeQueue> {
        Ok(FakeQueue)
    }

    fn tag_queue(&self, _queue: &FakeQueue) -> Result<()> {
        Ok(())
    }
}

/// Observable history of a [`FakePresenter`].
#[derive(Default)]
pub struct PresenterState {
    presents: Mutex<Vec<u32>>,
    destroyed: Mutex<Vec<u32>>,
    current: Mutex<Option<u32>>,
    init_platform_calls: AtomicU32,
}

impl PresenterState {
    /// Indices handed to `present_image`, in call order.
    pub fn presents(&self) -> Vec<u32> {
        self.presents.lock().unwrap().clone()
    }

    /// Slot indices whose image was destroyed, in call order.
    pub fn destroyed(&self) -> Vec<u32> {
        self.destroyed.lock().unwrap().clone()
    }

    pub fn init_platform_calls(&self) -> u32 {
        self.init_platform_calls.load(Ordering::SeqCst)
    }
}

/// A presenter that records its calls and tracks a single displayed
/// image, displacing the previous one on every flip.
pub struct FakePresenter {
    state: Arc<PresenterState>,
}

impl FakePresenter {
    pub fn new() -> (FakePresenter, Arc<PresenterState>) {
        let state = Arc::new(PresenterState::default());
        (
            FakePresenter {
                state: state.clone(),
            },
            state,
        )
    }
}

impl Presenter for FakePresenter {
    type Device = FakeDevice;

    fn init_platform(
        &mut self,
        _device: &FakeDevice,
        _create_info: &SwapchainCreateInfo,
    ) -> Result<()> {
        self.state.init_platform_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_image(
        &mut self,
        device: &FakeDevice,
        _index: u32,
        desc: &ImageCreateDesc,
    ) -> Result<(FakeImage, FakeFence)> {
        Ok((device.create_image(desc)?, device.create_fence()?))
    }

    fn destroy_image(&mut self, device: &FakeDevice, index: u32, image: FakeImage) {
        device.destroy_image(&image);
        self.state.destroyed.lock().unwrap().push(index);
    }

    fn present_image(&mut self, index: u32) -> Result<Option<u32>> {
        self.state.presents.lock().unwrap().push(index);
        Ok(self.state.current.lock().unwrap().replace(index))
    }
}
