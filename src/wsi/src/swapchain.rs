// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The swapchain image-lifecycle engine.
//!
//! A swapchain owns a small pool of presentable images. The application
//! acquires a free image, renders into it, and queues it for presentation;
//! a dedicated page-flip worker drives queued images onto the display in
//! submission order. Image states move through a fixed machine:
//!
//! ```text
//!   FREE ──acquire──► ACQUIRED ──queue_present──► PENDING
//!     ▲                   │                          │ worker, after the
//!     │                   │ deprecated               │ render fence
//!     │                   ▼                          ▼
//!     └────displaced── (FREE) ◄────displaced──── PRESENTED
//! ```
//!
//! Only the caller moves an image out of FREE or ACQUIRED; only the
//! worker moves one out of PENDING or PRESENTED. A counting semaphore
//! tracks free images, a second one signals the worker, and a bounded
//! ring carries pending indices from `queue_present` to the worker in
//! FIFO order.
//!
//! When the application recreates a swapchain, the old and new instances
//! are linked as ancestor and descendant so the new one starts presenting
//! only after the old one's outstanding presents have drained, and the
//! old one releases its images as soon as the new one takes over. The
//! link is weak in both directions and broken at teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use utils::Semaphore;

use crate::device::DeviceAdaptor;
use crate::presenter::{
    DeviceFence, DeviceImage, DeviceQueue, DeviceSemaphore, ImageCreateDesc, PresentMode,
    Presenter, SwapchainCreateInfo,
};
use crate::{Error, Result};

/// Lifecycle state of one swapchain image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageState {
    /// No backing resources.
    Invalid,
    /// Available for acquisition.
    Free,
    /// Handed to the application for rendering.
    Acquired,
    /// Queued for presentation, waiting for its render fence and its turn.
    Pending,
    /// On the display.
    Presented,
}

struct ImageSlot<P: Presenter> {
    image: Option<DeviceImage<P>>,
    fence: Option<Arc<DeviceFence<P>>>,
    state: ImageState,
}

/// Bounded FIFO of image indices in submission order. Capacity equals the
/// image count, so it cannot overflow while the state machine holds.
struct PendingRing {
    slots: Box<[u32]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl PendingRing {
    fn new(capacity: usize) -> PendingRing {
        PendingRing {
            slots: vec![0; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    fn push(&mut self, index: u32) {
        assert!(self.len < self.slots.len());
        self.slots[self.tail] = index;
        self.tail = (self.tail + 1) % self.slots.len();
        self.len += 1;
    }

    fn pop(&mut self) -> u32 {
        assert!(self.len > 0);
        let index = self.slots[self.head];
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        index
    }
}

struct Pool<P: Presenter> {
    images: Vec<ImageSlot<P>>,
    ring: PendingRing,
}

/// State shared between the caller-facing API and the page-flip worker.
struct Shared<P: Presenter> {
    device: Arc<P::Device>,
    presenter: Mutex<P>,
    pool: Mutex<Pool<P>>,
    /// Permits equal the number of FREE images not yet claimed by an
    /// acquire in progress.
    free_images: Semaphore,
    /// Posted once per queued present, waited once per flip.
    page_flip: Semaphore,
    /// Posted exactly once, right before this swapchain's first presenter
    /// call; the ancestor's teardown waits on it.
    start_present: Semaphore,
    valid: AtomicBool,
    run: AtomicBool,
    ancestor: Mutex<Option<Weak<Shared<P>>>>,
    descendant: Mutex<Option<Weak<Shared<P>>>>,
    image_count: u32,
}

impl<P: Presenter> Shared<P> {
    fn wait_free_semaphore(&self, timeout_ns: u64) -> Result<()> {
        match timeout_ns {
            0 => {
                if self.free_images.try_wait() {
                    Ok(())
                } else {
                    Err(Error::NotReady)
                }
            }
            u64::MAX => {
                self.free_images.wait();
                Ok(())
            }
            ns => {
                if self.free_images.wait_timeout(Duration::from_nanos(ns)) {
                    Ok(())
                } else {
                    Err(Error::Timeout)
                }
            }
        }
    }

    /// Claims one free image, blocking up to `timeout_ns`. The platform
    /// gets a chance to produce a free buffer before we commit to
    /// waiting; it may shorten the remaining timeout.
    fn wait_for_free_buffer(&self, timeout_ns: u64) -> Result<()> {
        if self.free_images.try_wait() {
            return Ok(());
        }

        let mut timeout_ns = timeout_ns;
        self.presenter
            .lock()
            .expect("Poisoned mutex")
            .get_free_buffer(&mut timeout_ns)?;

        self.wait_free_semaphore(timeout_ns)
    }

    /// Takes image `index` off the display books: it becomes FREE again,
    /// or is destroyed outright when this swapchain has been deprecated
    /// and can never display it again. Wakes one waiting acquirer.
    fn unpresent_image(&self, index: u32) {
        let deprecated = self
            .descendant
            .lock()
            .expect("Poisoned mutex")
            .is_some();

        if deprecated {
            self.destroy_image(index);
        } else {
            let mut pool = self.pool.lock().expect("Poisoned mutex");
            pool.images[index as usize].state = ImageState::Free;
        }

        self.free_images.post();
    }

    /// Releases slot `index`'s backing resources through the presenter
    /// and marks the slot INVALID.
    fn destroy_image(&self, index: u32) {
        let image = {
            let mut pool = self.pool.lock().expect("Poisoned mutex");
            let slot = &mut pool.images[index as usize];
            slot.state = ImageState::Invalid;
            slot.fence = None;
            slot.image.take()
        };

        if let Some(image) = image {
            self.presenter
                .lock()
                .expect("Poisoned mutex")
                .destroy_image(&self.device, index, image);
        }
    }

    fn descendant_started_presenting(&self) -> bool {
        let descendant = self.descendant.lock().expect("Poisoned mutex").clone();
        match descendant.and_then(|weak| weak.upgrade()) {
            Some(descendant) => {
                let pool = descendant.pool.lock().expect("Poisoned mutex");
                pool.images
                    .iter()
                    .any(|slot| matches!(slot.state, ImageState::Presented | ImageState::Pending))
            }
            None => false,
        }
    }

    /// Marks this swapchain as superseded by `descendant` and destroys
    /// every image that is currently FREE, since those can never be
    /// displayed again.
    fn deprecate(&self, descendant: Weak<Shared<P>>) {
        let free: Vec<u32> = {
            let pool = self.pool.lock().expect("Poisoned mutex");
            pool.images
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.state == ImageState::Free)
                .map(|(index, _)| index as u32)
                .collect()
        };
        for index in free {
            self.destroy_image(index);
        }

        *self.descendant.lock().expect("Poisoned mutex") = Some(descendant);
    }

    /// Blocks until every outstanding present has page-flipped. Once that
    /// holds, the images are in ACQUIRED (the application never queued
    /// them back), FREE, and exactly one PRESENTED.
    fn wait_for_pending_buffers(&self) {
        let acquired = {
            let pool = self.pool.lock().expect("Poisoned mutex");
            pool.images
                .iter()
                .filter(|slot| slot.state == ImageState::Acquired)
                .count()
        };

        let mut wait = self.image_count as i64 - acquired as i64 - 1;
        while wait > 0 {
            let _ = self.wait_for_free_buffer(u64::MAX);
            wait -= 1;
        }
    }

    /// Flips image `index` onto the display and releases whatever it
    /// displaced. Both transitions happen under one lock so there is
    /// never a moment with two PRESENTED images.
    fn present(&self, index: u32) {
        let outcome = self
            .presenter
            .lock()
            .expect("Poisoned mutex")
            .present_image(index);

        match outcome {
            Ok(displaced) => {
                let displaced = displaced.filter(|previous| *previous != index);
                let deprecated =
                    displaced.is_some() && self.descendant.lock().expect("Poisoned mutex").is_some();

                let reclaimed = {
                    let mut pool = self.pool.lock().expect("Poisoned mutex");
                    let slot = &mut pool.images[index as usize];
                    assert_eq!(slot.state, ImageState::Pending);
                    slot.state = ImageState::Presented;

                    displaced.and_then(|previous| {
                        let slot = &mut pool.images[previous as usize];
                        if deprecated {
                            slot.state = ImageState::Invalid;
                            slot.fence = None;
                            slot.image.take()
                        } else {
                            slot.state = ImageState::Free;
                            None
                        }
                    })
                };

                if let Some(previous) = displaced {
                    if let Some(image) = reclaimed {
                        self.presenter
                            .lock()
                            .expect("Poisoned mutex")
                            .destroy_image(&self.device, previous, image);
                    }
                    self.free_images.post();
                }
            }
            Err(e) => {
                error!("presenting image {index} failed: {e}");
                self.valid.store(false, Ordering::SeqCst);
                self.free_images.post();
            }
        }
    }
}

/// The per-swapchain page-flip worker.
///
/// Runs for the lifetime of the swapchain and simply drives queued images
/// through the presenter. Three cases are covered:
///
/// 1. On the first present, if the swapchain has an ancestor, its
///    outstanding presents must drain before we take over the display.
/// 2. The normal case: flip the oldest PENDING image onto the display and
///    release the image it displaces.
/// 3. A dequeued image marked FREE means the descendant has started
///    presenting; release the image and move on.
struct Worker<P: Presenter> {
    shared: Arc<Shared<P>>,
}

impl<P: Presenter> Worker<P> {
    fn run(self) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("page flip".into())
            .spawn(move || self.work())
    }

    fn work(self) {
        let sc = &*self.shared;
        let mut first_present = true;

        loop {
            // Signalled once per queued present, and once more at
            // teardown after the run flag is cleared.
            sc.page_flip.wait();
            if !sc.run.load(Ordering::SeqCst) {
                break;
            }

            // Oldest queued image first.
            let (pending_index, fence) = {
                let mut pool = sc.pool.lock().expect("Poisoned mutex");
                let index = pool.ring.pop();
                let fence = pool.images[index as usize]
                    .fence
                    .clone()
                    .expect("pending image has no fence");
                (index, fence)
            };

            // The image may still be rendering; its fence signals
            // completion.
            if let Err(e) = sc.device.wait_for_fence(&fence) {
                error!("presentation fence wait failed: {e}");
                sc.valid.store(false, Ordering::SeqCst);
                sc.free_images.post();
                continue;
            }

            // Case 3: queue_present marked the image FREE because the
            // descendant took over; reclaim it.
            let state = sc.pool.lock().expect("Poisoned mutex").images[pending_index as usize].state;
            if state == ImageState::Free {
                sc.destroy_image(pending_index);
                sc.free_images.post();
                continue;
            }

            if first_present {
                let ancestor = sc.ancestor.lock().expect("Poisoned mutex").clone();
                if let Some(ancestor) = ancestor.and_then(|weak| weak.upgrade()) {
                    ancestor.wait_for_pending_buffers();
                }

                sc.start_present.post();
                sc.present(pending_index);
                first_present = false;
            } else {
                sc.present(pending_index);
            }
        }
        debug!("page flip worker exiting");
    }
}

/// A swapchain: the image pool, its state machine, and the worker that
/// page-flips queued images onto the display.
pub struct Swapchain<P: Presenter> {
    shared: Arc<Shared<P>>,
    queue: DeviceQueue<P>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<P: Presenter> Swapchain<P> {
    /// Brings up a swapchain for `create_info`.
    ///
    /// Only the FIFO present modes are supported. When `old_swapchain` is
    /// given, the new swapchain becomes its descendant: the old one's
    /// free images are released immediately and its remaining images as
    /// soon as this one starts presenting.
    pub fn new(
        device: Arc<P::Device>,
        mut presenter: P,
        create_info: &SwapchainCreateInfo,
        old_swapchain: Option<&Swapchain<P>>,
    ) -> Result<Swapchain<P>> {
        if !matches!(
            create_info.present_mode,
            PresentMode::Fifo | PresentMode::FifoRelaxed
        ) {
            return Err(Error::InitializationFailed);
        }

        let image_count = create_info.min_image_count;

        presenter.init_platform(&device, create_info)?;

        let desc = ImageCreateDesc::for_swapchain(create_info);
        let mut images: Vec<ImageSlot<P>> = (0..image_count)
            .map(|_| ImageSlot {
                image: None,
                fence: None,
                state: ImageState::Invalid,
            })
            .collect();

        for index in 0..image_count {
            match presenter.create_image(&device, index, &desc) {
                Ok((image, fence)) => {
                    let slot = &mut images[index as usize];
                    slot.image = Some(image);
                    slot.fence = Some(Arc::new(fence));
                    slot.state = ImageState::Free;
                }
                Err(e) => {
                    for (created, slot) in images.iter_mut().enumerate() {
                        if let Some(image) = slot.image.take() {
                            presenter.destroy_image(&device, created as u32, image);
                        }
                    }
                    return Err(e);
                }
            }
        }

        let queue = device.get_queue(0, 0)?;
        device.tag_queue(&queue)?;

        let shared = Arc::new(Shared {
            device,
            presenter: Mutex::new(presenter),
            pool: Mutex::new(Pool {
                images,
                ring: PendingRing::new(image_count as usize),
            }),
            free_images: Semaphore::new(image_count as usize),
            page_flip: Semaphore::new(0),
            start_present: Semaphore::new(0),
            valid: AtomicBool::new(false),
            run: AtomicBool::new(true),
            ancestor: Mutex::new(None),
            descendant: Mutex::new(None),
            image_count,
        });

        // Spawned only now that every member the worker reads is in
        // place.
        let worker = match (Worker {
            shared: shared.clone(),
        })
        .run()
        {
            Ok(handle) => handle,
            Err(e) => {
                error!("failed to spawn page flip worker: {e}");
                for index in 0..image_count {
                    shared.destroy_image(index);
                }
                return Err(Error::OutOfHostMemory);
            }
        };

        // Linking up with the old swapchain releases its free images,
        // which matters on platforms with limited display memory. This
        // must come last, once the rest of the swapchain is usable.
        if let Some(old) = old_swapchain {
            *shared.ancestor.lock().expect("Poisoned mutex") =
                Some(Arc::downgrade(&old.shared));
            old.shared.deprecate(Arc::downgrade(&shared));
        }

        shared.valid.store(true, Ordering::SeqCst);

        Ok(Swapchain {
            shared,
            queue,
            worker: Some(worker),
        })
    }

    /// Number of images in the swapchain.
    pub fn image_count(&self) -> u32 {
        self.shared.image_count
    }

    /// Acquires a free image, blocking up to `timeout_ns` (0 polls,
    /// `u64::MAX` waits forever). On success the returned index is
    /// ACQUIRED and owned by the caller until queued back for present.
    ///
    /// When a semaphore or fence is supplied, a signalling-only batch is
    /// submitted to the presentation queue so the caller gets the usual
    /// acquire-complete signal.
    pub fn acquire_next_image(
        &self,
        timeout_ns: u64,
        semaphore: Option<&DeviceSemaphore<P>>,
        fence: Option<&DeviceFence<P>>,
    ) -> Result<u32> {
        self.shared.wait_for_free_buffer(timeout_ns)?;

        if !self.shared.valid.load(Ordering::SeqCst) {
            return Err(Error::OutOfHostMemory);
        }

        let index = {
            let mut pool = self.shared.pool.lock().expect("Poisoned mutex");
            let index = pool
                .images
                .iter()
                .position(|slot| slot.state == ImageState::Free)
                .expect("free-image semaphore out of sync with image states");
            pool.images[index].state = ImageState::Acquired;
            index as u32
        };

        if semaphore.is_some() || fence.is_some() {
            self.shared
                .device
                .submit(&self.queue, &[], semaphore, fence)?;
        }

        Ok(index)
    }

    /// Queues ACQUIRED image `image_index` for presentation after the
    /// renders waiting on `wait_semaphores` complete.
    ///
    /// Returns [`Error::OutOfDate`] when a replacement swapchain has
    /// already taken over the display; the image is reclaimed instead of
    /// presented, and the caller should move to the replacement.
    pub fn queue_present(
        &self,
        queue: &DeviceQueue<P>,
        wait_semaphores: &[DeviceSemaphore<P>],
        image_index: u32,
    ) -> Result<()> {
        let shared = &self.shared;
        let descendant_took_over = shared.descendant_started_presenting();

        let fence = {
            let pool = shared.pool.lock().expect("Poisoned mutex");
            let slot = &pool.images[image_index as usize];
            assert_eq!(slot.state, ImageState::Acquired);
            slot.fence.clone().expect("acquired image has no fence")
        };

        shared.device.reset_fence(&fence)?;

        // The incoming semaphores are signalled once rendering is done;
        // the fence translates that into something the page-flip worker
        // can wait on. Waiting at the bottom of the pipe keeps future
        // queue work unblocked.
        shared
            .device
            .submit(queue, wait_semaphores, None, Some(&*fence))?;

        // The ring slot must be filled in before the worker is
        // signalled.
        {
            let mut pool = shared.pool.lock().expect("Poisoned mutex");
            pool.images[image_index as usize].state = if descendant_took_over {
                // Let the worker reclaim it rather than blocking here.
                ImageState::Free
            } else {
                ImageState::Pending
            };
            pool.ring.push(image_index);
        }
        shared.page_flip.post();

        if descendant_took_over {
            Err(Error::OutOfDate)
        } else {
            Ok(())
        }
    }

    /// Reports the swapchain's image handles.
    ///
    /// With `images` absent only `count` is written. Otherwise up to
    /// `count` handles are copied into `images`, `count` receives the
    /// number copied, and [`Error::Incomplete`] is reported when that is
    /// fewer than the swapchain holds. Slots whose image was already
    /// released yield `None`.
    pub fn get_swapchain_images(
        &self,
        count: &mut u32,
        images: Option<&mut [Option<DeviceImage<P>>]>,
    ) -> Result<()> {
        let out = match images {
            None => {
                *count = self.shared.image_count;
                return Ok(());
            }
            Some(out) => out,
        };

        assert!(self.shared.image_count > 0);
        assert!(*count > 0);

        let pool = self.shared.pool.lock().expect("Poisoned mutex");
        let copied = (*count)
            .min(out.len() as u32)
            .min(self.shared.image_count);
        for index in 0..copied as usize {
            out[index] = pool.images[index].image.clone();
        }
        *count = copied;

        if copied < self.shared.image_count {
            Err(Error::Incomplete)
        } else {
            Ok(())
        }
    }

    /// Releases the image the display stopped reading. Back-ends that
    /// learn about displacement asynchronously call this instead of
    /// returning the displaced index from `present_image`.
    pub fn unpresent_image(&self, index: u32) {
        self.shared.unpresent_image(index);
    }

    /// Marks this swapchain as superseded by `descendant`. Called on the
    /// old swapchain when a new one is created over the same surface.
    pub fn deprecate(&self, descendant: &Swapchain<P>) {
        self.shared.deprecate(Arc::downgrade(&descendant.shared));
    }

    /// Drops the link to the swapchain this one replaced.
    pub fn clear_ancestor(&self) {
        *self.shared.ancestor.lock().expect("Poisoned mutex") = None;
    }

    /// Drops the link to the swapchain that replaced this one.
    pub fn clear_descendant(&self) {
        *self.shared.descendant.lock().expect("Poisoned mutex") = None;
    }

    /// Blocks until every queued present has page-flipped.
    pub fn wait_for_pending_buffers(&self) {
        self.shared.wait_for_pending_buffers();
    }

    /// Claims one free image, blocking up to `timeout_ns`.
    pub fn wait_for_free_buffer(&self, timeout_ns: u64) -> Result<()> {
        self.shared.wait_for_free_buffer(timeout_ns)
    }

    /// Tears the swapchain down, blocking until every resource can be
    /// released safely. FREE and ACQUIRED images can go immediately; a
    /// PRESENTED image only once the display side is done with it, which
    /// is what the drain (or the descendant's first-present handshake)
    /// guarantees. Runs at most once; `Drop` calls it too.
    pub fn teardown(&mut self) {
        if self.worker.is_none() {
            return;
        }
        let shared = &self.shared;

        // If the replacement already took over the display there are no
        // pending buffers here, but its worker may still be waiting on
        // our images; hold off until it has started presenting.
        let descendant = shared
            .descendant
            .lock()
            .expect("Poisoned mutex")
            .clone()
            .and_then(|weak| weak.upgrade());
        match descendant {
            Some(descendant)
                if descendant
                    .pool
                    .lock()
                    .expect("Poisoned mutex")
                    .images
                    .iter()
                    .any(|slot| {
                        matches!(slot.state, ImageState::Presented | ImageState::Pending)
                    }) =>
            {
                descendant.start_present.wait();
            }
            _ => shared.wait_for_pending_buffers(),
        }

        // Drain the device so the fences are safe to destroy.
        if let Err(e) = shared.device.queue_wait_idle(&self.queue) {
            warn!("queue drain during teardown failed: {e}");
        }

        // The worker may still hold references to fences and images;
        // stop it before anything is destroyed.
        shared.run.store(false, Ordering::SeqCst);
        shared.page_flip.post();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("page flip worker panicked");
            }
        }

        // Break the coordination links on both sides. Each lock is
        // released before the peer's is taken.
        let descendant = shared.descendant.lock().expect("Poisoned mutex").take();
        if let Some(descendant) = descendant.and_then(|weak| weak.upgrade()) {
            *descendant.ancestor.lock().expect("Poisoned mutex") = None;
        }
        let ancestor = shared.ancestor.lock().expect("Poisoned mutex").take();
        if let Some(ancestor) = ancestor.and_then(|weak| weak.upgrade()) {
            *ancestor.descendant.lock().expect("Poisoned mutex") = None;
        }

        for index in 0..shared.image_count {
            shared.destroy_image(index);
        }
    }
}

impl<P: Presenter> Drop for Swapchain<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::presenter::{Extent2d, SharingMode};
    use crate::test_utils::{FakeDevice, FakePresenter, PresenterState};

    fn create_info(image_count: u32, present_mode: PresentMode) -> SwapchainCreateInfo {
        SwapchainCreateInfo {
            min_image_count: image_count,
            image_format: 0,
            image_extent: Extent2d {
                width: 640,
                height: 480,
            },
            image_array_layers: 1,
            image_usage: 0,
            image_sharing_mode: SharingMode::Exclusive,
            queue_family_indices: vec![0],
            present_mode,
        }
    }

    fn make_swapchain(
        image_count: u32,
    ) -> (Swapchain<FakePresenter>, Arc<PresenterState>, Arc<FakeDevice>) {
        let device = Arc::new(FakeDevice::new());
        let (presenter, state) = FakePresenter::new();
        let swapchain = Swapchain::new(
            device.clone(),
            presenter,
            &create_info(image_count, PresentMode::Fifo),
            None,
        )
        .unwrap();
        (swapchain, state, device)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn state_counts<P: Presenter>(swapchain: &Swapchain<P>) -> (usize, usize, usize, usize) {
        let pool = swapchain.shared.pool.lock().unwrap();
        let count = |wanted: ImageState| pool.images.iter().filter(|s| s.state == wanted).count();
        (
            count(ImageState::Free),
            count(ImageState::Acquired),
            count(ImageState::Pending),
            count(ImageState::Presented),
        )
    }

    #[test]
    fn rejects_non_fifo_present_modes() {
        let device = Arc::new(FakeDevice::new());
        for mode in [PresentMode::Immediate, PresentMode::Mailbox] {
            let (presenter, _) = FakePresenter::new();
            let err = Swapchain::new(device.clone(), presenter, &create_info(3, mode), None)
                .err()
                .unwrap();
            assert_eq!(err, Error::InitializationFailed);
        }
    }

    #[test]
    fn basic_present_cycle() {
        let (swapchain, state, _) = make_swapchain(3);
        assert_eq!(state.init_platform_calls(), 1);

        for cycle in 0..4u32 {
            let index = swapchain.acquire_next_image(u64::MAX, None, None).unwrap();
            swapchain
                .queue_present(&Default::default(), &[], index)
                .unwrap();
            wait_until(|| state.presents().len() == cycle as usize + 1);
        }

        wait_until(|| state_counts(&swapchain) == (2, 0, 0, 1));
        assert_eq!(state.presents().len(), 4);
    }

    #[test]
    fn ring_preserves_submission_order() {
        let (swapchain, state, _) = make_swapchain(3);

        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(swapchain.acquire_next_image(u64::MAX, None, None).unwrap());
        }
        for &index in &order {
            swapchain
                .queue_present(&Default::default(), &[], index)
                .unwrap();
        }

        wait_until(|| state.presents().len() == 3);
        assert_eq!(state.presents(), order);
    }

    #[test]
    fn exactly_one_presented_after_first_flip() {
        let (swapchain, state, _) = make_swapchain(3);

        for cycle in 0..6u32 {
            let index = swapchain.acquire_next_image(u64::MAX, None, None).unwrap();
            swapchain
                .queue_present(&Default::default(), &[], index)
                .unwrap();
            wait_until(|| state.presents().len() == cycle as usize + 1);
            wait_until(|| state_counts(&swapchain).3 == 1);
        }
    }

    #[test]
    fn acquire_respects_timeouts() {
        let (swapchain, _, _) = make_swapchain(2);

        swapchain.acquire_next_image(u64::MAX, None, None).unwrap();
        swapchain.acquire_next_image(u64::MAX, None, None).unwrap();

        assert_eq!(
            swapchain.acquire_next_image(0, None, None).unwrap_err(),
            Error::NotReady
        );
        assert_eq!(
            swapchain
                .acquire_next_image(5_000_000, None, None)
                .unwrap_err(),
            Error::Timeout
        );
    }

    #[test]
    fn acquire_signals_caller_primitives() {
        let (swapchain, _, device) = make_swapchain(2);

        let semaphore = device.make_semaphore();
        let fence = device.make_fence();
        swapchain
            .acquire_next_image(u64::MAX, Some(&semaphore), Some(&fence))
            .unwrap();
        assert!(semaphore.is_signalled());
        assert!(fence.is_signalled());
    }

    #[test]
    fn get_swapchain_images_reports_and_copies() {
        let (swapchain, _, _) = make_swapchain(3);

        let mut count = 0;
        swapchain.get_swapchain_images(&mut count, None).unwrap();
        assert_eq!(count, 3);

        let mut handles = vec![None; 3];
        let mut count = 3;
        swapchain
            .get_swapchain_images(&mut count, Some(&mut handles[..]))
            .unwrap();
        assert_eq!(count, 3);
        assert!(handles.iter().all(|h| h.is_some()));

        let mut short = vec![None; 2];
        let mut count = 2;
        assert_eq!(
            swapchain
                .get_swapchain_images(&mut count, Some(&mut short[..]))
                .unwrap_err(),
            Error::Incomplete
        );
        assert_eq!(count, 2);
    }

    #[test]
    fn recreate_handoff() {
        let device = Arc::new(FakeDevice::new());
        let (presenter_a, state_a) = FakePresenter::new();
        let swapchain_a = Swapchain::new(
            device.clone(),
            presenter_a,
            &create_info(3, PresentMode::Fifo),
            None,
        )
        .unwrap();

        let index = swapchain_a.acquire_next_image(u64::MAX, None, None).unwrap();
        swapchain_a
            .queue_present(&Default::default(), &[], index)
            .unwrap();
        wait_until(|| state_a.presents().len() == 1);

        let (presenter_b, state_b) = FakePresenter::new();
        let swapchain_b = Swapchain::new(
            device,
            presenter_b,
            &create_info(3, PresentMode::Fifo),
            Some(&swapchain_a),
        )
        .unwrap();

        // Deprecation released A's free images right away.
        wait_until(|| state_a.destroyed().len() == 2);
        assert!(swapchain_a.shared.descendant.lock().unwrap().is_some());
        assert!(swapchain_b.shared.ancestor.lock().unwrap().is_some());

        let index = swapchain_b.acquire_next_image(u64::MAX, None, None).unwrap();
        swapchain_b
            .queue_present(&Default::default(), &[], index)
            .unwrap();
        wait_until(|| state_b.presents().len() == 1);

        // B's worker drained A and announced its own start before
        // flipping.
        drop(swapchain_a);
        drop(swapchain_b);
    }

    #[test]
    fn deprecated_present_surfaces_out_of_date() {
        let device = Arc::new(FakeDevice::new());
        let (presenter_a, state_a) = FakePresenter::new();
        let swapchain_a = Swapchain::new(
            device.clone(),
            presenter_a,
            &create_info(3, PresentMode::Fifo),
            None,
        )
        .unwrap();

        let first = swapchain_a.acquire_next_image(u64::MAX, None, None).unwrap();
        swapchain_a
            .queue_present(&Default::default(), &[], first)
            .unwrap();
        wait_until(|| state_a.presents().len() == 1);

        // Acquired before the replacement exists, presented after it took
        // over.
        let stale = swapchain_a.acquire_next_image(u64::MAX, None, None).unwrap();

        let (presenter_b, state_b) = FakePresenter::new();
        let swapchain_b = Swapchain::new(
            device,
            presenter_b,
            &create_info(3, PresentMode::Fifo),
            Some(&swapchain_a),
        )
        .unwrap();

        let index = swapchain_b.acquire_next_image(u64::MAX, None, None).unwrap();
        swapchain_b
            .queue_present(&Default::default(), &[], index)
            .unwrap();
        wait_until(|| state_b.presents().len() == 1);

        let err = swapchain_a
            .queue_present(&Default::default(), &[], stale)
            .unwrap_err();
        assert_eq!(err, Error::OutOfDate);

        // The worker reclaims the image rather than presenting it.
        wait_until(|| state_a.destroyed().contains(&stale));
        assert_eq!(state_a.presents().len(), 1);
        wait_until(|| swapchain_a.wait_for_free_buffer(0).is_ok());

        // Retire the deprecated swapchain before its replacement.
        drop(swapchain_a);
        drop(swapchain_b);
    }

    #[test]
    fn teardown_with_unpresented_acquire() {
        let (mut swapchain, state, _) = make_swapchain(3);

        swapchain.acquire_next_image(u64::MAX, None, None).unwrap();
        swapchain.teardown();

        assert_eq!(state.destroyed().len(), 3);
        assert!(swapchain.worker.is_none());
    }

    #[test]
    fn fence_failure_invalidates_swapchain() {
        let (swapchain, _, device) = make_swapchain(3);

        device.fail_fence_waits.store(true, std::sync::atomic::Ordering::SeqCst);
        let index = swapchain.acquire_next_image(u64::MAX, None, None).unwrap();
        swapchain
            .queue_present(&Default::default(), &[], index)
            .unwrap();

        wait_until(|| !swapchain.shared.valid.load(Ordering::SeqCst));
        assert_eq!(
            swapchain
                .acquire_next_image(u64::MAX, None, None)
                .unwrap_err(),
            Error::OutOfHostMemory
        );

        // The worker never got past the fence; nothing was presented.
        assert!(state_counts(&swapchain).3 == 0);
        device.fail_fence_waits.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}
