// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Small synchronization helpers shared across the workspace.

pub mod semaphore;

pub use semaphore::Semaphore;
