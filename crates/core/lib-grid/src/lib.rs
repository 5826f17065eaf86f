// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

//! Grid-wide cooperative synchronization and kernel dispatch.
//!
//! A kernel is written once, generically over the accelerator context it runs in, and
//! launched on any enabled back-end with a [`WorkDiv`]. Cooperative tasks may call
//! [`sync_grid_threads`] to rendezvous every thread of the launch; enqueueing one fails
//! with [`GridError::CapacityExceeded`] when the back-end cannot keep the whole grid
//! resident.
//!
//! ```
//! use lib_grid::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Opposite;
//!
//! impl<A: Acc<1> + CooperativeAcc> Kernel<A, Vec<AtomicUsize>> for Opposite {
//! 	fn run(&self, acc: &A, slots: &Vec<AtomicUsize>) {
//! 		let idx = acc.grid_thread_linear_idx();
//! 		slots[idx].store(idx, Ordering::Relaxed);
//! 		sync_grid_threads(acc);
//! 		let opposite = slots[slots.len() - 1 - idx].load(Ordering::Relaxed);
//! 		assert_eq!(idx + opposite, slots.len() - 1);
//! 	}
//! }
//!
//! let dev = CpuThreads::<BlockingBarrier>::dev_by_idx(&RuntimeConfig::default(), 0)?;
//! let queue = Queue::<CpuThreads, Blocking>::new(dev)?;
//! let slots: Vec<AtomicUsize> = (0..8).map(|_| AtomicUsize::new(0)).collect();
//! let task = create_task_cooperative_kernel(WorkDiv::<1>::new(4, 2, 1), Opposite, slots);
//! enqueue(&queue, task)?;
//! # Ok::<(), GridError>(())
//! ```

mod acc;
mod backend;
mod config;
mod dev;
mod dispatch;
pub mod error;
mod grid;
mod kernel;
mod queue;
mod workdiv;

pub use acc::*;
pub use backend::*;
pub use config::*;
pub use dev::*;
pub use dispatch::*;
pub use error::GridError;
pub use grid::*;
pub use kernel::*;
pub use queue::*;
pub use workdiv::*;
