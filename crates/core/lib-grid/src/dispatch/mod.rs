// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

//! Compile-time capability dispatch.
//!
//! An accelerator context states which member implements a capability through
//! [`Implements`]. Kernels ask for capabilities through trait bounds, so a kernel that
//! needs grid synchronization does not compile against a context that lacks it.
//!
//! ```compile_fail
//! use lib_grid::*;
//!
//! // Serial contexts never carry a grid barrier.
//! fn body(acc: &AccCpu<CpuSerial, 1, NoGridSync>) {
//! 	sync_grid_threads(acc);
//! }
//! ```
//!
//! ```compile_fail
//! use lib_grid::*;
//!
//! struct Rendezvous;
//!
//! impl<A: Acc<1> + CooperativeAcc> Kernel<A, ()> for Rendezvous {
//! 	fn run(&self, acc: &A, _: &()) {
//! 		sync_grid_threads(acc);
//! 	}
//! }
//!
//! // Independent tasks hand out contexts without the grid sync capability.
//! let dev = CpuThreads::<BlockingBarrier>::dev_by_idx(&RuntimeConfig::default(), 0).unwrap();
//! let queue = Queue::<CpuThreads, Blocking>::new(dev).unwrap();
//! let task = create_task_kernel(WorkDiv::<1>::new(2, 1, 1), Rendezvous, ());
//! enqueue(&queue, task).unwrap();
//! ```
//!
//! ```compile_fail
//! use lib_grid::*;
//!
//! struct Nop;
//!
//! impl<A: Acc<1>> Kernel<A, ()> for Nop {
//! 	fn run(&self, _: &A, _: &()) {}
//! }
//!
//! // Serial back-ends cannot run cooperative tasks at all.
//! let dev = CpuSerial::dev_by_idx(&RuntimeConfig::default(), 0).unwrap();
//! let queue = Queue::<CpuSerial, Blocking>::new(dev).unwrap();
//! let task = create_task_cooperative_kernel(WorkDiv::<1>::new(2, 1, 1), Nop, ());
//! enqueue(&queue, task).unwrap();
//! ```
//!
//! Back-ends register their resident block query as the [`ConceptMaxActiveBlocks`] member.
//! The serial back-end registers none, so asking it does not compile either.
//!
//! ```compile_fail
//! use lib_grid::*;
//!
//! let dev = CpuSerial::dev_by_idx(&RuntimeConfig::default(), 0).unwrap();
//! get_max_active_blocks::<CpuSerial, _, _, 1>(&dev, &(), DimVec::from(1), DimVec::from(1), &()).unwrap();
//! ```

use crate::grid::{Barrier, BarrierTuning, GridSyncBarrier, NoGridSync};

mod private {
	pub trait Sealed {}
}

pub trait Concept: private::Sealed + 'static {
	const NAME: &'static str;
}

/// Grid-wide synchronization of all threads of a launch.
pub enum ConceptGridSync {}

/// Query of the resident block limit of a back-end.
pub enum ConceptMaxActiveBlocks {}

impl private::Sealed for ConceptGridSync {}
impl private::Sealed for ConceptMaxActiveBlocks {}

impl Concept for ConceptGridSync {
	const NAME: &'static str = "GridSync";
}

impl Concept for ConceptMaxActiveBlocks {
	const NAME: &'static str = "MaxActiveBlocks";
}

/// `Self` provides capability `C` through its member `Impl`.
pub trait Implements<C: Concept> {
	type Impl;

	fn interface(&self) -> &Self::Impl;
}

/// Looks up the member implementing `C`. Resolved entirely at compile time.
pub fn get_interface<C: Concept, T: Implements<C>>(t: &T) -> &T::Impl {
	t.interface()
}

/// Concrete grid synchronization object.
pub trait SyncGridThreads {
	fn sync_grid_threads(&self);
}

/// Context that can synchronize all threads of its launch.
pub trait CooperativeAcc {
	fn sync_grid_threads(&self);
}

impl<T> CooperativeAcc for T
where
	T: Implements<ConceptGridSync>,
	T::Impl: SyncGridThreads,
{
	fn sync_grid_threads(&self) {
		SyncGridThreads::sync_grid_threads(get_interface::<ConceptGridSync, T>(self));
	}
}

/// Blocks until every thread of the launch has called it. Safe to call repeatedly; each
/// call is one full rendezvous.
pub fn sync_grid_threads<A: CooperativeAcc>(acc: &A) {
	acc.sync_grid_threads();
}

/// Whether a task's threads may synchronize grid-wide. Fixed at task creation.
pub trait Cooperation: private::Sealed + Send + Sync + 'static {
	const IS_COOPERATIVE: bool;

	type GridSync<Bar: Barrier>: Clone + Send + Sync;

	fn grid_sync<Bar: Barrier>(
		grid_thread_count: usize,
		tuning: &BarrierTuning,
	) -> Self::GridSync<Bar>;
}

/// All blocks are resident together and may call [`sync_grid_threads`].
#[derive(Debug)]
pub enum Cooperative {}

/// Blocks are scheduled freely; grid synchronization is unavailable.
#[derive(Debug)]
pub enum Independent {}

impl private::Sealed for Cooperative {}
impl private::Sealed for Independent {}

impl Cooperation for Cooperative {
	const IS_COOPERATIVE: bool = true;

	type GridSync<Bar: Barrier> = GridSyncBarrier<Bar>;

	fn grid_sync<Bar: Barrier>(
		grid_thread_count: usize,
		tuning: &BarrierTuning,
	) -> GridSyncBarrier<Bar> {
		GridSyncBarrier::new(grid_thread_count, tuning)
	}
}

impl Cooperation for Independent {
	const IS_COOPERATIVE: bool = false;

	type GridSync<Bar: Barrier> = NoGridSync;

	fn grid_sync<Bar: Barrier>(
		_grid_thread_count: usize,
		_tuning: &BarrierTuning,
	) -> NoGridSync {
		NoGridSync
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::grid::BlockingBarrier;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Counting {
		calls: AtomicUsize,
	}

	impl SyncGridThreads for Counting {
		fn sync_grid_threads(&self) {
			self.calls.fetch_add(1, Ordering::Relaxed);
		}
	}

	struct Ctx {
		sync: Counting,
	}

	impl Implements<ConceptGridSync> for Ctx {
		type Impl = Counting;

		fn interface(&self) -> &Counting {
			&self.sync
		}
	}

	#[test]
	fn test_capability_resolves_to_member() {
		let ctx = Ctx {
			sync: Counting {
				calls: AtomicUsize::new(0),
			},
		};
		sync_grid_threads(&ctx);
		sync_grid_threads(&ctx);
		assert_eq!(ctx.sync.calls.load(Ordering::Relaxed), 2);
	}

	#[test]
	fn test_cooperation_flags() {
		assert!(Cooperative::IS_COOPERATIVE);
		assert!(!Independent::IS_COOPERATIVE);
		assert_eq!(ConceptGridSync::NAME, "GridSync");

		let handle = Cooperative::grid_sync::<BlockingBarrier>(1, &BarrierTuning::default());
		handle.sync_grid_threads();
		assert_eq!(handle.barrier().generation(), 1);
	}
}
