// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

mod shared;

pub use shared::SharedMem;

use crate::dispatch::{ConceptGridSync, Implements};
use crate::grid::{Barrier, GridSyncBarrier};
use crate::workdiv::{DimVec, WorkDiv};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// What a kernel body sees of its launch: where it runs and how large the launch is.
pub trait Acc<const D: usize> {
	fn work_div(&self) -> &WorkDiv<D>;

	fn grid_block_idx(&self) -> DimVec<D>;

	fn block_thread_idx(&self) -> DimVec<D>;

	/// Dynamic shared memory of the calling thread's block.
	fn block_shared_mem(&self) -> &SharedMem;

	fn grid_block_extent(&self) -> DimVec<D> {
		self.work_div().grid_block_extent()
	}

	fn block_thread_extent(&self) -> DimVec<D> {
		self.work_div().block_thread_extent()
	}

	fn thread_elem_extent(&self) -> DimVec<D> {
		self.work_div().thread_elem_extent()
	}

	fn grid_thread_extent(&self) -> DimVec<D> {
		self.work_div().grid_thread_extent()
	}

	fn grid_thread_idx(&self) -> DimVec<D> {
		self.grid_block_idx() * self.block_thread_extent() + self.block_thread_idx()
	}

	fn grid_thread_linear_idx(&self) -> usize {
		DimVec::map_idx_to_linear(self.grid_thread_idx(), self.grid_thread_extent())
	}

	fn block_thread_linear_idx(&self) -> usize {
		DimVec::map_idx_to_linear(self.block_thread_idx(), self.block_thread_extent())
	}

	fn grid_thread_count(&self) -> usize {
		self.work_div().grid_thread_count()
	}
}

/// Context of one logical thread on a CPU back-end `B`.
///
/// `S` is the grid sync handle. Only a [`GridSyncBarrier`] gives the context the grid
/// sync capability.
pub struct AccCpu<B, const D: usize, S> {
	work_div: WorkDiv<D>,
	grid_block_idx: DimVec<D>,
	block_thread_idx: DimVec<D>,
	shared: Arc<SharedMem>,
	grid_sync: S,
	_backend: PhantomData<fn() -> B>,
}

impl<B, const D: usize, S> AccCpu<B, D, S> {
	pub(crate) fn new(
		work_div: WorkDiv<D>,
		grid_block_idx: DimVec<D>,
		block_thread_idx: DimVec<D>,
		shared: Arc<SharedMem>,
		grid_sync: S,
	) -> Self {
		Self {
			work_div,
			grid_block_idx,
			block_thread_idx,
			shared,
			grid_sync,
			_backend: PhantomData,
		}
	}
}

impl<B, const D: usize, S> Acc<D> for AccCpu<B, D, S> {
	fn work_div(&self) -> &WorkDiv<D> {
		&self.work_div
	}

	fn grid_block_idx(&self) -> DimVec<D> {
		self.grid_block_idx
	}

	fn block_thread_idx(&self) -> DimVec<D> {
		self.block_thread_idx
	}

	fn block_shared_mem(&self) -> &SharedMem {
		&self.shared
	}
}

impl<B, const D: usize, Bar: Barrier> Implements<ConceptGridSync> for AccCpu<B, D, GridSyncBarrier<Bar>> {
	type Impl = GridSyncBarrier<Bar>;

	fn interface(&self) -> &GridSyncBarrier<Bar> {
		&self.grid_sync
	}
}

impl<B, const D: usize, S> fmt::Debug for AccCpu<B, D, S> {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		f.debug_struct("AccCpu")
			.field("backend", &std::any::type_name::<B>())
			.field("work_div", &self.work_div)
			.field("grid_block_idx", &self.grid_block_idx)
			.field("block_thread_idx", &self.block_thread_idx)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dispatch::CooperativeAcc;
	use crate::grid::{BarrierTuning, BlockingBarrier, NoGridSync};

	struct Host;

	fn acc(
		block: [usize; 2],
		thread: [usize; 2],
	) -> AccCpu<Host, 2, NoGridSync> {
		AccCpu::new(
			WorkDiv::<2>::new([2, 3], [4, 5], [1, 1]),
			DimVec::new(block),
			DimVec::new(thread),
			Arc::new(SharedMem::with_bytes(0)),
			NoGridSync,
		)
	}

	#[test]
	fn test_grid_thread_idx() {
		let a = acc([1, 2], [3, 4]);
		assert_eq!(a.grid_thread_idx(), DimVec::new([7, 14]));
		assert_eq!(a.grid_thread_extent(), DimVec::new([8, 15]));
		assert_eq!(a.grid_thread_linear_idx(), 7 * 15 + 14);
		assert_eq!(a.block_thread_linear_idx(), 3 * 5 + 4);
		assert_eq!(a.grid_thread_count(), 120);
	}

	fn assert_cooperative<A: CooperativeAcc>(_: &A) {}

	#[test]
	fn test_barrier_handle_grants_grid_sync() {
		let a: AccCpu<Host, 1, _> = AccCpu::new(
			WorkDiv::<1>::new(1, 1, 1),
			DimVec::zeros(),
			DimVec::zeros(),
			Arc::new(SharedMem::with_bytes(0)),
			GridSyncBarrier::<BlockingBarrier>::new(1, &BarrierTuning::default()),
		);
		assert_cooperative(&a);
		a.sync_grid_threads();
		assert_eq!(a.interface().barrier().generation(), 1);
	}
}
