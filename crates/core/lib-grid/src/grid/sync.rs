// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use super::barrier::{Barrier, BarrierTuning};
use crate::dispatch::SyncGridThreads;
use std::fmt;
use std::sync::Arc;

/// Grid sync handle of one cooperative launch.
///
/// Cloning shares the barrier; every logical thread of the launch holds a clone of the
/// same handle and the barrier is dropped with the last one.
pub struct GridSyncBarrier<B: Barrier> {
	barrier: Arc<B>,
}

impl<B: Barrier> GridSyncBarrier<B> {
	pub fn new(
		grid_thread_count: usize,
		tuning: &BarrierTuning,
	) -> Self {
		Self {
			barrier: Arc::new(B::new(grid_thread_count, tuning)),
		}
	}

	pub fn barrier(&self) -> &B {
		&self.barrier
	}
}

impl<B: Barrier> Clone for GridSyncBarrier<B> {
	fn clone(&self) -> Self {
		Self {
			barrier: Arc::clone(&self.barrier),
		}
	}
}

impl<B: Barrier> fmt::Debug for GridSyncBarrier<B> {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		f.debug_struct("GridSyncBarrier")
			.field("thread_count", &self.barrier.thread_count())
			.field("generation", &self.barrier.generation())
			.finish()
	}
}

impl<B: Barrier> SyncGridThreads for GridSyncBarrier<B> {
	fn sync_grid_threads(&self) {
		self.barrier.wait();
	}
}

/// Handle carried by independent launches. Offers no grid-wide capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGridSync;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::grid::BlockingBarrier;

	#[test]
	fn test_clones_share_one_barrier() {
		let handle = GridSyncBarrier::<BlockingBarrier>::new(2, &BarrierTuning::default());
		let other = handle.clone();

		std::thread::scope(|s| {
			s.spawn(|| other.sync_grid_threads());
			handle.sync_grid_threads();
		});

		assert_eq!(handle.barrier().generation(), 1);
		assert!(Arc::ptr_eq(&handle.barrier, &other.barrier));
	}
}
