// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

#![cfg(all(feature = "cpu-serial", feature = "cpu-threads", feature = "cpu-blocks"))]

use lib_grid::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Each thread writes its index, synchronizes, then reads the slot of the thread at the
/// mirrored position.
struct HelloOpposite<const D: usize>;

struct Mirror {
	written: Vec<AtomicUsize>,
	observed: Vec<AtomicUsize>,
}

impl Mirror {
	fn new(len: usize) -> Arc<Self> {
		Arc::new(Self {
			written: (0..len).map(|_| AtomicUsize::new(usize::MAX)).collect(),
			observed: (0..len).map(|_| AtomicUsize::new(usize::MAX)).collect(),
		})
	}

	fn assert_mirrored(&self) {
		let len = self.written.len();
		for idx in 0..len {
			assert_eq!(self.written[idx].load(Ordering::Relaxed), idx);
			let opposite = self.observed[idx].load(Ordering::Relaxed);
			assert_eq!(
				idx + opposite,
				len - 1,
				"thread {} read {} from the mirrored slot",
				idx,
				opposite
			);
		}
	}
}

impl<A, const D: usize> Kernel<A, Arc<Mirror>> for HelloOpposite<D>
where
	A: Acc<D> + CooperativeAcc,
{
	fn run(
		&self,
		acc: &A,
		mirror: &Arc<Mirror>,
	) {
		let idx = acc.grid_thread_linear_idx();
		let len = acc.grid_thread_count();
		mirror.written[idx].store(idx, Ordering::Relaxed);
		sync_grid_threads(acc);
		let opposite = mirror.written[len - 1 - idx].load(Ordering::Relaxed);
		mirror.observed[idx].store(opposite, Ordering::Relaxed);
	}
}

fn run_on_threads<const D: usize>(work_div: WorkDiv<D>) -> Arc<Mirror> {
	let dev = CpuThreads::<BlockingBarrier>::dev_by_idx(&RuntimeConfig::default(), 0).unwrap();
	let queue = Queue::<CpuThreads, Blocking>::new(dev).unwrap();
	let mirror = Mirror::new(work_div.grid_thread_count());

	let task = create_task_cooperative_kernel(work_div, HelloOpposite::<D>, Arc::clone(&mirror));
	enqueue(&queue, task).unwrap();
	mirror
}

#[test]
fn test_opposite_index_on_thread_grids() {
	for extent in [1usize, 2, 100] {
		run_on_threads(WorkDiv::<1>::new(extent, 1, 1)).assert_mirrored();
	}
	run_on_threads(WorkDiv::<1>::new(100, 10, 1)).assert_mirrored();
}

#[test]
fn test_two_hundred_single_thread_blocks() {
	let mirror = run_on_threads(WorkDiv::<1>::new(200, 1, 1));
	for idx in 0..200 {
		assert_eq!(mirror.observed[idx].load(Ordering::Relaxed), 199 - idx);
	}
}

#[test]
fn test_opposite_index_on_multidimensional_grid() {
	run_on_threads(WorkDiv::<2>::new([2, 3], [2, 2], [1, 1])).assert_mirrored();
	run_on_threads(WorkDiv::<3>::new([2, 1, 2], [1, 3, 1], [1, 1, 1])).assert_mirrored();
}

fn run_on_blocks<Bar: Barrier>(
	blocks: usize,
	pool_threads: usize,
) -> Arc<Mirror> {
	let config = RuntimeConfig::builder()
		.with_pool_threads(pool_threads)
		.with_poll_interval_us(10);
	let dev = CpuBlocks::<Bar>::dev_by_idx(&config, 0).unwrap();
	let queue = Queue::<CpuBlocks<Bar>, Blocking>::new(dev).unwrap();

	let mirror = Mirror::new(blocks);
	let task = create_task_cooperative_kernel(
		WorkDiv::<1>::new(blocks, 1, 1),
		HelloOpposite::<1>,
		Arc::clone(&mirror),
	);
	enqueue(&queue, task).unwrap();
	mirror
}

#[test]
fn test_opposite_index_on_block_pool() {
	for blocks in [1, 2, 8] {
		run_on_blocks::<BlockingBarrier>(blocks, 8).assert_mirrored();
		run_on_blocks::<PollingBarrier>(blocks, 8).assert_mirrored();
	}
}

#[test]
fn test_clamped_grid_like_hello_world() {
	let dev = CpuBlocks::<BlockingBarrier>::dev_by_idx(&RuntimeConfig::builder().with_pool_threads(6), 0)
		.unwrap();
	let max = get_max_active_blocks::<CpuBlocks, _, _, 1>(
		&dev,
		&HelloOpposite::<1>,
		DimVec::from(1),
		DimVec::from(1),
		&Mirror::new(0),
	)
	.unwrap();
	assert_eq!(max, 6);

	let blocks = 100.min(max);
	let queue = Queue::<CpuBlocks, Blocking>::new(dev).unwrap();
	let mirror = Mirror::new(blocks);
	let task = create_task_cooperative_kernel(
		WorkDiv::<1>::new(blocks, 1, 1),
		HelloOpposite::<1>,
		Arc::clone(&mirror),
	);
	enqueue(&queue, task).unwrap();
	mirror.assert_mirrored();
}

/// Rotates a value around the grid for several rounds, two rendezvous per round.
struct Rotate;

struct Ring {
	values: Vec<AtomicUsize>,
	rounds: usize,
}

impl<A: Acc<1> + CooperativeAcc> Kernel<A, Arc<Ring>> for Rotate {
	fn run(
		&self,
		acc: &A,
		ring: &Arc<Ring>,
	) {
		let idx = acc.grid_thread_linear_idx();
		let len = acc.grid_thread_count();
		for _ in 0..ring.rounds {
			let next = ring.values[(idx + 1) % len].load(Ordering::Relaxed);
			sync_grid_threads(acc);
			ring.values[idx].store(next, Ordering::Relaxed);
			sync_grid_threads(acc);
		}
	}
}

#[test]
fn test_repeated_syncs_keep_rounds_apart() {
	let len = 16;
	let rounds = 250;
	let dev = CpuThreads::<PollingBarrier>::dev_by_idx(&RuntimeConfig::builder().with_poll_interval_us(0), 0)
		.unwrap();
	let queue = Queue::<CpuThreads<PollingBarrier>, Blocking>::new(dev).unwrap();
	let ring = Arc::new(Ring {
		values: (0..len).map(AtomicUsize::new).collect(),
		rounds,
	});

	let task = create_task_cooperative_kernel(WorkDiv::<1>::new(4, 4, 1), Rotate, Arc::clone(&ring));
	enqueue(&queue, task).unwrap();

	for idx in 0..len {
		assert_eq!(ring.values[idx].load(Ordering::Relaxed), (idx + rounds) % len);
	}
}
