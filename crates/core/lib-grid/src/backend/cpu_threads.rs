// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use super::{check_capacity, cpu_dev_by_idx, validate_launch, Backend, Execute, OccupancyQuery};
use crate::acc::{AccCpu, SharedMem};
use crate::config::RuntimeConfig;
use crate::dev::{pin_current, AccDevProps, DevCpu, Device};
use crate::dispatch::{ConceptMaxActiveBlocks, Cooperation, Implements};
use crate::error::{GridError, Result};
use crate::grid::{Barrier, BlockingBarrier};
use crate::kernel::{FunctionAttributes, Kernel, KernelFunctionAttributes, TaskKernel};
use crate::workdiv::{DimVec, WorkDiv};
use crossbeam::channel::unbounded;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;
use std::thread;

/// One OS thread per grid thread.
///
/// Cooperative launches start the whole grid at once, so every thread is resident while
/// the grid barrier `Bar` is in use. Independent launches run block after block.
pub struct CpuThreads<Bar = BlockingBarrier>(PhantomData<fn() -> Bar>);

impl<Bar: Barrier> Backend for CpuThreads<Bar> {
	const NAME: &'static str = "CpuThreads";

	type Dev = DevCpu;

	fn dev_count(_config: &RuntimeConfig) -> Result<usize> {
		Ok(1)
	}

	fn dev_by_idx(
		config: &RuntimeConfig,
		idx: usize,
	) -> Result<DevCpu> {
		cpu_dev_by_idx(config, idx)
	}

	fn acc_dev_props(dev: &DevCpu) -> Result<AccDevProps> {
		let max_threads = dev.config().cpu_threads.max_threads;
		Ok(AccDevProps {
			multi_processor_count: dev.core_count(),
			grid_block_extent_max: [usize::MAX; 3],
			grid_block_count_max: usize::MAX,
			block_thread_extent_max: [max_threads; 3],
			block_thread_count_max: max_threads,
			thread_elem_extent_max: [usize::MAX; 3],
			thread_elem_count_max: usize::MAX,
			shared_mem_size_bytes: dev.block_shared_mem_bytes(),
			warp_sizes: vec![1],
			supports_cooperative_launch: true,
		})
	}
}

/// Resident blocks of a thread-per-grid-thread launch: as many as fit under the configured
/// thread limit.
#[derive(Debug, Clone, Copy)]
pub struct ThreadLimitOccupancy;

impl<Bar: Barrier> Implements<ConceptMaxActiveBlocks> for CpuThreads<Bar> {
	type Impl = ThreadLimitOccupancy;

	fn interface(&self) -> &ThreadLimitOccupancy {
		&ThreadLimitOccupancy
	}
}

impl<K, Args, const D: usize> OccupancyQuery<K, Args, D> for ThreadLimitOccupancy {
	type Dev = DevCpu;

	fn max_active_blocks(
		dev: &DevCpu,
		_kernel: &K,
		block_thread_extent: DimVec<D>,
		_thread_elem_extent: DimVec<D>,
		_args: &Args,
	) -> Result<usize> {
		let threads_per_block = block_thread_extent.prod();
		let max_threads = dev.config().cpu_threads.max_threads;
		if threads_per_block == 0 || threads_per_block > max_threads {
			return Ok(0);
		}
		Ok(max_threads / threads_per_block)
	}
}

impl<Bar: Barrier, K> FunctionAttributes<K> for CpuThreads<Bar> {
	fn function_attributes(
		dev: &DevCpu,
		_kernel: &K,
	) -> Result<KernelFunctionAttributes> {
		Ok(KernelFunctionAttributes::from_props(&Self::acc_dev_props(dev)?, 0))
	}
}

impl<Bar, const D: usize, K, Args, C> Execute<TaskKernel<D, K, Args, C>> for CpuThreads<Bar>
where
	Bar: Barrier,
	C: Cooperation,
	K: Kernel<AccCpu<CpuThreads<Bar>, D, C::GridSync<Bar>>, Args>,
	Args: Sync,
{
	fn validate(
		dev: &DevCpu,
		task: &TaskKernel<D, K, Args, C>,
	) -> Result<()> {
		let props = Self::acc_dev_props(dev)?;
		let work_div = task.work_div();
		let shared_mem_bytes = task.kernel().block_shared_mem_dyn_bytes(
			work_div.block_thread_count(),
			work_div.thread_elem_count(),
			task.args(),
		);
		validate_launch(
			Self::NAME,
			dev.name(),
			&props,
			task,
			shared_mem_bytes,
			task.kernel().warp_size(),
		)?;
		check_capacity::<Self, D, K, Args, C>(dev, task)
	}

	fn launch(
		dev: &DevCpu,
		task: &TaskKernel<D, K, Args, C>,
	) -> Result<()> {
		let work_div = task.work_div();
		let shared_mem_bytes = task.kernel().block_shared_mem_dyn_bytes(
			work_div.block_thread_count(),
			work_div.thread_elem_count(),
			task.args(),
		);
		let tuning = dev.config().barrier;
		let block_count = work_div.grid_block_count();

		if C::IS_COOPERATIVE {
			let grid_sync = C::grid_sync::<Bar>(work_div.grid_thread_count(), &tuning);
			return run_blocks::<Bar, D, K, Args, _>(
				dev,
				work_div,
				task.kernel(),
				task.args(),
				0..block_count,
				grid_sync,
				shared_mem_bytes,
			);
		}

		for block in 0..block_count {
			let grid_sync = C::grid_sync::<Bar>(work_div.block_thread_count(), &tuning);
			run_blocks::<Bar, D, K, Args, _>(
				dev,
				work_div,
				task.kernel(),
				task.args(),
				block..block + 1,
				grid_sync,
				shared_mem_bytes,
			)?;
		}
		Ok(())
	}
}

/// Spawns one thread per grid thread of `blocks` and joins them.
///
/// Threads wait on a start gate until the last one is spawned. If a spawn fails the gate
/// is closed, the already spawned threads return without running the kernel and the
/// spawn error is reported, so a partial grid never enters the barrier.
fn run_blocks<Bar, const D: usize, K, Args, S>(
	dev: &DevCpu,
	work_div: &WorkDiv<D>,
	kernel: &K,
	args: &Args,
	blocks: Range<usize>,
	grid_sync: S,
	shared_mem_bytes: usize,
) -> Result<()>
where
	Bar: Barrier,
	K: Kernel<AccCpu<CpuThreads<Bar>, D, S>, Args>,
	Args: Sync,
	S: Clone + Send + Sync,
{
	let threads_per_block = work_div.block_thread_count();
	let stack_size = dev.config().cpu_threads.stack_size;
	let (gate_tx, gate_rx) = unbounded::<()>();

	thread::scope(|scope| {
		let mut handles = Vec::with_capacity(blocks.len() * threads_per_block);
		let mut spawn_error = None;

		'blocks: for block in blocks {
			let grid_block_idx = DimVec::map_linear_to_idx(block, work_div.grid_block_extent());
			let shared = Arc::new(SharedMem::with_bytes(shared_mem_bytes));

			for thread_in_block in 0..threads_per_block {
				let linear = block * threads_per_block + thread_in_block;
				let acc = AccCpu::<CpuThreads<Bar>, D, S>::new(
					*work_div,
					grid_block_idx,
					DimVec::map_linear_to_idx(thread_in_block, work_div.block_thread_extent()),
					Arc::clone(&shared),
					grid_sync.clone(),
				);
				let gate = gate_rx.clone();
				let core = dev.core_for_thread(linear);

				let mut builder = thread::Builder::new().name(format!("grid-thread-{}", linear));
				if let Some(bytes) = stack_size {
					builder = builder.stack_size(bytes);
				}

				let spawned = builder.spawn_scoped(scope, move || {
					if gate.recv().is_err() {
						return;
					}
					if let Some(core) = core {
						pin_current(core, linear);
					}
					kernel.run(&acc, args);
				});

				match spawned {
					Ok(handle) => handles.push((linear, handle)),
					Err(e) => {
						spawn_error = Some(e);
						break 'blocks;
					},
				}
			}
		}

		if let Some(e) = spawn_error {
			drop(gate_tx);
			for (_, handle) in handles {
				let _ = handle.join();
			}
			tracing::warn!(error = %e, "grid thread spawn failed, launch aborted");
			return Err(GridError::Spawn(e));
		}

		for _ in 0..handles.len() {
			let _ = gate_tx.send(());
		}

		let mut result = Ok(());
		for (linear, handle) in handles {
			if handle.join().is_err() && result.is_ok() {
				result = Err(GridError::KernelPanic {
					backend: <CpuThreads<Bar> as Backend>::NAME,
					thread: linear,
				});
			}
		}
		result
	})
}
