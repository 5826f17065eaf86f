// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use super::{check_capacity, cpu_dev_by_idx, validate_launch, Backend, Execute, OccupancyQuery};
use crate::acc::{AccCpu, SharedMem};
use crate::config::RuntimeConfig;
use crate::dev::{AccDevProps, DevCpu, Device};
use crate::dispatch::{ConceptMaxActiveBlocks, Cooperation, Implements};
use crate::error::{GridError, Result};
use crate::grid::{Barrier, BlockingBarrier};
use crate::kernel::{FunctionAttributes, Kernel, KernelFunctionAttributes, TaskKernel};
use crate::workdiv::DimVec;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One rayon task per block on the device's block pool; blocks have a single thread.
///
/// A cooperative grid may hold at most as many blocks as the pool has workers, which keeps
/// every block resident while it waits in the grid barrier `Bar`. Cooperative launches on
/// one device run one at a time, from any number of queues. Use
/// [`PollingBarrier`](crate::grid::PollingBarrier) to suspend-and-poll instead of parking.
pub struct CpuBlocks<Bar = BlockingBarrier>(PhantomData<fn() -> Bar>);

impl<Bar: Barrier> Backend for CpuBlocks<Bar> {
	const NAME: &'static str = "CpuBlocks";

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
		Ok(AccDevProps {
			multi_processor_count: dev.block_pool()?.current_num_threads(),
			grid_block_extent_max: [usize::MAX; 3],
			grid_block_count_max: usize::MAX,
			block_thread_extent_max: [1; 3],
			block_thread_count_max: 1,
			thread_elem_extent_max: [usize::MAX; 3],
			thread_elem_count_max: usize::MAX,
			shared_mem_size_bytes: dev.block_shared_mem_bytes(),
			warp_sizes: vec![1],
			supports_cooperative_launch: true,
		})
	}
}

/// Resident blocks on the block pool: one per worker, single-thread blocks only.
#[derive(Debug, Clone, Copy)]
pub struct BlockPoolOccupancy;

impl<Bar: Barrier> Implements<ConceptMaxActiveBlocks> for CpuBlocks<Bar> {
	type Impl = BlockPoolOccupancy;

	fn interface(&self) -> &BlockPoolOccupancy {
		&BlockPoolOccupancy
	}
}

impl<K, Args, const D: usize> OccupancyQuery<K, Args, D> for BlockPoolOccupancy {
	type Dev = DevCpu;

	fn max_active_blocks(
		dev: &DevCpu,
		_kernel: &K,
		block_thread_extent: DimVec<D>,
		_thread_elem_extent: DimVec<D>,
		_args: &Args,
	) -> Result<usize> {
		if block_thread_extent.prod() != 1 {
			return Ok(0);
		}
		Ok(dev.block_pool()?.current_num_threads())
	}
}

impl<Bar: Barrier, K> FunctionAttributes<K> for CpuBlocks<Bar> {
	fn function_attributes(
		dev: &DevCpu,
		_kernel: &K,
	) -> Result<KernelFunctionAttributes> {
		Ok(KernelFunctionAttributes::from_props(&Self::acc_dev_props(dev)?, 0))
	}
}

impl<Bar, const D: usize, K, Args, C> Execute<TaskKernel<D, K, Args, C>> for CpuBlocks<Bar>
where
	Bar: Barrier,
	C: Cooperation,
	K: Kernel<AccCpu<CpuBlocks<Bar>, D, C::GridSync<Bar>>, Args>,
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
		let pool = dev.block_pool()?;
		let work_div = *task.work_div();
		let shared_mem_bytes = task.kernel().block_shared_mem_dyn_bytes(
			work_div.block_thread_count(),
			work_div.thread_elem_count(),
			task.args(),
		);
		let block_count = work_div.grid_block_count();
		let grid_sync = C::grid_sync::<Bar>(block_count, &dev.config().barrier);
		let kernel = task.kernel();
		let args = task.args();

		let first_panic = AtomicUsize::new(usize::MAX);

		let _exclusive = C::IS_COOPERATIVE.then(|| dev.lock_block_pool());
		pool.scope(|s| {
			for block in 0..block_count {
				let acc = AccCpu::<CpuBlocks<Bar>, D, _>::new(
					work_div,
					DimVec::map_linear_to_idx(block, work_div.grid_block_extent()),
					DimVec::zeros(),
					Arc::new(SharedMem::with_bytes(shared_mem_bytes)),
					grid_sync.clone(),
				);
				let first_panic = &first_panic;
				s.spawn(move |_| {
					let ran = panic::catch_unwind(AssertUnwindSafe(|| kernel.run(&acc, args)));
					if ran.is_err() {
						first_panic.fetch_min(block, Ordering::AcqRel);
					}
				});
			}
		});

		match first_panic.into_inner() {
			usize::MAX => Ok(()),
			block => Err(GridError::KernelPanic {
				backend: Self::NAME,
				thread: block,
			}),
		}
	}
}
