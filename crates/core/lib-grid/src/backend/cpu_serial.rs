// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use super::{cpu_dev_by_idx, validate_launch, Backend, Execute};
use crate::acc::{AccCpu, SharedMem};
use crate::config::RuntimeConfig;
use crate::dev::{AccDevProps, DevCpu, Device};
use crate::dispatch::Independent;
use crate::error::{GridError, Result};
use crate::grid::NoGridSync;
use crate::kernel::{FunctionAttributes, Kernel, KernelFunctionAttributes, TaskKernel};
use crate::workdiv::DimVec;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Runs blocks one after another on the calling thread, one thread per block.
///
/// Has no grid synchronization and no resident block limit: only independent tasks can be
/// enqueued.
pub struct CpuSerial;

impl Backend for CpuSerial {
	const NAME: &'static str = "CpuSerial";

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
			multi_processor_count: 1,
			grid_block_extent_max: [usize::MAX; 3],
			grid_block_count_max: usize::MAX,
			block_thread_extent_max: [1; 3],
			block_thread_count_max: 1,
			thread_elem_extent_max: [usize::MAX; 3],
			thread_elem_count_max: usize::MAX,
			shared_mem_size_bytes: dev.block_shared_mem_bytes(),
			warp_sizes: vec![1],
			supports_cooperative_launch: false,
		})
	}
}

impl<K> FunctionAttributes<K> for CpuSerial {
	fn function_attributes(
		dev: &DevCpu,
		_kernel: &K,
	) -> Result<KernelFunctionAttributes> {
		Ok(KernelFunctionAttributes::from_props(&Self::acc_dev_props(dev)?, 0))
	}
}

impl<const D: usize, K, Args> Execute<TaskKernel<D, K, Args, Independent>> for CpuSerial
where
	K: Kernel<AccCpu<CpuSerial, D, NoGridSync>, Args>,
{
	fn validate(
		dev: &DevCpu,
		task: &TaskKernel<D, K, Args, Independent>,
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
		)
	}

	fn launch(
		_dev: &DevCpu,
		task: &TaskKernel<D, K, Args, Independent>,
	) -> Result<()> {
		let work_div = *task.work_div();
		let shared_mem_bytes = task.kernel().block_shared_mem_dyn_bytes(
			work_div.block_thread_count(),
			work_div.thread_elem_count(),
			task.args(),
		);

		for block in 0..work_div.grid_block_count() {
			let acc = AccCpu::<CpuSerial, D, _>::new(
				work_div,
				DimVec::map_linear_to_idx(block, work_div.grid_block_extent()),
				DimVec::zeros(),
				Arc::new(SharedMem::with_bytes(shared_mem_bytes)),
				NoGridSync,
			);
			let ran = panic::catch_unwind(AssertUnwindSafe(|| task.kernel().run(&acc, task.args())));
			if ran.is_err() {
				return Err(GridError::KernelPanic {
					backend: Self::NAME,
					thread: block,
				});
			}
		}
		Ok(())
	}
}
