// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

#[cfg(feature = "cpu-blocks")]
mod cpu_blocks;
#[cfg(feature = "cpu-serial")]
mod cpu_serial;
#[cfg(feature = "cpu-threads")]
mod cpu_threads;
#[cfg(feature = "cuda")]
mod cuda;

#[cfg(feature = "cpu-blocks")]
pub use cpu_blocks::{BlockPoolOccupancy, CpuBlocks};
#[cfg(feature = "cpu-serial")]
pub use cpu_serial::CpuSerial;
#[cfg(feature = "cpu-threads")]
pub use cpu_threads::{CpuThreads, ThreadLimitOccupancy};
#[cfg(feature = "cuda")]
pub use cuda::*;

use crate::config::RuntimeConfig;
use crate::dev::{AccDevProps, Device};
use crate::dispatch::{Concept, ConceptMaxActiveBlocks, Cooperation, Implements};
use crate::error::{GridError, Result};
use crate::kernel::TaskKernel;
use crate::workdiv::DimVec;

/// Execution back-end selected at compile time by a marker type.
pub trait Backend: Sized + Send + Sync + 'static {
	const NAME: &'static str;

	type Dev: Device;

	fn dev_count(config: &RuntimeConfig) -> Result<usize>;

	fn dev_by_idx(
		config: &RuntimeConfig,
		idx: usize,
	) -> Result<Self::Dev>;

	fn acc_dev_props(dev: &Self::Dev) -> Result<AccDevProps>;

	/// Waits for all work issued to `dev` by this back-end. Host back-ends finish inside
	/// `launch`, so there is nothing to wait for.
	fn synchronize(_dev: &Self::Dev) -> Result<()> {
		Ok(())
	}
}

/// Runs tasks of type `T`.
pub trait Execute<T>: Backend {
	/// Rejects tasks the device cannot run. Called on the enqueueing thread.
	fn validate(
		dev: &Self::Dev,
		task: &T,
	) -> Result<()>;

	/// Runs a validated task.
	fn launch(
		dev: &Self::Dev,
		task: &T,
	) -> Result<()>;
}

/// Resident block query of one back-end family. Registered on the family's markers as the
/// [`ConceptMaxActiveBlocks`] member, so barrier variants of a family share it.
pub trait OccupancyQuery<K, Args, const D: usize> {
	type Dev: Device;

	fn max_active_blocks(
		dev: &Self::Dev,
		kernel: &K,
		block_thread_extent: DimVec<D>,
		thread_elem_extent: DimVec<D>,
		args: &Args,
	) -> Result<usize>;
}

/// Upper bound on blocks of one cooperative launch that can be resident together.
///
/// Available exactly on back-ends whose [`ConceptMaxActiveBlocks`] member answers the query
/// for `K`.
pub trait MaxActiveBlocks<K, Args, const D: usize>: Backend {
	fn max_active_blocks(
		dev: &Self::Dev,
		kernel: &K,
		block_thread_extent: DimVec<D>,
		thread_elem_extent: DimVec<D>,
		args: &Args,
	) -> Result<usize>;
}

impl<B, K, Args, const D: usize> MaxActiveBlocks<K, Args, D> for B
where
	B: Backend + Implements<ConceptMaxActiveBlocks>,
	<B as Implements<ConceptMaxActiveBlocks>>::Impl: OccupancyQuery<K, Args, D, Dev = B::Dev>,
{
	fn max_active_blocks(
		dev: &B::Dev,
		kernel: &K,
		block_thread_extent: DimVec<D>,
		thread_elem_extent: DimVec<D>,
		args: &Args,
	) -> Result<usize> {
		<<B as Implements<ConceptMaxActiveBlocks>>::Impl as OccupancyQuery<K, Args, D>>::max_active_blocks(
			dev,
			kernel,
			block_thread_extent,
			thread_elem_extent,
			args,
		)
	}
}

/// Resident block limit of `kernel` on `dev`. Not cached; ask again when anything changes.
pub fn get_max_active_blocks<B, K, Args, const D: usize>(
	dev: &B::Dev,
	kernel: &K,
	block_thread_extent: DimVec<D>,
	thread_elem_extent: DimVec<D>,
	args: &Args,
) -> Result<usize>
where
	B: MaxActiveBlocks<K, Args, D>,
{
	let max = B::max_active_blocks(dev, kernel, block_thread_extent, thread_elem_extent, args)?;
	tracing::trace!(
		concept = ConceptMaxActiveBlocks::NAME,
		backend = B::NAME,
		block_thread_extent = %block_thread_extent,
		max,
		"queried resident block limit"
	);
	Ok(max)
}

pub fn get_acc_dev_props<B: Backend>(dev: &B::Dev) -> Result<AccDevProps> {
	B::acc_dev_props(dev)
}

pub(crate) fn cpu_dev_by_idx(
	config: &RuntimeConfig,
	idx: usize,
) -> Result<crate::dev::DevCpu> {
	if idx != 0 {
		return Err(GridError::InvalidDevice { idx, count: 1 });
	}
	crate::dev::DevCpu::new(config.clone())
}

/// Checks shared by all back-ends: work division and kernel requirements against the
/// device limits.
pub(crate) fn validate_launch<const D: usize, K, Args, C: Cooperation>(
	backend: &'static str,
	device: &str,
	props: &AccDevProps,
	task: &TaskKernel<D, K, Args, C>,
	shared_mem_bytes: usize,
	warp_size: Option<u32>,
) -> Result<()> {
	props.validate_work_div(device, task.work_div())?;
	props.validate_kernel_requirements(device, warp_size, shared_mem_bytes)?;

	if C::IS_COOPERATIVE && !props.supports_cooperative_launch {
		return Err(GridError::unsupported(
			device,
			format!("{} cannot launch cooperative kernels", backend),
		));
	}

	tracing::debug!(
		backend,
		kernel = task.kernel_name(),
		work_div = %task.work_div(),
		cooperative = C::IS_COOPERATIVE,
		shared_mem_bytes,
		"task accepted"
	);
	Ok(())
}

/// Fails a cooperative task whose grid cannot be resident at once.
pub(crate) fn check_capacity<B, const D: usize, K, Args, C>(
	dev: &B::Dev,
	task: &TaskKernel<D, K, Args, C>,
) -> Result<()>
where
	B: MaxActiveBlocks<K, Args, D>,
	C: Cooperation,
{
	if !C::IS_COOPERATIVE {
		return Ok(());
	}

	let work_div = task.work_div();
	let max = get_max_active_blocks::<B, K, Args, D>(
		dev,
		task.kernel(),
		work_div.block_thread_extent(),
		work_div.thread_elem_extent(),
		task.args(),
	)?;
	let requested = work_div.grid_block_count();
	if requested > max {
		return Err(GridError::CapacityExceeded {
			kernel: task.kernel_name(),
			device: dev.name().to_string(),
			requested,
			max,
		});
	}

	tracing::debug!(backend = B::NAME, requested, max, "cooperative grid fits");
	Ok(())
}

#[cfg(all(test, feature = "cpu-threads", feature = "cpu-blocks"))]
mod tests {
	use super::*;
	use crate::grid::{BlockingBarrier, PollingBarrier};
	use std::any::TypeId;

	fn occupancy_member<B>() -> TypeId
	where
		B: Implements<ConceptMaxActiveBlocks>,
		B::Impl: 'static,
	{
		TypeId::of::<B::Impl>()
	}

	#[test]
	fn test_one_occupancy_member_per_family() {
		assert_eq!(
			occupancy_member::<CpuBlocks<BlockingBarrier>>(),
			occupancy_member::<CpuBlocks<PollingBarrier>>()
		);
		assert_eq!(
			occupancy_member::<CpuThreads<BlockingBarrier>>(),
			occupancy_member::<CpuThreads<PollingBarrier>>()
		);
		assert_ne!(
			occupancy_member::<CpuThreads>(),
			occupancy_member::<CpuBlocks>()
		);
	}

	#[test]
	fn test_query_goes_through_registered_member() {
		let dev = CpuThreads::<BlockingBarrier>::dev_by_idx(&RuntimeConfig::builder().with_max_threads(12), 0).unwrap();
		let direct = <ThreadLimitOccupancy as OccupancyQuery<(), (), 1>>::max_active_blocks(
			&dev,
			&(),
			DimVec::from(4),
			DimVec::from(1),
			&(),
		)
		.unwrap();
		let dispatched = get_max_active_blocks::<CpuThreads, _, _, 1>(&dev, &(), DimVec::from(4), DimVec::from(1), &()).unwrap();
		assert_eq!(direct, 3);
		assert_eq!(dispatched, direct);
	}
}
