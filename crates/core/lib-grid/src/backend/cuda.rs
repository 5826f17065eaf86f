// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use super::{check_capacity, validate_launch, Backend, Execute, MaxActiveBlocks, OccupancyQuery};
use crate::config::RuntimeConfig;
use crate::dev::{AccDevProps, Device};
use crate::dispatch::{ConceptMaxActiveBlocks, Cooperation, Implements};
use crate::error::{GridError, Result};
use crate::kernel::{FunctionAttributes, KernelFunctionAttributes, TaskKernel};
use crate::workdiv::{DimVec, WorkDiv};
use cudarc::driver::{
	sys, CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, DeviceRepr, DriverError,
	LaunchArgs, LaunchConfig, PushKernelArg,
};
use cudarc::nvrtc::{compile_ptx_with_opts, CompileOptions};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// NVIDIA GPUs through the CUDA driver. Cooperative tasks use the hardware grid barrier.
pub struct GpuCuda;

#[derive(Clone)]
pub struct DevCuda {
	ordinal: usize,
	name: String,
	ctx: Arc<CudaContext>,
	stream: Arc<CudaStream>,
	props: Arc<AccDevProps>,
	config: RuntimeConfig,
}

impl DevCuda {
	pub fn ordinal(&self) -> usize {
		self.ordinal
	}

	pub fn context(&self) -> &Arc<CudaContext> {
		&self.ctx
	}

	pub fn stream(&self) -> &Arc<CudaStream> {
		&self.stream
	}

	fn detect_props(ctx: &CudaContext) -> Result<AccDevProps> {
		use sys::CUdevice_attribute as Attr;
		let attr = |a: Attr| -> Result<usize> { Ok(ctx.attribute(a)?.max(0) as usize) };

		let block_thread_count_max = attr(Attr::CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)?;
		let grid_block_extent_max = [
			attr(Attr::CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_X)?,
			attr(Attr::CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Y)?,
			attr(Attr::CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_Z)?,
		];

		Ok(AccDevProps {
			multi_processor_count: attr(Attr::CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?,
			grid_block_count_max: grid_block_extent_max
				.iter()
				.fold(1usize, |acc, e| acc.saturating_mul(*e)),
			grid_block_extent_max,
			block_thread_extent_max: [
				attr(Attr::CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_X)?,
				attr(Attr::CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Y)?,
				attr(Attr::CU_DEVICE_ATTRIBUTE_MAX_BLOCK_DIM_Z)?,
			],
			block_thread_count_max,
			thread_elem_extent_max: [usize::MAX; 3],
			thread_elem_count_max: usize::MAX,
			shared_mem_size_bytes: attr(Attr::CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK)?,
			warp_sizes: vec![attr(Attr::CU_DEVICE_ATTRIBUTE_WARP_SIZE)? as u32],
			supports_cooperative_launch: attr(Attr::CU_DEVICE_ATTRIBUTE_COOPERATIVE_LAUNCH)? != 0,
		})
	}
}

impl Device for DevCuda {
	fn name(&self) -> &str {
		&self.name
	}

	fn config(&self) -> &RuntimeConfig {
		&self.config
	}
}

impl fmt::Debug for DevCuda {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		f.debug_struct("DevCuda")
			.field("ordinal", &self.ordinal)
			.field("props", &self.props)
			.finish()
	}
}

/// Device function compiled from CUDA C source with NVRTC.
///
/// Cooperative kernels prepend [`CUDA_GRID_SYNC_PRELUDE`](crate::grid::CUDA_GRID_SYNC_PRELUDE)
/// and call `sync_grid_threads()`.
#[derive(Clone)]
pub struct CudaKernel {
	name: String,
	function: CudaFunction,
	shared_mem_bytes: u32,
	_module: Arc<CudaModule>,
}

impl CudaKernel {
	pub fn compile(
		dev: &DevCuda,
		source: &str,
		name: &str,
	) -> Result<Self> {
		let cuda = &dev.config.cuda;
		let mut options = Vec::new();
		if let Some(arch) = &cuda.arch {
			options.push(format!("--gpu-architecture={}", arch));
		}
		let opts = CompileOptions {
			include_paths: cuda.include_paths.clone(),
			options,
			..Default::default()
		};

		let ptx = compile_ptx_with_opts(source, opts)?;
		let module = dev.ctx.load_module(ptx)?;
		let function = module.load_function(name)?;
		tracing::debug!(kernel = name, device = dev.ordinal, "compiled CUDA kernel");

		Ok(Self {
			name: name.to_string(),
			function,
			shared_mem_bytes: 0,
			_module: module,
		})
	}

	pub fn with_shared_mem_bytes(
		mut self,
		bytes: u32,
	) -> Self {
		self.shared_mem_bytes = bytes;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn shared_mem_bytes(&self) -> u32 {
		self.shared_mem_bytes
	}
}

/// One kernel parameter.
pub trait CudaArg: Send + Sync {
	fn push_arg<'a>(
		&'a self,
		builder: &mut LaunchArgs<'a>,
	);
}

impl<T: DeviceRepr + Send + Sync> CudaArg for CudaSlice<T> {
	fn push_arg<'a>(
		&'a self,
		builder: &mut LaunchArgs<'a>,
	) {
		builder.arg(self);
	}
}

macro_rules! impl_scalar_arg {
	($($t:ty),+) => {
		$(
			impl CudaArg for $t {
				fn push_arg<'a>(
					&'a self,
					builder: &mut LaunchArgs<'a>,
				) {
					builder.arg(self);
				}
			}
		)+
	};
}

impl_scalar_arg!(i32, u32, i64, u64, f32, f64, usize);

/// Borrowed buffers, so results can be read back after a blocking launch.
impl<T: CudaArg + ?Sized> CudaArg for &T {
	fn push_arg<'a>(
		&'a self,
		builder: &mut LaunchArgs<'a>,
	) {
		(**self).push_arg(builder);
	}
}

/// Full parameter list of a kernel, pushed in order.
pub trait CudaArgs: Send + Sync {
	fn push_args<'a>(
		&'a self,
		builder: &mut LaunchArgs<'a>,
	);
}

impl CudaArgs for () {
	fn push_args<'a>(
		&'a self,
		_builder: &mut LaunchArgs<'a>,
	) {
	}
}

macro_rules! impl_tuple_args {
	($($name:ident),+) => {
		impl<$($name: CudaArg),+> CudaArgs for ($($name,)+) {
			#[allow(non_snake_case)]
			fn push_args<'a>(
				&'a self,
				builder: &mut LaunchArgs<'a>,
			) {
				let ($($name,)+) = self;
				$($name.push_arg(builder);)+
			}
		}
	};
}

impl_tuple_args!(A);
impl_tuple_args!(A, B);
impl_tuple_args!(A, B, C);
impl_tuple_args!(A, B, C, E);
impl_tuple_args!(A, B, C, E, F);
impl_tuple_args!(A, B, C, E, F, G);

fn to_dim3<const D: usize>(extent: DimVec<D>) -> Result<(u32, u32, u32)> {
	let axis = |a: usize| -> Result<u32> {
		let value = extent.axis(a).unwrap_or(1);
		u32::try_from(value).map_err(|_| {
			GridError::unsupported("CUDA", format!("extent {} does not fit a dim3", extent))
		})
	};
	Ok((axis(0)?, axis(1)?, axis(2)?))
}

/// Runs a driver call that may be the first to touch `libcuda`. With dynamic loading a
/// missing library panics inside cudarc; that is reported as an error instead.
fn load_driver<T>(call: impl FnOnce() -> std::result::Result<T, DriverError>) -> Result<T> {
	match panic::catch_unwind(AssertUnwindSafe(call)) {
		Ok(result) => Ok(result?),
		Err(_) => Err(GridError::Cuda("CUDA driver library could not be loaded".to_string())),
	}
}

fn launch_config<const D: usize>(
	work_div: &WorkDiv<D>,
	shared_mem_bytes: u32,
) -> Result<LaunchConfig> {
	Ok(LaunchConfig {
		grid_dim: to_dim3(work_div.grid_block_extent())?,
		block_dim: to_dim3(work_div.block_thread_extent())?,
		shared_mem_bytes,
	})
}

impl Backend for GpuCuda {
	const NAME: &'static str = "GpuCuda";

	type Dev = DevCuda;

	fn dev_count(_config: &RuntimeConfig) -> Result<usize> {
		Ok(load_driver(CudaContext::device_count)?.max(0) as usize)
	}

	fn dev_by_idx(
		config: &RuntimeConfig,
		idx: usize,
	) -> Result<DevCuda> {
		let count = Self::dev_count(config)?;
		if idx >= count {
			return Err(GridError::InvalidDevice { idx, count });
		}

		let ctx = load_driver(|| CudaContext::new(idx))?;
		let stream = ctx.default_stream();
		let props = DevCuda::detect_props(&ctx)?;

		Ok(DevCuda {
			ordinal: idx,
			name: format!("CUDA:{}", idx),
			ctx,
			stream,
			props: Arc::new(props),
			config: config.clone(),
		})
	}

	fn acc_dev_props(dev: &DevCuda) -> Result<AccDevProps> {
		Ok(AccDevProps::clone(&dev.props))
	}

	fn synchronize(dev: &DevCuda) -> Result<()> {
		dev.stream.synchronize()?;
		Ok(())
	}
}

/// Driver occupancy calculator scaled by the multiprocessor count.
#[derive(Debug, Clone, Copy)]
pub struct CudaOccupancy;

impl Implements<ConceptMaxActiveBlocks> for GpuCuda {
	type Impl = CudaOccupancy;

	fn interface(&self) -> &CudaOccupancy {
		&CudaOccupancy
	}
}

impl<Args, const D: usize> OccupancyQuery<CudaKernel, Args, D> for CudaOccupancy {
	type Dev = DevCuda;

	fn max_active_blocks(
		dev: &DevCuda,
		kernel: &CudaKernel,
		block_thread_extent: DimVec<D>,
		_thread_elem_extent: DimVec<D>,
		_args: &Args,
	) -> Result<usize> {
		let block_size = u32::try_from(block_thread_extent.prod()).unwrap_or(u32::MAX);
		if block_size as usize > dev.props.block_thread_count_max {
			return Ok(0);
		}
		let per_multiprocessor = kernel.function.occupancy_max_active_blocks_per_multiprocessor(
			block_size,
			kernel.shared_mem_bytes as usize,
			None,
		)?;
		Ok(per_multiprocessor as usize * dev.props.multi_processor_count)
	}
}

impl FunctionAttributes<CudaKernel> for GpuCuda {
	fn function_attributes(
		dev: &DevCuda,
		kernel: &CudaKernel,
	) -> Result<KernelFunctionAttributes> {
		Ok(KernelFunctionAttributes::from_props(
			&dev.props,
			kernel.shared_mem_bytes as usize,
		))
	}
}

impl<const D: usize, Args, C> Execute<TaskKernel<D, CudaKernel, Args, C>> for GpuCuda
where
	Args: CudaArgs,
	C: Cooperation,
{
	fn validate(
		dev: &DevCuda,
		task: &TaskKernel<D, CudaKernel, Args, C>,
	) -> Result<()> {
		validate_launch(
			Self::NAME,
			dev.name(),
			&dev.props,
			task,
			task.kernel().shared_mem_bytes as usize,
			None,
		)?;
		check_capacity::<Self, D, CudaKernel, Args, C>(dev, task)
	}

	fn launch(
		dev: &DevCuda,
		task: &TaskKernel<D, CudaKernel, Args, C>,
	) -> Result<()> {
		let kernel = task.kernel();
		let cfg = launch_config(task.work_div(), kernel.shared_mem_bytes)?;

		let mut builder = dev.stream.launch_builder(&kernel.function);
		task.args().push_args(&mut builder);

		// SAFETY: the caller's `CudaArgs` match the kernel signature. Device buffers are
		// freed in stream order, so dropping the task after an asynchronous launch is sound.
		let launched = unsafe {
			if C::IS_COOPERATIVE {
				builder.launch_cooperative(cfg)
			} else {
				builder.launch(cfg)
			}
		};

		match launched {
			Ok(_) => Ok(()),
			Err(DriverError(sys::CUresult::CUDA_ERROR_COOPERATIVE_LAUNCH_TOO_LARGE)) => {
				let work_div = task.work_div();
				let max = Self::max_active_blocks(
					dev,
					kernel,
					work_div.block_thread_extent(),
					work_div.thread_elem_extent(),
					task.args(),
				)?;
				Err(GridError::CapacityExceeded {
					kernel: task.kernel_name(),
					device: dev.name().to_string(),
					requested: work_div.grid_block_count(),
					max,
				})
			},
			Err(e) => Err(e.into()),
		}
	}
}
