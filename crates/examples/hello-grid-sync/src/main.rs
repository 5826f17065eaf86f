// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

//! Grid Sync Hello World
//!
//! Every grid thread writes its index, waits for the whole grid and then reads the slot of
//! the thread at the mirrored position. Runs once per compiled back-end with a grid of up
//! to 100 single-thread blocks, clamped to what the back-end keeps resident.
//!
//! **Run with**: cargo run --release --bin hello-grid-sync [-- config.json]

use lib_grid::error::Result;
use lib_grid::*;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const GRID_BLOCKS: usize = 100;

struct Greeting {
	slots: Vec<AtomicUsize>,
	failures: AtomicUsize,
}

impl Greeting {
	fn new(len: usize) -> Arc<Self> {
		Arc::new(Self {
			slots: (0..len).map(|_| AtomicUsize::new(0)).collect(),
			failures: AtomicUsize::new(0),
		})
	}
}

struct HelloGridSync;

impl<A: Acc<1> + CooperativeAcc> Kernel<A, Arc<Greeting>> for HelloGridSync {
	fn run(
		&self,
		acc: &A,
		greeting: &Arc<Greeting>,
	) {
		let idx = acc.grid_thread_linear_idx();
		let count = acc.grid_thread_count();
		greeting.slots[idx].store(idx, Ordering::Relaxed);

		sync_grid_threads(acc);

		let opposite = greeting.slots[count - 1 - idx].load(Ordering::Relaxed);
		if idx + opposite == count - 1 {
			tracing::debug!(idx, opposite, "hello from grid thread");
		} else {
			greeting.failures.fetch_add(1, Ordering::Relaxed);
		}
	}
}

/// Runs the greeting on one CPU back-end. `Ok(false)` means some thread read a stale slot.
fn hello<B>(config: &RuntimeConfig) -> Result<bool>
where
	B: MaxActiveBlocks<HelloGridSync, Arc<Greeting>, 1>
		+ Execute<TaskKernel<1, HelloGridSync, Arc<Greeting>, Cooperative>>,
{
	let dev = B::dev_by_idx(config, 0)?;
	let max = get_max_active_blocks::<B, _, _, 1>(
		&dev,
		&HelloGridSync,
		DimVec::from(1),
		DimVec::from(1),
		&Greeting::new(0),
	)?;
	let blocks = GRID_BLOCKS.min(max);
	if blocks == 0 {
		tracing::warn!(backend = B::NAME, "no block can be resident, skipping");
		return Ok(false);
	}

	let greeting = Greeting::new(blocks);
	let queue = Queue::<B, Blocking>::new(dev)?;
	let task = create_task_cooperative_kernel(
		WorkDiv::<1>::new(blocks, 1, 1),
		HelloGridSync,
		Arc::clone(&greeting),
	);
	enqueue(&queue, task)?;

	let failures = greeting.failures.load(Ordering::Relaxed);
	tracing::info!(backend = B::NAME, blocks, max, failures, "grid sync hello world finished");
	Ok(failures == 0)
}

#[cfg(feature = "cuda")]
const HELLO_CUDA: &str = r#"
extern "C" __global__ void hello_grid_sync(unsigned int* slots, unsigned int* failures)
{
	unsigned long long idx = grid_thread_linear_idx();
	unsigned long long count = grid_thread_count();
	slots[idx] = (unsigned int)idx;

	sync_grid_threads();

	unsigned int opposite = slots[count - 1 - idx];
	if (idx + opposite != count - 1)
	{
		atomicAdd(failures, 1u);
	}
}
"#;

#[cfg(feature = "cuda")]
fn hello_cuda(config: &RuntimeConfig) -> Result<bool> {
	match GpuCuda::dev_count(config) {
		Ok(0) => {
			tracing::info!("no CUDA device found, skipping");
			return Ok(true);
		},
		Err(GridError::Cuda(reason)) => {
			tracing::info!(%reason, "CUDA driver unavailable, skipping");
			return Ok(true);
		},
		Err(e) => return Err(e),
		Ok(_) => {},
	}

	let dev = GpuCuda::dev_by_idx(config, 0)?;
	let source = format!("{}{}", CUDA_GRID_SYNC_PRELUDE, HELLO_CUDA);
	let kernel = CudaKernel::compile(&dev, &source, "hello_grid_sync")?;

	let max = get_max_active_blocks::<GpuCuda, _, _, 1>(&dev, &kernel, DimVec::from(1), DimVec::from(1), &())?;
	let blocks = GRID_BLOCKS.min(max);
	if blocks == 0 {
		tracing::warn!(backend = GpuCuda::NAME, "no block can be resident, skipping");
		return Ok(false);
	}

	let slots = dev.stream().alloc_zeros::<u32>(blocks)?;
	let failures = dev.stream().alloc_zeros::<u32>(1)?;
	let queue = Queue::<GpuCuda, Blocking>::new(dev.clone())?;
	let task = create_task_cooperative_kernel(WorkDiv::<1>::new(blocks, 1, 1), kernel, (&slots, &failures));
	enqueue(&queue, task)?;

	let failed = dev.stream().memcpy_dtov(&failures)?.first().copied().unwrap_or(0);
	tracing::info!(backend = GpuCuda::NAME, blocks, max, failures = failed, "grid sync hello world finished");
	Ok(failed == 0)
}

fn load_config() -> Result<RuntimeConfig> {
	match std::env::args().nth(1) {
		Some(path) => {
			tracing::info!(%path, "loading config");
			RuntimeConfig::from_file(path)
		},
		None => Ok(RuntimeConfig::default()),
	}
}

fn run() -> Result<bool> {
	let config = load_config()?;
	println!("{}", DevCpu::new(config.clone())?.report());

	let mut passed = true;

	#[cfg(feature = "cpu-serial")]
	tracing::info!(backend = CpuSerial::NAME, "no grid sync capability, skipping");

	#[cfg(feature = "cpu-threads")]
	{
		passed &= hello::<CpuThreads<BlockingBarrier>>(&config)?;
		passed &= hello::<CpuThreads<PollingBarrier>>(&config)?;
	}

	#[cfg(feature = "cpu-blocks")]
	{
		passed &= hello::<CpuBlocks<BlockingBarrier>>(&config)?;
		passed &= hello::<CpuBlocks<PollingBarrier>>(&config)?;
	}

	#[cfg(feature = "cuda")]
	{
		passed &= hello_cuda(&config)?;
	}

	Ok(passed)
}

fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	match run() {
		Ok(true) => {
			println!("✅ All grid threads saw their mirrored neighbour");
			ExitCode::SUCCESS
		},
		Ok(false) => {
			println!("❌ Grid synchronization failed");
			ExitCode::FAILURE
		},
		Err(e) => {
			tracing::error!(error = %e, "hello world aborted");
			ExitCode::FAILURE
		},
	}
}
