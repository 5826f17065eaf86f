// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

mod props;

pub use props::AccDevProps;

use crate::config::RuntimeConfig;
use crate::error::Result;
use core_affinity::CoreId;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "cpu-blocks")]
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Handle to a device a back-end launches on.
pub trait Device: Clone + Send + Sync + 'static {
	fn name(&self) -> &str;

	fn config(&self) -> &RuntimeConfig;
}

struct DevCpuInner {
	name: String,
	core_ids: Vec<CoreId>,
	config: RuntimeConfig,
	#[cfg(feature = "cpu-blocks")]
	pool: OnceLock<rayon::ThreadPool>,
	#[cfg(feature = "cpu-blocks")]
	cooperative: Mutex<()>,
}

/// The host CPU. Shared by all CPU back-ends; cloning is cheap.
#[derive(Clone)]
pub struct DevCpu {
	inner: Arc<DevCpuInner>,
}

impl DevCpu {
	pub fn new(config: RuntimeConfig) -> Result<Self> {
		config.validate()?;
		let core_ids = core_affinity::get_core_ids().unwrap_or_default();
		let core_count = std::thread::available_parallelism()
			.map(|n| n.get())
			.unwrap_or(core_ids.len().max(1));

		Ok(Self {
			inner: Arc::new(DevCpuInner {
				name: format!("CPU ({} cores)", core_count),
				core_ids,
				config,
				#[cfg(feature = "cpu-blocks")]
				pool: OnceLock::new(),
				#[cfg(feature = "cpu-blocks")]
				cooperative: Mutex::new(()),
			}),
		})
	}

	pub fn core_count(&self) -> usize {
		std::thread::available_parallelism()
			.map(|n| n.get())
			.unwrap_or(self.inner.core_ids.len().max(1))
	}

	pub fn block_shared_mem_bytes(&self) -> usize {
		self.inner.config.block_shared_mem_kib * 1024
	}

	/// Core that grid thread `linear` is pinned to, if pinning is on.
	pub(crate) fn core_for_thread(
		&self,
		linear: usize,
	) -> Option<CoreId> {
		if !self.inner.config.cpu_threads.pin_threads || self.inner.core_ids.is_empty() {
			return None;
		}
		Some(self.inner.core_ids[linear % self.inner.core_ids.len()])
	}

	/// Pool executing one block per task. Built on first use with the configured size.
	#[cfg(feature = "cpu-blocks")]
	pub(crate) fn block_pool(&self) -> Result<&rayon::ThreadPool> {
		if let Some(pool) = self.inner.pool.get() {
			return Ok(pool);
		}

		let config = &self.inner.config.cpu_blocks;
		let threads = self.inner.config.resolved_pool_threads();
		let mut builder = rayon::ThreadPoolBuilder::new()
			.num_threads(threads)
			.thread_name(|i| format!("grid-block-{}", i));

		if config.pin_workers && !self.inner.core_ids.is_empty() {
			let core_ids = self.inner.core_ids.clone();
			builder = builder.start_handler(move |i| {
				pin_current(core_ids[i % core_ids.len()], i);
			});
		}

		let pool = builder.build()?;
		tracing::debug!(threads, "built block pool");
		Ok(self.inner.pool.get_or_init(move || pool))
	}

	/// Held for the whole of a cooperative launch on the block pool. Two cooperative grids
	/// sharing the workers could each park part of the pool in their barrier and starve the
	/// other's remaining blocks.
	#[cfg(feature = "cpu-blocks")]
	pub(crate) fn lock_block_pool(&self) -> MutexGuard<'_, ()> {
		self.inner.cooperative.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn report(&self) -> String {
		let config = &self.inner.config;
		let mut report = String::new();

		report.push_str("=== CPU Device Report ===\n\n");
		report.push_str(&format!("Device: {}\n", self.inner.name));
		report.push_str(&format!(
			"Pinnable cores: {}\n",
			self.inner.core_ids.len()
		));
		report.push_str(&format!(
			"Max threads per launch: {}\n",
			config.cpu_threads.max_threads
		));
		report.push_str(&format!(
			"Block pool threads: {}\n",
			config.resolved_pool_threads()
		));
		report.push_str(&format!(
			"Block shared memory: {:.1} KB\n",
			self.block_shared_mem_bytes() as f64 / 1024.0
		));
		report.push_str(&format!(
			"Barrier poll interval: {} us\n",
			config.barrier.poll_interval_us
		));

		report
	}
}

impl Device for DevCpu {
	fn name(&self) -> &str {
		&self.inner.name
	}

	fn config(&self) -> &RuntimeConfig {
		&self.inner.config
	}
}

impl fmt::Debug for DevCpu {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		f.debug_struct("DevCpu")
			.field("name", &self.inner.name)
			.field("cores", &self.inner.core_ids.len())
			.finish()
	}
}

pub(crate) fn pin_current(
	core: CoreId,
	worker: usize,
) {
	if !core_affinity::set_for_current(core) {
		tracing::warn!(worker, core = core.id, "failed to pin thread to core");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_report_lists_limits() {
		let dev = DevCpu::new(RuntimeConfig::builder().with_max_threads(32)).unwrap();
		let report = dev.report();
		assert!(report.contains("Max threads per launch: 32"));
		assert!(report.contains("Block shared memory: 64.0 KB"));
		assert!(dev.name().starts_with("CPU"));
	}

	#[test]
	fn test_no_core_without_pinning() {
		let dev = DevCpu::new(RuntimeConfig::default()).unwrap();
		assert_eq!(dev.core_for_thread(0), None);
	}

	#[test]
	fn test_invalid_config_rejected() {
		assert!(DevCpu::new(RuntimeConfig::builder().with_max_threads(0)).is_err());
	}
}
