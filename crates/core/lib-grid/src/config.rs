// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use crate::error::{GridError, Result};
use crate::grid::BarrierTuning;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuThreadsConfig {
	/// Upper bound on OS threads of one launch.
	pub max_threads: usize,

	pub pin_threads: bool,

	pub stack_size: Option<usize>,
}

impl Default for CpuThreadsConfig {
	fn default() -> Self {
		Self {
			max_threads: 1024,
			pin_threads: false,
			stack_size: None,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuBlocksConfig {
	/// Worker count of the block pool; `None` uses the available parallelism.
	pub pool_threads: Option<usize>,

	pub pin_workers: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CudaConfig {
	/// Extra NVRTC include directories, e.g. the toolkit's `include` for cooperative groups.
	pub include_paths: Vec<String>,

	/// Target architecture passed to NVRTC, e.g. `sm_80`.
	pub arch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
	pub version: String,

	pub barrier: BarrierTuning,

	pub cpu_threads: CpuThreadsConfig,

	pub cpu_blocks: CpuBlocksConfig,

	pub cuda: CudaConfig,

	/// Dynamic shared memory available to one block on CPU back-ends.
	pub block_shared_mem_kib: usize,

	/// Capacity of the command channel of a non-blocking queue.
	pub queue_depth: usize,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			version: Self::cfg_version(),
			barrier: BarrierTuning::default(),
			cpu_threads: CpuThreadsConfig::default(),
			cpu_blocks: CpuBlocksConfig::default(),
			cuda: CudaConfig::default(),
			block_shared_mem_kib: 64,
			queue_depth: 100,
		}
	}
}

impl RuntimeConfig {
	pub fn cfg_version() -> String {
		"0.1".to_string()
	}

	pub fn builder() -> Self {
		Self::default()
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let file = File::open(path).map_err(|source| GridError::ConfigIo {
			path: path.display().to_string(),
			source,
		})?;
		let reader = BufReader::new(file);

		let config: RuntimeConfig = serde_json::from_reader(reader)?;
		if config.version != Self::cfg_version() {
			return Err(GridError::InvalidConfigVersion {
				found: config.version,
				expected: Self::cfg_version(),
			});
		}
		config.validate()?;
		Ok(config)
	}

	pub fn with_poll_interval_us(
		mut self,
		poll_interval_us: u64,
	) -> Self {
		self.barrier.poll_interval_us = poll_interval_us;
		self
	}

	pub fn with_max_threads(
		mut self,
		max_threads: usize,
	) -> Self {
		self.cpu_threads.max_threads = max_threads;
		self
	}

	pub fn with_thread_pinning(
		mut self,
		pin: bool,
	) -> Self {
		self.cpu_threads.pin_threads = pin;
		self.cpu_blocks.pin_workers = pin;
		self
	}

	pub fn with_stack_size(
		mut self,
		bytes: usize,
	) -> Self {
		self.cpu_threads.stack_size = Some(bytes);
		self
	}

	pub fn with_pool_threads(
		mut self,
		threads: usize,
	) -> Self {
		self.cpu_blocks.pool_threads = Some(threads);
		self
	}

	pub fn with_block_shared_mem_kib(
		mut self,
		kib: usize,
	) -> Self {
		self.block_shared_mem_kib = kib;
		self
	}

	pub fn with_queue_depth(
		mut self,
		depth: usize,
	) -> Self {
		self.queue_depth = depth;
		self
	}

	pub fn with_cuda_include_path(
		mut self,
		path: impl Into<String>,
	) -> Self {
		self.cuda.include_paths.push(path.into());
		self
	}

	pub fn with_cuda_arch(
		mut self,
		arch: impl Into<String>,
	) -> Self {
		self.cuda.arch = Some(arch.into());
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.cpu_threads.max_threads == 0 {
			return Err(GridError::InvalidConfig(
				"cpu_threads.max_threads must be at least 1".to_string(),
			));
		}
		if self.cpu_blocks.pool_threads == Some(0) {
			return Err(GridError::InvalidConfig(
				"cpu_blocks.pool_threads must be at least 1".to_string(),
			));
		}
		if self.queue_depth == 0 {
			return Err(GridError::InvalidConfig(
				"queue_depth must be at least 1".to_string(),
			));
		}
		Ok(())
	}

	pub fn build(self) -> Result<Self> {
		self.validate()?;
		Ok(self)
	}

	/// Worker count of the block pool after resolving the default.
	pub fn resolved_pool_threads(&self) -> usize {
		self.cpu_blocks.pool_threads.unwrap_or_else(|| {
			std::thread::available_parallelism()
				.map(|n| n.get())
				.unwrap_or(4)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_builder_chain() {
		let config = RuntimeConfig::builder()
			.with_poll_interval_us(10)
			.with_max_threads(64)
			.with_pool_threads(3)
			.with_thread_pinning(true)
			.with_stack_size(1 << 20)
			.with_cuda_arch("sm_80")
			.with_cuda_include_path("/opt/cuda/include")
			.build()
			.unwrap();

		assert_eq!(config.barrier.poll_interval_us, 10);
		assert_eq!(config.cpu_threads.max_threads, 64);
		assert_eq!(config.resolved_pool_threads(), 3);
		assert!(config.cpu_threads.pin_threads);
		assert!(config.cpu_blocks.pin_workers);
		assert_eq!(config.cpu_threads.stack_size, Some(1 << 20));
		assert_eq!(config.cuda.arch.as_deref(), Some("sm_80"));
		assert_eq!(config.cuda.include_paths, vec!["/opt/cuda/include".to_string()]);
	}

	#[test]
	fn test_validate_rejects_zero_limits() {
		assert!(matches!(
			RuntimeConfig::builder().with_max_threads(0).build(),
			Err(GridError::InvalidConfig(_))
		));
		assert!(matches!(
			RuntimeConfig::builder().with_pool_threads(0).build(),
			Err(GridError::InvalidConfig(_))
		));
		assert!(matches!(
			RuntimeConfig::builder().with_queue_depth(0).build(),
			Err(GridError::InvalidConfig(_))
		));
	}

	#[test]
	fn test_from_file_fills_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{"version": "0.1", "barrier": {{"poll_interval_us": 250}}}}"#
		)
		.unwrap();

		let config = RuntimeConfig::from_file(file.path()).unwrap();
		assert_eq!(config.barrier.poll_interval_us, 250);
		assert_eq!(config.cpu_threads, CpuThreadsConfig::default());
		assert_eq!(config.queue_depth, 100);
	}

	#[test]
	fn test_from_file_rejects_other_version() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"version": "0.0"}}"#).unwrap();

		match RuntimeConfig::from_file(file.path()) {
			Err(GridError::InvalidConfigVersion { found, expected }) => {
				assert_eq!(found, "0.0");
				assert_eq!(expected, RuntimeConfig::cfg_version());
			},
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn test_from_file_missing() {
		let dir = tempfile::tempdir().unwrap();
		let result = RuntimeConfig::from_file(dir.path().join("absent.json"));
		assert!(matches!(result, Err(GridError::ConfigIo { .. })));
	}

	#[test]
	fn test_json_round_trip_of_default() {
		let json = serde_json::to_string(&RuntimeConfig::default()).unwrap();
		let parsed: RuntimeConfig = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, RuntimeConfig::default());
	}
}
