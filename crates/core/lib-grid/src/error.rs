// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use thiserror::Error;

pub type Result<T> = core::result::Result<T, GridError>;

#[derive(Debug, Error)]
pub enum GridError {
	#[error(
		"requested {requested} blocks for kernel {kernel} on {device}, but at most {max} can be \
		 resident at once; query get_max_active_blocks() and shrink the grid"
	)]
	CapacityExceeded {
		kernel: &'static str,
		device: String,
		requested: usize,
		max: usize,
	},

	#[error("unsupported configuration on {device}: {reason}")]
	UnsupportedConfiguration { device: String, reason: String },

	#[error("Invalid device index: {idx}. Available devices: {count}")]
	InvalidDevice { idx: usize, count: usize },

	#[error("kernel panicked on {backend} in grid thread {thread}")]
	KernelPanic { backend: &'static str, thread: usize },

	#[error("Failed to spawn grid thread: {0}")]
	Spawn(#[from] std::io::Error),

	#[error("Failed to build block thread pool: {0}")]
	PoolBuild(String),

	#[error("Queue worker is gone")]
	QueueClosed,

	#[error("Failed to read config {path}: {source}")]
	ConfigIo {
		path: String,
		source: std::io::Error,
	},

	#[error(transparent)]
	ConfigParse(#[from] serde_json::Error),

	#[error("Config version is {found}, expected {expected}")]
	InvalidConfigVersion { found: String, expected: String },

	#[error("Invalid config: {0}")]
	InvalidConfig(String),

	#[cfg(feature = "cuda")]
	#[error("CUDA error: {0}")]
	Cuda(String),
}

impl GridError {
	pub(crate) fn unsupported(
		device: &str,
		reason: impl Into<String>,
	) -> Self {
		GridError::UnsupportedConfiguration {
			device: device.to_string(),
			reason: reason.into(),
		}
	}
}

impl<T> From<crossbeam::channel::SendError<T>> for GridError {
	fn from(_: crossbeam::channel::SendError<T>) -> Self {
		GridError::QueueClosed
	}
}

impl From<crossbeam::channel::RecvError> for GridError {
	fn from(_: crossbeam::channel::RecvError) -> Self {
		GridError::QueueClosed
	}
}

#[cfg(feature = "cpu-blocks")]
impl From<rayon::ThreadPoolBuildError> for GridError {
	fn from(e: rayon::ThreadPoolBuildError) -> Self {
		GridError::PoolBuild(e.to_string())
	}
}

#[cfg(feature = "cuda")]
impl From<cudarc::driver::DriverError> for GridError {
	fn from(e: cudarc::driver::DriverError) -> Self {
		GridError::Cuda(e.to_string())
	}
}

#[cfg(feature = "cuda")]
impl From<cudarc::nvrtc::CompileError> for GridError {
	fn from(e: cudarc::nvrtc::CompileError) -> Self {
		GridError::Cuda(format!("{:?}", e))
	}
}
