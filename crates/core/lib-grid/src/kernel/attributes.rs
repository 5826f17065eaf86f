// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use crate::backend::Backend;
use crate::dev::AccDevProps;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernelFunctionAttributes {
	pub max_threads_per_block: usize,

	pub shared_size_bytes: usize,

	pub num_regs: usize,
}

impl KernelFunctionAttributes {
	/// Attributes of a host kernel: no registers, limits taken from the device.
	pub fn from_props(
		props: &AccDevProps,
		shared_size_bytes: usize,
	) -> Self {
		Self {
			max_threads_per_block: props.block_thread_count_max,
			shared_size_bytes,
			num_regs: 0,
		}
	}
}

/// Attributes of `kernel` compiled for back-end `B`.
pub fn get_function_attributes<B, K>(
	dev: &B::Dev,
	kernel: &K,
) -> Result<KernelFunctionAttributes>
where
	B: FunctionAttributes<K>,
{
	B::function_attributes(dev, kernel)
}

pub trait FunctionAttributes<K>: Backend {
	fn function_attributes(
		dev: &Self::Dev,
		kernel: &K,
	) -> Result<KernelFunctionAttributes>;
}
