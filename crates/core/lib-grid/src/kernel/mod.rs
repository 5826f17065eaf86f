// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

mod attributes;

pub use attributes::*;

use crate::dispatch::{Cooperation, Cooperative, Independent};
use crate::workdiv::WorkDiv;
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

/// A kernel body runnable by every thread of a launch.
///
/// Implement it generically over the context `A` with the capabilities the body needs,
/// e.g. `A: Acc<1> + CooperativeAcc` for a body that synchronizes the grid.
pub trait Kernel<A, Args>: Send + Sync {
	fn run(
		&self,
		acc: &A,
		args: &Args,
	);

	/// Dynamic shared memory one block needs.
	fn block_shared_mem_dyn_bytes(
		&self,
		_block_thread_count: usize,
		_thread_elem_count: usize,
		_args: &Args,
	) -> usize {
		0
	}

	/// Warp size the body relies on, if any.
	fn warp_size(&self) -> Option<u32> {
		None
	}
}

impl<A, Args, F> Kernel<A, Args> for F
where
	F: Fn(&A, &Args) + Send + Sync,
{
	fn run(
		&self,
		acc: &A,
		args: &Args,
	) {
		self(acc, args)
	}
}

/// One launch: kernel, argument snapshot and work division.
///
/// `C` fixes whether the launch is cooperative. Consumed by `enqueue`.
pub struct TaskKernel<const D: usize, K, Args, C: Cooperation> {
	work_div: WorkDiv<D>,
	kernel: K,
	args: Args,
	_cooperation: PhantomData<fn() -> C>,
}

impl<const D: usize, K, Args, C: Cooperation> TaskKernel<D, K, Args, C> {
	pub fn new(
		work_div: WorkDiv<D>,
		kernel: K,
		args: Args,
	) -> Self {
		Self {
			work_div,
			kernel,
			args,
			_cooperation: PhantomData,
		}
	}

	pub fn work_div(&self) -> &WorkDiv<D> {
		&self.work_div
	}

	pub fn kernel(&self) -> &K {
		&self.kernel
	}

	pub fn args(&self) -> &Args {
		&self.args
	}

	pub fn is_cooperative(&self) -> bool {
		C::IS_COOPERATIVE
	}

	pub fn kernel_name(&self) -> &'static str {
		type_name::<K>()
	}
}

impl<const D: usize, K, Args, C: Cooperation> fmt::Debug for TaskKernel<D, K, Args, C> {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		f.debug_struct("TaskKernel")
			.field("kernel", &self.kernel_name())
			.field("work_div", &self.work_div)
			.field("cooperative", &C::IS_COOPERATIVE)
			.finish()
	}
}

/// Task whose blocks run in any order, possibly not all at once.
pub fn create_task_kernel<const D: usize, K, Args>(
	work_div: WorkDiv<D>,
	kernel: K,
	args: Args,
) -> TaskKernel<D, K, Args, Independent> {
	TaskKernel::new(work_div, kernel, args)
}

/// Task whose blocks are all resident together and may synchronize grid-wide.
///
/// Enqueueing fails with `CapacityExceeded` when the back-end cannot keep the whole grid
/// resident; the grid is never clamped.
pub fn create_task_cooperative_kernel<const D: usize, K, Args>(
	work_div: WorkDiv<D>,
	kernel: K,
	args: Args,
) -> TaskKernel<D, K, Args, Cooperative> {
	TaskKernel::new(work_div, kernel, args)
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Fill;

	impl<A> Kernel<A, usize> for Fill {
		fn run(
			&self,
			_acc: &A,
			_args: &usize,
		) {
		}

		fn block_shared_mem_dyn_bytes(
			&self,
			block_thread_count: usize,
			_thread_elem_count: usize,
			args: &usize,
		) -> usize {
			block_thread_count * args
		}
	}

	#[test]
	fn test_task_flags_and_name() {
		let coop = create_task_cooperative_kernel(WorkDiv::<1>::new(4, 1, 1), Fill, 8usize);
		assert!(coop.is_cooperative());
		assert!(coop.kernel_name().ends_with("Fill"));
		assert_eq!(Kernel::<(), usize>::block_shared_mem_dyn_bytes(coop.kernel(), 2, 1, coop.args()), 16);

		let plain = create_task_kernel(WorkDiv::<1>::new(4, 1, 1), Fill, 0usize);
		assert!(!plain.is_cooperative());
		assert_eq!(plain.work_div().grid_block_count(), 4);
	}

	#[test]
	fn test_closures_are_kernels() {
		let k = |_: &(), n: &usize| assert_eq!(*n, 3);
		Kernel::run(&k, &(), &3usize);
		assert_eq!(Kernel::<(), usize>::warp_size(&k), None);
	}
}
