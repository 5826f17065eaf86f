// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

mod vec;

pub use vec::DimVec;

use std::fmt;

/// Three-level decomposition of a launch: blocks per grid, threads per block,
/// elements per thread.
///
/// Every component of every extent is at least one. A zero extent would describe a
/// launch that silently does nothing, so construction panics instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkDiv<const D: usize> {
	grid_block_extent: DimVec<D>,
	block_thread_extent: DimVec<D>,
	thread_elem_extent: DimVec<D>,
}

impl<const D: usize> WorkDiv<D> {
	const DIM_SUPPORTED: () = assert!(D >= 1 && D <= 3, "work divisions have 1, 2 or 3 dimensions");

	pub fn new(
		grid_block_extent: impl Into<DimVec<D>>,
		block_thread_extent: impl Into<DimVec<D>>,
		thread_elem_extent: impl Into<DimVec<D>>,
	) -> Self {
		let _: () = Self::DIM_SUPPORTED;

		let grid_block_extent = grid_block_extent.into();
		let block_thread_extent = block_thread_extent.into();
		let thread_elem_extent = thread_elem_extent.into();

		assert!(
			!grid_block_extent.contains_zero(),
			"grid block extent {} has a zero component",
			grid_block_extent
		);
		assert!(
			!block_thread_extent.contains_zero(),
			"block thread extent {} has a zero component",
			block_thread_extent
		);
		assert!(
			!thread_elem_extent.contains_zero(),
			"thread element extent {} has a zero component",
			thread_elem_extent
		);

		Self {
			grid_block_extent,
			block_thread_extent,
			thread_elem_extent,
		}
	}

	pub fn grid_block_extent(&self) -> DimVec<D> {
		self.grid_block_extent
	}

	pub fn block_thread_extent(&self) -> DimVec<D> {
		self.block_thread_extent
	}

	pub fn thread_elem_extent(&self) -> DimVec<D> {
		self.thread_elem_extent
	}

	pub fn grid_thread_extent(&self) -> DimVec<D> {
		self.grid_block_extent * self.block_thread_extent
	}

	pub fn block_elem_extent(&self) -> DimVec<D> {
		self.block_thread_extent * self.thread_elem_extent
	}

	pub fn grid_elem_extent(&self) -> DimVec<D> {
		self.grid_thread_extent() * self.thread_elem_extent
	}

	pub fn grid_block_count(&self) -> usize {
		self.grid_block_extent.prod()
	}

	pub fn block_thread_count(&self) -> usize {
		self.block_thread_extent.prod()
	}

	pub fn thread_elem_count(&self) -> usize {
		self.thread_elem_extent.prod()
	}

	pub fn grid_thread_count(&self) -> usize {
		self.grid_block_count() * self.block_thread_count()
	}
}

impl<const D: usize> fmt::Display for WorkDiv<D> {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		write!(
			f,
			"{{gridBlockExtent: {}, blockThreadExtent: {}, threadElemExtent: {}}}",
			self.grid_block_extent, self.block_thread_extent, self.thread_elem_extent
		)
	}
}
