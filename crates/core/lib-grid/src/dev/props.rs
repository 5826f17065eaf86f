// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use crate::error::{GridError, Result};
use crate::workdiv::{DimVec, WorkDiv};

/// Hard limits of one back-end on one device. Axis arrays are ordered `[x, y, z]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccDevProps {
	pub multi_processor_count: usize,

	pub grid_block_extent_max: [usize; 3],

	pub grid_block_count_max: usize,

	pub block_thread_extent_max: [usize; 3],

	pub block_thread_count_max: usize,

	pub thread_elem_extent_max: [usize; 3],

	pub thread_elem_count_max: usize,

	pub shared_mem_size_bytes: usize,

	pub warp_sizes: Vec<u32>,

	pub supports_cooperative_launch: bool,
}

impl AccDevProps {
	fn extent_max<const D: usize>(axes: &[usize; 3]) -> DimVec<D> {
		let mut extent = DimVec::<D>::zeros();
		for d in 0..D.min(3) {
			extent[d] = axes[D - 1 - d];
		}
		extent
	}

	pub fn grid_block_extent_max_vec<const D: usize>(&self) -> DimVec<D> {
		Self::extent_max(&self.grid_block_extent_max)
	}

	pub fn block_thread_extent_max_vec<const D: usize>(&self) -> DimVec<D> {
		Self::extent_max(&self.block_thread_extent_max)
	}

	pub fn thread_elem_extent_max_vec<const D: usize>(&self) -> DimVec<D> {
		Self::extent_max(&self.thread_elem_extent_max)
	}

	pub fn supports_warp_size(
		&self,
		warp_size: u32,
	) -> bool {
		self.warp_sizes.contains(&warp_size)
	}

	/// Checks a work division against these limits.
	pub fn validate_work_div<const D: usize>(
		&self,
		device: &str,
		work_div: &WorkDiv<D>,
	) -> Result<()> {
		check_extent(
			device,
			"grid block",
			work_div.grid_block_extent(),
			self.grid_block_extent_max_vec(),
			work_div.grid_block_count(),
			self.grid_block_count_max,
		)?;
		check_extent(
			device,
			"block thread",
			work_div.block_thread_extent(),
			self.block_thread_extent_max_vec(),
			work_div.block_thread_count(),
			self.block_thread_count_max,
		)?;
		check_extent(
			device,
			"thread element",
			work_div.thread_elem_extent(),
			self.thread_elem_extent_max_vec(),
			work_div.thread_elem_count(),
			self.thread_elem_count_max,
		)
	}

	/// Checks what a kernel asks of the device beyond the work division.
	pub fn validate_kernel_requirements(
		&self,
		device: &str,
		warp_size: Option<u32>,
		shared_mem_bytes: usize,
	) -> Result<()> {
		if let Some(warp_size) = warp_size {
			if !self.supports_warp_size(warp_size) {
				return Err(GridError::unsupported(
					device,
					format!(
						"warp size {} requested, device supports {:?}",
						warp_size, self.warp_sizes
					),
				));
			}
		}
		if shared_mem_bytes > self.shared_mem_size_bytes {
			return Err(GridError::unsupported(
				device,
				format!(
					"kernel needs {} bytes of block shared memory, device offers {}",
					shared_mem_bytes, self.shared_mem_size_bytes
				),
			));
		}
		Ok(())
	}
}

fn check_extent<const D: usize>(
	device: &str,
	what: &str,
	extent: DimVec<D>,
	extent_max: DimVec<D>,
	count: usize,
	count_max: usize,
) -> Result<()> {
	for d in 0..D {
		if extent[d] > extent_max[d] {
			return Err(GridError::unsupported(
				device,
				format!(
					"{} extent {} exceeds the maximum {}",
					what, extent, extent_max
				),
			));
		}
	}
	if count > count_max {
		return Err(GridError::unsupported(
			device,
			format!(
				"{} count {} exceeds the maximum {}",
				what, count, count_max
			),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn props() -> AccDevProps {
		AccDevProps {
			multi_processor_count: 4,
			grid_block_extent_max: [usize::MAX; 3],
			grid_block_count_max: usize::MAX,
			block_thread_extent_max: [8, 4, 1],
			block_thread_count_max: 16,
			thread_elem_extent_max: [usize::MAX; 3],
			thread_elem_count_max: usize::MAX,
			shared_mem_size_bytes: 1024,
			warp_sizes: vec![1],
			supports_cooperative_launch: true,
		}
	}

	#[test]
	fn test_axis_order_maps_x_to_last_component() {
		let p = props();
		assert_eq!(p.block_thread_extent_max_vec::<1>(), DimVec::new([8]));
		assert_eq!(p.block_thread_extent_max_vec::<2>(), DimVec::new([4, 8]));
		assert_eq!(p.block_thread_extent_max_vec::<3>(), DimVec::new([1, 4, 8]));
	}

	#[test]
	fn test_work_div_limits() {
		let p = props();
		assert!(p.validate_work_div("cpu", &WorkDiv::<2>::new([3, 3], [2, 8], [1, 1])).is_ok());
		assert!(matches!(
			p.validate_work_div("cpu", &WorkDiv::<2>::new([1, 1], [1, 9], [1, 1])),
			Err(GridError::UnsupportedConfiguration { .. })
		));
		assert!(matches!(
			p.validate_work_div("cpu", &WorkDiv::<2>::new([1, 1], [4, 8], [1, 1])),
			Err(GridError::UnsupportedConfiguration { .. })
		));
	}

	#[test]
	fn test_kernel_requirements() {
		let p = props();
		assert!(p.validate_kernel_requirements("cpu", Some(1), 1024).is_ok());
		assert!(p.validate_kernel_requirements("cpu", Some(32), 0).is_err());
		assert!(p.validate_kernel_requirements("cpu", None, 1025).is_err());
	}
}
