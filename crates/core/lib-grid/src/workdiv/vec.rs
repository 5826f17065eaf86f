// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul};

/// Fixed-dimension index or extent vector.
///
/// The last component is the fastest varying one (the `x` axis of a device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimVec<const D: usize>([usize; D]);

impl<const D: usize> DimVec<D> {
	pub const fn new(components: [usize; D]) -> Self {
		Self(components)
	}

	pub const fn zeros() -> Self {
		Self([0; D])
	}

	pub const fn ones() -> Self {
		Self([1; D])
	}

	pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
		self.0.iter().copied()
	}

	/// Product of all components.
	pub fn prod(&self) -> usize {
		self.0.iter().product()
	}

	pub fn contains_zero(&self) -> bool {
		self.0.contains(&0)
	}

	pub fn elementwise_min(
		self,
		other: Self,
	) -> Self {
		Self(std::array::from_fn(|d| self.0[d].min(other.0[d])))
	}

	pub fn elementwise_max(
		self,
		other: Self,
	) -> Self {
		Self(std::array::from_fn(|d| self.0[d].max(other.0[d])))
	}

	/// Component of the given device axis (`0` = x, `1` = y, `2` = z).
	pub fn axis(
		&self,
		axis: usize,
	) -> Option<usize> {
		if axis < D {
			Some(self.0[D - 1 - axis])
		} else {
			None
		}
	}

	/// Row-major linearization of `idx` inside `extent`.
	pub fn map_idx_to_linear(
		idx: Self,
		extent: Self,
	) -> usize {
		let mut linear = 0;
		for d in 0..D {
			debug_assert!(idx.0[d] < extent.0[d]);
			linear = linear * extent.0[d] + idx.0[d];
		}
		linear
	}

	/// Inverse of [`DimVec::map_idx_to_linear`].
	pub fn map_linear_to_idx(
		mut linear: usize,
		extent: Self,
	) -> Self {
		let mut idx = [0; D];
		for d in (0..D).rev() {
			idx[d] = linear % extent.0[d];
			linear /= extent.0[d];
		}
		Self(idx)
	}
}

impl<const D: usize> Default for DimVec<D> {
	fn default() -> Self {
		Self::zeros()
	}
}

impl<const D: usize> From<[usize; D]> for DimVec<D> {
	fn from(components: [usize; D]) -> Self {
		Self(components)
	}
}

impl From<usize> for DimVec<1> {
	fn from(value: usize) -> Self {
		Self([value])
	}
}

impl<const D: usize> Index<usize> for DimVec<D> {
	type Output = usize;

	fn index(
		&self,
		d: usize,
	) -> &usize {
		&self.0[d]
	}
}

impl<const D: usize> IndexMut<usize> for DimVec<D> {
	fn index_mut(
		&mut self,
		d: usize,
	) -> &mut usize {
		&mut self.0[d]
	}
}

impl<const D: usize> Mul for DimVec<D> {
	type Output = Self;

	fn mul(
		self,
		rhs: Self,
	) -> Self {
		Self(std::array::from_fn(|d| self.0[d] * rhs.0[d]))
	}
}

impl<const D: usize> Add for DimVec<D> {
	type Output = Self;

	fn add(
		self,
		rhs: Self,
	) -> Self {
		Self(std::array::from_fn(|d| self.0[d] + rhs.0[d]))
	}
}

impl<const D: usize> fmt::Display for DimVec<D> {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		write!(f, "(")?;
		for (d, value) in self.0.iter().enumerate() {
			if d > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{}", value)?;
		}
		write!(f, ")")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_prod_and_display() {
		let v = DimVec::new([2, 3, 4]);
		assert_eq!(v.prod(), 24);
		assert_eq!(v.to_string(), "(2, 3, 4)");
		assert_eq!(v.axis(0), Some(4));
		assert_eq!(v.axis(2), Some(2));
		assert_eq!(v.axis(3), None);
	}

	#[test]
	fn test_last_component_varies_fastest() {
		let extent = DimVec::new([2, 3]);
		assert_eq!(DimVec::map_idx_to_linear(DimVec::new([0, 1]), extent), 1);
		assert_eq!(DimVec::map_idx_to_linear(DimVec::new([1, 0]), extent), 3);
		assert_eq!(DimVec::map_linear_to_idx(5, extent), DimVec::new([1, 2]));
	}

	#[test]
	fn test_elementwise_ops() {
		let a = DimVec::new([1, 5]);
		let b = DimVec::new([3, 2]);
		assert_eq!(a * b, DimVec::new([3, 10]));
		assert_eq!(a + b, DimVec::new([4, 7]));
		assert_eq!(a.elementwise_min(b), DimVec::new([1, 2]));
		assert_eq!(a.elementwise_max(b), DimVec::new([3, 5]));
	}

	proptest! {
		#[test]
		fn linear_index_stays_inside_extent(
			ex in 1usize..8,
			ey in 1usize..8,
			ez in 1usize..8,
			seed in any::<usize>(),
		) {
			let extent = DimVec::new([ex, ey, ez]);
			let linear = seed % extent.prod();
			let idx = DimVec::map_linear_to_idx(linear, extent);
			for d in 0..3 {
				prop_assert!(idx[d] < extent[d]);
			}
			prop_assert_eq!(DimVec::map_idx_to_linear(idx, extent), linear);
		}
	}
}
