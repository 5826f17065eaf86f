// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use std::sync::atomic::AtomicU32;

/// Per-block dynamic shared memory on CPU back-ends, addressed in 32-bit words.
///
/// Threads of a block share one instance. Accesses go through atomics, so ordering between
/// threads comes from the caller (a grid sync or an explicit atomic protocol).
#[derive(Debug, Default)]
pub struct SharedMem {
	words: Box<[AtomicU32]>,
}

impl SharedMem {
	/// Allocates at least `bytes`, rounded up to whole words and zeroed.
	pub fn with_bytes(bytes: usize) -> Self {
		let word_count = bytes.div_ceil(4);
		Self {
			words: (0..word_count).map(|_| AtomicU32::new(0)).collect(),
		}
	}

	pub fn words(&self) -> &[AtomicU32] {
		&self.words
	}

	pub fn len_bytes(&self) -> usize {
		self.words.len() * 4
	}

	pub fn is_empty(&self) -> bool {
		self.words.is_empty()
	}
}
