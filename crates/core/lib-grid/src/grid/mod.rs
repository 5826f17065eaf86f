// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

mod barrier;
mod sync;

pub use barrier::*;
pub use sync::*;

#[cfg(feature = "cuda")]
/// Device-side helpers for CUDA kernels launched cooperatively. Prepend to the kernel
/// source; `sync_grid_threads()` is the hardware grid barrier.
pub const CUDA_GRID_SYNC_PRELUDE: &str = r#"
#include <cooperative_groups.h>

__device__ __forceinline__ void sync_grid_threads()
{
	cooperative_groups::this_grid().sync();
}

__device__ __forceinline__ unsigned long long grid_thread_linear_idx()
{
	return cooperative_groups::this_grid().thread_rank();
}

__device__ __forceinline__ unsigned long long grid_thread_count()
{
	return cooperative_groups::this_grid().size();
}
"#;
