// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierTuning {
	/// Sleep between two polls of [`PollingBarrier`]; zero yields instead.
	pub poll_interval_us: u64,
}

impl Default for BarrierTuning {
	fn default() -> Self {
		Self {
			poll_interval_us: 100,
		}
	}
}

impl BarrierTuning {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_micros(self.poll_interval_us)
	}
}

/// Reusable rendezvous for a fixed number of threads.
///
/// Every cycle needs exactly `thread_count` callers of [`Barrier::wait`]. With fewer the
/// callers block forever. The barrier resets itself, so one instance serves any number of
/// consecutive cycles inside a kernel body.
pub trait Barrier: Send + Sync + 'static {
	fn new(
		thread_count: usize,
		tuning: &BarrierTuning,
	) -> Self
	where
		Self: Sized;

	fn wait(&self);

	fn thread_count(&self) -> usize;

	/// Number of completed cycles.
	fn generation(&self) -> u64;
}

#[derive(Debug)]
struct BarrierState {
	remaining: usize,
	generation: u64,
}

/// Mutex and condition variable realization. Waiters are parked by the OS.
#[derive(Debug)]
pub struct BlockingBarrier {
	thread_count: usize,
	state: Mutex<BarrierState>,
	released: Condvar,
}

impl Barrier for BlockingBarrier {
	fn new(
		thread_count: usize,
		_tuning: &BarrierTuning,
	) -> Self {
		assert!(thread_count > 0, "a barrier needs at least one thread");
		Self {
			thread_count,
			state: Mutex::new(BarrierState {
				remaining: thread_count,
				generation: 0,
			}),
			released: Condvar::new(),
		}
	}

	fn wait(&self) {
		// The critical sections below cannot panic, so a poisoned lock still holds a
		// consistent state.
		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		let generation = state.generation;
		state.remaining -= 1;

		if state.remaining == 0 {
			state.remaining = self.thread_count;
			state.generation = state.generation.wrapping_add(1);
			drop(state);
			self.released.notify_all();
		} else {
			let _released = self
				.released
				.wait_while(state, |s| s.generation == generation)
				.unwrap_or_else(PoisonError::into_inner);
		}
	}

	fn thread_count(&self) -> usize {
		self.thread_count
	}

	fn generation(&self) -> u64 {
		self.state
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.generation
	}
}

/// Atomic countdown with sleep-and-poll waiting.
///
/// Fits task pools where a parked OS thread is more expensive than a short sleep, at the
/// price of up to one poll interval of extra latency per cycle.
#[derive(Debug)]
pub struct PollingBarrier {
	thread_count: usize,
	remaining: AtomicUsize,
	generation: AtomicU64,
	poll_interval: Duration,
}

impl Barrier for PollingBarrier {
	fn new(
		thread_count: usize,
		tuning: &BarrierTuning,
	) -> Self {
		assert!(thread_count > 0, "a barrier needs at least one thread");
		Self {
			thread_count,
			remaining: AtomicUsize::new(thread_count),
			generation: AtomicU64::new(0),
			poll_interval: tuning.poll_interval(),
		}
	}

	fn wait(&self) {
		let generation = self.generation.load(Ordering::Acquire);

		// AcqRel chains the release sequence of every arrival into the last one.
		if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
			self.remaining.store(self.thread_count, Ordering::Relaxed);
			self.generation.fetch_add(1, Ordering::Release);
			return;
		}

		while self.generation.load(Ordering::Acquire) == generation {
			if self.poll_interval.is_zero() {
				thread::yield_now();
			} else {
				thread::sleep(self.poll_interval);
			}
		}
	}

	fn thread_count(&self) -> usize {
		self.thread_count
	}

	fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::Arc;

	fn fast() -> BarrierTuning {
		BarrierTuning {
			poll_interval_us: 0,
		}
	}

	/// Runs `cycles` rendezvous with `threads` threads. Every thread checks after each cycle
	/// that all arrivals of that cycle happened and no arrival of the cycle after next did.
	fn run_cycles<B: Barrier>(
		threads: usize,
		cycles: usize,
		tuning: &BarrierTuning,
	) -> Arc<B> {
		let barrier = Arc::new(B::new(threads, tuning));
		let arrived = Arc::new(AtomicUsize::new(0));

		thread::scope(|s| {
			for _ in 0..threads {
				let barrier = Arc::clone(&barrier);
				let arrived = Arc::clone(&arrived);
				s.spawn(move || {
					for k in 0..cycles {
						arrived.fetch_add(1, Ordering::SeqCst);
						barrier.wait();
						let seen = arrived.load(Ordering::SeqCst);
						assert!(seen >= threads * (k + 1), "left cycle {} early", k);
						assert!(seen < threads * (k + 2), "cycle {} overtaken", k + 1);
					}
				});
			}
		});

		assert_eq!(arrived.load(Ordering::SeqCst), threads * cycles);
		barrier
	}

	#[test]
	fn test_blocking_barrier_thousand_cycles() {
		for threads in [1, 2, 3, 8, 17] {
			let barrier = run_cycles::<BlockingBarrier>(threads, 1000, &fast());
			assert_eq!(barrier.generation(), 1000);
		}
	}

	#[test]
	fn test_polling_barrier_thousand_cycles() {
		for threads in [1, 2, 5, 8] {
			let barrier = run_cycles::<PollingBarrier>(threads, 1000, &fast());
			assert_eq!(barrier.generation(), 1000);
		}
	}

	#[test]
	fn test_polling_barrier_default_interval() {
		let barrier = run_cycles::<PollingBarrier>(4, 50, &BarrierTuning::default());
		assert_eq!(barrier.generation(), 50);
	}

	#[test]
	fn test_single_thread_never_blocks() {
		let barrier = BlockingBarrier::new(1, &fast());
		for _ in 0..10 {
			barrier.wait();
		}
		assert_eq!(barrier.generation(), 10);
		assert_eq!(barrier.thread_count(), 1);
	}

	#[test]
	fn test_writes_before_wait_are_visible_after() {
		let threads = 6;
		let slots: Arc<Vec<AtomicUsize>> = Arc::new((0..threads).map(|_| AtomicUsize::new(0)).collect());
		let barrier = Arc::new(BlockingBarrier::new(threads, &fast()));

		thread::scope(|s| {
			for t in 0..threads {
				let slots = Arc::clone(&slots);
				let barrier = Arc::clone(&barrier);
				s.spawn(move || {
					for round in 1..=100 {
						slots[t].store(round * (t + 1), Ordering::Relaxed);
						barrier.wait();
						for (other, slot) in slots.iter().enumerate() {
							assert_eq!(slot.load(Ordering::Relaxed), round * (other + 1));
						}
						barrier.wait();
					}
				});
			}
		});
	}

	#[test]
	#[should_panic(expected = "at least one thread")]
	fn test_zero_threads_rejected() {
		let _ = PollingBarrier::new(0, &fast());
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(16))]

		#[test]
		fn blocking_generation_counts_cycles(threads in 1usize..6, cycles in 1usize..60) {
			let barrier = run_cycles::<BlockingBarrier>(threads, cycles, &fast());
			prop_assert_eq!(barrier.generation(), cycles as u64);
		}

		#[test]
		fn polling_generation_counts_cycles(threads in 1usize..6, cycles in 1usize..60) {
			let barrier = run_cycles::<PollingBarrier>(threads, cycles, &fast());
			prop_assert_eq!(barrier.generation(), cycles as u64);
		}
	}
}
