// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

//! Grid Barrier Latency Benchmark with Statistical Analysis
//!
//! Launches a cooperative kernel that does nothing but synchronize the grid and measures
//! each round trip from grid thread 0:
//! - Latency statistics (min, max, median, P95, P99)
//! - Stability metrics (CV, jitter)
//! - Blocking vs polling barrier at several thread counts
//!
//! **Run with**: cargo run --release --bin barrier-bench -- [--warmup N] [--iterations N] [--csv FILE]

use lib_grid::*;
use std::fs::File;
use std::io::Write;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const THREAD_COUNTS: [usize; 4] = [2, 4, 8, 16];

#[derive(Debug)]
struct BenchmarkConfig {
	warmup_iterations: usize,
	benchmark_iterations: usize,
	csv_path: Option<String>,
}

impl BenchmarkConfig {
	fn from_args() -> Result<Self, String> {
		let mut config = Self {
			warmup_iterations: 100,
			benchmark_iterations: 1000,
			csv_path: None,
		};

		let mut args = std::env::args().skip(1);
		while let Some(flag) = args.next() {
			let mut value = || args.next().ok_or_else(|| format!("{} needs a value", flag));
			match flag.as_str() {
				"--warmup" => config.warmup_iterations = parse_count(&value()?)?,
				"--iterations" => config.benchmark_iterations = parse_count(&value()?)?.max(1),
				"--csv" => config.csv_path = Some(value()?),
				other => return Err(format!("unknown argument {}", other)),
			}
		}
		Ok(config)
	}
}

fn parse_count(value: &str) -> Result<usize, String> {
	value.parse::<usize>().map_err(|_| format!("{} is not a count", value))
}

#[derive(Debug, Clone)]
struct BenchmarkResult {
	test_name: String,
	threads: usize,
	times_us: Vec<f64>,
	min_us: f64,
	max_us: f64,
	median_us: f64,
	avg_us: f64,
	std_dev_us: f64,
	p95_us: f64,
	p99_us: f64,
	cv_percent: f64,
	jitter_percent: f64,
}

impl BenchmarkResult {
	fn from_times(
		test_name: String,
		threads: usize,
		times: Vec<f64>,
	) -> Self {
		let mut sorted_times = times.clone();
		sorted_times.sort_by(|a, b| a.total_cmp(b));

		let n = sorted_times.len();
		let min_us = sorted_times[0];
		let max_us = sorted_times[n - 1];
		let avg_us: f64 = sorted_times.iter().sum::<f64>() / n as f64;
		let median_us = if n % 2 == 0 {
			(sorted_times[n / 2 - 1] + sorted_times[n / 2]) / 2.0
		} else {
			sorted_times[n / 2]
		};

		let variance: f64 = sorted_times
			.iter()
			.map(|&t| {
				let diff = t - avg_us;
				diff * diff
			})
			.sum::<f64>()
			/ n as f64;
		let std_dev_us = variance.sqrt();

		let p95_us = sorted_times[((n as f64 * 0.95) as usize).min(n - 1)];
		let p99_us = sorted_times[((n as f64 * 0.99) as usize).min(n - 1)];

		let cv_percent = (std_dev_us / avg_us) * 100.0;
		let jitter_percent = ((max_us - min_us) / avg_us) * 100.0;

		BenchmarkResult {
			test_name,
			threads,
			times_us: times,
			min_us,
			max_us,
			median_us,
			avg_us,
			std_dev_us,
			p95_us,
			p99_us,
			cv_percent,
			jitter_percent,
		}
	}
}

/// Round trips recorded by grid thread 0.
struct Samples {
	warmup: usize,
	iterations: usize,
	times_us: Mutex<Vec<f64>>,
	poisoned: AtomicBool,
}

struct Rendezvous;

impl<A: Acc<1> + CooperativeAcc> Kernel<A, Arc<Samples>> for Rendezvous {
	fn run(
		&self,
		acc: &A,
		samples: &Arc<Samples>,
	) {
		for _ in 0..samples.warmup {
			sync_grid_threads(acc);
		}

		let leader = acc.grid_thread_linear_idx() == 0;
		let mut local = Vec::with_capacity(if leader { samples.iterations } else { 0 });
		for _ in 0..samples.iterations {
			let start = Instant::now();
			sync_grid_threads(acc);
			if leader {
				local.push(start.elapsed().as_secs_f64() * 1_000_000.0);
			}
		}

		if leader {
			match samples.times_us.lock() {
				Ok(mut times) => *times = local,
				Err(_) => samples.poisoned.store(true, Ordering::Relaxed),
			}
		}
	}
}

fn run_barrier_benchmark<Bar: Barrier>(
	label: &str,
	threads: usize,
	config: &BenchmarkConfig,
) -> Result<BenchmarkResult, Box<dyn std::error::Error>> {
	let test_name = format!("{} barrier, {} threads", label, threads);
	println!("\n{}", "=".repeat(80));
	println!("🚀 Running: {}", test_name);
	println!("   Warmup:     {}", config.warmup_iterations);
	println!("   Iterations: {}", config.benchmark_iterations);
	println!("{}", "=".repeat(80));

	let runtime = RuntimeConfig::builder().with_max_threads(threads.max(1)).build()?;
	let dev = CpuThreads::<Bar>::dev_by_idx(&runtime, 0)?;
	let queue = Queue::<CpuThreads<Bar>, Blocking>::new(dev)?;

	let samples = Arc::new(Samples {
		warmup: config.warmup_iterations,
		iterations: config.benchmark_iterations,
		times_us: Mutex::new(Vec::new()),
		poisoned: AtomicBool::new(false),
	});

	let overall_start = Instant::now();
	let task = create_task_cooperative_kernel(WorkDiv::<1>::new(threads, 1, 1), Rendezvous, Arc::clone(&samples));
	enqueue(&queue, task)?;
	let overall_elapsed = overall_start.elapsed();

	println!(
		"   Total time: {:.2}s ({:.1} syncs/sec)",
		overall_elapsed.as_secs_f64(),
		(config.warmup_iterations + config.benchmark_iterations) as f64 / overall_elapsed.as_secs_f64()
	);

	if samples.poisoned.load(Ordering::Relaxed) {
		return Err("sample buffer poisoned".into());
	}
	let times = match samples.times_us.lock() {
		Ok(mut times) => std::mem::take(&mut *times),
		Err(_) => return Err("sample buffer poisoned".into()),
	};
	if times.is_empty() {
		return Err("no samples recorded".into());
	}

	Ok(BenchmarkResult::from_times(test_name, threads, times))
}

fn print_banner() {
	println!("\n╔═══════════════════════════════════════════════════════════════╗");
	println!("║      🔥 GRID BARRIER BENCHMARK - STATISTICAL ANALYSIS        ║");
	println!("║           Blocking vs Polling Round-Trip Latency              ║");
	println!("╚═══════════════════════════════════════════════════════════════╝\n");
}

fn print_result(result: &BenchmarkResult) {
	println!("\n╔═══════════════════════════════════════════════════════════════╗");
	println!("║  📊 {} Results", result.test_name);
	println!("╚═══════════════════════════════════════════════════════════════╝");

	println!("\n   ┌─────────────────────────────────────────┐");
	println!("   │ Timing Statistics (us)                  │");
	println!("   ├─────────────────┬───────────────────────┤");
	println!("   │ Min (Best)      │ {:>17.3} us │", result.min_us);
	println!("   │ Median (P50)    │ {:>17.3} us │", result.median_us);
	println!("   │ Average         │ {:>17.3} us │", result.avg_us);
	println!("   │ P95             │ {:>17.3} us │", result.p95_us);
	println!("   │ P99             │ {:>17.3} us │", result.p99_us);
	println!("   │ Max (Worst)     │ {:>17.3} us │", result.max_us);
	println!("   ├─────────────────┼───────────────────────┤");
	println!("   │ Std Deviation   │ {:>17.3} us │", result.std_dev_us);
	println!("   │ CV              │ {:>17.2}% │", result.cv_percent);
	println!("   │ Jitter          │ {:>17.2}% │", result.jitter_percent);
	println!("   └─────────────────┴───────────────────────┘");

	let cv_rating = if result.cv_percent < 10.0 {
		"Excellent ⭐⭐⭐"
	} else if result.cv_percent < 30.0 {
		"Very Good ⭐⭐"
	} else if result.cv_percent < 60.0 {
		"Good ⭐"
	} else {
		"Needs Investigation ⚠️"
	};

	println!("\n   ┌─────────────────────────────────────────┐");
	println!("   │ Stability Assessment                    │");
	println!("   ├─────────────────┬───────────────────────┤");
	println!("   │ Consistency     │ {:>21} │", cv_rating);
	println!("   │ Threads         │ {:>21} │", result.threads);
	println!("   │ Iterations      │ {:>21} │", result.times_us.len());
	println!("   └─────────────────┴───────────────────────┘");
}

fn compare_results(results: &[BenchmarkResult]) {
	println!("\n╔═══════════════════════════════════════════════════════════════╗");
	println!("║                 🆚 BLOCKING vs POLLING                        ║");
	println!("╚═══════════════════════════════════════════════════════════════╝\n");

	println!("   ┌─────────┬────────────────┬────────────────┬──────────┐");
	println!("   │ Threads │ Blocking (us)  │ Polling (us)   │ Speedup  │");
	println!("   ├─────────┼────────────────┼────────────────┼──────────┤");
	for threads in THREAD_COUNTS {
		let median = |prefix: &str| {
			results
				.iter()
				.find(|r| r.threads == threads && r.test_name.starts_with(prefix))
				.map(|r| r.median_us)
		};
		if let (Some(blocking), Some(polling)) = (median("Blocking"), median("Polling")) {
			println!(
				"   │ {:>7} │ {:>14.3} │ {:>14.3} │ {:>7.2}x │",
				threads,
				blocking,
				polling,
				blocking / polling
			);
		}
	}
	println!("   └─────────┴────────────────┴────────────────┴──────────┘");
}

fn write_results_to_csv(
	path: &str,
	results: &[BenchmarkResult],
) -> std::io::Result<()> {
	let mut file = File::create(path)?;
	writeln!(
		file,
		"test,threads,iterations,min_us,median_us,avg_us,p95_us,p99_us,max_us,std_dev_us,cv_percent,jitter_percent"
	)?;
	for r in results {
		writeln!(
			file,
			"{},{},{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.2},{:.2}",
			r.test_name,
			r.threads,
			r.times_us.len(),
			r.min_us,
			r.median_us,
			r.avg_us,
			r.p95_us,
			r.p99_us,
			r.max_us,
			r.std_dev_us,
			r.cv_percent,
			r.jitter_percent
		)?;
	}
	Ok(())
}

fn run(config: &BenchmarkConfig) -> Result<(), Box<dyn std::error::Error>> {
	let mut results = Vec::new();
	for threads in THREAD_COUNTS {
		let blocking = run_barrier_benchmark::<BlockingBarrier>("Blocking", threads, config)?;
		print_result(&blocking);
		results.push(blocking);

		let polling = run_barrier_benchmark::<PollingBarrier>("Polling", threads, config)?;
		print_result(&polling);
		results.push(polling);
	}

	compare_results(&results);

	if let Some(path) = &config.csv_path {
		write_results_to_csv(path, &results)?;
		println!("\n📄 Results written to {}", path);
	}
	Ok(())
}

fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.init();

	let config = match BenchmarkConfig::from_args() {
		Ok(config) => config,
		Err(e) => {
			eprintln!("❌ {}", e);
			eprintln!("Usage: barrier-bench [--warmup N] [--iterations N] [--csv FILE]");
			return ExitCode::FAILURE;
		},
	};

	print_banner();
	match run(&config) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, "benchmark aborted");
			ExitCode::FAILURE
		},
	}
}
