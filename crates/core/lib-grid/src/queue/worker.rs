// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

use crate::error::{GridError, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use std::thread;

pub(crate) type Job = Box<dyn FnOnce() -> Result<()> + Send>;

pub(crate) enum QueueCommand {
	Execute { job: Job, kernel: &'static str },
	Wait { response: Sender<QueueResponse> },
	Shutdown,
}

#[derive(Debug)]
pub(crate) enum QueueResponse {
	Idle,
	Failed { error: GridError },
}

/// Runs jobs in submission order. The first failure since the last `Wait` is held back
/// and handed to the next waiter.
pub(crate) fn queue_worker(rx: Receiver<QueueCommand>) {
	let mut failure: Option<GridError> = None;

	while let Ok(command) = rx.recv() {
		match command {
			QueueCommand::Execute { job, kernel } => {
				if let Err(error) = job() {
					tracing::error!(kernel, %error, "asynchronous launch failed");
					failure.get_or_insert(error);
				}
			},
			QueueCommand::Wait { response } => {
				let resp = match failure.take() {
					Some(error) => QueueResponse::Failed { error },
					None => QueueResponse::Idle,
				};
				let _ = response.send(resp);
			},
			QueueCommand::Shutdown => break,
		}
	}

	tracing::trace!("queue worker stopped");
}

pub(crate) struct QueueWorker {
	tx: Sender<QueueCommand>,
	handle: Option<thread::JoinHandle<()>>,
}

impl QueueWorker {
	pub(crate) fn spawn(
		name: &str,
		depth: usize,
	) -> Result<Self> {
		let (tx, rx) = bounded::<QueueCommand>(depth);
		let handle = thread::Builder::new()
			.name(format!("grid-queue-{}", name))
			.spawn(move || queue_worker(rx))?;

		Ok(Self {
			tx,
			handle: Some(handle),
		})
	}

	pub(crate) fn submit(
		&self,
		kernel: &'static str,
		job: Job,
	) -> Result<()> {
		self.tx.send(QueueCommand::Execute { job, kernel })?;
		Ok(())
	}

	pub(crate) fn wait(&self) -> Result<()> {
		let (response_tx, response_rx) = bounded(1);
		self.tx.send(QueueCommand::Wait {
			response: response_tx,
		})?;

		match response_rx.recv()? {
			QueueResponse::Idle => Ok(()),
			QueueResponse::Failed { error } => Err(error),
		}
	}
}

impl Drop for QueueWorker {
	fn drop(&mut self) {
		let _ = self.tx.send(QueueCommand::Shutdown);
		if let Some(handle) = self.handle.take() {
			if handle.join().is_err() {
				tracing::error!("queue worker panicked");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[test]
	fn test_jobs_run_in_order() {
		let worker = QueueWorker::spawn("test", 4).unwrap();
		let next = Arc::new(AtomicUsize::new(0));

		for expected in 0..10 {
			let next = Arc::clone(&next);
			worker
				.submit(
					"order",
					Box::new(move || {
						assert_eq!(next.fetch_add(1, Ordering::SeqCst), expected);
						Ok(())
					}),
				)
				.unwrap();
		}

		worker.wait().unwrap();
		assert_eq!(next.load(Ordering::SeqCst), 10);
	}

	#[test]
	fn test_failure_reported_once() {
		let worker = QueueWorker::spawn("test", 4).unwrap();
		worker
			.submit(
				"broken",
				Box::new(|| Err(GridError::InvalidConfig("broken".to_string()))),
			)
			.unwrap();

		assert!(matches!(worker.wait(), Err(GridError::InvalidConfig(_))));
		assert!(worker.wait().is_ok());
	}
}
