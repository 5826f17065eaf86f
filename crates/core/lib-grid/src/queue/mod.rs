// SPDX-License-Identifier: LicenseRef-PolyForm-Perimeter-1.0.1
// Copyright (c) 2026 Use-AI.rs
//
// This file is part of Use-Ai.rs
// See LICENSE for details

mod worker;

use crate::backend::{Backend, Execute};
use crate::dev::Device;
use crate::error::{GridError, Result};
use std::fmt;
use std::marker::PhantomData;
use worker::QueueWorker;

mod private {
	pub trait Sealed {}
}

pub trait QueueKind: private::Sealed + 'static {
	const BLOCKING: bool;
}

/// `enqueue` returns after the task has finished.
#[derive(Debug)]
pub enum Blocking {}

/// `enqueue` returns after validation; the task runs on the queue's worker thread.
#[derive(Debug)]
pub enum NonBlocking {}

impl private::Sealed for Blocking {}
impl private::Sealed for NonBlocking {}

impl QueueKind for Blocking {
	const BLOCKING: bool = true;
}

impl QueueKind for NonBlocking {
	const BLOCKING: bool = false;
}

/// In-order stream of tasks for one device of back-end `B`.
pub struct Queue<B: Backend, P: QueueKind> {
	dev: B::Dev,
	worker: Option<QueueWorker>,
	_kind: PhantomData<fn() -> P>,
}

impl<B: Backend> Queue<B, Blocking> {
	pub fn new(dev: B::Dev) -> Result<Self> {
		Ok(Self {
			dev,
			worker: None,
			_kind: PhantomData,
		})
	}
}

impl<B: Backend> Queue<B, NonBlocking> {
	pub fn new(dev: B::Dev) -> Result<Self> {
		let worker = QueueWorker::spawn(B::NAME, dev.config().queue_depth)?;
		Ok(Self {
			dev,
			worker: Some(worker),
			_kind: PhantomData,
		})
	}
}

impl<B: Backend, P: QueueKind> Queue<B, P> {
	pub fn dev(&self) -> &B::Dev {
		&self.dev
	}

	pub fn is_blocking(&self) -> bool {
		P::BLOCKING
	}
}

impl<B: Backend, P: QueueKind> fmt::Debug for Queue<B, P> {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		f.debug_struct("Queue")
			.field("backend", &B::NAME)
			.field("blocking", &P::BLOCKING)
			.finish()
	}
}

pub trait Enqueue<T> {
	/// Submits `task`. Validation, including the resident block check of cooperative
	/// tasks, always happens before this returns.
	fn enqueue(
		&self,
		task: T,
	) -> Result<()>;
}

pub trait Wait {
	/// Returns once every task enqueued so far has finished, with the first error an
	/// asynchronous launch raised since the previous wait.
	fn wait(&self) -> Result<()>;
}

impl<B, T> Enqueue<T> for Queue<B, Blocking>
where
	B: Execute<T>,
{
	fn enqueue(
		&self,
		task: T,
	) -> Result<()> {
		B::validate(&self.dev, &task)?;
		B::launch(&self.dev, &task)?;
		B::synchronize(&self.dev)
	}
}

impl<B, T> Enqueue<T> for Queue<B, NonBlocking>
where
	B: Execute<T>,
	T: Send + 'static,
{
	fn enqueue(
		&self,
		task: T,
	) -> Result<()> {
		B::validate(&self.dev, &task)?;

		let dev = self.dev.clone();
		let job = Box::new(move || B::launch(&dev, &task));
		match &self.worker {
			Some(worker) => worker.submit(std::any::type_name::<T>(), job),
			None => Err(GridError::QueueClosed),
		}
	}
}

impl<B: Backend> Wait for Queue<B, Blocking> {
	fn wait(&self) -> Result<()> {
		B::synchronize(&self.dev)
	}
}

impl<B: Backend> Wait for Queue<B, NonBlocking> {
	fn wait(&self) -> Result<()> {
		if let Some(worker) = &self.worker {
			worker.wait()?;
		}
		B::synchronize(&self.dev)
	}
}

/// Submits `task` to `queue`.
pub fn enqueue<Q, T>(
	queue: &Q,
	task: T,
) -> Result<()>
where
	Q: Enqueue<T>,
{
	queue.enqueue(task)
}

/// Blocks until `queue` has drained.
pub fn wait<Q: Wait>(queue: &Q) -> Result<()> {
	queue.wait()
}
