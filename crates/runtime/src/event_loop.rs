//! Single-threaded FIFO event loop.
//!
//! Tasks are closures receiving the [`Runtime`]; they run one at a time on the
//! thread that called [`Runtime::run`], in posting order. Timers post their
//! task once the delay elapses. The loop runs until [`EventLoop::shutdown`] is
//! requested or the process receives an interrupt; tasks already queued at
//! that point still run, tasks posted afterwards are dropped.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::Runtime;
use crate::error::{Error, Result};

/// Unit of work executed by the event loop.
pub type Task = Box<dyn FnOnce(&Runtime) + 'static>;

struct Timer {
	deadline: Instant,
	task: Task,
}

struct Queues {
	tasks: UnboundedReceiver<Task>,
	timers: UnboundedReceiver<Timer>,
}

/// Cloneable, thread-safe shutdown trigger for an [`EventLoop`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
	token: CancellationToken,
}

impl ShutdownHandle {
	/// Requests shutdown. Returns `false` if it was already requested.
	pub fn shutdown(&self) -> bool {
		let first = !self.token.is_cancelled();
		self.token.cancel();
		first
	}

	pub fn is_shutdown_requested(&self) -> bool {
		self.token.is_cancelled()
	}
}

pub struct EventLoop {
	tasks: UnboundedSender<Task>,
	timers: UnboundedSender<Timer>,
	queues: RefCell<Option<Queues>>,
	shutdown: CancellationToken,
}

impl EventLoop {
	pub fn new() -> Self {
		let (tasks, task_rx) = unbounded_channel();
		let (timers, timer_rx) = unbounded_channel();
		Self {
			tasks,
			timers,
			queues: RefCell::new(Some(Queues {
				tasks: task_rx,
				timers: timer_rx,
			})),
			shutdown: CancellationToken::new(),
		}
	}

	/// Queues `task` behind everything posted before it.
	pub fn post(&self, task: impl FnOnce(&Runtime) + 'static) {
		if self.tasks.send(Box::new(task)).is_err() {
			debug!("event loop finished, dropping posted task");
		}
	}

	/// Queues `task` once `delay` has elapsed.
	pub fn post_after(&self, delay: Duration, task: impl FnOnce(&Runtime) + 'static) {
		let timer = Timer {
			deadline: Instant::now() + delay,
			task: Box::new(task),
		};
		if self.timers.send(timer).is_err() {
			debug!("event loop finished, dropping timer");
		}
	}

	/// Requests shutdown. Returns `false` if it was already requested.
	pub fn shutdown(&self) -> bool {
		self.shutdown_handle().shutdown()
	}

	pub fn is_shutdown_requested(&self) -> bool {
		self.shutdown.is_cancelled()
	}

	pub fn shutdown_handle(&self) -> ShutdownHandle {
		ShutdownHandle {
			token: self.shutdown.clone(),
		}
	}

	/// Whether [`EventLoop::run`] was already called.
	pub fn has_run(&self) -> bool {
		self.queues.borrow().is_none()
	}

	/// Runs until shutdown, then drains what was queued at that moment.
	///
	/// Can run once; the receiving ends are dropped on return so later posts
	/// are discarded.
	pub(crate) fn run(&self, rt: &Runtime) -> Result<()> {
		let Some(mut queues) = self.queues.borrow_mut().take() else {
			return Err(Error::EventLoop("event loop already ran".to_owned()));
		};
		let reactor = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.map_err(|err| Error::EventLoop(format!("cannot build reactor: {err}")))?;

		LocalSet::new().block_on(&reactor, self.drive(&mut queues, rt));
		Ok(())
	}

	async fn drive(&self, queues: &mut Queues, rt: &Runtime) {
		let interrupt = tokio::signal::ctrl_c();
		tokio::pin!(interrupt);
		let mut interrupted = false;

		loop {
			tokio::select! {
				biased;
				_ = self.shutdown.cancelled() => break,
				Some(task) = queues.tasks.recv() => task(rt),
				Some(timer) = queues.timers.recv() => {
					let tasks = self.tasks.clone();
					tokio::task::spawn_local(async move {
						tokio::time::sleep_until(timer.deadline.into()).await;
						let _ = tasks.send(timer.task);
					});
				}
				result = &mut interrupt, if !interrupted => {
					interrupted = true;
					match result {
						Ok(()) => {
							warn!("interrupt received, shutting down");
							self.shutdown();
						}
						Err(err) => warn!(error = %err, "cannot listen for interrupts"),
					}
				}
			}
		}

		let pending = queues.tasks.len();
		debug!(pending, "event loop stopping, draining queued tasks");
		for _ in 0..pending {
			match queues.tasks.try_recv() {
				Ok(task) => task(rt),
				Err(_) => break,
			}
		}
	}
}

impl Default for EventLoop {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn tasks_run_in_posting_order() {
		let rt = Runtime::new();
		let events = EventLoop::new();
		let seen = Rc::new(RefCell::new(Vec::new()));

		for n in 0..3 {
			let seen = Rc::clone(&seen);
			events.post(move |_| seen.borrow_mut().push(n));
		}
		let handle = events.shutdown_handle();
		events.post(move |_| {
			handle.shutdown();
		});

		events.run(&rt).unwrap();
		assert_eq!(*seen.borrow(), [0, 1, 2]);
	}

	#[test]
	fn queued_tasks_drain_and_later_posts_are_dropped() {
		let rt = Runtime::new();
		let events = Rc::new(EventLoop::new());
		let seen = Rc::new(RefCell::new(Vec::new()));

		let (inner, log) = (Rc::clone(&events), Rc::clone(&seen));
		events.post(move |_| {
			inner.shutdown();
			let late = Rc::clone(&log);
			log.borrow_mut().push("stop");
			inner.post(move |_| late.borrow_mut().push("drained"));
		});

		events.run(&rt).unwrap();
		let late = Rc::clone(&seen);
		events.post(move |_| late.borrow_mut().push("after"));

		assert_eq!(*seen.borrow(), ["stop", "drained"]);
	}

	#[test]
	fn timer_fires_after_delay() {
		let rt = Runtime::new();
		let events = EventLoop::new();
		let fired = Rc::new(RefCell::new(None));

		let started = Instant::now();
		let handle = events.shutdown_handle();
		let slot = Rc::clone(&fired);
		events.post_after(Duration::from_millis(20), move |_| {
			*slot.borrow_mut() = Some(started.elapsed());
			handle.shutdown();
		});

		events.run(&rt).unwrap();
		let elapsed = fired.borrow().unwrap();
		assert!(elapsed >= Duration::from_millis(20), "fired after {elapsed:?}");
	}

	#[test]
	fn shutdown_is_idempotent() {
		let events = EventLoop::new();
		assert!(!events.is_shutdown_requested());
		assert!(events.shutdown());
		assert!(!events.shutdown());
		assert!(events.shutdown_handle().is_shutdown_requested());
	}

	#[test]
	fn runs_once() {
		let rt = Runtime::new();
		let events = EventLoop::new();
		events.shutdown();
		events.run(&rt).unwrap();
		assert!(events.has_run());
		assert!(matches!(events.run(&rt), Err(Error::EventLoop(_))));
	}
}
