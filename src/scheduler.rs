//! Timers and background tasks behind a cancellable interface.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::LocalBoxFuture;

/// Spawns local tasks and provides sleeps and a clock.
pub trait Scheduler {
	/// Run a task on the event loop.
	fn spawn(&self, task: LocalBoxFuture<'static, ()>);

	/// Resolve after `period`.
	fn sleep(&self, period: Duration) -> LocalBoxFuture<'static, ()>;

	/// Milliseconds since an arbitrary epoch.
	fn now_ms(&self) -> f64;
}

/// Browser event loop, `setTimeout` and `Date.now()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserScheduler;

impl Scheduler for BrowserScheduler {
	fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
		leptos::task::spawn_local(task);
	}

	fn sleep(&self, period: Duration) -> LocalBoxFuture<'static, ()> {
		let millis = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);
		Box::pin(gloo_timers::future::TimeoutFuture::new(millis))
	}

	fn now_ms(&self) -> f64 {
		js_sys::Date::now()
	}
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	/// Create a live token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Signal every holder to stop.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	/// Whether `cancel` was called on any clone.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}

	/// Both tokens share one flag.
	pub fn same_as(&self, other: &CancelToken) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

/// Owns a recurring task; dropping the handle cancels it.
#[derive(Debug, Default)]
pub struct PollHandle {
	token: CancelToken,
}

impl PollHandle {
	/// Create a handle with a fresh token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Token the task checks between iterations.
	pub fn token(&self) -> CancelToken {
		self.token.clone()
	}
}

impl Drop for PollHandle {
	fn drop(&mut self) {
		self.token.cancel();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dropping_handle_cancels_token() {
		let handle = PollHandle::new();
		let token = handle.token();
		assert!(!token.is_cancelled());
		drop(handle);
		assert!(token.is_cancelled());
	}

	#[test]
	fn tokens_compare_by_flag() {
		let a = CancelToken::new();
		let b = a.clone();
		assert!(a.same_as(&b));
		assert!(!a.same_as(&CancelToken::new()));
	}
}
