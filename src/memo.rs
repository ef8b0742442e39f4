//! Memoize-with-refresh cache with a single outstanding refresh per instance.
//!
//! [`Memoized`] serves the last good value while it is fresh and otherwise runs the
//! [`RefreshPolicy`] producer. Concurrent callers that find the value stale queue on one
//! refresh guard; whoever acquires it first performs the refresh, and every caller that was
//! already waiting observes that same outcome (value or error) instead of starting another
//! fetch. Failures are logged and never cached as valid, so the next call retries.
//!
//! Dropping the future of the caller that is refreshing releases the guard without recording
//! an outcome, which lets the next waiter take over the refresh.

pub mod reclaim;

pub use reclaim::*;

// self
use crate::_prelude::*;

/// Boxed future returned by [`RefreshPolicy::refresh`].
pub type RefreshFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Staleness and production rules for a [`Memoized`] cache.
pub trait RefreshPolicy
where
	Self: Send + Sync,
{
	/// Cached value type.
	type Value: Send + Sync;

	/// Returns `true` when `value`, stored at `updated_at`, must be recomputed.
	fn is_stale(&self, value: &Self::Value, updated_at: OffsetDateTime) -> bool;

	/// Produces a fresh value.
	fn refresh(&self) -> RefreshFuture<'_, Self::Value>;
}

/// Generic memoize-with-refresh cache.
pub struct Memoized<P>
where
	P: RefreshPolicy,
{
	policy: P,
	max_age: Option<Duration>,
	retention: Retention,
	state: RwLock<CacheState<P::Value>>,
	refresh_guard: AsyncMutex<()>,
}
impl<P> Memoized<P>
where
	P: RefreshPolicy,
{
	/// Creates an empty cache that keeps values until the policy reports them stale.
	pub fn new(policy: P) -> Self {
		Self {
			policy,
			max_age: None,
			retention: Retention::Strong,
			state: RwLock::new(CacheState::default()),
			refresh_guard: AsyncMutex::new(()),
		}
	}

	/// Treats values older than `max_age` as stale regardless of the policy.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = Some(max_age);

		self
	}

	/// Overrides how the cached value is retained.
	pub fn with_retention(mut self, retention: Retention) -> Self {
		self.retention = retention;

		self
	}

	/// Returns the policy driving this cache.
	pub fn policy(&self) -> &P {
		&self.policy
	}

	/// Returns the configured maximum age, if any.
	pub fn max_age(&self) -> Option<Duration> {
		self.max_age
	}

	/// Returns the retention mode.
	pub fn retention(&self) -> Retention {
		self.retention
	}

	/// Returns the current value, refreshing it first when absent, failed, or stale.
	pub async fn get(&self) -> Result<Arc<P::Value>> {
		let observed = {
			let state = self.state.read();

			if let Some(value) = self.fresh(&state, OffsetDateTime::now_utc()) {
				return Ok(value);
			}

			state.epoch
		};
		let _refresh = self.refresh_guard.lock().await;
		let generation = {
			let state = self.state.read();

			if state.epoch != observed {
				if let Some(failure) = &state.failure {
					return Err(Error::Refresh(failure.clone()));
				}
				if let Some(value) = &state.value {
					return Ok(value.clone());
				}
			}

			state.generation
		};
		let outcome = self.policy.refresh().await;
		let mut state = self.state.write();

		state.epoch = state.epoch.wrapping_add(1);

		let current = state.generation == generation;

		match outcome {
			Ok(value) => {
				let value = Arc::new(value);

				if current {
					state.value = Some(value.clone());
					state.updated_at = OffsetDateTime::now_utc();
					state.failure = None;
				}

				Ok(value)
			},
			Err(err) => {
				tracing::warn!(error = %err, "Cached resource refresh failed.");

				let err = Arc::new(err);

				if current {
					state.value = None;
					state.failure = Some(err.clone());
				}

				Err(Error::Refresh(err))
			},
		}
	}

	/// Returns the stored value without refreshing, even when it is stale.
	pub fn peek(&self) -> Option<Arc<P::Value>> {
		self.state.read().value.clone()
	}

	/// Returns `true` when a call to [`get`](Self::get) would be answered from the cache.
	pub fn is_fresh(&self) -> bool {
		self.fresh(&self.state.read(), OffsetDateTime::now_utc()).is_some()
	}

	/// Instant of the last successful store, or [`OffsetDateTime::UNIX_EPOCH`] when empty.
	pub fn updated_at(&self) -> OffsetDateTime {
		self.state.read().updated_at
	}

	/// Drops the value and forgets failures; a refresh already running is not stored.
	pub fn clear(&self) {
		let mut state = self.state.write();

		state.value = None;
		state.failure = None;
		state.updated_at = OffsetDateTime::UNIX_EPOCH;
		state.generation = state.generation.wrapping_add(1);
	}

	fn fresh(
		&self,
		state: &CacheState<P::Value>,
		now: OffsetDateTime,
	) -> Option<Arc<P::Value>> {
		let value = state.value.as_ref()?;

		if self.max_age.is_some_and(|max_age| now - state.updated_at > max_age) {
			return None;
		}
		if self.policy.is_stale(value, state.updated_at) {
			return None;
		}

		Some(value.clone())
	}

	fn drop_value(&self) -> bool {
		let mut state = self.state.write();

		if state.value.take().is_some() {
			state.updated_at = OffsetDateTime::UNIX_EPOCH;

			true
		} else {
			false
		}
	}
}
impl<P> Debug for Memoized<P>
where
	P: RefreshPolicy,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("Memoized")
			.field("max_age", &self.max_age)
			.field("retention", &self.retention)
			.field("cached", &state.value.is_some())
			.field("failed", &state.failure.is_some())
			.field("updated_at", &state.updated_at)
			.finish()
	}
}

struct CacheState<T> {
	value: Option<Arc<T>>,
	updated_at: OffsetDateTime,
	failure: Option<Arc<Error>>,
	// Bumped each time a refresh finishes.
	epoch: u64,
	// Bumped by `clear`; refreshes started under an older generation are not stored.
	generation: u64,
}
impl<T> Default for CacheState<T> {
	fn default() -> Self {
		Self {
			value: None,
			updated_at: OffsetDateTime::UNIX_EPOCH,
			failure: None,
			epoch: 0,
			generation: 0,
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use tokio::sync::Notify;
	// self
	use super::*;

	struct Counter {
		calls: Arc<AtomicUsize>,
		gate: Option<Arc<Notify>>,
		fail: bool,
		stale: bool,
	}
	impl Counter {
		fn new() -> Self {
			Self { calls: Default::default(), gate: None, fail: false, stale: false }
		}
	}
	impl RefreshPolicy for Counter {
		type Value = usize;

		fn is_stale(&self, _value: &usize, _updated_at: OffsetDateTime) -> bool {
			self.stale
		}

		fn refresh(&self) -> RefreshFuture<'_, usize> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

				if let Some(gate) = &self.gate {
					gate.notified().await;
				}
				if self.fail {
					return Err(Error::InvalidClient { reason: format!("attempt {call}") });
				}

				Ok(call)
			})
		}
	}

	#[tokio::test]
	async fn value_is_reused_while_fresh() {
		let cache = Memoized::new(Counter::new());

		assert_eq!(*cache.get().await.expect("First get should refresh."), 1);
		assert_eq!(*cache.get().await.expect("Second get should hit the cache."), 1);
		assert_eq!(cache.policy().calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn stale_policy_refreshes_every_time() {
		let cache = Memoized::new(Counter { stale: true, ..Counter::new() });

		cache.get().await.expect("First get should refresh.");
		cache.get().await.expect("Second get should refresh again.");

		assert_eq!(cache.policy().calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn failures_are_not_cached() {
		let cache = Memoized::new(Counter { fail: true, ..Counter::new() });
		let first = cache.get().await.expect_err("Failing policy should surface an error.");
		let second = cache.get().await.expect_err("Failure should be retried, not replayed.");

		assert!(first.to_string().contains("attempt 1"));
		assert!(second.to_string().contains("attempt 2"));
		assert!(cache.peek().is_none());
	}

	#[tokio::test]
	async fn max_age_expires_values() {
		let cache = Memoized::new(Counter::new()).with_max_age(Duration::ZERO);

		cache.get().await.expect("First get should refresh.");
		tokio::time::sleep(std::time::Duration::from_millis(5)).await;
		cache.get().await.expect("Expired value should refresh.");

		assert_eq!(cache.policy().calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn clear_forces_absence() {
		let cache = Memoized::new(Counter::new());

		cache.get().await.expect("First get should refresh.");
		cache.clear();

		assert!(cache.peek().is_none());
		assert_eq!(cache.updated_at(), OffsetDateTime::UNIX_EPOCH);
		assert_eq!(*cache.get().await.expect("Cleared cache should refresh."), 2);
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_refresh() {
		let gate = Arc::new(Notify::new());
		let cache =
			Arc::new(Memoized::new(Counter { gate: Some(gate.clone()), ..Counter::new() }));
		let waiters = (0..8)
			.map(|_| {
				let cache = cache.clone();

				tokio::spawn(async move { cache.get().await.map(|value| *value) })
			})
			.collect::<Vec<_>>();

		while cache.policy().calls.load(Ordering::SeqCst) == 0 {
			tokio::task::yield_now().await;
		}
		tokio::time::sleep(std::time::Duration::from_millis(20)).await;
		gate.notify_one();

		for waiter in waiters {
			let value = waiter.await.expect("Waiter task should not panic.");

			assert_eq!(value.expect("Every waiter should observe the shared value."), 1);
		}

		assert_eq!(cache.policy().calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_failure() {
		let gate = Arc::new(Notify::new());
		let cache = Arc::new(Memoized::new(Counter {
			gate: Some(gate.clone()),
			fail: true,
			..Counter::new()
		}));
		let waiters = (0..4)
			.map(|_| {
				let cache = cache.clone();

				tokio::spawn(async move { cache.get().await.map(|value| *value) })
			})
			.collect::<Vec<_>>();

		while cache.policy().calls.load(Ordering::SeqCst) == 0 {
			tokio::task::yield_now().await;
		}
		tokio::time::sleep(std::time::Duration::from_millis(20)).await;
		gate.notify_one();

		for waiter in waiters {
			let err = waiter
				.await
				.expect("Waiter task should not panic.")
				.expect_err("Every waiter should observe the shared failure.");

			assert!(matches!(err, Error::Refresh(_)));
			assert!(err.to_string().contains("attempt 1"));
		}

		assert_eq!(cache.policy().calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn cancelled_refresh_hands_over_to_next_caller() {
		let gate = Arc::new(Notify::new());
		let cache = Memoized::new(Counter { gate: Some(gate.clone()), ..Counter::new() });
		let abandoned =
			tokio::time::timeout(std::time::Duration::from_millis(10), cache.get()).await;

		assert!(abandoned.is_err());

		gate.notify_one();

		assert_eq!(*cache.get().await.expect("Next caller should refresh."), 2);
	}

	#[tokio::test]
	async fn refresh_started_before_clear_is_not_stored() {
		let gate = Arc::new(Notify::new());
		let cache =
			Arc::new(Memoized::new(Counter { gate: Some(gate.clone()), ..Counter::new() }));
		let pending = {
			let cache = cache.clone();

			tokio::spawn(async move { cache.get().await.map(|value| *value) })
		};

		while cache.policy().calls.load(Ordering::SeqCst) == 0 {
			tokio::task::yield_now().await;
		}

		cache.clear();
		gate.notify_one();

		assert_eq!(
			pending.await.expect("Refresh task should not panic.").expect("Refresh should succeed."),
			1
		);
		assert!(cache.peek().is_none());
	}
}
