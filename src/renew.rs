//! Resource renewers: [`Memoized`] caches specialized for externally fetched resources.

// self
use crate::{
	_prelude::*,
	memo::{Memoized, RefreshFuture, RefreshPolicy},
	obs::{self, FlowKind},
};

/// Fetch and staleness rules for an externally fetched resource.
pub trait Renewable
where
	Self: Send + Sync,
{
	/// Resource type kept in the cache.
	type Resource: Send + Sync;

	/// Flow label recorded for every fetch.
	const KIND: FlowKind;

	/// Returns `true` when `resource` must be fetched again.
	fn needs_refresh(&self, resource: &Self::Resource) -> bool;

	/// Fetches a new resource.
	fn request_new(&self) -> RefreshFuture<'_, Self::Resource>;
}

/// Adapts a [`Renewable`] into a [`RefreshPolicy`], wrapping fetches in flow observation.
#[derive(Debug)]
pub struct Renewal<R>(R);
impl<R> RefreshPolicy for Renewal<R>
where
	R: Renewable,
{
	type Value = R::Resource;

	fn is_stale(&self, value: &Self::Value, _updated_at: OffsetDateTime) -> bool {
		self.0.needs_refresh(value)
	}

	fn refresh(&self) -> RefreshFuture<'_, Self::Value> {
		Box::pin(obs::observe(R::KIND, "request_new", self.0.request_new()))
	}
}

/// Cache that renews one external resource on demand.
#[derive(Debug)]
pub struct Renewer<R>
where
	R: Renewable,
{
	cache: Arc<Memoized<Renewal<R>>>,
}
impl<R> Renewer<R>
where
	R: Renewable,
{
	/// Creates a renewer that keeps the resource until it needs a refresh.
	pub fn new(resource: R) -> Self {
		Self { cache: Arc::new(Memoized::new(Renewal(resource))) }
	}

	/// Creates a reclaimable renewer whose resource also expires after `max_age`.
	pub fn reclaimable(resource: R, max_age: Duration) -> Self {
		Self { cache: Arc::new(Memoized::reclaimable(Renewal(resource), max_age)) }
	}

	/// Returns the current resource, fetching it when absent or stale.
	pub async fn get(&self) -> Result<Arc<R::Resource>> {
		self.cache.get().await
	}

	/// Forgets the cached resource.
	pub fn clear(&self) {
		self.cache.clear();
	}

	/// Discards the cached resource and fetches a new one.
	pub async fn renew(&self) -> Result<Arc<R::Resource>> {
		self.cache.clear();
		self.cache.get().await
	}

	/// Returns the cached resource without fetching.
	pub fn peek(&self) -> Option<Arc<R::Resource>> {
		self.cache.peek()
	}

	/// Returns the fetch rules.
	pub fn resource(&self) -> &R {
		&self.cache.policy().0
	}

	/// Returns the underlying cache, for registration with a
	/// [`PressureRegistry`](crate::memo::PressureRegistry).
	pub fn cache(&self) -> &Arc<Memoized<Renewal<R>>> {
		&self.cache
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[derive(Default)]
	struct Lease {
		fetched: AtomicUsize,
	}
	impl Renewable for Lease {
		type Resource = usize;

		const KIND: FlowKind = FlowKind::TokenRefresh;

		fn needs_refresh(&self, resource: &usize) -> bool {
			*resource % 2 == 1
		}

		fn request_new(&self) -> RefreshFuture<'_, usize> {
			Box::pin(async move { Ok(self.fetched.fetch_add(1, Ordering::SeqCst) + 1) })
		}
	}

	#[tokio::test]
	async fn needs_refresh_drives_staleness() {
		let renewer = Renewer::new(Lease::default());

		assert_eq!(*renewer.get().await.expect("First fetch should succeed."), 1);
		// Odd values are stale, so the next call fetches again and keeps the even value.
		assert_eq!(*renewer.get().await.expect("Stale value should be renewed."), 2);
		assert_eq!(*renewer.get().await.expect("Fresh value should be reused."), 2);
		assert_eq!(renewer.resource().fetched.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn renew_always_fetches() {
		let renewer = Renewer::new(Lease::default());

		renewer.get().await.expect("First fetch should succeed.");
		renewer.get().await.expect("Second fetch should succeed.");
		renewer.renew().await.expect("Forced renewal should succeed.");

		assert_eq!(renewer.resource().fetched.load(Ordering::SeqCst), 3);
	}
}
