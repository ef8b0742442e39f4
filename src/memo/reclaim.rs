//! Reclaimable retention for [`Memoized`] caches.
//!
//! There is no garbage collector to clear soft references under memory pressure, so
//! reclaimable caches combine a mandatory maximum age with an explicit pressure hook:
//! [`PressureRegistry::relieve`] drops the value of every live reclaimable cache, and the
//! next access simply recomputes it.

// std
use std::sync::Weak;
// self
use crate::{
	_prelude::*,
	memo::{Memoized, RefreshPolicy},
};

/// How a [`Memoized`] cache holds its value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Retention {
	/// Value is kept until it turns stale or the cache is cleared.
	#[default]
	Strong,
	/// Value may additionally be dropped by [`Reclaim::reclaim`].
	Reclaimable,
}

/// Caches whose value can be released under memory pressure.
pub trait Reclaim
where
	Self: Send + Sync,
{
	/// Releases the cached value; returns `true` when something was dropped.
	fn reclaim(&self) -> bool;
}
impl<P> Reclaim for Memoized<P>
where
	P: RefreshPolicy,
{
	fn reclaim(&self) -> bool {
		matches!(self.retention(), Retention::Reclaimable) && self.drop_value()
	}
}

impl<P> Memoized<P>
where
	P: RefreshPolicy,
{
	/// Creates a reclaimable cache whose values also expire after `max_age`.
	pub fn reclaimable(policy: P, max_age: Duration) -> Self {
		Self::new(policy).with_max_age(max_age).with_retention(Retention::Reclaimable)
	}
}

/// Weak registry of reclaimable caches notified on memory pressure.
#[derive(Default)]
pub struct PressureRegistry(Mutex<Vec<Weak<dyn Reclaim>>>);
impl PressureRegistry {
	/// Tracks `cache` without extending its lifetime.
	pub fn register<R>(&self, cache: &Arc<R>)
	where
		R: 'static + Reclaim,
	{
		let cache: Arc<dyn Reclaim> = cache.clone();

		self.0.lock().push(Arc::downgrade(&cache));
	}

	/// Reclaims every live cache and forgets dropped ones; returns how many values were freed.
	pub fn relieve(&self) -> usize {
		let mut caches = self.0.lock();
		let mut freed = 0;

		caches.retain(|weak| match weak.upgrade() {
			Some(cache) => {
				if cache.reclaim() {
					freed += 1;
				}

				true
			},
			None => false,
		});

		tracing::debug!(freed, tracked = caches.len(), "Relieved memory pressure on caches.");

		freed
	}

	/// Number of caches still alive.
	pub fn len(&self) -> usize {
		self.0.lock().iter().filter(|weak| weak.strong_count() > 0).count()
	}

	/// Returns `true` when no live cache is tracked.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl Debug for PressureRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PressureRegistry").field("tracked", &self.0.lock().len()).finish()
	}
}
