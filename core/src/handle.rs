//! `WatchRuleHandle`: single publish point for the active rule set
//!
//! Readers take a snapshot (`Arc` clone under a short read lock) and evaluate
//! against it without holding the lock. Reconfiguration builds a complete new
//! [`WatchRuleSet`] off to the side and swaps it in; a reader sees either the
//! whole old set or the whole new one.

use crate::{PatternError, RuleDescriptor, WatchRuleSet};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Shared, atomically replaceable [`WatchRuleSet`].
///
/// # Example
///
/// ```
/// use urlwatch::prelude::*;
///
/// let handle = WatchRuleHandle::new(WatchRuleSet::empty());
/// assert!(!handle.matches("https://x/a"));
///
/// handle.load(vec![RuleDescriptor::parse("https://x/*")]).unwrap();
/// assert!(handle.matches("https://x/a"));
/// ```
#[derive(Debug, Default)]
pub struct WatchRuleHandle {
    current: RwLock<Arc<WatchRuleSet>>,
}

impl WatchRuleHandle {
    /// Publish `rules` as the initial set.
    #[must_use]
    pub fn new(rules: WatchRuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
        }
    }

    /// The currently published set.
    ///
    /// The snapshot stays valid after a later [`publish`](Self::publish).
    #[must_use]
    pub fn snapshot(&self) -> Arc<WatchRuleSet> {
        Arc::clone(&self.current.read())
    }

    /// Replace the published set, returning the previous one.
    pub fn publish(&self, rules: WatchRuleSet) -> Arc<WatchRuleSet> {
        let next = Arc::new(rules);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        debug!(
            previous = previous.len(),
            current = self.current.read().len(),
            "published watch rule set"
        );
        previous
    }

    /// Compile `descriptors` and publish the result.
    ///
    /// # Errors
    ///
    /// Returns the compile error and leaves the current set published.
    pub fn load(
        &self,
        descriptors: impl IntoIterator<Item = RuleDescriptor>,
    ) -> Result<Arc<WatchRuleSet>, PatternError> {
        let rules = WatchRuleSet::from_descriptors(descriptors)?;
        Ok(self.publish(rules))
    }

    /// Evaluate `url` against the current snapshot.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.snapshot().matches(url)
    }
}
