//! Tax classification of a disposal, and the lazy cell that resolves it.
//!
//! The nature of a disposal decides which category of the annex the line
//! belongs to. It is looked up from an external classification service,
//! so records carry a [`NatureCell`]: a deferred accessor that performs
//! the lookup at most once, only if the value is actually read, and caches
//! a failure as [`Nature::Unknown`] rather than retrying.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::OnceCell;

/// Tax nature code of a disposal, per table VII of the annex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Nature {
    /// Classification missing or the lookup failed.
    #[default]
    Unknown,
    /// Onerous disposal of shares or other equity stakes.
    G01,
    /// Redemption or disposal of units in investment funds, including ETFs.
    G20,
}

impl fmt::Display for Nature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::G01 => write!(f, "G01"),
            Self::G20 => write!(f, "G20"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Future produced by a deferred nature fetch.
pub type NatureFuture = Pin<Box<dyn Future<Output = Nature> + Send>>;

type NatureFetch = Box<dyn Fn() -> NatureFuture + Send + Sync>;

/// A lazily-resolved, memoized [`Nature`].
///
/// The fetch runs at most once even under concurrent readers; whatever it
/// returns (including `Unknown` on failure) is cached for the lifetime of
/// the cell and never recomputed.
pub struct NatureCell {
    cell: OnceCell<Nature>,
    fetch: Option<NatureFetch>,
}

impl NatureCell {
    /// A cell holding an already-known nature. Reads never trigger a fetch.
    #[must_use]
    pub fn known(nature: Nature) -> Self {
        Self {
            cell: OnceCell::new_with(Some(nature)),
            fetch: None,
        }
    }

    /// A cell that resolves by running `fetch` on first read.
    ///
    /// The fetch is infallible by contract: lookup failures must be mapped
    /// to [`Nature::Unknown`] by the caller so a classification problem
    /// never aborts matching.
    #[must_use]
    pub fn deferred<F>(fetch: F) -> Self
    where
        F: Fn() -> NatureFuture + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            fetch: Some(Box::new(fetch)),
        }
    }

    /// Resolve the nature, fetching on first use.
    pub async fn get(&self) -> Nature {
        *self
            .cell
            .get_or_init(|| match &self.fetch {
                Some(fetch) => fetch(),
                None => Box::pin(async { Nature::Unknown }),
            })
            .await
    }
}

impl Default for NatureCell {
    fn default() -> Self {
        Self::known(Nature::Unknown)
    }
}

impl fmt::Debug for NatureCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(nature) => write!(f, "NatureCell({nature})"),
            None => write!(f, "NatureCell(<deferred>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_display() {
        assert_eq!(Nature::G01.to_string(), "G01");
        assert_eq!(Nature::G20.to_string(), "G20");
        assert_eq!(Nature::Unknown.to_string(), "unknown");
    }

    #[tokio::test]
    async fn test_known_cell_never_fetches() {
        let cell = NatureCell::known(Nature::G01);
        assert_eq!(cell.get().await, Nature::G01);
    }

    #[tokio::test]
    async fn test_deferred_cell_fetches_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let cell = NatureCell::deferred(move || {
            let counted = counted.clone();
            Box::pin(async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Nature::G20
            })
        });

        assert_eq!(cell.get().await, Nature::G20);
        assert_eq!(cell.get().await, Nature::G20);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_cached_as_unknown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        // A fetch that "fails" resolves to Unknown; later reads must not retry.
        let cell = NatureCell::deferred(move || {
            let counted = counted.clone();
            Box::pin(async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Nature::Unknown
            })
        });

        assert_eq!(cell.get().await, Nature::Unknown);
        assert_eq!(cell.get().await, Nature::Unknown);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_is_unknown() {
        assert_eq!(NatureCell::default().get().await, Nature::Unknown);
    }
}
