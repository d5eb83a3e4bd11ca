//! Owned raster buffers with release accounting.
//!
//! Every intermediate image the orchestrator creates is wrapped in a
//! [`Buffer`], which reports its release to the [`BufferLedger`] that
//! allocated it when dropped. Because release happens in `Drop`, early
//! returns, `?` propagation and abandoned pipelines all balance the
//! ledger without explicit cleanup code.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::types::ErrorKind;

#[derive(Debug, Default)]
struct Counters {
    allocated: AtomicUsize,
    released: AtomicUsize,
    limit: Option<usize>,
}

/// Counts buffer allocations and releases for one or more pipeline runs.
///
/// Cloning is cheap and clones share counters, so a caller can keep a
/// handle while the pipeline owns another.
#[derive(Debug, Clone, Default)]
pub struct BufferLedger {
    counters: Arc<Counters>,
}

impl BufferLedger {
    /// A ledger with no allocation limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger that refuses allocations once `limit` buffers have been
    /// handed out. Used to exercise allocation-failure paths.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            counters: Arc::new(Counters {
                limit: Some(limit),
                ..Counters::default()
            }),
        }
    }

    /// Allocate a buffer by running `build`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AllocationFailure`] if the ledger's limit has
    /// been reached. `build` is not called in that case.
    pub fn allocate<T>(
        &self,
        label: &'static str,
        build: impl FnOnce() -> T,
    ) -> Result<Buffer<T>, ErrorKind> {
        self.try_allocate(label, || Ok(build()))
    }

    /// Allocate a buffer with a fallible constructor.
    ///
    /// Nothing is recorded when `build` fails.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AllocationFailure`] if the ledger's limit has
    /// been reached, or the error produced by `build`.
    pub fn try_allocate<T>(
        &self,
        label: &'static str,
        build: impl FnOnce() -> Result<T, ErrorKind>,
    ) -> Result<Buffer<T>, ErrorKind> {
        if let Some(limit) = self.counters.limit
            && self.allocated() >= limit
        {
            return Err(ErrorKind::AllocationFailure {
                label: label.to_string(),
                reason: format!("ledger limit of {limit} allocation(s) reached"),
            });
        }

        let value = build()?;
        self.counters.allocated.fetch_add(1, Ordering::SeqCst);
        trace!(label, "buffer allocated");
        Ok(Buffer {
            value,
            guard: Release {
                counters: Arc::clone(&self.counters),
                label,
            },
        })
    }

    /// Number of buffers allocated so far.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.counters.allocated.load(Ordering::SeqCst)
    }

    /// Number of buffers released so far.
    #[must_use]
    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Buffers allocated but not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.allocated().saturating_sub(self.released())
    }
}

/// Records a release on drop.
#[derive(Debug)]
struct Release {
    counters: Arc<Counters>,
    label: &'static str,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        trace!(label = self.label, "buffer released");
    }
}

/// An owned buffer tracked by a [`BufferLedger`].
///
/// Dereferences to the wrapped value. Dropping the buffer, or taking the
/// value out with [`into_inner`](Self::into_inner), counts as its single
/// release.
#[derive(Debug)]
pub struct Buffer<T> {
    value: T,
    guard: Release,
}

impl<T> Buffer<T> {
    /// The label given at allocation.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.guard.label
    }

    /// Hand the value to the caller, releasing it from the ledger.
    #[must_use]
    pub fn into_inner(self) -> T {
        let Self { value, guard } = self;
        drop(guard);
        value
    }
}

impl<T> Deref for Buffer<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Buffer<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
