//! Single-class pool that detects lifecycle violations.
//!
//! Every release is recorded against the buffer's [`BufferId`] together with
//! a [`ReleaseContext`]. Releasing an identity that is already released, or
//! releasing an alias whose generation predates the current issue, is fatal:
//! both contexts are reported and the violation hook runs (by default it
//! exits the process). The identity map sits behind one mutex, so this pool
//! belongs in debug runs, not hot paths.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;

use tracing::{debug, error};

use super::allocator::Allocator;
use super::buffer::{Buffer, BufferId};
use super::error::PoolError;
use super::size_class::MIN_ALLOC_SIZE;
use crate::sync::atomic::{AtomicU64, Ordering};
use crate::sync::{Arc, Mutex, lock};

// Generations are process-wide so a buffer moving between pools never meets
// a generation from a different sequence.
crate::sync::static_atomic! {
    static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);
}

/// What to record at each release.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureMode {
    /// Full stack trace. Slow.
    #[default]
    Backtrace,
    /// Source location of the `free`/`realloc` call.
    Caller,
    Off,
}

/// Where a release happened. Reporting only.
#[derive(Clone, Debug)]
pub enum ReleaseContext {
    Backtrace(Arc<Backtrace>),
    Caller(&'static Location<'static>),
    Untracked,
}

impl ReleaseContext {
    fn capture(mode: CaptureMode, caller: &'static Location<'static>) -> Self {
        match mode {
            CaptureMode::Backtrace => ReleaseContext::Backtrace(Arc::new(Backtrace::force_capture())),
            CaptureMode::Caller => ReleaseContext::Caller(caller),
            CaptureMode::Off => ReleaseContext::Untracked,
        }
    }
}

impl fmt::Display for ReleaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseContext::Backtrace(bt) => write!(f, "{bt}"),
            ReleaseContext::Caller(loc) => write!(f, "released at {loc}"),
            ReleaseContext::Untracked => write!(f, "<release context not captured>"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// The identity was released twice with no reissue in between.
    DoubleFree,
    /// An alias from an earlier issue was released after the storage had
    /// been handed out again.
    StaleRelease { issued_generation: u64 },
}

/// A buffer lifecycle bug caught by [`DiagnosticPool`].
#[derive(Clone, Debug)]
pub struct LifecycleViolation {
    pub kind: ViolationKind,
    pub id: BufferId,
    /// Generation carried by the offending handle.
    pub generation: u64,
    /// Most recent accepted release of this identity.
    pub previous: Option<ReleaseContext>,
    pub current: ReleaseContext,
}

impl fmt::Display for LifecycleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::DoubleFree => write!(
                f,
                "double free of buffer {} (generation {})",
                self.id, self.generation
            )?,
            ViolationKind::StaleRelease { issued_generation } => write!(
                f,
                "stale release of buffer {}: handle generation {} but reissued as generation {issued_generation}",
                self.id, self.generation
            )?,
        }
        match &self.previous {
            Some(previous) => write!(f, "\npre put:\n{previous}")?,
            None => write!(f, "\npre put:\n<none>")?,
        }
        write!(f, "\ncurr put:\n{}", self.current)
    }
}

/// Called once a violation has been reported. Must not return.
pub type ViolationHook = fn(&LifecycleViolation) -> !;

/// Default hook: terminate with status 1.
pub fn exit_on_violation(_violation: &LifecycleViolation) -> ! {
    std::process::exit(1)
}

/// Hook for test harnesses: unwind instead of terminating.
pub fn panic_on_violation(violation: &LifecycleViolation) -> ! {
    panic!("{violation}")
}

/// Configuration for `DiagnosticPool`. Set at init time via
/// `DiagnosticPool::with_config()`.
#[derive(Clone, Debug)]
pub struct DiagnosticPoolConfig {
    /// Capacity of freshly pooled buffers; 0 means 64.
    pub min_size: usize,
    pub capture: CaptureMode,
    pub on_violation: ViolationHook,
}

impl Default for DiagnosticPoolConfig {
    fn default() -> Self {
        Self {
            min_size: MIN_ALLOC_SIZE,
            capture: CaptureMode::default(),
            on_violation: exit_on_violation,
        }
    }
}

struct SlotState {
    /// Generation of the latest issue.
    generation: u64,
    released: bool,
    last_release: Option<ReleaseContext>,
}

pub struct DiagnosticPool {
    min_size: usize,
    capture: CaptureMode,
    on_violation: ViolationHook,
    free_list: Mutex<Vec<Buffer>>,
    slots: Mutex<HashMap<BufferId, SlotState>>,
}

impl DiagnosticPool {
    /// Pool with floor `min_size` (0 means 64), capturing backtraces and
    /// exiting on violation.
    #[must_use]
    pub fn new(min_size: usize) -> Self {
        Self::with_config(DiagnosticPoolConfig {
            min_size,
            ..DiagnosticPoolConfig::default()
        })
    }

    #[must_use]
    pub fn with_config(config: DiagnosticPoolConfig) -> Self {
        let min_size = if config.min_size == 0 {
            MIN_ALLOC_SIZE
        } else {
            config.min_size
        };
        Self {
            min_size,
            capture: config.capture,
            on_violation: config.on_violation,
            free_list: Mutex::new(Vec::new()),
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Borrow a buffer of length `size`. Returns `None` for `size == 0`.
    ///
    /// A pooled buffer too small for `size` goes back untouched and a fresh
    /// exact-size buffer is allocated instead.
    pub fn malloc(&self, size: usize) -> Option<Buffer> {
        if size == 0 {
            return None;
        }
        let pooled = lock(&self.free_list).pop();
        let buf = match pooled {
            Some(buf) if buf.capacity() >= size => buf,
            Some(small) => {
                lock(&self.free_list).push(small);
                Buffer::with_capacity(size)
            }
            None => Buffer::with_capacity(size.max(self.min_size)),
        };
        Some(self.issue(buf).with_len(size))
    }

    /// Stamp a fresh generation. Only identities that were released before
    /// have a slot to reopen; the map never grows on malloc.
    fn issue(&self, mut buf: Buffer) -> Buffer {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        buf.set_generation(generation);
        if let Some(slot) = lock(&self.slots).get_mut(&buf.id()) {
            slot.generation = generation;
            slot.released = false;
        }
        buf
    }

    /// Resize `buf` to `size`. Growth releases `buf` through the same
    /// checks as [`free`](Self::free).
    #[track_caller]
    pub fn realloc(&self, buf: Buffer, size: usize) -> Buffer {
        if size <= buf.capacity() {
            return buf.with_len(size);
        }
        let caller = Location::caller();
        // size > capacity >= 0, so malloc cannot refuse.
        let mut grown = match self.malloc(size) {
            Some(grown) => grown,
            None => Buffer::zeroed(size),
        };
        grown[..buf.len()].copy_from_slice(&buf);
        self.release(buf, caller);
        grown
    }

    /// Return `buf` to the pool, recording where the release happened.
    ///
    /// Never fails: a lifecycle violation is reported and handed to the
    /// violation hook, which does not return.
    #[track_caller]
    pub fn free(&self, buf: Buffer) -> Result<(), PoolError> {
        self.release(buf, Location::caller());
        Ok(())
    }

    fn release(&self, buf: Buffer, caller: &'static Location<'static>) {
        let current = ReleaseContext::capture(self.capture, caller);

        let mut slots = lock(&self.slots);
        let slot = slots.entry(buf.id()).or_insert(SlotState {
            generation: buf.generation(),
            released: false,
            last_release: None,
        });
        let kind = if slot.released {
            Some(ViolationKind::DoubleFree)
        } else if buf.generation() < slot.generation {
            Some(ViolationKind::StaleRelease {
                issued_generation: slot.generation,
            })
        } else {
            None
        };

        let Some(kind) = kind else {
            slot.generation = buf.generation();
            slot.released = true;
            slot.last_release = Some(current);
            drop(slots);
            lock(&self.free_list).push(buf);
            return;
        };

        let violation = LifecycleViolation {
            kind,
            id: buf.id(),
            generation: buf.generation(),
            previous: slot.last_release.clone(),
            current,
        };
        drop(slots);
        report(&violation);
        (self.on_violation)(&violation)
    }

    /// Identities with recorded state.
    #[must_use]
    pub fn tracked_buffers(&self) -> usize {
        lock(&self.slots).len()
    }

    #[must_use]
    pub fn cached_buffers(&self) -> usize {
        lock(&self.free_list).len()
    }

    /// Drop every cached buffer and forget its identity.
    pub fn trim(&self) {
        let drained = std::mem::take(&mut *lock(&self.free_list));
        let mut slots = lock(&self.slots);
        for buf in &drained {
            slots.remove(&buf.id());
        }
        drop(slots);
        debug!(buffers = drained.len(), "diagnostic pool trimmed");
    }
}

fn report(violation: &LifecycleViolation) {
    error!(
        id = %violation.id,
        generation = violation.generation,
        kind = ?violation.kind,
        "buffer lifecycle violation"
    );
    eprintln!("{violation}");
}

impl Allocator for DiagnosticPool {
    fn malloc(&self, size: usize) -> Option<Buffer> {
        DiagnosticPool::malloc(self, size)
    }

    #[track_caller]
    fn realloc(&self, buf: Buffer, size: usize) -> Buffer {
        DiagnosticPool::realloc(self, buf, size)
    }

    #[track_caller]
    fn free(&self, buf: Buffer) -> Result<(), PoolError> {
        DiagnosticPool::free(self, buf)
    }
}
