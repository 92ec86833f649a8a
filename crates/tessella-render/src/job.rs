//! Render jobs and the registry that deduplicates them.
//!
//! At most one job exists per [`MetaId`] and render generation. The
//! registry's entry API makes the check-then-insert atomic, so concurrent
//! requests for tiles of the same block end up waiting on one job instead of
//! starting several. A request made after a reload never joins a job that
//! renders with the previous generation.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use strum_macros::{Display, IntoStaticStr};
use tokio::sync::watch;
use tracing::debug;

use crate::error::RenderError;
use crate::tile::{MetaId, TileId};

/// Output of a successful job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedBlock {
    /// Bytes of every member tile.
    pub tiles: HashMap<TileId, Bytes>,
    /// Number of styled objects in the block's draw list.
    pub styled_objects: usize,
}

/// What every waiter of a job receives.
pub type JobOutcome = Result<Arc<RenderedBlock>, RenderError>;

/// Lifecycle of a job.
///
/// Stored as an atomic `u8` so any task can read it without locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum JobStatus {
    /// Waiting for an admission permit.
    Queued = 0,
    /// Rendering on a worker.
    Running = 1,
    /// Finished; tiles are cached.
    Done = 2,
    /// Finished with an error; nothing was cached.
    Failed = 3,
}

impl JobStatus {
    /// Convert from the stored representation.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Queued),
            1 => Some(Self::Running),
            2 => Some(Self::Done),
            3 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true once the job has an outcome.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Status name for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// One in-flight render of a meta tile.
#[derive(Debug)]
pub struct Job {
    meta: MetaId,
    generation: u64,
    status: AtomicU8,
    created: Instant,
    outcome: watch::Sender<Option<JobOutcome>>,
}

impl Job {
    fn new(meta: MetaId, generation: u64) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            meta,
            generation,
            status: AtomicU8::new(JobStatus::Queued as u8),
            created: Instant::now(),
            outcome,
        }
    }

    /// The block this job renders.
    #[must_use]
    pub const fn meta(&self) -> MetaId {
        self.meta
    }

    /// The render generation this job renders with.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire)).unwrap_or(JobStatus::Failed)
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Time since the job was registered.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.created.elapsed()
    }

    /// A receiver that yields the outcome once it is published. Subscribing
    /// after the fact still sees it.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<JobOutcome>> {
        self.outcome.subscribe()
    }

    /// Publish the outcome. Only the first call has an effect.
    fn resolve(&self, outcome: JobOutcome) -> bool {
        let status = if outcome.is_ok() {
            JobStatus::Done
        } else {
            JobStatus::Failed
        };
        let published = self.outcome.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        });
        if published {
            self.set_status(status);
        }
        published
    }
}

/// Result of registering interest in a block.
#[derive(Debug)]
pub enum Registration {
    /// A job for the block was already running; wait on this receiver.
    Joined(watch::Receiver<Option<JobOutcome>>),
    /// A new job was registered and must be started by the caller.
    Started(Arc<Job>),
}

/// Map of in-flight jobs by meta tile and generation.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<(MetaId, u64), Arc<Job>>,
}

impl JobRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the job rendering `meta` at `generation`, or register a new one.
    ///
    /// Jobs of other generations are never joined.
    pub fn register(&self, meta: MetaId, generation: u64) -> Registration {
        match self.register_unless(meta, generation, || None::<Infallible>) {
            Ok(registration) => registration,
            Err(never) => match never {},
        }
    }

    /// Like [`JobRegistry::register`], but runs `recheck` while the vacant
    /// entry is held and registers nothing if it returns a value.
    ///
    /// This closes the gap between a caller's cache lookup and a job that
    /// finished in the meantime.
    ///
    /// # Errors
    ///
    /// Returns the value found by `recheck`.
    pub fn register_unless<T>(
        &self,
        meta: MetaId,
        generation: u64,
        recheck: impl FnOnce() -> Option<T>,
    ) -> Result<Registration, T> {
        match self.jobs.entry((meta, generation)) {
            Entry::Occupied(entry) => {
                let job = entry.get();
                debug!(
                    meta = %meta,
                    generation,
                    status = job.status().as_str(),
                    "joined in-flight job"
                );
                Ok(Registration::Joined(job.subscribe()))
            }
            Entry::Vacant(entry) => {
                if let Some(found) = recheck() {
                    return Err(found);
                }
                let job = Arc::new(Job::new(meta, generation));
                let _ = entry.insert(Arc::clone(&job));
                debug!(meta = %meta, generation, "registered job");
                Ok(Registration::Started(job))
            }
        }
    }

    /// Publish `outcome` to every waiter of `job` and unregister it.
    ///
    /// Returns false if the job already had an outcome.
    pub fn finish(&self, job: &Arc<Job>, outcome: JobOutcome) -> bool {
        let published = job.resolve(outcome);
        let _ = self
            .jobs
            .remove_if(&(job.meta, job.generation), |_, registered| {
                Arc::ptr_eq(registered, job)
            });
        published
    }

    /// The in-flight job for `meta` at `generation`, if any.
    #[must_use]
    pub fn get(&self, meta: MetaId, generation: u64) -> Option<Arc<Job>> {
        self.jobs
            .get(&(meta, generation))
            .map(|job| Arc::clone(job.value()))
    }

    /// Number of in-flight jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if no job is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Wait for the outcome behind `receiver`.
///
/// Holds no lock while waiting. If the job is dropped without publishing,
/// the waiter gets [`RenderError::Abandoned`].
pub async fn wait_for_outcome(
    mut receiver: watch::Receiver<Option<JobOutcome>>,
    meta: MetaId,
) -> JobOutcome {
    loop {
        let current = receiver.borrow_and_update().clone();
        if let Some(outcome) = current {
            return outcome;
        }
        if receiver.changed().await.is_err() {
            let last = receiver.borrow().clone();
            return last.unwrap_or_else(|| Err(RenderError::Abandoned(meta.to_string())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileFormat;

    fn meta() -> MetaId {
        MetaId::for_tile(&TileId::new(3, 5, 6, TileFormat::Png), 4)
    }

    #[test]
    fn test_second_registration_joins() {
        let registry = JobRegistry::new();
        let Registration::Started(job) = registry.register(meta(), 1) else {
            panic!("expected a new job");
        };
        assert!(matches!(registry.register(meta(), 1), Registration::Joined(_)));
        assert_eq!(registry.len(), 1);

        assert!(registry.finish(&job, Err(RenderError::Backend("boom".into()))));
        assert!(!registry.finish(&job, Ok(Arc::default())));
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_recheck_hit_skips_registration() {
        let registry = JobRegistry::new();
        let hit = registry.register_unless(meta(), 1, || Some(Bytes::from_static(b"tile")));
        assert_eq!(hit.err(), Some(Bytes::from_static(b"tile")));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_outcome() {
        let registry = JobRegistry::new();
        let Registration::Started(job) = registry.register(meta(), 1) else {
            panic!("expected a new job");
        };
        let early = job.subscribe();
        let _ = registry.finish(&job, Ok(Arc::default()));
        let late = job.subscribe();
        assert!(wait_for_outcome(early, meta()).await.is_ok());
        assert!(wait_for_outcome(late, meta()).await.is_ok());
        assert_eq!(job.status(), JobStatus::Done);
    }

    #[test]
    fn test_new_generation_starts_its_own_job() {
        let registry = JobRegistry::new();
        let Registration::Started(old) = registry.register(meta(), 1) else {
            panic!("expected a new job");
        };
        let Registration::Started(current) = registry.register(meta(), 2) else {
            panic!("expected a job for the new generation");
        };
        assert_eq!(current.generation(), 2);
        assert!(matches!(registry.register(meta(), 2), Registration::Joined(_)));
        assert_eq!(registry.len(), 2);

        let _ = registry.finish(&old, Ok(Arc::default()));
        assert!(registry.get(meta(), 1).is_none());
        assert!(registry.get(meta(), 2).is_some_and(|job| Arc::ptr_eq(&job, &current)));
    }
}
