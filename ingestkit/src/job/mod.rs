//! Job/chunk lifecycle typestate (§4.3), adapted from `Request<State>` in
//! the request-lifecycle module this crate's daemon otherwise uses: illegal
//! transitions (e.g. `completed -> running`) are unrepresentable at the type
//! level. The persisted `jobs.status` column is the serialized projection of
//! whichever state variant last committed — callers own persistence; this
//! module only owns the transition rules.

pub mod retry;

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Queued;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Running {
    pub total_chunks: u32,
    pub chunks_done: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub total_chunks: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failed {
    pub reason: String,
    pub chunks_done: u32,
    pub total_chunks: u32,
    pub failed_at: DateTime<Utc>,
}

pub trait JobState {}
impl JobState for Queued {}
impl JobState for Running {}
impl JobState for Completed {}
impl JobState for Failed {}

#[derive(Debug, Clone)]
pub struct Job<S: JobState> {
    pub id: Uuid,
    pub dataset_id: i64,
    pub owner: i64,
    pub state: S,
}

impl Job<Queued> {
    pub fn new(id: Uuid, dataset_id: i64, owner: i64) -> Self {
        Self {
            id,
            dataset_id,
            owner,
            state: Queued,
        }
    }

    /// `queued --start--> running`
    pub fn start(self) -> Job<Running> {
        Job {
            id: self.id,
            dataset_id: self.dataset_id,
            owner: self.owner,
            state: Running {
                total_chunks: 0,
                chunks_done: 0,
            },
        }
    }
}

/// Outcome of reporting one chunk's success back into a running job.
pub enum ChunkCommitted {
    StillRunning(Job<Running>),
    Completed(Job<Completed>),
}

impl Job<Running> {
    /// Lazily increments `total_chunks` as new batches are formed (in-memory
    /// batching mode) or set once up front (persisted-chunks mode).
    pub fn set_total_chunks(&mut self, total: u32) {
        self.state.total_chunks = total;
    }

    pub fn increment_total_chunks(&mut self) {
        self.state.total_chunks += 1;
    }

    /// `running --chunk-commit--> running` (self-transition), or
    /// `running --all-chunks-ok--> completed` if this was the last chunk.
    pub fn record_chunk_done(mut self) -> ChunkCommitted {
        self.state.chunks_done += 1;
        debug_assert!(self.state.chunks_done <= self.state.total_chunks.max(self.state.chunks_done));

        if self.state.total_chunks > 0 && self.state.chunks_done >= self.state.total_chunks {
            ChunkCommitted::Completed(Job {
                id: self.id,
                dataset_id: self.dataset_id,
                owner: self.owner,
                state: Completed {
                    total_chunks: self.state.total_chunks,
                    completed_at: Utc::now(),
                },
            })
        } else {
            ChunkCommitted::StillRunning(self)
        }
    }

    /// `running --any-chunk-fatal--> failed` or `running --stall-timeout--> failed`.
    pub fn fail(self, reason: impl Into<String>) -> Job<Failed> {
        Job {
            id: self.id,
            dataset_id: self.dataset_id,
            owner: self.owner,
            state: Failed {
                reason: reason.into(),
                chunks_done: self.state.chunks_done,
                total_chunks: self.state.total_chunks,
                failed_at: Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_only_when_all_chunks_done() {
        let job = Job::<Queued>::new(Uuid::new_v4(), 1, 1).start();
        let mut job = job;
        job.set_total_chunks(2);

        let job = match job.record_chunk_done() {
            ChunkCommitted::StillRunning(j) => j,
            ChunkCommitted::Completed(_) => panic!("should not complete after one of two chunks"),
        };

        match job.record_chunk_done() {
            ChunkCommitted::Completed(j) => {
                assert_eq!(j.state.total_chunks, 2);
            }
            ChunkCommitted::StillRunning(_) => panic!("should complete after second of two chunks"),
        }
    }

    #[test]
    fn fail_preserves_chunk_progress() {
        let mut job = Job::<Queued>::new(Uuid::new_v4(), 1, 1).start();
        job.set_total_chunks(5);
        let job = match job.record_chunk_done() {
            ChunkCommitted::StillRunning(j) => j,
            ChunkCommitted::Completed(_) => panic!("unexpected completion"),
        };
        let failed = job.fail("chunk 2 unparseable header");
        assert_eq!(failed.state.chunks_done, 1);
        assert_eq!(failed.state.total_chunks, 5);
        assert_eq!(failed.state.reason, "chunk 2 unparseable header");
    }
}
