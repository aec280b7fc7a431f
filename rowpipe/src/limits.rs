//! Resource limiting for protecting system capacity (§5 backpressure).
//!
//! A semaphore + RAII-permit shape for job-queue admission control.
//! `create_job` acquires a permit for the job's full
//! lifetime (queued through completed/failed) and releases it when the job's
//! terminal state is recorded, bounding how many jobs may be in flight at
//! once regardless of which worker is processing them.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::WorkerConfig;
use crate::errors::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct Limiters {
    /// Limiter bounding concurrently in-flight jobs. `None` means unlimited.
    pub job_queue: Option<Arc<JobQueueLimiter>>,
}

impl Limiters {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            job_queue: JobQueueLimiter::new(config).map(Arc::new),
        }
    }
}

/// Admission control for `POST /jobs` (§4.3, §5). Rejects new jobs
/// immediately with 503 once `queue_high_water_mark` jobs are already queued
/// or running; does not make callers wait, since a full queue is a signal to
/// back off rather than a transient dip in capacity.
#[derive(Debug)]
pub struct JobQueueLimiter {
    semaphore: Arc<Semaphore>,
}

impl JobQueueLimiter {
    /// Returns `None` (unlimited) when `queue_high_water_mark` is zero.
    pub fn new(config: &WorkerConfig) -> Option<Self> {
        if config.queue_high_water_mark == 0 {
            return None;
        }
        Some(Self {
            semaphore: Arc::new(Semaphore::new(config.queue_high_water_mark)),
        })
    }

    pub fn try_acquire(&self) -> Result<JobQueuePermit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(JobQueuePermit { _permit: permit }),
            Err(_) => Err(Error::Unavailable {
                message: "Job queue is at capacity, please retry later".to_string(),
            }),
        }
    }
}

/// RAII guard; dropping it (job reaches a terminal state) frees the slot.
#[must_use]
pub struct JobQueuePermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(high_water_mark: usize) -> WorkerConfig {
        WorkerConfig {
            queue_high_water_mark: high_water_mark,
            ..Default::default()
        }
    }

    #[test]
    fn unlimited_returns_none() {
        let config = test_config(0);
        assert!(JobQueueLimiter::new(&config).is_none());
    }

    #[test]
    fn acquire_succeeds_under_capacity() {
        let config = test_config(2);
        let limiter = JobQueueLimiter::new(&config).unwrap();
        let _p1 = limiter.try_acquire().unwrap();
        let _p2 = limiter.try_acquire().unwrap();
    }

    #[test]
    fn acquire_rejects_at_capacity() {
        let config = test_config(1);
        let limiter = JobQueueLimiter::new(&config).unwrap();
        let _p1 = limiter.try_acquire().unwrap();

        let result = limiter.try_acquire();
        assert!(matches!(result, Err(Error::Unavailable { .. })));
    }

    #[test]
    fn slot_is_released_on_drop() {
        let config = test_config(1);
        let limiter = JobQueueLimiter::new(&config).unwrap();
        {
            let _p1 = limiter.try_acquire().unwrap();
        }
        assert!(limiter.try_acquire().is_ok());
    }
}
