//! Cancel-flag registry for live jobs.
//!
//! The flag is handed to every long operation as an explicit parameter;
//! operations observe it at their next suspension point.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct JobCanceler {
    cancel_map: DashMap<String, Arc<AtomicBool>>,
}

impl JobCanceler {
    pub fn new() -> Self {
        Self {
            cancel_map: DashMap::with_capacity(16),
        }
    }

    pub fn get_cancel_flag(&self, job_id: &str) -> Arc<AtomicBool> {
        self.cancel_map
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    pub fn set_cancelled(&self, job_id: &str) {
        if let Some(flag) = self.cancel_map.get(job_id) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_cancelled(&self, job_id: &str) -> bool {
        self.cancel_map
            .get(job_id)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Drop the flag once the job reached a terminal state.
    pub fn remove(&self, job_id: &str) {
        self.cancel_map.remove(job_id);
    }
}

impl Default for JobCanceler {
    fn default() -> Self {
        Self::new()
    }
}
