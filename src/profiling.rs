//! Exclusive profiling sessions.
//!
//! # Responsibilities
//! - Guarantee at most one active session per profiler
//! - Report elapsed session time (and record it when a registry is attached)
//!
//! # Design Decisions
//! - The profiler is an owned value, not process-global state
//! - Starting while a session is active is an explicit error
//! - Sessions release the profiler on drop, so early returns cannot leak it

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::metrics::{Labels, Registry};

pub const PROFILE_SESSION_SECONDS: &str = "profile_session_seconds";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfilingError {
    #[error("profiling already active (session '{label}')")]
    AlreadyActive { label: String },
}

/// Owner of the "is profiling active" state: the active session's label.
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    active: Arc<Mutex<Option<String>>>,
    registry: Option<Arc<Registry>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record finished session durations into `registry`.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            active: Arc::default(),
            registry: Some(registry),
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Begin a session.
    pub fn start(&self, label: impl Into<String>) -> Result<ProfileSession, ProfilingError> {
        let label = label.into();
        {
            let mut active = self.lock_active();
            if let Some(current) = active.as_ref() {
                tracing::warn!(requested = %label, active = %current, "Profiling already active");
                return Err(ProfilingError::AlreadyActive {
                    label: current.clone(),
                });
            }
            *active = Some(label.clone());
        }
        tracing::info!(label = %label, "Profiling session started");

        Ok(ProfileSession {
            profiler: self.clone(),
            label,
            started: Instant::now(),
            finished: false,
        })
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An active profiling session. Dropping it ends the session.
#[derive(Debug)]
pub struct ProfileSession {
    profiler: Profiler,
    label: String,
    started: Instant,
    finished: bool,
}

impl ProfileSession {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// End the session and return how long it ran.
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    fn finish(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        if self.finished {
            return elapsed;
        }
        self.finished = true;

        if let Some(registry) = &self.profiler.registry {
            registry
                .register_histogram(PROFILE_SESSION_SECONDS, &Labels::from([("label", self.label.as_str())]), None)
                .observe_duration(elapsed);
        }
        *self.profiler.lock_active() = None;
        tracing::info!(label = %self.label, elapsed_ms = elapsed.as_millis() as u64, "Profiling session stopped");
        elapsed
    }
}

impl Drop for ProfileSession {
    fn drop(&mut self) {
        self.finish();
    }
}
