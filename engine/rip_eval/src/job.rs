//! Job lifecycle.
//!
//! A job is one unit of submitted work. Between jobs the interpreter is
//! `Idle`; an optional configuration phase runs before the real job.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Configuring,
    Running,
    Failed,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Idle => "idle",
            JobPhase::Configuring => "configuring",
            JobPhase::Running => "running",
            JobPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot move job from {from} to {to}")]
pub struct JobError {
    pub from: JobPhase,
    pub to: JobPhase,
}

/// How a job ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSummary {
    pub failed: bool,
    pub aborted: bool,
    pub failure: Option<String>,
}

#[derive(Debug)]
pub struct JobState {
    phase: JobPhase,
    failure: Option<String>,
    completed: u64,
}

impl Default for JobState {
    fn default() -> Self {
        JobState {
            phase: JobPhase::Idle,
            failure: None,
            completed: 0,
        }
    }
}

impl JobState {
    #[inline]
    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Jobs ended so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub(crate) fn configure(&mut self) -> Result<(), JobError> {
        self.transition(JobPhase::Idle, JobPhase::Configuring)
    }

    pub(crate) fn begin_real(&mut self) -> Result<(), JobError> {
        match self.phase {
            JobPhase::Idle | JobPhase::Configuring => {
                self.phase = JobPhase::Running;
                Ok(())
            }
            from => Err(JobError {
                from,
                to: JobPhase::Running,
            }),
        }
    }

    /// Mark the job failed. The first reason is kept.
    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        if self.phase == JobPhase::Idle {
            return;
        }
        self.phase = JobPhase::Failed;
        self.failure.get_or_insert_with(|| reason.into());
    }

    pub(crate) fn end(&mut self, aborted: bool) -> JobSummary {
        let summary = JobSummary {
            failed: self.phase == JobPhase::Failed,
            aborted,
            failure: self.failure.take(),
        };
        self.phase = JobPhase::Idle;
        self.completed += 1;
        summary
    }

    fn transition(&mut self, from: JobPhase, to: JobPhase) -> Result<(), JobError> {
        if self.phase != from {
            return Err(JobError {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }
}
