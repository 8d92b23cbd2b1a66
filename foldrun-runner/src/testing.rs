//! Scripted fakes for the backend seams

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use foldrun_core::domain::job::{JobHandle, JobState};
use foldrun_core::domain::spec::JobSpec;

use crate::backend::{JobCanceller, JobSubmitter, StatusClient, StatusClientFactory};
use crate::error::{JobError, StatusError};

pub(crate) fn transient() -> Result<JobState, StatusError> {
    Err(StatusError::Transient("connection refused".to_string()))
}

/// Answers status queries from a fixed script, in order
pub(crate) struct ScriptedStatus {
    script: Mutex<VecDeque<Result<JobState, StatusError>>>,
    queries: AtomicU32,
    clients: AtomicU32,
}

impl ScriptedStatus {
    pub(crate) fn new(
        script: impl IntoIterator<Item = Result<JobState, StatusError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            queries: AtomicU32::new(0),
            clients: AtomicU32::new(0),
        })
    }

    /// Factory handing out this script, counting each client created
    pub(crate) fn factory(self: &Arc<Self>) -> Arc<dyn StatusClientFactory> {
        let status = Arc::clone(self);
        let create = move || -> Arc<dyn StatusClient> {
            status.clients.fetch_add(1, Ordering::SeqCst);
            Arc::clone(&status) as Arc<dyn StatusClient>
        };
        Arc::new(create)
    }

    pub(crate) fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }

    pub(crate) fn clients_created(&self) -> u32 {
        self.clients.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusClient for ScriptedStatus {
    async fn query(&self, _handle: &JobHandle) -> Result<JobState, StatusError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StatusError::Fatal("status script exhausted".to_string())))
    }
}

/// Records every cancel request
pub(crate) struct CountingCanceller {
    cancelled: Mutex<Vec<JobHandle>>,
    fail: bool,
}

impl CountingCanceller {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    /// Canceller whose requests never get through
    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            cancelled: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.cancelled.lock().unwrap().len()
    }

    pub(crate) fn cancelled(&self) -> Vec<JobHandle> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobCanceller for CountingCanceller {
    async fn cancel(&self, handle: &JobHandle) -> Result<(), JobError> {
        self.cancelled.lock().unwrap().push(handle.clone());
        if self.fail {
            return Err(JobError::CancellationSend {
                handle: handle.clone(),
                message: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

/// Accepts submissions and returns a fixed handle
pub(crate) struct FakeSubmitter {
    handle: Option<String>,
    calls: AtomicU32,
    last: Mutex<Option<JobSpec>>,
}

impl FakeSubmitter {
    pub(crate) fn new(handle: &str) -> Arc<Self> {
        Arc::new(Self {
            handle: Some(handle.to_string()),
            calls: AtomicU32::new(0),
            last: Mutex::new(None),
        })
    }

    /// Submitter that rejects every job
    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            handle: None,
            calls: AtomicU32::new(0),
            last: Mutex::new(None),
        })
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_spec(&self) -> Option<JobSpec> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobSubmitter for FakeSubmitter {
    async fn submit(&self, spec: &JobSpec) -> Result<JobHandle, JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(spec.clone());
        match &self.handle {
            Some(handle) => Ok(JobHandle::new(handle.clone())),
            None => Err(JobError::submission("quota exceeded")),
        }
    }
}
