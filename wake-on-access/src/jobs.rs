use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Runs one-shot background jobs on the tokio blocking pool.
///
/// A job receives a cancellation token it is expected to poll. When it
/// finishes without being canceled its completion callback runs on the same
/// blocking thread. Jobs are fire-and-forget: dropping the returned handle
/// neither cancels nor waits for them.
#[derive(Clone)]
pub struct JobRunner {
    handle: Handle,
    next_id: Arc<AtomicU64>,
}

impl JobRunner {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn submit<T, W, C>(&self, name: &'static str, work: W, on_complete: C) -> JobHandle
    where
        T: Send + 'static,
        W: FnOnce(&CancellationToken) -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        // Nothing is ever sent; the sender is dropped when the job ends, which
        // disconnects the receiver even if the job panics.
        let (done_tx, done_rx) = flume::bounded::<()>(0);

        let job_token = token.clone();
        self.handle.spawn_blocking(move || {
            let _done = done_tx;
            let _span = tracing::debug_span!("job", id, name).entered();

            let output = work(&job_token);
            if job_token.is_cancelled() {
                tracing::debug!("Job {} ({}) canceled", id, name);
                return;
            }
            on_complete(output);
        });

        JobHandle { id, token, done: done_rx }
    }
}

pub struct JobHandle {
    id: u64,
    token: CancellationToken,
    done: flume::Receiver<()>,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Ask the job to stop. Its completion callback will not run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_disconnected()
    }

    /// Block until the job has finished, including its completion callback
    pub fn join(&self) {
        let _ = self.done.recv();
    }

    /// Like `join`, giving up after `timeout`. Returns true if the job finished.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.done.recv_timeout(timeout),
            Err(flume::RecvTimeoutError::Disconnected)
        )
    }
}
