//! One connection, one operation at a time.
//!
//! A [`Session`] owns the connected reader and runs each operation on a worker
//! thread so the caller stays responsive. While an operation is in flight a
//! second one is refused with [`SessionError::Busy`] instead of being queued.
//! Running operations cannot be cancelled; they end at their own deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::reader::HfRfid;
use crate::transport::RfidTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Another operation is still running
    #[error("another operation is in progress, wait until it completes")]
    Busy,
    /// No reader is attached
    #[error("not connected")]
    NotConnected,
    /// The operation panicked on its worker thread
    #[error("operation panicked")]
    Panicked,
}

/// Clears the busy flag when the worker finishes, panicking or not.
struct IdleOnDrop(Arc<AtomicBool>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to an operation started with [`Session::spawn`]
#[derive(Debug)]
pub struct TaskHandle<R> {
    handle: JoinHandle<Option<R>>,
}

impl<R> TaskHandle<R> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the operation and take its result.
    pub fn join(self) -> Result<R, SessionError> {
        match self.handle.join() {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(SessionError::NotConnected),
            Err(_) => Err(SessionError::Panicked),
        }
    }
}

pub struct Session<T: RfidTransport + Send + 'static> {
    reader: Arc<Mutex<Option<HfRfid<T>>>>,
    busy: Arc<AtomicBool>,
    connected: AtomicBool,
}

impl<T: RfidTransport + Send + 'static> Default for Session<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RfidTransport + Send + 'static> Session<T> {
    pub fn new() -> Self {
        Self {
            reader: Arc::new(Mutex::new(None)),
            busy: Arc::new(AtomicBool::new(false)),
            connected: AtomicBool::new(false),
        }
    }

    /// Take ownership of a connected reader, closing the previous one first.
    ///
    /// Stale input left on the new line is discarded; a failure there is
    /// logged and the reader is attached anyway.
    pub fn attach(&self, mut reader: HfRfid<T>) -> Result<(), SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        if let Err(e) = reader.discard_input() {
            warn!("Could not discard stale input on attach: {}", e);
        }
        let mut slot = self.slot();
        // drop the old transport before the new one takes over the line
        slot.take();
        *slot = Some(reader);
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    /// Release the reader; dropping it closes the transport.
    pub fn detach(&self) -> Result<Option<HfRfid<T>>, SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        let reader = self.slot().take();
        self.connected.store(false, Ordering::Release);
        Ok(reader)
    }

    /// Answers without waiting for a running operation.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run `job` against the reader on a worker thread.
    ///
    /// Fails fast with [`SessionError::Busy`] while another job runs and
    /// with [`SessionError::NotConnected`] when no reader is attached.
    pub fn spawn<F, R>(&self, job: F) -> Result<TaskHandle<R>, SessionError>
    where
        F: FnOnce(&mut HfRfid<T>) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejected operation: session busy");
            return Err(SessionError::Busy);
        }
        let idle = IdleOnDrop(Arc::clone(&self.busy));

        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let reader = Arc::clone(&self.reader);
        let handle = thread::spawn(move || {
            let _idle = idle;
            let mut slot = reader.lock().unwrap_or_else(PoisonError::into_inner);
            slot.as_mut().map(job)
        });
        Ok(TaskHandle { handle })
    }

    fn slot(&self) -> MutexGuard<'_, Option<HfRfid<T>>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
