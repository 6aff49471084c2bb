use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::error;

use crate::common::{PageId, Result, StorageError, DISK_REQUEST_QUEUE_DEPTH, PAGE_SIZE};
use crate::storage::heap::HeapFile;
use crate::storage::page::HeapPage;

/// A disk I/O request against one heap file
pub enum DiskRequest {
    /// Read and decode a page
    Read {
        file: Arc<HeapFile>,
        page_id: PageId,
        done: Sender<Result<HeapPage>>,
    },
    /// Overwrite a page with the given bytes
    Write {
        file: Arc<HeapFile>,
        page_id: PageId,
        data: Box<[u8; PAGE_SIZE]>,
        done: Sender<Result<()>>,
    },
}

/// DiskScheduler manages a background worker thread that processes page I/O
/// for the buffer pool. Requests are queued on a channel and executed in
/// arrival order; the `*_sync` helpers block until their request completes.
pub struct DiskScheduler {
    /// Channel sender for queuing requests
    request_sender: Sender<DiskRequest>,
    /// Flag to signal shutdown
    shutdown: Arc<AtomicBool>,
    /// Handle to the background worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler and spawns its worker thread.
    pub fn new() -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(DISK_REQUEST_QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));

        let shutdown_clone = Arc::clone(&shutdown);
        let worker_handle = thread::spawn(move || {
            Self::start_worker_thread(receiver, shutdown_clone);
        });

        Self {
            request_sender: sender,
            shutdown,
            worker_handle: Some(worker_handle),
        }
    }

    /// Schedules a disk request for processing by the background worker.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .send(request)
            .map_err(|e| StorageError::DiskScheduler(format!("Failed to schedule request: {}", e)))
    }

    /// Schedules a page read and waits for the decoded page.
    pub fn schedule_read_sync(&self, file: Arc<HeapFile>, page_id: PageId) -> Result<HeapPage> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Read {
            file,
            page_id,
            done: tx,
        })?;

        rx.recv().map_err(|e| {
            StorageError::DiskScheduler(format!("Failed to receive completion: {}", e))
        })?
    }

    /// Schedules a page write and waits for it to reach the file.
    pub fn schedule_write_sync(
        &self,
        file: Arc<HeapFile>,
        page_id: PageId,
        data: Box<[u8; PAGE_SIZE]>,
    ) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Write {
            file,
            page_id,
            data,
            done: tx,
        })?;

        rx.recv().map_err(|e| {
            StorageError::DiskScheduler(format!("Failed to receive completion: {}", e))
        })?
    }

    /// The background worker thread function.
    /// Processes requests from the queue until shutdown is signaled.
    fn start_worker_thread(receiver: Receiver<DiskRequest>, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                // Drain remaining requests before exiting
                while let Ok(request) = receiver.try_recv() {
                    Self::process_request(request);
                }
                break;
            }

            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(request) => Self::process_request(request),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Executes a single request and reports its outcome to the requester.
    fn process_request(request: DiskRequest) {
        match request {
            DiskRequest::Read {
                file,
                page_id,
                done,
            } => {
                let result = file.read_page(page_id);
                if let Err(e) = &result {
                    error!("read of {} failed: {}", page_id, e);
                }
                let _ = done.send(result);
            }
            DiskRequest::Write {
                file,
                page_id,
                data,
                done,
            } => {
                let result = file.write_page_data(page_id, &data[..]);
                if let Err(e) = &result {
                    error!("write of {} failed: {}", page_id, e);
                }
                let _ = done.send(result);
            }
        }
    }
}

impl Default for DiskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
