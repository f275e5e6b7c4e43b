//! Numeric runtime: a scratch-buffer pool with a compaction watchdog.
//!
//! Trainers borrow buffers per batch and hand them back. Compaction drops the
//! pooled buffers and forgets anything still outstanding, so a trainer that
//! leaks buffers cannot grow memory past one compaction interval.

use crate::config::RuntimeConfig;
use crate::error::TrainingError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Pool {
    free: Vec<Vec<f64>>,
    outstanding: usize,
    compactions: u64,
}

/// Snapshot of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub initialized: bool,
    pub outstanding: usize,
    pub pooled: usize,
    pub compactions: u64,
}

/// Buffer pool shared by the orchestrator and the trainer.
pub struct ComputeRuntime {
    config: RuntimeConfig,
    initialized: AtomicBool,
    pool: Mutex<Pool>,
    shutdown_tx: broadcast::Sender<()>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl ComputeRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            initialized: AtomicBool::new(false),
            pool: Mutex::new(Pool::default()),
            shutdown_tx,
            watchdog: Mutex::new(None),
        }
    }

    fn pool(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Start the watchdog. Calling again while ready does nothing.
    ///
    /// Must run inside a tokio runtime.
    pub fn initialize(self: &Arc<Self>) -> Result<(), TrainingError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            self.initialized.store(false, Ordering::SeqCst);
            TrainingError::Runtime(format!("no async runtime for watchdog: {}", e))
        })?;

        let weak = Arc::downgrade(self);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let period = Duration::from_millis(self.config.watchdog_interval_ms.max(1));
        let task = handle.spawn(Self::watch(weak, shutdown_rx, period));

        let mut watchdog = self.watchdog.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = watchdog.replace(task) {
            previous.abort();
        }

        info!(
            "Compute runtime ready (watchdog every {}ms, threshold {})",
            self.config.watchdog_interval_ms, self.config.buffer_threshold
        );
        Ok(())
    }

    async fn watch(runtime: Weak<Self>, mut shutdown_rx: broadcast::Receiver<()>, period: Duration) {
        let mut ticker = interval(period);
        // First tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(runtime) = runtime.upgrade() else {
                        break;
                    };
                    let outstanding = runtime.outstanding();
                    if outstanding > runtime.config.buffer_threshold {
                        warn!("High buffer count detected: {} outstanding", outstanding);
                        runtime.compact();
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Compute runtime watchdog stopped");
                    break;
                }
            }
        }
    }

    /// Borrow a zeroed buffer of `len` values.
    pub fn acquire(&self, len: usize) -> Result<Vec<f64>, TrainingError> {
        if !self.is_ready() {
            return Err(TrainingError::Runtime("runtime not initialized".to_string()));
        }

        let mut pool = self.pool();
        pool.outstanding += 1;
        let mut buffer = pool.free.pop().unwrap_or_default();
        buffer.clear();
        buffer.resize(len, 0.0);
        Ok(buffer)
    }

    /// Return a borrowed buffer to the pool.
    pub fn release(&self, buffer: Vec<f64>) {
        let mut pool = self.pool();
        if pool.outstanding > 0 {
            pool.outstanding -= 1;
            pool.free.push(buffer);
        }
        // Buffers borrowed before a compaction are simply dropped
    }

    pub fn outstanding(&self) -> usize {
        self.pool().outstanding
    }

    /// Drop pooled buffers and forget outstanding ones.
    pub fn compact(&self) {
        let mut pool = self.pool();
        let freed = pool.free.len();
        pool.free = Vec::new();
        pool.outstanding = 0;
        pool.compactions += 1;
        debug!("Compacted compute runtime ({} pooled buffers freed)", freed);
    }

    /// Stop the watchdog and compact. Safe to call repeatedly.
    pub fn cleanup(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self
            .watchdog
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        self.compact();
        self.initialized.store(false, Ordering::SeqCst);
        debug!("Compute runtime cleaned up");
    }

    pub fn stats(&self) -> RuntimeStats {
        let pool = self.pool();
        RuntimeStats {
            initialized: self.is_ready(),
            outstanding: pool.outstanding,
            pooled: pool.free.len(),
            compactions: pool.compactions,
        }
    }
}

impl Default for ComputeRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Drop for ComputeRuntime {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
