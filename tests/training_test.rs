//! Training Session Tests
//!
//! Single-flight start, cancellation, failure propagation and the drop
//! guard, driven through the orchestrator with in-memory collaborators.

use augur::config::TrainingConfig;
use augur::services::training::EpochChannel;
use augur::services::{
    BacktestStore, Collaborators, ComputeRuntime, MetricsSink, Predictor, PredictorSink,
    SoftmaxModel, SoftmaxTrainer, Trainer, TrainingOrchestrator,
};
use augur::sources::{MarketData, SyntheticFeed};
use augur::{
    AppError, Candle, FitConfig, StartOutcome, TrainingData, TrainingError, TrainingMetrics,
    TrainingProgress, TrainingState,
};
use std::error::Error as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, timeout};

// ============================================================================
// Collaborators
// ============================================================================

/// Candle source that counts calls and can hold each fetch until released.
struct GatedFeed {
    candles: Vec<Candle>,
    fetches: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl GatedFeed {
    fn open(count: usize) -> Self {
        Self {
            candles: SyntheticFeed::new(21).generate(count),
            fetches: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn gated(count: usize, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::open(count)
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl MarketData for GatedFeed {
    fn fetch_historical(
        &self,
        _days: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Candle>>> + Send + '_>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(self.candles.clone())
        })
    }
}

struct BrokenFeed;

impl MarketData for BrokenFeed {
    fn fetch_historical(
        &self,
        _days: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Candle>>> + Send + '_>> {
        Box::pin(async { Err(anyhow::anyhow!("Binance API error: 503")) })
    }
}

#[derive(Default)]
struct RecordingDesk {
    installs: AtomicUsize,
    fail: bool,
}

impl PredictorSink for RecordingDesk {
    fn install(
        &self,
        _predictor: Arc<dyn Predictor>,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail {
                return Err(AppError::Internal("model write failed".to_string()));
            }
            self.installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[derive(Default)]
struct FailingSink {
    calls: Mutex<Vec<TrainingMetrics>>,
}

impl MetricsSink for FailingSink {
    fn record_training(
        &self,
        metrics: TrainingMetrics,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + '_>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(metrics);
            Err(AppError::Internal("store offline".to_string()))
        })
    }
}

/// Softmax trainer that keeps working after its last epoch report.
struct LingeringTrainer {
    inner: SoftmaxTrainer,
    linger: Duration,
}

impl Trainer for LingeringTrainer {
    type Model = SoftmaxModel;

    fn create_model(&self, input_width: usize) -> Result<SoftmaxModel, TrainingError> {
        self.inner.create_model(input_width)
    }

    fn fit(
        &self,
        model: &mut SoftmaxModel,
        data: &TrainingData,
        config: &FitConfig,
        runtime: &ComputeRuntime,
        epochs: &EpochChannel,
    ) -> Result<(), TrainingError> {
        self.inner.fit(model, data, config, runtime, epochs)?;
        std::thread::sleep(self.linger);
        Ok(())
    }
}

fn config(epochs: usize) -> TrainingConfig {
    TrainingConfig {
        epochs,
        ..TrainingConfig::default()
    }
}

fn build(
    epochs: usize,
    market_data: Arc<dyn MarketData>,
    metrics_sink: Arc<dyn MetricsSink>,
    desk: Arc<RecordingDesk>,
) -> Arc<TrainingOrchestrator<SoftmaxTrainer>> {
    build_with(
        SoftmaxTrainer::with_seed(5),
        epochs,
        market_data,
        metrics_sink,
        desk,
    )
}

fn build_with<T: Trainer>(
    trainer: T,
    epochs: usize,
    market_data: Arc<dyn MarketData>,
    metrics_sink: Arc<dyn MetricsSink>,
    desk: Arc<RecordingDesk>,
) -> Arc<TrainingOrchestrator<T>> {
    Arc::new(TrainingOrchestrator::new(
        config(epochs),
        trainer,
        Collaborators {
            market_data,
            runtime: Arc::new(ComputeRuntime::default()),
            metrics_sink,
            predictor_sink: desk,
        },
    ))
}

fn drain(rx: &mut mpsc::UnboundedReceiver<TrainingProgress>) -> Vec<TrainingProgress> {
    let mut out = Vec::new();
    while let Ok(update) = rx.try_recv() {
        out.push(update);
    }
    out
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !check() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ============================================================================
// Single flight
// ============================================================================

#[tokio::test]
async fn test_second_start_while_initializing_is_noop() {
    let gate = Arc::new(Notify::new());
    let feed = Arc::new(GatedFeed::gated(200, gate.clone()));
    let desk = Arc::new(RecordingDesk::default());
    let orchestrator = build(3, feed.clone(), Arc::new(BacktestStore::new()), desk.clone());

    let (tx, _rx) = mpsc::unbounded_channel();
    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_training(tx).await })
    };

    wait_until(|| feed.fetches() == 1).await;
    assert_eq!(orchestrator.state(), TrainingState::Initializing);
    assert!(orchestrator.is_in_progress());
    let before = orchestrator.session();

    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let second = orchestrator.start_training(tx2).await.unwrap();
    assert_eq!(second, StartOutcome::AlreadyRunning);
    assert_eq!(feed.fetches(), 1);
    assert!(drain(&mut rx2).is_empty());

    let after = orchestrator.session();
    assert_eq!(after.id, before.id);
    assert_eq!(after.progress, before.progress);
    assert_eq!(after.logs, before.logs);

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome, StartOutcome::Completed);
    assert_eq!(feed.fetches(), 1);
    assert_eq!(desk.installs.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.state(), TrainingState::Idle);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_abort_mid_training_then_restart() {
    let feed = Arc::new(GatedFeed::open(200));
    let desk = Arc::new(RecordingDesk::default());
    let orchestrator = build(5_000, feed, Arc::new(BacktestStore::new()), desk.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_training(tx).await })
    };

    // Wait for the first epoch report
    let mut seen = Vec::new();
    loop {
        let update = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let is_epoch = update.log.starts_with("Epoch ");
        seen.push(update);
        if is_epoch {
            break;
        }
    }
    assert_eq!(orchestrator.state(), TrainingState::Training);

    orchestrator.abort().await;
    assert_eq!(orchestrator.state(), TrainingState::Idle);

    let result = running.await.unwrap();
    assert!(matches!(result, Err(TrainingError::Cancelled)));
    assert_eq!(desk.installs.load(Ordering::SeqCst), 0);

    seen.extend(drain(&mut rx));
    let aborted = seen.iter().position(|u| u.state == TrainingState::Aborted);
    assert!(aborted.is_some());
    assert_eq!(seen.last().unwrap().state, TrainingState::Aborted);
    assert!(!orchestrator.session().abort_requested);

    // No busy state left behind: a new session starts and reaches training
    let (tx, _rx) = mpsc::unbounded_channel();
    let again = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_training(tx).await })
    };
    wait_until(|| orchestrator.state() == TrainingState::Training).await;
    orchestrator.abort().await;
    assert!(matches!(again.await.unwrap(), Err(TrainingError::Cancelled)));
    assert_eq!(orchestrator.state(), TrainingState::Idle);
}

#[tokio::test]
async fn test_abort_during_fetch_stops_before_training() {
    let gate = Arc::new(Notify::new());
    let feed = Arc::new(GatedFeed::gated(200, gate.clone()));
    let desk = Arc::new(RecordingDesk::default());
    let orchestrator = build(3, feed.clone(), Arc::new(BacktestStore::new()), desk.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_training(tx).await })
    };
    wait_until(|| feed.fetches() == 1).await;

    let aborter = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.abort().await })
    };
    wait_until(|| orchestrator.session().abort_requested).await;
    gate.notify_one();

    aborter.await.unwrap();
    assert!(matches!(running.await.unwrap(), Err(TrainingError::Cancelled)));
    assert!(drain(&mut rx).iter().all(|u| !u.log.starts_with("Epoch ")));
    assert_eq!(orchestrator.state(), TrainingState::Idle);
}

#[tokio::test]
async fn test_abort_after_last_epoch_skips_install() {
    let desk = Arc::new(RecordingDesk::default());
    let trainer = LingeringTrainer {
        inner: SoftmaxTrainer::with_seed(5),
        linger: Duration::from_millis(300),
    };
    let orchestrator = build_with(
        trainer,
        1,
        Arc::new(GatedFeed::open(200)),
        Arc::new(BacktestStore::new()),
        desk.clone(),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_training(tx).await })
    };

    // The only epoch has been answered; the trainer is still busy
    loop {
        let update = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if update.log == "Epoch 1/1" {
            break;
        }
    }

    orchestrator.abort().await;
    assert_eq!(orchestrator.state(), TrainingState::Idle);

    assert!(matches!(running.await.unwrap(), Err(TrainingError::Cancelled)));
    assert_eq!(desk.installs.load(Ordering::SeqCst), 0);
    let updates = drain(&mut rx);
    assert!(updates.iter().all(|u| u.progress < 100.0));
    assert_eq!(updates.last().unwrap().state, TrainingState::Aborted);
}

#[tokio::test]
async fn test_late_abort_does_not_touch_next_session() {
    let gate = Arc::new(Notify::new());
    let feed = Arc::new(GatedFeed::gated(200, gate.clone()));
    let desk = Arc::new(RecordingDesk::default());
    let orchestrator = build(2, feed.clone(), Arc::new(BacktestStore::new()), desk.clone());

    let (tx, _rx) = mpsc::unbounded_channel();
    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_training(tx).await })
    };
    wait_until(|| feed.fetches() == 1).await;
    let first_id = orchestrator.session().id;

    // Register the abort, then stop polling it
    let abort = orchestrator.abort();
    tokio::pin!(abort);
    assert!(timeout(Duration::from_millis(10), &mut abort).await.is_err());
    assert!(orchestrator.session().abort_requested);

    gate.notify_one();
    assert!(matches!(first.await.unwrap(), Err(TrainingError::Cancelled)));
    assert_eq!(orchestrator.state(), TrainingState::Idle);

    // A new session starts before the pending abort runs again
    let (tx, _rx) = mpsc::unbounded_channel();
    let second = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_training(tx).await })
    };
    wait_until(|| feed.fetches() == 2).await;
    assert_ne!(orchestrator.session().id, first_id);

    timeout(Duration::from_secs(2), &mut abort)
        .await
        .expect("abort should settle once its own session is gone");

    let session = orchestrator.session();
    assert_eq!(session.state, TrainingState::Initializing);
    assert!(!session.abort_requested);
    assert!(orchestrator.runtime().is_ready());

    gate.notify_one();
    assert_eq!(second.await.unwrap().unwrap(), StartOutcome::Completed);
    assert_eq!(desk.installs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropped_session_returns_to_idle() {
    let feed = Arc::new(GatedFeed::open(200));
    let orchestrator = build(
        5_000,
        feed,
        Arc::new(BacktestStore::new()),
        Arc::new(RecordingDesk::default()),
    );

    let (tx, _rx) = mpsc::unbounded_channel();
    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_training(tx).await })
    };
    wait_until(|| orchestrator.state() == TrainingState::Training).await;

    running.abort();
    let mut state_rx = orchestrator.subscribe();
    timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| s.state == TrainingState::Idle),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(!orchestrator.is_in_progress());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_fetch_failure_reraised_and_reported() {
    let desk = Arc::new(RecordingDesk::default());
    let orchestrator = build(3, Arc::new(BrokenFeed), Arc::new(BacktestStore::new()), desk);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let err = orchestrator.start_training(tx).await.unwrap_err();
    assert!(matches!(err, TrainingError::MarketData { ref message, .. } if message.contains("503")));
    assert!(err.source().is_some());
    assert_eq!(orchestrator.state(), TrainingState::Idle);

    let updates = drain(&mut rx);
    let last = updates.last().unwrap();
    assert_eq!(last.state, TrainingState::Failed);
    assert_eq!(last.progress, 0.0);
    assert!(last.log.starts_with("Error: "));
    assert!(orchestrator
        .session()
        .logs
        .iter()
        .any(|l| l.starts_with("Error: ")));
}

#[tokio::test]
async fn test_handoff_failure_fails_session() {
    let desk = Arc::new(RecordingDesk {
        fail: true,
        ..RecordingDesk::default()
    });
    let orchestrator = build(
        2,
        Arc::new(GatedFeed::open(200)),
        Arc::new(BacktestStore::new()),
        desk,
    );

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = orchestrator.start_training(tx).await.unwrap_err();
    assert!(matches!(err, TrainingError::Handoff { .. }));
    assert!(err.to_string().contains("model write failed"));
    assert_eq!(orchestrator.state(), TrainingState::Idle);
}

#[tokio::test]
async fn test_metric_sink_failure_is_not_fatal() {
    let sink = Arc::new(FailingSink::default());
    let desk = Arc::new(RecordingDesk::default());
    let orchestrator = build(4, Arc::new(GatedFeed::open(200)), sink.clone(), desk.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = orchestrator.start_training(tx).await.unwrap();
    assert_eq!(outcome, StartOutcome::Completed);
    assert_eq!(sink.calls.lock().unwrap().len(), 4);
    assert_eq!(desk.installs.load(Ordering::SeqCst), 1);

    let updates = drain(&mut rx);
    assert_eq!(updates.last().unwrap().progress, 100.0);
    let metrics = orchestrator.session().metrics;
    assert!(metrics.loss > 0.0);
}
