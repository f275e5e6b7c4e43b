//! Training session orchestrator.
//!
//! Drives one session at a time through
//! `Idle -> Initializing -> Training -> {Completed, Aborted, Failed} -> Idle`.

use super::runtime::ComputeRuntime;
use super::trainer::{EpochChannel, EpochDirective, EpochReport, Predictor, Trainer};
use crate::config::TrainingConfig;
use crate::error::TrainingError;
use crate::services::backtest::MetricsSink;
use crate::services::execution::PredictorSink;
use crate::services::features::FeaturePipeline;
use crate::sources::MarketData;
use crate::types::{
    FitConfig, SessionStatus, StartOutcome, TrainingData, TrainingMetrics, TrainingProgress,
    TrainingSession, TrainingState, FEATURE_WIDTH,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Outbound progress channel.
pub type ProgressSender = mpsc::UnboundedSender<TrainingProgress>;

/// Everything a session talks to.
pub struct Collaborators {
    pub market_data: Arc<dyn MarketData>,
    pub runtime: Arc<ComputeRuntime>,
    pub metrics_sink: Arc<dyn MetricsSink>,
    pub predictor_sink: Arc<dyn PredictorSink>,
}

/// Owns the session context and runs training sessions.
pub struct TrainingOrchestrator<T: Trainer> {
    config: TrainingConfig,
    trainer: Arc<T>,
    pipeline: FeaturePipeline,
    market_data: Arc<dyn MarketData>,
    runtime: Arc<ComputeRuntime>,
    metrics_sink: Arc<dyn MetricsSink>,
    predictor_sink: Arc<dyn PredictorSink>,
    session: Mutex<TrainingSession>,
    state_tx: watch::Sender<SessionStatus>,
}

/// Returns the session to Idle however `start_training` exits.
struct SessionGuard<'a, T: Trainer> {
    orchestrator: &'a TrainingOrchestrator<T>,
}

impl<T: Trainer> Drop for SessionGuard<'_, T> {
    fn drop(&mut self) {
        let orchestrator = self.orchestrator;
        orchestrator.runtime.compact();

        let mut session = orchestrator.lock_session();
        if session.state.is_active() {
            warn!("Training session dropped while {}", session.state.label());
            orchestrator.set_state(&mut session, TrainingState::Aborted);
        }
        session.abort_requested = false;
        orchestrator.set_state(&mut session, TrainingState::Idle);
    }
}

impl<T: Trainer> TrainingOrchestrator<T> {
    pub fn new(config: TrainingConfig, trainer: T, collaborators: Collaborators) -> Self {
        let (state_tx, _) = watch::channel(SessionStatus::default());
        Self {
            config,
            trainer: Arc::new(trainer),
            pipeline: FeaturePipeline::new(),
            market_data: collaborators.market_data,
            runtime: collaborators.runtime,
            metrics_sink: collaborators.metrics_sink,
            predictor_sink: collaborators.predictor_sink,
            session: Mutex::new(TrainingSession::default()),
            state_tx,
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, TrainingSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the session context.
    pub fn session(&self) -> TrainingSession {
        self.lock_session().clone()
    }

    pub fn state(&self) -> TrainingState {
        self.lock_session().state
    }

    /// Watch state transitions, tagged with the session they belong to.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.state_tx.subscribe()
    }

    pub fn is_in_progress(&self) -> bool {
        self.state().is_active()
    }

    pub fn runtime(&self) -> &Arc<ComputeRuntime> {
        &self.runtime
    }

    /// Move `session` to `next` and publish it. Callers hold the session lock,
    /// so watchers see transitions in the order they happened.
    fn set_state(&self, session: &mut TrainingSession, next: TrainingState) {
        if !session.state.can_transition_to(next) {
            warn!(
                "Unexpected training transition {} -> {}",
                session.state.label(),
                next.label()
            );
        }
        session.state = next;
        debug!("Training state -> {}", next.label());
        self.state_tx.send_replace(session.status());
    }

    fn transition(&self, next: TrainingState) {
        let mut session = self.lock_session();
        self.set_state(&mut session, next);
    }

    fn abort_requested(&self) -> bool {
        self.lock_session().abort_requested
    }

    fn check_abort(&self) -> Result<(), TrainingError> {
        if self.abort_requested() {
            Err(TrainingError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Record progress on the session and forward it to the sink.
    fn report(
        &self,
        progress_tx: &ProgressSender,
        progress: f64,
        log: impl Into<String>,
        metrics: Option<TrainingMetrics>,
    ) {
        let log = log.into();
        let state = {
            let mut session = self.lock_session();
            session.progress = progress;
            session.logs.push(log.clone());
            if let Some(m) = metrics {
                session.metrics.record(m);
            }
            session.state
        };
        // Receiver gone just means nobody is watching
        let _ = progress_tx.send(TrainingProgress {
            state,
            progress,
            log,
            metrics,
        });
    }

    /// Run one training session.
    ///
    /// Returns `AlreadyRunning` without side effects when a session is active.
    /// Cancellation surfaces as `Err(TrainingError::Cancelled)` after the
    /// session has gone `Aborted -> Idle`.
    pub async fn start_training(
        &self,
        progress_tx: ProgressSender,
    ) -> Result<StartOutcome, TrainingError> {
        {
            let mut session = self.lock_session();
            if session.state.is_active() {
                warn!("Training already started");
                return Ok(StartOutcome::AlreadyRunning);
            }
            *session = TrainingSession::begin();
            info!(
                "Training session {} starting",
                session.id.map(|id| id.to_string()).unwrap_or_default()
            );
            self.state_tx.send_replace(session.status());
        }

        let _guard = SessionGuard { orchestrator: self };

        match self.run(&progress_tx).await {
            Ok(()) => {
                self.transition(TrainingState::Completed);
                info!("Training session completed");
                Ok(StartOutcome::Completed)
            }
            Err(e) if e.is_cancelled() => {
                self.transition(TrainingState::Aborted);
                self.runtime.compact();
                self.report(&progress_tx, self.session().progress, "Training aborted", None);
                info!("Training session aborted");
                Err(e)
            }
            Err(e) => {
                self.transition(TrainingState::Failed);
                error!("Training failed: {}", e);
                self.report(&progress_tx, 0.0, format!("Error: {}", e), None);
                Err(e)
            }
        }
    }

    async fn run(&self, progress_tx: &ProgressSender) -> Result<(), TrainingError> {
        self.runtime.initialize()?;
        self.report(progress_tx, 5.0, "Numeric runtime ready", None);
        self.check_abort()?;

        let candles = self
            .market_data
            .fetch_historical(self.config.history_days)
            .await
            .map_err(TrainingError::market_data)?;
        self.report(
            progress_tx,
            20.0,
            format!("Loaded {} data points", candles.len()),
            None,
        );
        self.check_abort()?;

        let data = self.pipeline.prepare(&candles)?;
        self.report(progress_tx, 30.0, "Data prepared", None);
        self.check_abort()?;

        let model = self.trainer.create_model(FEATURE_WIDTH)?;
        self.transition(TrainingState::Training);

        let predictor = self.fit(model, data, progress_tx).await?;
        // The trainer may still have been working when abort was requested
        self.check_abort()?;

        self.report(progress_tx, 100.0, "Training complete", None);
        self.predictor_sink
            .install(predictor)
            .await
            .map_err(TrainingError::handoff)?;
        Ok(())
    }

    /// Fit on a blocking worker, answering each epoch report.
    async fn fit(
        &self,
        model: T::Model,
        data: TrainingData,
        progress_tx: &ProgressSender,
    ) -> Result<Arc<dyn Predictor>, TrainingError> {
        let fit_config = FitConfig {
            epochs: self.config.epochs,
            batch_size: self.config.batch_size,
            validation_split: self.config.validation_split,
            shuffle: true,
            learning_rate: self.config.learning_rate,
        };

        let (channel, mut epochs_rx) = EpochChannel::pair();
        let trainer = self.trainer.clone();
        let runtime = self.runtime.clone();

        let worker = tokio::task::spawn_blocking(move || {
            let mut model = model;
            trainer
                .fit(&mut model, &data, &fit_config, &runtime, &channel)
                .map(|()| model)
        });

        while let Some(report) = epochs_rx.recv().await {
            self.on_epoch_end(report, progress_tx).await;
        }

        let model = worker
            .await
            .map_err(|e| TrainingError::trainer_with_source("trainer worker failed", e))??;
        Ok(Arc::new(model))
    }

    async fn on_epoch_end(&self, report: EpochReport, progress_tx: &ProgressSender) {
        if self.abort_requested() {
            info!("Abort requested, stopping after epoch {}", report.epoch + 1);
            report.reply(EpochDirective::Stop);
            return;
        }

        let total = report.total.max(1);
        let progress = (30.0 + report.epoch as f64 / total as f64 * 70.0).min(100.0);
        self.report(
            progress_tx,
            progress,
            format!("Epoch {}/{}", report.epoch + 1, total),
            Some(report.metrics),
        );

        if let Err(e) = self.metrics_sink.record_training(report.metrics).await {
            error!("Failed to update backtest metrics: {}", e);
        }

        let interval = self.config.compaction_interval.max(1);
        if report.epoch % interval == 0 {
            self.runtime.compact();
        }

        report.reply(EpochDirective::Continue);
    }

    /// Request cancellation.
    ///
    /// With a session running this waits until that session has returned to
    /// Idle. With nothing running it records `Aborted -> Idle`. The runtime is
    /// cleaned up unless a newer session has started in the meantime.
    pub async fn abort(&self) {
        let target = {
            let mut session = self.lock_session();
            // Anything but Idle means a session is still unwinding
            if session.state == TrainingState::Idle {
                self.set_state(&mut session, TrainingState::Aborted);
                self.set_state(&mut session, TrainingState::Idle);
                session.abort_requested = false;
                self.runtime.cleanup();
                return;
            }
            session.abort_requested = true;
            session.id
        };

        info!(
            "Abort requested for session {}",
            target.map(|id| id.to_string()).unwrap_or_default()
        );
        let mut state_rx = self.state_tx.subscribe();
        let _ = state_rx
            .wait_for(|status| status.id != target || status.state == TrainingState::Idle)
            .await;

        let session = self.lock_session();
        if session.state.is_active() {
            debug!("Newer session running, leaving the runtime up");
            return;
        }
        self.runtime.cleanup();
    }
}
