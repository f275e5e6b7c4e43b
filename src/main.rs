use augur::config::{Config, MarketDataSource};
use augur::services::{
    BacktestStore, Collaborators, ComputeRuntime, FeaturePipeline, JsonModelStore, ModelStore,
    RiskEngine, SoftmaxModel, SoftmaxTrainer, TradingDesk, TrainingOrchestrator,
};
use augur::sources::{BinanceClient, MarketData, SyntheticFeed};
use augur::{PositionSide, TrainingError, TrainingProgress};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "augur=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Starting Augur for {} ({} candles, {:?} source)",
        config.market_data.symbol, config.market_data.interval, config.market_data.source
    );

    let market_data: Arc<dyn MarketData> = match config.market_data.source {
        MarketDataSource::Binance => Arc::new(BinanceClient::new(config.market_data.clone())),
        MarketDataSource::Synthetic => Arc::new(SyntheticFeed::default()),
    };

    let model_store = Arc::new(JsonModelStore::new(config.model_path.clone()));
    let risk = RiskEngine::new(config.risk.clone());
    let desk = Arc::new(TradingDesk::new(model_store.clone(), risk.clone()));
    let backtest = Arc::new(BacktestStore::new());
    let runtime = Arc::new(ComputeRuntime::new(config.runtime.clone()));

    let orchestrator = Arc::new(TrainingOrchestrator::new(
        config.training.clone(),
        SoftmaxTrainer::new(),
        Collaborators {
            market_data: market_data.clone(),
            runtime: runtime.clone(),
            metrics_sink: backtest.clone(),
            predictor_sink: desk.clone(),
        },
    ));

    if model_store.needs_retraining(chrono::Utc::now()) {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<TrainingProgress>();

        let printer = tokio::spawn(async move {
            while let Some(update) = progress_rx.recv().await {
                info!("[{:>5.1}%] {}", update.progress, update.log);
            }
        });

        let session = orchestrator.clone();
        let mut training = tokio::spawn(async move { session.start_training(progress_tx).await });

        let result = tokio::select! {
            joined = &mut training => joined,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupt received, aborting training");
                orchestrator.abort().await;
                (&mut training).await
            }
        };

        match result? {
            Ok(outcome) => info!("Training finished: {:?}", outcome),
            Err(TrainingError::Cancelled) => {
                info!("Training cancelled");
                printer.abort();
                return Ok(());
            }
            Err(e) => {
                error!("Training failed: {}", e);
                printer.abort();
                return Err(e.into());
            }
        }
        let _ = printer.await;
    } else if let Some(stored) = model_store.load()? {
        info!("Using stored model trained at {}", stored.trained_at);
        let model = SoftmaxModel::from_snapshot(stored.model)?;
        desk.set_predictor(Arc::new(model));
    }

    let Some(predictor) = desk.predictor() else {
        warn!("No predictor available");
        return Ok(());
    };

    // Evaluate the predictor on fresh history
    let candles = market_data
        .fetch_historical(config.training.history_days)
        .await?;
    let data = FeaturePipeline::new().prepare(&candles)?;
    let predictions: Vec<_> = data
        .features()
        .iter()
        .map(|features| predictor.predict(features))
        .collect();
    // Row k belongs to candle k + 20
    let prices: Vec<f64> = candles[20..].iter().map(|c| c.close).collect();
    let metrics = backtest.record_evaluation(&predictions, &prices).await;
    info!("Backtest metrics: {:?}", metrics);

    let signal = desk.signal_for(&candles)?;
    info!(
        "Latest signal at {}: buy {:.3}, sell {:.3}, hold {:.3}",
        signal.price, signal.signals.buy, signal.signals.sell, signal.signals.hold
    );
    match signal.risk {
        Some(plan) => info!(
            "{:?} plan: stop {:.4}, targets {:?}, sizes {:?}, leveraged {:.2}",
            signal.side.unwrap_or(PositionSide::Long),
            plan.stop_loss,
            plan.take_profit_levels,
            plan.position_sizes,
            risk.leveraged(plan.total_size())
        ),
        None => info!("No trade: hold"),
    }

    runtime.cleanup();
    Ok(())
}
