use std::env;
use std::path::PathBuf;

/// Risk configuration injected into the risk engine.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Portfolio value used for sizing.
    pub portfolio_value: f64,
    /// Maximum risk per trade as a percentage of the portfolio (2.0 = 2%).
    pub max_risk_pct: f64,
    /// Leverage multiplier applied by callers to stop-based sizes.
    pub leverage: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            portfolio_value: 100.0,
            max_risk_pct: 2.0,
            leverage: 20.0,
        }
    }
}

/// Training session configuration.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of epochs per session.
    pub epochs: usize,
    /// Mini-batch size handed to the trainer.
    pub batch_size: usize,
    /// Fraction of samples held out for validation.
    pub validation_split: f64,
    /// Days of history fetched per session.
    pub history_days: u32,
    /// Compact runtime buffers every N epochs.
    pub compaction_interval: usize,
    /// Learning rate for the bundled softmax trainer.
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            validation_split: 0.2,
            history_days: 365,
            compaction_interval: 10,
            learning_rate: 0.0005,
        }
    }
}

/// Numeric runtime (buffer pool) configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Watchdog poll interval in milliseconds.
    pub watchdog_interval_ms: u64,
    /// Outstanding buffer count that triggers a forced compaction.
    pub buffer_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: 5_000,
            buffer_threshold: 1_000,
        }
    }
}

/// Where historical candles come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataSource {
    Binance,
    Synthetic,
}

/// Market data configuration.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub source: MarketDataSource,
    /// REST base URL for klines.
    pub rest_url: String,
    /// Trading pair, e.g. BCHUSDT.
    pub symbol: String,
    /// Kline interval, e.g. 1m.
    pub interval: String,
    /// Binance API key (optional, public endpoints work without).
    pub api_key: Option<String>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            source: MarketDataSource::Binance,
            rest_url: "https://api.binance.com/api/v3".to_string(),
            symbol: "BCHUSDT".to_string(),
            interval: "1m".to_string(),
            api_key: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub risk: RiskConfig,
    pub training: TrainingConfig,
    pub runtime: RuntimeConfig,
    pub market_data: MarketDataConfig,
    /// Path of the persisted model file.
    pub model_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            risk: RiskConfig::default(),
            training: TrainingConfig::default(),
            runtime: RuntimeConfig::default(),
            market_data: MarketDataConfig::default(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

const DEFAULT_MODEL_PATH: &str = ".augur/model.json";

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let risk_defaults = RiskConfig::default();
        let training_defaults = TrainingConfig::default();
        let runtime_defaults = RuntimeConfig::default();
        let market_defaults = MarketDataConfig::default();

        let source = match env::var("MARKET_DATA_SOURCE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "synthetic" => MarketDataSource::Synthetic,
            _ => MarketDataSource::Binance,
        };

        Self {
            risk: RiskConfig {
                portfolio_value: parse_env("INITIAL_PORTFOLIO_VALUE")
                    .unwrap_or(risk_defaults.portfolio_value),
                max_risk_pct: parse_env("MAX_RISK_PER_TRADE_PCT")
                    .unwrap_or(risk_defaults.max_risk_pct),
                leverage: parse_env("LEVERAGE").unwrap_or(risk_defaults.leverage),
            },
            training: TrainingConfig {
                epochs: parse_env("TRAINING_EPOCHS").unwrap_or(training_defaults.epochs),
                batch_size: parse_env("TRAINING_BATCH_SIZE")
                    .unwrap_or(training_defaults.batch_size),
                validation_split: parse_env("TRAINING_VALIDATION_SPLIT")
                    .unwrap_or(training_defaults.validation_split),
                history_days: parse_env("HISTORY_DAYS").unwrap_or(training_defaults.history_days),
                compaction_interval: parse_env("COMPACTION_INTERVAL_EPOCHS")
                    .unwrap_or(training_defaults.compaction_interval),
                learning_rate: parse_env("LEARNING_RATE")
                    .unwrap_or(training_defaults.learning_rate),
            },
            runtime: RuntimeConfig {
                watchdog_interval_ms: parse_env("WATCHDOG_INTERVAL_MS")
                    .unwrap_or(runtime_defaults.watchdog_interval_ms),
                buffer_threshold: parse_env("BUFFER_THRESHOLD")
                    .unwrap_or(runtime_defaults.buffer_threshold),
            },
            market_data: MarketDataConfig {
                source,
                rest_url: env::var("BINANCE_REST_URL").unwrap_or(market_defaults.rest_url),
                symbol: env::var("SYMBOL").unwrap_or(market_defaults.symbol),
                interval: env::var("KLINE_INTERVAL").unwrap_or(market_defaults.interval),
                api_key: env::var("BINANCE_API_KEY").ok(),
            },
            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH)),
        }
    }
}
