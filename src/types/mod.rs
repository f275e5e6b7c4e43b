pub mod backtest;
pub mod candle;
pub mod features;
pub mod indicators;
pub mod risk;
pub mod training;

pub use backtest::*;
pub use candle::*;
pub use features::*;
pub use indicators::*;
pub use risk::*;
pub use training::*;
