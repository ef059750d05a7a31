pub mod registry;
pub mod retry;
pub mod traits;

// Quote source implementations
pub mod alphavantage;
#[cfg(not(target_arch = "wasm32"))]
pub mod yahoo_finance;
