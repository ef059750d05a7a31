pub mod ledger_service;
pub mod performance_service;
pub mod price_resolver;
pub mod strategy_service;
pub mod valuation_service;
