//! Standardized emoji logging for the arbitrage engine
//!
//! One emoji per concern so an execution's lifecycle can be followed in plain
//! text logs: borrow, hops, profit, settlement or revert.

/// Standard emoji set for engine logging
pub struct LogEmoji;

impl LogEmoji {
    // Status indicators
    pub const SUCCESS: &'static str = "✅"; // Execution settled
    pub const ERROR: &'static str = "❌"; // Execution reverted
    pub const WARNING: &'static str = "⚠️"; // Warning or caution

    // Lifecycle
    pub const EXECUTE: &'static str = "⚡"; // Execution started
    pub const LOAN: &'static str = "🏦"; // Flash borrow opened or closed
    pub const MONEY: &'static str = "💰"; // Profit computed
    pub const POOL: &'static str = "🏊"; // Registry and pool diagnostics
}

#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SUCCESS, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!("{} {}", $crate::logging::LogEmoji::ERROR, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        tracing::warn!("{} {}", $crate::logging::LogEmoji::WARNING, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_execution {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::EXECUTE, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_borrow {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::LOAN, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_profit {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::MONEY, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_pool {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::POOL, format!($($arg)*))
    };
}
