//! Engine configuration defaults
//!
//! Default values used when a configuration file leaves a field out.

/// Settlement defaults
pub mod settlement {
    /// Share of net profit forwarded to the relay (basis points)
    pub const RELAY_SHARE_BPS: u32 = 0;

    /// Upper bound for any basis-point setting
    pub const MAX_BPS: u32 = 10_000;
}

/// Flash lender defaults
pub mod lenders {
    /// Aave-style flash loan premium (basis points)
    pub const DEFAULT_FEE_BPS: u32 = 9;
}

/// Logging defaults
pub mod logging {
    pub const LEVEL: &str = "info";

    /// Env var that overrides the configured filter
    pub const FILTER_ENV: &str = "RUST_LOG";
}

/// Environment overrides
pub mod env {
    /// Prefix for overrides, e.g. `ARB__SETTLEMENT__RELAY_SHARE_BPS`
    pub const PREFIX: &str = "ARB";

    /// Separator between prefix and nested keys
    pub const SEPARATOR: &str = "__";
}
