//! Core conversion logic and abstractions

pub mod config;
pub mod conversion;
pub mod currency;
pub mod favorites;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use conversion::{ConversionEngine, RefreshOutcome, RefreshTicket};
pub use currency::CurrencyCode;
pub use favorites::Favorites;
pub use rates::{RateProvider, RateTable};
