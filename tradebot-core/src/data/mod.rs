//! Market data: providers, fallback chain, CSV import and canonicalization.

pub mod canonicalize;
pub mod circuit_breaker;
pub mod csv_import;
pub mod fallback;
pub mod provider;
pub mod stooq;
pub mod synthetic;
pub mod yahoo;

pub use canonicalize::{canonicalize, suspicious_rows};
pub use circuit_breaker::CircuitBreaker;
pub use csv_import::{load_csv, parse_csv, parse_timestamp, save_csv, write_csv};
pub use fallback::{FallbackChain, SourcePreference};
pub use provider::{DataError, DataProvider, DataSource, FetchRange, FetchResult, Interval};
pub use stooq::StooqProvider;
pub use yahoo::YahooProvider;
