pub mod bar_cache;
pub mod retry;
pub mod scanner;
pub mod signals;
pub mod sqlite_store;

pub use bar_cache::BarCache;
pub use retry::RetryPolicy;
pub use scanner::{ScanService, ScannerOptions};
pub use signals::{analyze_bars, SignalConfig};
pub use sqlite_store::{ResultStore, SqliteStore};
