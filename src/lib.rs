pub mod columns;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod load;
pub mod memo;
pub mod merge;
pub mod normalize;
pub mod records;
pub mod session;
pub mod summary;
pub mod table;

pub use config::{DataSource, Settings};
pub use error::{ExplorerError, Outcome, Result};
pub use fetch::{DownloadCache, HttpTransport, Transport};
pub use filter::FilterCriteria;
pub use session::Session;
pub use summary::Summary;
pub use table::Table;
