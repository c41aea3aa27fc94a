//! Data sources and multi-symbol alignment.

pub mod align;
pub mod csv_dir;
pub mod provider;
pub mod terminal;

pub use align::{align_and_fill, AlignedData, SeriesSlot};
pub use csv_dir::CsvDirProvider;
pub use provider::{DataError, DataProvider, DataSource, FetchResult, RawBar, ReplayRange};
pub use terminal::TerminalProvider;
