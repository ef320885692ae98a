//! Integration tests: full scans through the public API with an
//! in-memory market-data source.

mod mock_source;
mod scan;
