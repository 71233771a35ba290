//! Bibliography input.
//!
//! Turns a RIS export into `(doi, metadata)` entries for the download engine.
//!
//! # Example
//!
//! ```
//! use paperfetch_core::parser::parse_ris;
//!
//! let result = parse_ris("TY  - JOUR\nDO  - 10.1000/xyz\nPY  - 2019\nER  -\n");
//! assert_eq!(result.entries.len(), 1);
//! assert_eq!(result.entries[0].metadata.year(), "2019");
//! ```

mod error;
mod metadata;
mod ris;

pub use error::ParseError;
pub use metadata::{BibEntry, Metadata, UNKNOWN};
pub use ris::{RisParseResult, load_ris, parse_ris};
