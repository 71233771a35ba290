//! Download orchestration: the provider fallback loop, payload fetch,
//! validation, and atomic saves.
//!
//! # Example
//!
//! ```
//! use paperfetch_core::download::{PdfValidator, Validator};
//!
//! let verdict = PdfValidator.validate(b"<html>not a pdf</html>");
//! assert!(!verdict.is_valid());
//! ```

mod engine;
mod error;
mod fetch;
pub mod filename;
mod log;
mod validator;

pub use engine::{BatchOutcome, DownloadEngine, EngineError, EngineOptions, NOT_STARTED_REASON};
pub use error::{AcquireError, FetchError, PersistError};
pub use fetch::{MAX_PAYLOAD_BYTES, fetch_payload};
pub use log::{
    Attempt, AttemptLog, AttemptStatus, BatchSummary, DownloadResult, ProgressHook, ResultStatus,
};
pub use validator::{
    AcceptAll, MIN_PDF_BYTES, PdfValidator, TRAILER_WINDOW, Validation, ValidationFailure,
    Validator,
};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, FetchError>` explicitly in function signatures.
