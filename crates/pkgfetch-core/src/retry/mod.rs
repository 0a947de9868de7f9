//! Retry classification and budget.
//!
//! Transport failures are mapped onto the `FetchError` taxonomy using an
//! injectable table of retryable HTTP and curl codes. A drain gets a budget
//! scaled by the number of mirrors; every retryable failure spends one unit.

mod budget;
mod classify;

pub use budget::{Attempt, RetryBudget};
pub use classify::{classify_curl_error, classify_http_status, classify_io_error, RetryTable};
