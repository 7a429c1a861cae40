//! Request handlers and call-count budgets.
//!
//! - `core`: `RequestHandler`, its declaration API and intercepted log
//! - `times`: `TimesBudget` and `check_times` violations

mod core;
mod times;

pub use core::{InterceptedEntry, RequestHandler};
pub use times::{TimesBudget, TimesCheckFailure, TimesViolation};
