//! Static initialization-safety analysis for class constructors.
//!
//! Given a resolved, typed class template, the checker reports how
//! initialization safety can be violated: reads of not-yet-assigned fields,
//! calls that may reach overridable code, partially-constructed values
//! escaping into fields, arguments, or inner classes. See
//! [`initck::check_class`] for the entry point.

pub mod diag;
pub mod initck;
pub mod sym;
pub mod tree;
pub mod types;

pub use initck::{CheckConfig, CheckContext, CheckOutput, check_class};
