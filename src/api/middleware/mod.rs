//! API middleware stack.
//!
//! Only one layer today: the access logger, which wraps every route.

pub mod audit;
