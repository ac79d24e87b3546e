//! Convenient re-exports for common dispatchq types.
//!
//! This module provides a single import for most use cases:
//! ```
//! use dispatchq::prelude::*;
//! ```

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::pool::ExecutionPool;
pub use crate::queue::ExecutionQueue;
pub use crate::stream::ExecutionStream;
