//! Commonly used imports
//!
//! Use `use contseq::prelude::*;` for quick access to the most common types and functions.

// Chains and terminals
pub use crate::{Chain, Consumer, Listener, Observable, Sequence, Subscription, source};

// Joins
pub use crate::{combine, select, zip};

// Signals and errors
pub use crate::{ErrorContext, StreamError, Termination};

// Error handlers
pub use crate::{handler, swallow_errors, terminate_on_error};
