//! Service layer
//!
//! Services contain the business logic of the worker. Job sources only
//! talk to the [`JobHandler`] trait so they can be tested with stubs.

mod dispatch;

pub use dispatch::{
    DispatchError, DispatchResult, Dispatcher, JobHandler, handle_isolated, into_outcome,
    into_output,
};
