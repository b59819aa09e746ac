//! Outbound dispatcher: resolve recipient tokens, filter to
//! deliverable addresses, split into bounded groups, and send through a
//! single shared gateway client with bounded retry.

mod dispatcher;
mod failure_window;
mod gateway;
mod pipeline;

pub use dispatcher::{OutboundDispatcher, OutboundDispatcherConfig, OutboundError, Result, SendMessagesCommand};
pub use failure_window::FailureWindow;
pub use gateway::{SendError, SmsGateway};
pub use pipeline::{filter_tel_addresses, split_into_groups};
