//! Static-site-generator adapters behind a uniform capability surface.
//!
//! Every generator exposes the same shape: a name, an implementation
//! language, a description, a connect/disconnect lifecycle, and a set of
//! tools backed by whitelisted subprocess invocations. [`CommandAdapter`]
//! covers the whole fleet declaratively; [`AdapterRegistry`] aggregates
//! adapters under namespaced tool names; [`GatewayDispatcher`] turns the
//! registry into the message handler the transport consumes.

mod adapter;
mod builtin;
mod command;
mod dispatcher;
mod registry;

pub use adapter::SsgAdapter;
pub use builtin::builtin_adapters;
pub use command::{CommandAdapter, CommandTool};
pub use dispatcher::GatewayDispatcher;
pub use registry::AdapterRegistry;
