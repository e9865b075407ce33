//! Authentication core: the context, its background poller, and route guards.

pub mod context;
pub mod guard;
pub mod poller;

pub use context::AuthContext;
pub use poller::SessionPoller;
