pub mod poller;
pub mod session;
