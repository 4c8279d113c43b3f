pub mod claim;
pub mod dispatch;
pub mod resolver;
pub mod retry;
pub mod template;
pub mod transport;
