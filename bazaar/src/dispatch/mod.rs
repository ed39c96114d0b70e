pub mod dispatcher;
mod fan_out;

pub use dispatcher::Dispatcher;
