mod feed_listener;

pub use feed_listener::*;
