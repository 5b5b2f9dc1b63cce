//! Subscription support.

mod sink_stream;

pub use self::sink_stream::Disposer;
pub use self::sink_stream::Sink;
pub use self::sink_stream::SinkStream;
pub use self::sink_stream::from_sink;
