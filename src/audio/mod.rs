pub mod engine;
pub mod resolver;
pub mod sink;

pub use engine::{PlaybackState, PlayerEngine, PlayerSnapshot, RepeatMode};
pub use resolver::{HttpResolver, StreamResolver};
pub use sink::{AudioSink, SinkEvent};
