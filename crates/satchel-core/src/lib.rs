mod error;
mod event;

pub use error::{ErrorKind, ExitCode, SatchelError, SatchelResult};
pub use event::{Event, EventSink, NullSink, RecordingSink};
