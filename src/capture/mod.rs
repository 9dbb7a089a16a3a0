pub mod buffer;
pub mod runner;
pub mod transport;

pub use buffer::CaptureBuffer;
pub use runner::{spawn_capture, CaptureError, CaptureHandle};
pub use transport::{deliver_with_retry, HttpTransport, Transport, TransportError};
