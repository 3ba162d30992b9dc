//! Dispatch layer: a bounded worker pool that executes rendered requests,
//! normalizes OK responses and forwards them to an output sink.

pub mod dispatcher;
mod transport;

#[cfg(feature = "http")]
pub mod http;

pub use dispatcher::{
    DispatchConfig, DispatchStats, Dispatcher, DrainReport, ShutdownError, SubmitError,
};
pub use transport::{
    MemorySink, OutputSink, STATUS_OK, Transport, TransportError, TransportResponse,
};

#[cfg(feature = "http")]
pub use http::ReqwestTransport;
