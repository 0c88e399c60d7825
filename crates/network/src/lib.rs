//! Request capture.
//!
//! Decorates a [`TransportFactory`] so every transport it hands out records
//! its lifecycle into a bounded [`RequestStore`], then forwards each call to
//! the real transport unchanged.

pub mod headers;
pub mod interceptor;
pub mod query;
pub mod reader;
pub mod record;
pub mod request_store;
pub mod sim;
pub mod transport;

pub use headers::{parse_response_headers, HeaderMap};
pub use interceptor::{InterceptedTransport, InterceptingFactory};
pub use query::parse_send_url;
pub use reader::{EncodingTextReader, TextReader};
pub use record::{RequestRecord, RequestStatus, RequestUpdate, ResponseBody, ResponseKind};
pub use request_store::{RequestStore, RequestStoreConfig};
pub use sim::{ScriptedResponse, SimulatedFactory, SimulatedTransport};
pub use transport::{ready_state, OpenOptions, ReadyStateHandler, RequestBody, Transport, TransportFactory};
