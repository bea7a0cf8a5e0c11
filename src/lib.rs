//! A sans-I/O HTTP/1.1 protocol engine.
//!
//! This crate translates between a stream of bytes and a stream of HTTP
//! *events*, in both directions, without ever touching a socket. It can act
//! as either side of a connection; the embedder glues [`receive_data`] /
//! [`next_event`] / [`send`] to whatever I/O it uses, blocking or async or
//! anything else.
//!
//! # Example
//!
//! ```
//! use hwire::{Connection, EndOfMessage, Event, NextEvent, Request, Role};
//!
//! // Client side: events become wire bytes.
//! let mut client = Connection::new(Role::Client);
//! let request = Request::new("GET", "/", [("Host", "example.com")]).unwrap();
//! let bytes = client.send(Event::Request(request)).unwrap().unwrap();
//! assert_eq!(&bytes[..], b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
//! // A bodyless request still ends with an explicit EndOfMessage; it just
//! // produces no bytes.
//! client.send(Event::EndOfMessage(EndOfMessage::default())).unwrap();
//!
//! // Server side: wire bytes become events.
//! let mut server = Connection::new(Role::Server);
//! server.receive_data(&bytes).unwrap();
//! match server.next_event().unwrap() {
//!     NextEvent::Event(Event::Request(req)) => assert_eq!(&req.target[..], b"/"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! match server.next_event().unwrap() {
//!     NextEvent::Event(Event::EndOfMessage(_)) => {}
//!     other => panic!("unexpected {:?}", other),
//! }
//! assert_eq!(server.next_event().unwrap(), NextEvent::NeedData);
//! ```
//!
//! # Events, not streams
//!
//! Received bytes buffer up inside the [`Connection`]; [`next_event`] then
//! hands back start lines, body slices and end-of-message markers one at a
//! time, or says [`NeedData`] / [`Paused`] when there is nothing to
//! interpret. Outgoing events pass a legality check against the connection
//! state machine and come back as encoded bytes. The engine inserts the
//! framing headers it decided on (`Transfer-Encoding: chunked`,
//! `Connection: close`) and nothing else; identity headers like `Server`
//! are the embedder's job, with [`PRODUCT_ID`] available as a value.
//!
//! All methods run in time proportional to the bytes they look at, and
//! bodies are streamed, never accumulated.
//!
//! [`receive_data`]: Connection::receive_data
//! [`next_event`]: Connection::next_event
//! [`send`]: Connection::send
//! [`NeedData`]: NextEvent::NeedData
//! [`Paused`]: NextEvent::Paused

#[macro_use]
extern crate log;

mod buffer;
mod chunked;
mod connection;
mod error;
mod event;
mod headers;
mod http11;
mod limit;
mod state;

pub use buffer::Limits;
pub use connection::Connection;
pub use error::Error;
pub use event::{
    Data, EndOfMessage, Event, NextEvent, Payload, PayloadHandle, Request, Response, Segments,
};
pub use headers::Headers;
pub use state::{Role, State};

/// A string suitable for `User-Agent` or `Server` headers. The engine never
/// inserts it on its own.
pub const PRODUCT_ID: &str = concat!("hwire/", env!("CARGO_PKG_VERSION"));
