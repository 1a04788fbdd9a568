//! ACSLS client.
//!
//! Communicates with a StorageTek ACSLS library manager through its SSI
//! transport. Requests are XML `display` commands; responses arrive as
//! a stream of acknowledge/intermediate/final packets whose payload is
//! a restricted one-level `<r><f maxlen="n">value</f></r>` row grammar.
//! The ACSAPI transport itself (the vendor client library plus the
//! SSI/CSI daemons) is an external dependency behind [`AcsTransport`];
//! only request construction and response parsing live here.

mod client;
pub use client::*;

mod display;
pub use display::*;

mod filter;
pub use filter::*;

mod library;
pub use library::*;

mod parse;
pub use parse::*;

mod ssi;
pub use ssi::*;
