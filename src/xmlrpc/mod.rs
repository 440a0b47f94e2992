// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

#![deny(non_camel_case_types)]

//! XML-RPC serialization and remote procedure calling
//!
//! # What is XML-RPC?
//!
//! A remote procedure call protocol encoding requests and responses as XML
//! documents sent over HTTP POST. A call names a method and carries an ordered
//! list of params; the answer is either a single value or a fault.
//!
//! Basic documentation found on Wikipedia
//! http://en.wikipedia.org/wiki/XML-RPC
//!
//! Full specification of the XML-RPC protocol is found here:
//! http://xmlrpc.scripting.com/spec.html
//!
//! The `<nil/>` and `<i8>` extensions are understood, since Odoo emits them.

pub mod client;
pub mod encoding;
pub mod protocol;

pub use self::client::{Client, HttpTransport, Transport};
pub use self::encoding::{from_value, to_value, Array, Struct, ToValue, Value};
pub use self::protocol::{Fault, FaultKind, Request, Response};
