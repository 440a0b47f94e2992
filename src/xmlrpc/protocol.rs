// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use serde::de::DeserializeOwned;
use xml::escape::escape_str_pcdata;

use crate::error::{Error, Result};
use crate::xmlrpc::encoding::{self, MethodResponse, ToValue, Value};

#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub body: String,
}

#[derive(Debug)]
pub struct Response {
    pub body: String,
}

/// A `<fault>` returned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: i64,
    pub message: String,
}

/// How Odoo's `/xmlrpc/2` endpoints classify their faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Application,
    Warning,
    AccessDenied,
    AccessError,
    Other,
}

impl Request {
    pub fn new(method: &str) -> Request {
        Request {
            method: method.to_string(),
            body: format!(
                "<?xml version=\"1.0\"?>\
                 <methodCall><methodName>{}</methodName>\
                 <params>",
                escape_str_pcdata(method)
            ),
        }
    }

    pub fn argument<T: ToValue + ?Sized>(mut self, object: &T) -> Request {
        let append_body = format!("<param>{}</param>", encoding::encode(&object.to_value()));
        self.body = self.body + &append_body;
        self
    }

    pub fn finalize(mut self) -> Request {
        self.body = self.body + "</params></methodCall>";
        self
    }
}

impl Response {
    pub fn new(body: &str) -> Response {
        Response {
            body: body.to_string(),
        }
    }

    /// The returned value, or `Error::Fault` when the server answered with a fault.
    pub fn value(&self) -> Result<Value> {
        match encoding::parse_response(&self.body)? {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault(value) => Err(Error::Fault(Fault::from_value(&value)?)),
        }
    }

    pub fn result<T: DeserializeOwned>(&self) -> Result<T> {
        encoding::from_value(self.value()?)
    }
}

impl Fault {
    /// Reads the `faultCode`/`faultString` struct of a fault response.
    ///
    /// The legacy Odoo endpoints send string codes; those are kept in the message
    /// and reported as application errors unless they are numeric.
    pub fn from_value(value: &Value) -> Result<Fault> {
        let members = value
            .as_struct()
            .ok_or_else(|| Error::unexpected("fault struct", value))?;
        let message = match members.get("faultString") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(Error::unexpected("string faultString", other)),
            None => return Err(Error::Parse("fault without faultString".to_string())),
        };

        match members.get("faultCode") {
            Some(Value::Int(code)) => Ok(Fault {
                code: *code,
                message,
            }),
            Some(Value::String(code)) => match code.trim().parse::<i64>() {
                Ok(code) => Ok(Fault { code, message }),
                Err(_) => Ok(Fault {
                    code: 1,
                    message: format!("{}: {}", code, message),
                }),
            },
            Some(other) => Err(Error::unexpected("int faultCode", other)),
            None => Err(Error::Parse("fault without faultCode".to_string())),
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self.code {
            1 => FaultKind::Application,
            2 => FaultKind::Warning,
            3 => FaultKind::AccessDenied,
            4 => FaultKind::AccessError,
            _ => FaultKind::Other,
        }
    }
}
