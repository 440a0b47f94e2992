// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use time::macros::format_description;
use time::PrimitiveDateTime;
use xml::escape::escape_str_pcdata;
use xml::reader::{EventReader, ParserConfig, XmlEvent};

use crate::error::{Error, Result};

/// Represents an XML-RPC data value
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Int(i64),
    Boolean(bool),
    String(String),
    Double(f64),
    DateTime(PrimitiveDateTime),
    Base64(Vec<u8>),
    Array(Array),
    Struct(Struct),
    Nil,
}

pub type Array = Vec<Value>;
pub type Struct = BTreeMap<String, Value>;

impl Value {
    /// Name of the XML-RPC type carried by this value, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match *self {
            Value::Int(_) => "int",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Double(_) => "double",
            Value::DateTime(_) => "dateTime.iso8601",
            Value::Base64(_) => "base64",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Nil => "nil",
        }
    }

    /// If the value is a Struct, returns the value associated with the provided key.
    /// Otherwise, returns None.
    pub fn find(&self, key: &str) -> Option<&Value> {
        match *self {
            Value::Struct(ref map) => map.get(key),
            _ => None,
        }
    }

    /// Attempts to get a nested Struct member for each key in `keys`.
    /// If any key is found not to exist, find_path will return None.
    pub fn find_path(&self, keys: &[&str]) -> Option<&Value> {
        let mut target = self;
        for key in keys {
            target = target.find(key)?;
        }
        Some(target)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// Integers are widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(n) => Some(n as f64),
            Value::Double(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::String(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match *self {
            Value::Array(ref array) => Some(array),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match *self {
            Value::Struct(ref map) => Some(map),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(*self, Value::Nil)
    }

    /// Converts the value into its JSON counterpart.
    ///
    /// Date-times become `"YYYY-MM-DD HH:MM:SS"` strings (the format Odoo uses
    /// for datetime fields), binary data becomes a base64 string and
    /// non-finite doubles become `null`.
    pub fn into_json(self) -> Json {
        match self {
            Value::Int(n) => Json::from(n),
            Value::Boolean(b) => Json::Bool(b),
            Value::String(s) => Json::String(s),
            Value::Double(n) => serde_json::Number::from_f64(n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::DateTime(dt) => Json::String(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                dt.year(),
                u8::from(dt.month()),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second()
            )),
            Value::Base64(bytes) => Json::String(BASE64.encode(bytes)),
            Value::Array(values) => Json::Array(values.into_iter().map(Value::into_json).collect()),
            Value::Struct(members) => Json::Object(
                members
                    .into_iter()
                    .map(|(key, value)| (key, value.into_json()))
                    .collect(),
            ),
            Value::Nil => Json::Null,
        }
    }

    /// Builds a value from JSON. Integral numbers become `Int`, every other
    /// number becomes `Double`.
    pub fn from_json(json: Json) -> Value {
        match json {
            Json::Null => Value::Nil,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(values) => Value::Array(values.into_iter().map(Value::from_json).collect()),
            Json::Object(members) => Value::Struct(
                members
                    .into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

/// Decodes a value into any deserializable type, going through its JSON form.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value.into_json())?)
}

/// Encodes any serializable type as a value, going through its JSON form.
pub fn to_value<T: Serialize + ?Sized>(object: &T) -> Result<Value> {
    Ok(Value::from_json(serde_json::to_value(object)?))
}

/// Shortcut function to encode a value into an XML `<value>` element
pub fn encode(value: &Value) -> String {
    value.to_string()
}

fn write_value<W: fmt::Write>(w: &mut W, value: &Value) -> fmt::Result {
    w.write_str("<value>")?;
    match *value {
        Value::Int(n) if i32::try_from(n).is_ok() => write!(w, "<int>{}</int>", n)?,
        Value::Int(n) => write!(w, "<i8>{}</i8>", n)?,
        Value::Boolean(b) => write!(w, "<boolean>{}</boolean>", b as u8)?,
        Value::String(ref s) => write!(w, "<string>{}</string>", escape_text(s))?,
        Value::Double(n) if n.is_finite() => write!(w, "<double>{}</double>", n)?,
        // XML-RPC has no NaN or infinity
        Value::Double(_) => w.write_str("<nil/>")?,
        Value::DateTime(dt) => write!(
            w,
            "<dateTime.iso8601>{:04}{:02}{:02}T{:02}:{:02}:{:02}</dateTime.iso8601>",
            dt.year(),
            u8::from(dt.month()),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second()
        )?,
        Value::Base64(ref bytes) => write!(w, "<base64>{}</base64>", BASE64.encode(bytes))?,
        Value::Array(ref values) => {
            w.write_str("<array><data>")?;
            for v in values {
                write_value(w, v)?;
            }
            w.write_str("</data></array>")?;
        }
        Value::Struct(ref members) => {
            w.write_str("<struct>")?;
            for (name, v) in members {
                write!(w, "<member><name>{}</name>", escape_text(name))?;
                write_value(w, v)?;
                w.write_str("</member>")?;
            }
            w.write_str("</struct>")?;
        }
        Value::Nil => w.write_str("<nil/>")?,
    }
    w.write_str("</value>")
}

fn is_xml_char(c: char) -> bool {
    !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

/// Escapes markup and replaces the characters XML 1.0 cannot carry with U+FFFD.
fn escape_text(s: &str) -> Cow<str> {
    if s.chars().all(is_xml_char) {
        return escape_str_pcdata(s);
    }
    let cleaned: String = s
        .chars()
        .map(|c| if is_xml_char(c) { c } else { char::REPLACEMENT_CHARACTER })
        .collect();
    Cow::Owned(escape_str_pcdata(&cleaned).into_owned())
}

impl fmt::Display for Value {
    /// Encodes a value as an XML `<value>` element
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_value(f, self)
    }
}

fn parse_datetime(s: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(s, format_description!("[year][month][day]T[hour]:[minute]:[second]"))
        .or_else(|_| {
            PrimitiveDateTime::parse(
                s,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
        })
        .ok()
}

/// A trait for converting values to XML-RPC
pub trait ToValue {
    fn to_value(&self) -> Value;
}

macro_rules! to_value_impl_int {
    ($($t:ty), +) => (
        $(impl ToValue for $t {
            fn to_value(&self) -> Value { Value::Int(*self as i64) }
        })+
    )
}

to_value_impl_int! { i8, i16, i32, i64, isize, u8, u16, u32 }

macro_rules! to_value_impl_wide_uint {
    ($($t:ty), +) => (
        $(impl ToValue for $t {
            fn to_value(&self) -> Value {
                match i64::try_from(*self) {
                    Ok(n) => Value::Int(n),
                    Err(_) => Value::Double(*self as f64),
                }
            }
        })+
    )
}

to_value_impl_wide_uint! { u64, usize }

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for Json {
    fn to_value(&self) -> Value {
        Value::from_json(self.clone())
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        (*self as f64).to_value()
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Nil
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToValue for PrimitiveDateTime {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

macro_rules! tuple_impl {
    // use variables to indicate the arity of the tuple
    ($($tyvar:ident),* ) => {
        // the trailing commas are for the 1 tuple
        impl<
            $( $tyvar : ToValue ),*
            > ToValue for ( $( $tyvar ),* , ) {

            #[inline]
            #[allow(non_snake_case)]
            fn to_value(&self) -> Value {
                match *self {
                    ($(ref $tyvar),*,) => Value::Array(vec![$($tyvar.to_value()),*])
                }
            }
        }
    }
}

tuple_impl!{A}
tuple_impl!{A, B}
tuple_impl!{A, B, C}
tuple_impl!{A, B, C, D}
tuple_impl!{A, B, C, D, E}
tuple_impl!{A, B, C, D, E, F}
tuple_impl!{A, B, C, D, E, F, G}
tuple_impl!{A, B, C, D, E, F, G, H}
tuple_impl!{A, B, C, D, E, F, G, H, I}
tuple_impl!{A, B, C, D, E, F, G, H, I, J}
tuple_impl!{A, B, C, D, E, F, G, H, I, J, K}
tuple_impl!{A, B, C, D, E, F, G, H, I, J, K, L}

impl<A: ToValue> ToValue for [A] {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(|elt| elt.to_value()).collect())
    }
}

impl<A: ToValue> ToValue for Vec<A> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<A: ToValue> ToValue for BTreeMap<String, A> {
    fn to_value(&self) -> Value {
        Value::Struct(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

impl<A: ToValue> ToValue for HashMap<String, A> {
    fn to_value(&self) -> Value {
        Value::Struct(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

impl<A: ToValue> ToValue for Option<A> {
    fn to_value(&self) -> Value {
        match *self {
            None => Value::Nil,
            Some(ref value) => value.to_value(),
        }
    }
}

/// The two shapes a `<methodResponse>` can take.
#[derive(Clone, PartialEq, Debug)]
pub enum MethodResponse {
    Success(Value),
    /// The raw `<fault>` value, normally a struct with `faultCode` and `faultString`.
    Fault(Value),
}

/// Parses a complete `<methodResponse>` document.
pub fn parse_response(body: &str) -> Result<MethodResponse> {
    Builder::new(body.as_bytes()).build()
}

/// Structural tokens, whitespace between elements already dropped.
#[derive(Debug, PartialEq)]
enum Token {
    Start(String),
    End(String),
    Text(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Token::Start(ref tag) => write!(f, "<{}>", tag),
            Token::End(ref tag) => write!(f, "</{}>", tag),
            Token::Text(ref text) => write!(f, "text {:?}", text),
            Token::Eof => f.write_str("end of document"),
        }
    }
}

fn syntax_error(expected: &str, found: &Token) -> Error {
    Error::Parse(format!("expected {}, found {}", expected, found))
}

/// Deepest array/struct nesting accepted in a response.
const MAX_DEPTH: usize = 256;

struct Builder<R: Read> {
    parser: EventReader<R>,
    depth: usize,
}

impl<R: Read> Builder<R> {
    fn new(src: R) -> Builder<R> {
        let config = ParserConfig::new()
            .trim_whitespace(false)
            .cdata_to_characters(true)
            .ignore_comments(true);
        Builder {
            parser: EventReader::new_with_config(src, config),
            depth: 0,
        }
    }

    fn build(&mut self) -> Result<MethodResponse> {
        self.expect_start("methodResponse")?;

        let response = match self.next_token()? {
            Token::Start(ref tag) if tag == "params" => {
                match self.next_token()? {
                    Token::Start(ref tag) if tag == "param" => {}
                    Token::End(ref tag) if tag == "params" => {
                        return Err(Error::Parse("response carries no params".to_string()));
                    }
                    other => return Err(syntax_error("<param>", &other)),
                }
                let value = self.build_value_element()?;
                self.expect_end("param")?;
                self.expect_end("params")?;
                MethodResponse::Success(value)
            }
            Token::Start(ref tag) if tag == "fault" => {
                let value = self.build_value_element()?;
                self.expect_end("fault")?;
                MethodResponse::Fault(value)
            }
            other => return Err(syntax_error("<params> or <fault>", &other)),
        };

        self.expect_end("methodResponse")?;
        match self.next_token()? {
            Token::Eof => Ok(response),
            other => Err(syntax_error("end of document", &other)),
        }
    }

    fn next_event(&mut self) -> Result<XmlEvent> {
        Ok(self.parser.next()?)
    }

    fn next_token(&mut self) -> Result<Token> {
        loop {
            let token = match self.next_event()? {
                XmlEvent::StartElement { name, .. } => Token::Start(name.local_name),
                XmlEvent::EndElement { name } => Token::End(name.local_name),
                XmlEvent::Characters(s) | XmlEvent::CData(s) => Token::Text(s),
                XmlEvent::EndDocument => Token::Eof,
                _ => continue,
            };
            return Ok(token);
        }
    }

    fn expect_start(&mut self, tag: &str) -> Result<()> {
        match self.next_token()? {
            Token::Start(ref name) if name == tag => Ok(()),
            other => Err(syntax_error(&format!("<{}>", tag), &other)),
        }
    }

    fn expect_end(&mut self, tag: &str) -> Result<()> {
        match self.next_token()? {
            Token::End(ref name) if name == tag => Ok(()),
            other => Err(syntax_error(&format!("</{}>", tag), &other)),
        }
    }

    /// Reads character data up to the closing `tag`, whitespace included.
    fn read_text(&mut self, tag: &str) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                XmlEvent::Characters(s) | XmlEvent::CData(s) | XmlEvent::Whitespace(s) => {
                    text.push_str(&s)
                }
                XmlEvent::EndElement { ref name } if name.local_name == tag => return Ok(text),
                XmlEvent::StartElement { name, .. } => {
                    return Err(syntax_error(
                        &format!("text inside <{}>", tag),
                        &Token::Start(name.local_name),
                    ))
                }
                XmlEvent::EndElement { name } => {
                    return Err(syntax_error(&format!("</{}>", tag), &Token::End(name.local_name)))
                }
                XmlEvent::EndDocument => {
                    return Err(syntax_error(&format!("</{}>", tag), &Token::Eof))
                }
                _ => {}
            }
        }
    }

    fn build_value_element(&mut self) -> Result<Value> {
        self.expect_start("value")?;
        self.build_value()
    }

    /// Parses the content of a `<value>` whose start tag was just consumed,
    /// including its end tag.
    fn build_value(&mut self) -> Result<Value> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                XmlEvent::Characters(s) | XmlEvent::CData(s) | XmlEvent::Whitespace(s) => {
                    text.push_str(&s)
                }
                XmlEvent::StartElement { name, .. } => {
                    if !text.trim().is_empty() {
                        return Err(Error::Parse(format!(
                            "text {:?} mixed with <{}> inside <value>",
                            text, name.local_name
                        )));
                    }
                    let value = self.build_typed(&name.local_name)?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                // untyped values default to string
                XmlEvent::EndElement { ref name } if name.local_name == "value" => {
                    return Ok(Value::String(text))
                }
                XmlEvent::EndElement { name } => {
                    return Err(syntax_error("</value>", &Token::End(name.local_name)))
                }
                XmlEvent::EndDocument => return Err(syntax_error("</value>", &Token::Eof)),
                _ => {}
            }
        }
    }

    fn build_typed(&mut self, tag: &str) -> Result<Value> {
        match tag {
            "int" | "i4" | "i8" => {
                let text = self.read_text(tag)?;
                text.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| Error::Parse(format!("invalid <{}> {:?}", tag, text)))
            }
            "boolean" => {
                let text = self.read_text(tag)?;
                match text.trim() {
                    "0" => Ok(Value::Boolean(false)),
                    "1" => Ok(Value::Boolean(true)),
                    _ => Err(Error::Parse(format!("invalid <boolean> {:?}", text))),
                }
            }
            "string" => self.read_text(tag).map(Value::String),
            "double" => {
                let text = self.read_text(tag)?;
                text.trim()
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| Error::Parse(format!("invalid <double> {:?}", text)))
            }
            "dateTime.iso8601" => {
                let text = self.read_text(tag)?;
                parse_datetime(text.trim())
                    .map(Value::DateTime)
                    .ok_or_else(|| Error::Parse(format!("invalid <dateTime.iso8601> {:?}", text)))
            }
            "base64" => {
                let text = self.read_text(tag)?;
                let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                BASE64
                    .decode(compact)
                    .map(Value::Base64)
                    .map_err(|e| Error::Parse(format!("invalid <base64>: {}", e)))
            }
            "nil" => {
                let text = self.read_text(tag)?;
                if text.trim().is_empty() {
                    Ok(Value::Nil)
                } else {
                    Err(Error::Parse(format!("unexpected text {:?} inside <nil/>", text)))
                }
            }
            "array" | "struct" => {
                if self.depth >= MAX_DEPTH {
                    return Err(Error::Parse("value nesting too deep".to_string()));
                }
                self.depth += 1;
                let value = if tag == "array" {
                    self.build_array()
                } else {
                    self.build_struct()
                };
                self.depth -= 1;
                value
            }
            _ => Err(Error::Parse(format!("unknown value type <{}>", tag))),
        }
    }

    fn build_array(&mut self) -> Result<Value> {
        self.expect_start("data")?;
        let mut values = Vec::new();
        loop {
            match self.next_token()? {
                Token::Start(ref tag) if tag == "value" => values.push(self.build_value()?),
                Token::End(ref tag) if tag == "data" => break,
                other => return Err(syntax_error("<value> or </data>", &other)),
            }
        }
        self.expect_end("array")?;
        Ok(Value::Array(values))
    }

    fn build_struct(&mut self) -> Result<Value> {
        let mut members = BTreeMap::new();
        loop {
            match self.next_token()? {
                Token::Start(ref tag) if tag == "member" => {
                    self.expect_start("name")?;
                    let key = self.read_text("name")?;
                    let value = self.build_value_element()?;
                    self.expect_end("member")?;
                    members.insert(key, value);
                }
                Token::End(ref tag) if tag == "struct" => return Ok(Value::Struct(members)),
                other => return Err(syntax_error("<member> or </struct>", &other)),
            }
        }
    }
}
