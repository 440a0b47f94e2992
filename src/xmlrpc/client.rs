// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::{CONTENT_TYPE, USER_AGENT};
use hyper::{Body, Method, Uri};
use hyper_rustls::HttpsConnector;
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::xmlrpc::encoding::Value;
use crate::xmlrpc::protocol::{Request, Response};

const XMLRPC_USER_AGENT: &str = concat!("odoo-xmlrpc/", env!("CARGO_PKG_VERSION"));

/// Carries an encoded XML-RPC document to an endpoint and returns the raw answer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &Uri, body: String) -> Result<String>;
}

/// HTTP(S) transport on top of hyper.
pub struct HttpTransport {
    client: hyper::Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> HttpTransport {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        HttpTransport {
            client: hyper::Client::builder().build(https),
            timeout,
        }
    }

    async fn send(&self, url: &Uri, body: String) -> Result<String> {
        let request = hyper::Request::builder()
            .method(Method::POST)
            .uri(url.clone())
            .header(CONTENT_TYPE, "text/xml")
            .header(USER_AGENT, XMLRPC_USER_AGENT)
            .body(Body::from(body))?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;

        if !status.is_success() {
            debug!("HTTP status {} from {}", status, url);
            return Err(Error::Status(status.as_u16()));
        }

        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &Uri, body: String) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.send(url, body)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }
}

/// One XML-RPC endpoint.
#[derive(Clone)]
pub struct Client {
    url: Uri,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(s: &str, transport: Arc<dyn Transport>) -> Result<Client> {
        let url = s
            .parse::<Uri>()
            .map_err(|_| Error::InvalidUrl(s.to_string()))?;

        match (url.scheme_str(), url.host()) {
            (Some("http"), Some(_)) | (Some("https"), Some(_)) => Ok(Client { url, transport }),
            _ => Err(Error::InvalidUrl(s.to_string())),
        }
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub async fn remote_call(&self, request: &Request) -> Result<Response> {
        // request bodies carry the password and are never logged
        debug!("Send XML-RPC request `{}` to: {}", request.method, self.url);

        let body = self.transport.post(&self.url, request.body.clone()).await?;

        trace!("Response body: {}", body);

        Ok(Response { body })
    }

    /// Performs the call and unwraps its value, turning faults into errors.
    pub async fn call(&self, request: &Request) -> Result<Value> {
        self.remote_call(request).await?.value()
    }
}
