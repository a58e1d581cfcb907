//! HTTP status probe
//!
//! Sends the configured request and classifies the answer. Statuses listed
//! as failing (500 by default) mean "up but not ready yet" and keep the
//! probe polling, as do transport errors. Any other status counts as ready
//! unless an expected status is configured, in which case only that one
//! does.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use url::Url;

use super::{ProbeKind, ProbeTarget, ProbeTiming};
use crate::traits::Probe;

#[derive(Debug, Clone)]
pub struct HttpStatusProbe {
    url: Url,
    method: Method,
    body: Option<String>,
    headers: Vec<(String, String)>,
    fail_status_codes: Vec<StatusCode>,
    expected_status: Option<StatusCode>,
    timing: ProbeTiming,
    client: Client,
}

impl HttpStatusProbe {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            fail_status_codes: vec![StatusCode::INTERNAL_SERVER_ERROR],
            expected_status: None,
            timing: ProbeTiming::http(),
            client: Client::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the statuses that mean "keep polling"
    pub fn with_fail_status_codes(mut self, codes: Vec<StatusCode>) -> Self {
        self.fail_status_codes = codes;
        self
    }

    /// Only accept this exact status as ready
    pub fn expect_status(mut self, status: StatusCode) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn with_timing(mut self, timing: ProbeTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Decide whether a response with `status` proves readiness
    pub fn classify(&self, status: StatusCode) -> Result<(), String> {
        if self.fail_status_codes.contains(&status) {
            return Err(format!("got {} response from {}", status.as_u16(), self.url));
        }
        match self.expected_status {
            Some(expected) if expected != status => Err(format!(
                "got {} response from {}, want {}",
                status.as_u16(),
                self.url,
                expected.as_u16()
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Probe for HttpStatusProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::HttpStatus
    }

    fn timing(&self) -> ProbeTiming {
        self.timing
    }

    async fn attempt(&self, _target: &ProbeTarget) -> Result<(), String> {
        let mut request = self.client.request(self.method.clone(), self.url.clone());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = self.body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("{} {}: {}", self.method, self.url, e))?;

        self.classify(response.status())
    }
}
