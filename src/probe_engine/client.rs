use super::helpers::{fetch_http_version, map_curl_error, parse_status_line};
use crate::config::{HttpMethod, ProbeTarget};
use crate::probe::{ProbeResult, TransportError, TransportErrorKind};
use curl::Error as CurlError;
use curl::easy::{Easy2, Handler, List, WriteError};
use std::time::{Instant, SystemTime};

const USER_AGENT: &str = concat!("httpstress/", env!("CARGO_PKG_VERSION"));

#[derive(Default)]
struct ResponseCollector {
    bytes: u64,
    status_text: Option<String>,
}

impl ResponseCollector {
    fn reset(&mut self) {
        self.bytes = 0;
        self.status_text = None;
    }
}

impl Handler for ResponseCollector {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        self.bytes = self.bytes.saturating_add(data.len() as u64);
        Ok(data.len())
    }

    fn header(&mut self, data: &[u8]) -> bool {
        // Every hop of a redirect chain (and 100 Continue) starts a new status line.
        if let Ok(line) = std::str::from_utf8(data)
            && let Some(text) = parse_status_line(line)
        {
            self.status_text = Some(text);
        }
        true
    }
}

pub struct ProbeClient {
    easy: Easy2<ResponseCollector>,
}

impl ProbeClient {
    pub fn new() -> Result<Self, CurlError> {
        let mut easy = Easy2::new(ResponseCollector::default());
        easy.useragent(USER_AGENT)?;
        easy.accept_encoding("")?;
        Ok(Self { easy })
    }

    pub fn probe(&mut self, target: &ProbeTarget) -> ProbeResult {
        let ts = SystemTime::now();
        let started = Instant::now();
        self.easy.reset();
        self.easy.get_mut().reset();

        if let Err(err) = self.configure(target) {
            return ProbeResult::transport_failure(
                ts,
                started.elapsed(),
                map_curl_error(&err, None),
            );
        }

        let perform_result = self.easy.perform();
        let latency = self
            .easy
            .total_time()
            .unwrap_or_else(|_| started.elapsed());

        if let Err(err) = perform_result {
            let os_errno = self.easy.os_errno().ok().filter(|errno| *errno != 0);
            return ProbeResult::transport_failure(ts, latency, map_curl_error(&err, os_errno));
        }

        let status_code = self
            .easy
            .response_code()
            .ok()
            .and_then(|code| u16::try_from(code).ok())
            .filter(|code| *code != 0);
        let Some(status_code) = status_code else {
            return ProbeResult::transport_failure(
                ts,
                latency,
                TransportError {
                    kind: TransportErrorKind::Protocol,
                    message: "no HTTP status received".to_string(),
                },
            );
        };

        tracing::trace!(
            status = status_code,
            bytes = self.easy.get_ref().bytes,
            "response received"
        );

        ProbeResult {
            ts,
            status_code: Some(status_code),
            status_text: self.easy.get_mut().status_text.take(),
            latency,
            http_version: fetch_http_version(self.easy.raw()),
            error: None,
        }
    }

    fn configure(&mut self, target: &ProbeTarget) -> Result<(), CurlError> {
        self.easy.url(target.url.as_str())?;
        self.easy.useragent(USER_AGENT)?;
        self.easy.accept_encoding("")?;
        self.easy.timeout(target.timeout)?;

        if target.max_redirects > 0 {
            self.easy.follow_location(true)?;
            self.easy.max_redirections(target.max_redirects)?;
        } else {
            self.easy.follow_location(false)?;
        }

        match (target.method, target.body.as_deref()) {
            (HttpMethod::Head, _) => self.easy.nobody(true)?,
            (HttpMethod::Get, None) => self.easy.get(true)?,
            (HttpMethod::Post, None) => {
                self.easy.post(true)?;
                self.easy.post_field_size(0)?;
            }
            (method, None) => self.easy.custom_request(method.as_str())?,
            (method, Some(body)) => {
                self.easy.post_fields_copy(body.as_bytes())?;
                if method != HttpMethod::Post {
                    self.easy.custom_request(method.as_str())?;
                }
            }
        }

        if !target.headers.is_empty() {
            let mut list = List::new();
            for (name, value) in &target.headers {
                list.append(&format!("{name}: {}", value.expose()))?;
            }
            self.easy.http_headers(list)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
