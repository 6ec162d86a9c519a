use crate::probe::{TransportError, TransportErrorKind};
use curl::Error as CurlError;
use std::io;

// CURLINFO constants not exposed by curl-sys
// See: https://curl.se/libcurl/c/CURLINFO_HTTP_VERSION.html
// Use curl_sys::CURLINFO type for cross-platform compatibility (i32 on Windows, u32 on Unix)
const CURLINFO_LONG: curl_sys::CURLINFO = 0x200000;
const CURLINFO_HTTP_VERSION: curl_sys::CURLINFO = CURLINFO_LONG + 46;

// HTTP version codes returned by CURLINFO_HTTP_VERSION
const CURL_HTTP_VERSION_1_0: i64 = 1;
const CURL_HTTP_VERSION_1_1: i64 = 2;
const CURL_HTTP_VERSION_2_0: i64 = 3;
const CURL_HTTP_VERSION_3: i64 = 30;

pub(super) fn map_curl_error(err: &CurlError, os_errno: Option<i32>) -> TransportError {
    let message = err.to_string();

    let kind = if err.is_couldnt_resolve_host() || err.is_couldnt_resolve_proxy() {
        TransportErrorKind::Dns
    } else if err.is_operation_timedout() {
        TransportErrorKind::Timeout
    } else if err.is_couldnt_connect() {
        if is_connection_refused(os_errno, &message) {
            TransportErrorKind::ConnectRefused
        } else {
            TransportErrorKind::ConnectFailed
        }
    } else if err.is_ssl_connect_error()
        || err.is_ssl_cacert()
        || err.is_ssl_certproblem()
        || err.is_ssl_cipher()
        || err.is_peer_failed_verification()
    {
        TransportErrorKind::Tls
    } else if err.is_unsupported_protocol()
        || err.is_url_malformed()
        || err.is_got_nothing()
        || err.is_too_many_redirects()
        || err.is_http2_error()
        || err.is_http2_stream_error()
    {
        TransportErrorKind::Protocol
    } else {
        TransportErrorKind::Io
    };

    TransportError { kind, message }
}

fn is_connection_refused(os_errno: Option<i32>, message: &str) -> bool {
    if let Some(errno) = os_errno
        && io::Error::from_raw_os_error(errno).kind() == io::ErrorKind::ConnectionRefused
    {
        return true;
    }
    message.to_ascii_lowercase().contains("connection refused")
}

/// Extracts `"200 OK"` from `"HTTP/1.1 200 OK\r\n"`. HTTP/2 lines carry no
/// reason phrase, so those yield the bare code.
pub(super) fn parse_status_line(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let rest = line.strip_prefix("HTTP/")?;
    let (_version, rest) = rest.split_once(' ')?;
    let rest = rest.trim();
    let code = rest.split(' ').next()?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(rest.to_string())
}

pub(super) fn fetch_http_version(handle: *mut curl_sys::CURL) -> Option<String> {
    if handle.is_null() {
        return None;
    }

    unsafe {
        let mut version: std::os::raw::c_long = 0;
        let rc = curl_sys::curl_easy_getinfo(
            handle,
            CURLINFO_HTTP_VERSION,
            &mut version as *mut std::os::raw::c_long,
        );

        if rc != curl_sys::CURLE_OK {
            return None;
        }

        match version as i64 {
            CURL_HTTP_VERSION_1_0 => Some("http/1.0".to_string()),
            CURL_HTTP_VERSION_1_1 => Some("http/1.1".to_string()),
            CURL_HTTP_VERSION_2_0 => Some("h2".to_string()),
            CURL_HTTP_VERSION_3 => Some("h3".to_string()),
            _ => None,
        }
    }
}
