use super::ResponseCollector;
use curl::easy::Handler;

#[test]
fn collector_counts_body_bytes() {
    let mut collector = ResponseCollector::default();
    let data = vec![0u8; 8];
    let wrote = collector.write(&data).expect("write");
    assert_eq!(wrote, data.len());
    let wrote = collector.write(&data[..3]).expect("write");
    assert_eq!(wrote, 3);
    assert_eq!(collector.bytes, 11);
}

#[test]
fn collector_keeps_last_status_line() {
    let mut collector = ResponseCollector::default();
    assert!(collector.header(b"HTTP/1.1 301 Moved Permanently\r\n"));
    assert!(collector.header(b"Location: /next\r\n"));
    assert_eq!(collector.status_text.as_deref(), Some("301 Moved Permanently"));

    assert!(collector.header(b"HTTP/1.1 200 OK\r\n"));
    assert!(collector.header(b"Content-Length: 0\r\n"));
    assert!(collector.header(b"\r\n"));
    assert_eq!(collector.status_text.as_deref(), Some("200 OK"));
}

#[test]
fn collector_reset_clears_previous_response() {
    let mut collector = ResponseCollector::default();
    let _ = collector.write(b"abc").expect("write");
    let _ = collector.header(b"HTTP/2 204\r\n");
    collector.reset();
    assert_eq!(collector.bytes, 0);
    assert!(collector.status_text.is_none());
}
