//! WARC 1.1 record pairs for archived crawl attempts.
//!
//! Grounded in `doscrawler/crawls/models.py::crawl_host` (which shells out to `warcio` to
//! build a `request`/`response` or `request`/`metadata` pair, gzips it, and base64-encodes it
//! into `Crawl.record`). No WARC-writing crate is used anywhere in the reference corpus, so
//! this mirrors `other_examples`' CommonCrawl mapper in hand-rolling the binary format
//! directly against `flate2`.

use std::fmt::Write as _;
use std::io::{Read, Write};
use std::net::Ipv4Addr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use uuid::Uuid;

/// §6: the WARC-Type of a single record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordType {
    Request,
    Response,
    Metadata,
}

impl RecordType {
    fn as_str(self) -> &'static str {
        match self {
            RecordType::Request => "request",
            RecordType::Response => "response",
            RecordType::Metadata => "metadata",
        }
    }
}

/// One WARC 1.1 record, matching the headers the fetch step attaches: `WARC-IP-Address`,
/// `WARC-Concurrent-To`, and (on truncation) `WARC-Truncated`.
#[derive(Clone, Debug)]
pub struct WarcRecord {
    pub record_type: RecordType,
    pub record_id: Uuid,
    pub date: DateTime<Utc>,
    pub target_uri: String,
    pub ip_address: Ipv4Addr,
    pub concurrent_to: Option<Uuid>,
    pub truncated: bool,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl WarcRecord {
    pub fn request(target_uri: String, ip_address: Ipv4Addr, headers: &str) -> Self {
        Self {
            record_type: RecordType::Request,
            record_id: Uuid::new_v4(),
            date: Utc::now(),
            target_uri,
            ip_address,
            concurrent_to: None,
            truncated: false,
            content_type: "application/http; msgtype=request".to_string(),
            body: headers.as_bytes().to_vec(),
        }
    }

    pub fn response(target_uri: String, ip_address: Ipv4Addr, http_message: Vec<u8>, truncated: bool) -> Self {
        Self {
            record_type: RecordType::Response,
            record_id: Uuid::new_v4(),
            date: Utc::now(),
            target_uri,
            ip_address,
            concurrent_to: None,
            truncated,
            content_type: "application/http; msgtype=response".to_string(),
            body: http_message,
        }
    }

    /// §4.5: on transport failure, a `metadata` record carries `{error, error_desc}` in
    /// place of a `response`.
    pub fn metadata_error(target_uri: String, ip_address: Ipv4Addr, error: &str, error_desc: &str) -> Self {
        let body = format!(r#"{{"error":{error:?},"error_desc":{error_desc:?}}}"#);
        Self {
            record_type: RecordType::Metadata,
            record_id: Uuid::new_v4(),
            date: Utc::now(),
            target_uri,
            ip_address,
            concurrent_to: None,
            truncated: false,
            content_type: "application/json".to_string(),
            body: body.into_bytes(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut header = String::new();
        let _ = writeln!(header, "WARC/1.1\r");
        let _ = writeln!(header, "WARC-Type: {}\r", self.record_type.as_str());
        let _ = writeln!(header, "WARC-Record-ID: <urn:uuid:{}>\r", self.record_id);
        let _ = writeln!(
            header,
            "WARC-Date: {}\r",
            self.date.format("%Y-%m-%dT%H:%M:%S%.6fZ")
        );
        let _ = writeln!(header, "WARC-Target-URI: {}\r", self.target_uri);
        let _ = writeln!(header, "WARC-IP-Address: {}\r", self.ip_address);
        if let Some(concurrent_to) = self.concurrent_to {
            let _ = writeln!(header, "WARC-Concurrent-To: <urn:uuid:{concurrent_to}>\r");
        }
        if self.truncated {
            let _ = writeln!(header, "WARC-Truncated: true\r");
        }
        let _ = writeln!(header, "Content-Type: {}\r", self.content_type);
        let _ = writeln!(header, "Content-Length: {}\r", self.body.len());
        header.push_str("\r\n");

        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes.extend_from_slice(b"\r\n\r\n");
        bytes
    }
}

/// §4.5: link a `request` record to its `response`/`metadata` counterpart via
/// `WARC-Concurrent-To`, as they're always written as one pair.
pub fn link_pair(request: &mut WarcRecord, second: &mut WarcRecord) {
    request.concurrent_to = Some(second.record_id);
    second.concurrent_to = Some(request.record_id);
}

/// §4.5/§6: gzip-compress a linked request/response(-or-metadata) pair and base64-encode it,
/// producing the value stored in `Crawl.record`.
pub fn encode_pair(request: &WarcRecord, second: &WarcRecord, compress_level: u32) -> String {
    let mut raw = request.to_bytes();
    raw.extend_from_slice(&second.to_bytes());

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(compress_level));
    encoder
        .write_all(&raw)
        .expect("writing to an in-memory buffer cannot fail");
    let gzipped = encoder.finish().expect("flushing an in-memory buffer cannot fail");

    STANDARD.encode(gzipped)
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("record is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("record is not a valid gzip stream: {0}")]
    Gzip(#[from] std::io::Error),
}

/// §4.6: inverse of [`encode_pair`], used by the dump writer to embed the WARC pair as UTF-8
/// text (replacing invalid sequences) in the JSON dump.
pub fn decode_pair_lossy(encoded: &str) -> Result<String, DecodeError> {
    let gzipped = STANDARD.decode(encoded)?;
    let mut raw = Vec::new();
    GzDecoder::new(gzipped.as_slice()).read_to_end(&mut raw)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_request_response_pair() {
        let ip: Ipv4Addr = "203.0.113.9".parse().unwrap();
        let mut request = WarcRecord::request(
            "http://example.invalid/".to_string(),
            ip,
            "GET / HTTP/1.1\r\nHost: example.invalid\r\n\r\n",
        );
        let mut response = WarcRecord::response(
            "http://example.invalid/".to_string(),
            ip,
            b"HTTP/1.1 200 OK\r\n\r\nhello".to_vec(),
            false,
        );
        link_pair(&mut request, &mut response);

        let encoded = encode_pair(&request, &response, 7);
        let decoded = decode_pair_lossy(&encoded).unwrap();

        assert!(decoded.contains("WARC-Type: request"));
        assert!(decoded.contains("WARC-Type: response"));
        assert!(decoded.contains("WARC-Concurrent-To"));
        assert!(decoded.contains("hello"));
    }

    #[test]
    fn metadata_record_carries_error_fields() {
        let ip: Ipv4Addr = "203.0.113.9".parse().unwrap();
        let record = WarcRecord::metadata_error(
            "http://example.invalid/".to_string(),
            ip,
            "timeout",
            "request timed out after 20s",
        );
        let bytes = record.to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("WARC-Type: metadata"));
        assert!(text.contains(r#""error":"timeout""#));
    }

    #[test]
    fn truncated_records_carry_the_header() {
        let ip: Ipv4Addr = "203.0.113.9".parse().unwrap();
        let record = WarcRecord::response("http://example.invalid/".to_string(), ip, vec![0u8; 10], true);
        let text = String::from_utf8(record.to_bytes()).unwrap();
        assert!(text.contains("WARC-Truncated: true"));
    }
}
