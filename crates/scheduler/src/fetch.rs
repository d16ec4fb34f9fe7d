//! §4.4.1: the HTTP fetch step, one GET per host, archived as a WARC 1.1 pair.
//!
//! Grounded in `doscrawler/crawls/models.py::crawl_host` (warcio + `requests`), reimplemented
//! against `reqwest` + the `warc` crate's hand-rolled encoder.

use std::net::Ipv4Addr;
use std::time::Duration;

use doscrawler_model::{Crawl, Settings, CRAWL_CHUNK_BYTES};
use doscrawler_warc::{encode_pair, link_pair, WarcRecord};

pub fn build_client(settings: &Settings) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        // Attackers' hosts frequently serve broken or self-signed certificates.
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(settings.crawl_request_timeout))
        .pool_max_idle_per_host(settings.crawl_concurrency)
        .build()
}

/// Fetch `host` (resolved from `ip`) and return the archived crawl attempt. Never returns an
/// `Err`: a transport failure becomes a `status = -1` crawl with a `metadata` WARC record,
/// exactly as §4.4.1/§7 specify.
pub async fn fetch_host(client: &reqwest::Client, host: &str, ip: Ipv4Addr, settings: &Settings) -> Crawl {
    let url = format!("http://{host}/");
    let time = doscrawler_model::time::now();

    let mut request_builder = client.get(&url);
    for (name, value) in &settings.crawl_request_header {
        request_builder = request_builder.header(name.as_str(), value.as_str());
    }

    let mut request_record = WarcRecord::request(
        url.clone(),
        ip,
        &format!("GET / HTTP/1.1\r\nHost: {host}\r\n\r\n"),
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(settings.crawl_request_timeout),
        request_builder.send(),
    )
    .await;

    let (status, mut second_record) = match outcome {
        Ok(Ok(mut response)) => {
            let status_code = response.status();
            let mut headers = String::new();
            for (name, value) in response.headers() {
                if let Ok(value) = value.to_str() {
                    headers.push_str(&format!("{name}: {value}\r\n"));
                }
            }

            let mut body = Vec::new();
            let max_body_len = settings.crawl_body_max_bytes.saturating_sub(CRAWL_CHUNK_BYTES);
            let mut truncated = false;
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        body.extend_from_slice(&chunk);
                        // A single chunk can be far larger than CRAWL_CHUNK_BYTES, so clamp
                        // what we keep rather than just stopping once the limit is crossed.
                        if body.len() > max_body_len {
                            body.truncate(max_body_len);
                            truncated = true;
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        truncated = true;
                        break;
                    }
                }
            }

            let mut message = format!(
                "HTTP/1.1 {} {}\r\n{headers}\r\n",
                status_code.as_u16(),
                status_code.canonical_reason().unwrap_or("")
            )
            .into_bytes();
            message.extend_from_slice(&body);

            (
                status_code.as_u16() as i32,
                WarcRecord::response(url.clone(), ip, message, truncated),
            )
        }
        Ok(Err(err)) => {
            log::warn!("crawl of {host} failed: {err}");
            (
                -1,
                WarcRecord::metadata_error(url.clone(), ip, "transport_error", &err.to_string()),
            )
        }
        Err(_elapsed) => (
            -1,
            WarcRecord::metadata_error(
                url.clone(),
                ip,
                "timeout",
                &format!("request exceeded CRAWL_REQUEST_TIMEOUT={}s", settings.crawl_request_timeout),
            ),
        ),
    };

    link_pair(&mut request_record, &mut second_record);
    let record = encode_pair(&request_record, &second_record, settings.dump_compress_level);

    Crawl {
        host: host.to_string(),
        status,
        time,
        record,
    }
}
