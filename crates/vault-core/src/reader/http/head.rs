//! HTTP HEAD probing: the construction step of `SegmentedHttpReader`.

use std::str;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::url_model::derive_filename;

/// What a `HEAD` request tells us about a remote resource before we start
/// issuing range requests against it.
#[derive(Debug, Clone)]
pub struct HeadProbe {
    pub content_length: u64,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Issues `HEAD url` and extracts the fields `SegmentedHttpReader` needs.
/// `Content-Length` is required: a missing or non-integer value is a hard
/// `InvalidInput` failure, since there is no way to size pieces without it.
pub fn probe(url: &str) -> CoreResult<HeadProbe> {
    let mut header_lines: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)
        .map_err(|e| CoreError::InvalidInput(format!("invalid URL {url}: {e}")))?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(15))?;
    easy.timeout(Duration::from_secs(30))?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                header_lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer
            .perform()
            .map_err(|e| CoreError::InvalidInput(format!("HEAD {url} failed: {e}")))?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(CoreError::InvalidInput(format!(
            "HEAD {url} returned HTTP {code}"
        )));
    }

    let mut content_length = None;
    let mut content_type = None;
    let mut content_disposition = None;
    for line in &header_lines {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-disposition") {
            content_disposition = Some(value.to_string());
        }
    }

    let content_length = content_length.ok_or_else(|| {
        CoreError::InvalidInput(format!("HEAD {url} did not return a valid Content-Length"))
    })?;

    let filename = derive_filename(url, content_disposition.as_deref());

    Ok(HeadProbe {
        content_length,
        filename,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_probe_fields_are_plain_data() {
        // Construction-only smoke test: probe() itself needs a live server
        // and is exercised by the integration test in tests/http_reader.rs.
        let probe = HeadProbe {
            content_length: 42,
            filename: Some("x.bin".to_string()),
            content_type: Some("application/octet-stream".to_string()),
        };
        assert_eq!(probe.content_length, 42);
    }
}
