//! Payload download into the work directory.

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::net::IpAddr;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use lunapatch_core::util::log_snippet;
use reqwest::blocking::Client;
use tracing::info;
use url::{Host, Url};
use zip::ZipArchive;

use crate::paths::format_with_home;

use super::{log_line, StepContext};

const PK_LOCAL_FILE_HEADER: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const PK_EMPTY_ARCHIVE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const PK_SPANNED_ARCHIVE: [u8; 4] = [0x50, 0x4B, 0x07, 0x08];
const PREVIEW_BYTES: usize = 180;

pub fn download_payload(ctx: &StepContext) -> Result<()> {
    let raw_url = ctx
        .options
        .download_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| anyhow!("no download URL in options").context("Download URL is not set"))?;
    let url = parse_download_url(raw_url)?;

    fs::create_dir_all(&ctx.paths.work_dir).with_context(|| {
        format!(
            "failed to create work directory {}",
            format_with_home(&ctx.paths.work_dir)
        )
    })?;

    log_line(ctx, format!("Downloading TidaLuna from {}", log_snippet(url.as_str())));
    let client = build_client(ctx, &url)?;
    let response = client
        .get(url.clone())
        .send()
        .context("Error downloading TidaLuna, please check your network connection")?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("HTTP status {}", status).context("Error downloading TidaLuna"));
    }

    let bytes = response
        .bytes()
        .context("failed to read download response")?;
    if bytes.is_empty() {
        return Err(anyhow!("response body was empty").context("Error downloading TidaLuna"));
    }

    if let Err(reason) = validate_zip_bytes(&bytes) {
        let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(PREVIEW_BYTES)]).to_string();
        return Err(anyhow!(
            "{}; response preview: {}",
            reason,
            log_snippet(&preview)
        )
        .context("Downloaded file is not a valid ZIP archive"));
    }

    let written = write_payload(&ctx.paths.payload_part, &ctx.paths.payload_zip, &bytes)?;
    info!(bytes = written, url = %url, "payload downloaded");
    log_line(
        ctx,
        format!(
            "TidaLuna downloaded to {} ({} bytes)",
            format_with_home(&ctx.paths.payload_zip),
            written
        ),
    );
    Ok(())
}

fn parse_download_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|err| anyhow!("{}: {}", log_snippet(raw), err))
        .context("Download URL is invalid")?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("unsupported scheme `{}`", other).context("Download URL is invalid")),
    }
}

fn build_client(ctx: &StepContext, url: &Url) -> Result<Client> {
    let mut builder = Client::builder().timeout(ctx.download_timeout);
    if is_loopback(url) {
        builder = builder.no_proxy();
    }
    builder.build().context("failed to build HTTP client")
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(addr)) => IpAddr::V4(addr).is_loopback(),
        Some(Host::Ipv6(addr)) => IpAddr::V6(addr).is_loopback(),
        None => false,
    }
}

/// Checks the ZIP signature and that the central directory parses.
pub fn validate_zip_bytes(bytes: &[u8]) -> Result<(), String> {
    let signed = bytes.starts_with(&PK_LOCAL_FILE_HEADER)
        || bytes.starts_with(&PK_EMPTY_ARCHIVE)
        || bytes.starts_with(&PK_SPANNED_ARCHIVE);
    if !signed {
        return Err("missing ZIP signature".to_string());
    }
    ZipArchive::new(Cursor::new(bytes))
        .map(|_| ())
        .map_err(|err| format!("ZIP parse failed: {}", err))
}

fn write_payload(part_path: &Path, final_path: &Path, bytes: &[u8]) -> Result<u64> {
    if part_path.exists() {
        fs::remove_file(part_path)
            .with_context(|| format!("failed to remove stale {}", part_path.display()))?;
    }

    let mut file = File::create(part_path)
        .with_context(|| format!("failed to create {}", part_path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("failed to write {}", part_path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {}", part_path.display()))?;
    drop(file);

    if final_path.exists() {
        fs::remove_file(final_path)
            .with_context(|| format!("failed to replace {}", final_path.display()))?;
    }
    fs::rename(part_path, final_path)
        .with_context(|| format!("failed to finalize {}", final_path.display()))?;

    let written = fs::metadata(final_path)
        .with_context(|| format!("failed to inspect {}", final_path.display()))?
        .len();
    if written != bytes.len() as u64 {
        return Err(anyhow!(
            "wrote {} bytes but expected {}",
            written,
            bytes.len()
        ));
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunapatch_core::Step;

    use crate::test_support::{serve_once, zip_bytes, Harness};

    #[test]
    fn downloads_valid_archive_to_work_dir() {
        let body = zip_bytes(&[("index.js", b"console.log('luna')")]);
        let url = serve_once("200 OK", body.clone());
        let harness = Harness::install(&url);

        download_payload(&harness.ctx(Step::Download)).expect("download");
        let written = fs::read(&harness.paths.payload_zip).expect("payload");
        assert_eq!(written, body);
        assert!(!harness.paths.payload_part.exists());
    }

    #[test]
    fn non_success_status_fails() {
        let url = serve_once("404 Not Found", b"missing".to_vec());
        let harness = Harness::install(&url);

        let err = download_payload(&harness.ctx(Step::Download)).expect_err("404");
        assert_eq!(err.to_string(), "Error downloading TidaLuna");
        assert!(format!("{:#}", err).contains("404"));
        assert!(!harness.paths.payload_zip.exists());
    }

    #[test]
    fn html_body_fails_zip_validation() {
        let url = serve_once("200 OK", b"<html>rate limited</html>".to_vec());
        let harness = Harness::install(&url);

        let err = download_payload(&harness.ctx(Step::Download)).expect_err("html");
        let rendered = format!("{:#}", err);
        assert!(rendered.contains("missing ZIP signature"));
        assert!(rendered.contains("rate limited"));
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(parse_download_url("x").is_err());
        assert!(parse_download_url("file:///etc/passwd").is_err());
        assert!(parse_download_url("https://example.test/luna.zip").is_ok());

        let harness = Harness::install("ftp://example.test/luna.zip");
        assert!(download_payload(&harness.ctx(Step::Download)).is_err());
    }

    #[test]
    fn zip_validation_checks_signature_and_structure() {
        assert!(validate_zip_bytes(&zip_bytes(&[("a.txt", b"a")])).is_ok());
        assert_eq!(
            validate_zip_bytes(b"not a zip").expect_err("signature"),
            "missing ZIP signature"
        );
        let truncated = [PK_LOCAL_FILE_HEADER.as_slice(), b"junk"].concat();
        assert!(validate_zip_bytes(&truncated).is_err());
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback(&Url::parse("http://127.0.0.1:9/x").expect("url")));
        assert!(is_loopback(&Url::parse("http://localhost/x").expect("url")));
        assert!(!is_loopback(&Url::parse("https://github.com/x").expect("url")));
    }
}
