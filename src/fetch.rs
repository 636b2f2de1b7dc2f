use anyhow::{Context, Result};

/// Downloads `url` with a blocking client, failing on a non-success status.
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let resp = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to send request to {url}"))?
        .error_for_status()?;
    Ok(resp.bytes()?.to_vec())
}
