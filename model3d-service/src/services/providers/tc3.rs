//! Tencent Cloud API v3 (TC3-HMAC-SHA256) request signing.

use chrono::DateTime;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const SIGNED_HEADERS: &str = "content-type;host;x-tc-action";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Inputs of one signed POST request.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub service: &'a str,
    pub host: &'a str,
    pub action: &'a str,
    pub payload: &'a str,
    pub timestamp: i64,
}

fn hmac_sha256(key: &[u8], message: &str) -> Result<Vec<u8>, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// UTC date of `timestamp` as used in the credential scope.
pub fn credential_date(timestamp: i64) -> Result<String, anyhow::Error> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .ok_or_else(|| anyhow::anyhow!("Timestamp out of range: {}", timestamp))
}

/// Canonical request string; only POST to `/` with an empty query is used.
pub fn canonical_request(req: &SigningRequest<'_>) -> String {
    let canonical_headers = format!(
        "content-type:{}\nhost:{}\nx-tc-action:{}\n",
        CONTENT_TYPE,
        req.host,
        req.action.to_lowercase()
    );

    format!(
        "POST\n/\n\n{}\n{}\n{}",
        canonical_headers,
        SIGNED_HEADERS,
        sha256_hex(req.payload)
    )
}

/// Build the `Authorization` header value for `req`.
pub fn authorization(
    secret_id: &str,
    secret_key: &str,
    req: &SigningRequest<'_>,
) -> Result<String, anyhow::Error> {
    let date = credential_date(req.timestamp)?;
    let credential_scope = format!("{}/{}/tc3_request", date, req.service);

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        req.timestamp,
        credential_scope,
        sha256_hex(&canonical_request(req))
    );

    let secret_date = hmac_sha256(format!("TC3{}", secret_key).as_bytes(), &date)?;
    let secret_service = hmac_sha256(&secret_date, req.service)?;
    let secret_signing = hmac_sha256(&secret_service, "tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, &string_to_sign)?);

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, secret_id, credential_scope, SIGNED_HEADERS, signature
    ))
}
