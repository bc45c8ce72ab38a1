/*!
Signed payloads for direct uploads.

The service authorizes these uploads with `md5(secret + timestamp + nonce)`.
MD5 is weak and is only used here because the service expects it; don't
reuse this for anything else.
*/
use rand::Rng as _;
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;

/// Default number of seconds a token is accepted by the service
pub const DEFAULT_VALID_FOR: Duration = Duration::from_secs(30);

/// Header carrying the JSON encoded [`HmacToken::info`]
pub const INFO_HEADER: &str = "x-vwflow-info";
/// Header carrying the signature
pub const HMAC_HEADER: &str = "x-vwflow-hmac";

/// Computes the signature for a secret, an expiry timestamp and a nonce
pub fn sign(secret: &str, timestamp: i64, nonce: &str) -> String {
    let input = format!("{}{}{}", secret, timestamp, nonce);
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Generates a fresh `msg_data` value
pub fn nonce() -> String {
    let now = OffsetDateTime::now_utc();
    let micros = now.unix_timestamp_nanos() / 1_000;

    let mut rng = rand::thread_rng();
    format!(
        "{}{:x}.{:08}",
        rng.gen::<u32>(),
        micros,
        rng.gen_range(0..100_000_000u32)
    )
}

/// A single-use, time bounded authorization for an upload
#[derive(Debug, Clone, PartialEq)]
pub struct HmacToken {
    pub msg_data: String,
    /// Unix timestamp (UTC) after which the service rejects the token
    pub msg_timestamp: i64,
    pub client_data: String,
    /// Where the service redirects the browser to, for the form endpoint
    pub redirect: Option<String>,
    pub signature: String,
}

impl HmacToken {
    pub fn new(secret: &str, msg_data: impl ToString, msg_timestamp: i64) -> Self {
        let msg_data = msg_data.to_string();
        Self {
            signature: sign(secret, msg_timestamp, &msg_data),
            msg_data,
            msg_timestamp,
            client_data: String::new(),
            redirect: None,
        }
    }

    /// Makes a token with a fresh nonce, valid for `valid_for` after `now`
    pub fn generate(secret: &str, valid_for: Duration, now: OffsetDateTime) -> Self {
        let expires = now + valid_for;
        Self::new(secret, nonce(), expires.unix_timestamp())
    }

    pub fn client_data(mut self, data: impl ToString) -> Self {
        self.client_data = data.to_string();
        self
    }

    pub fn redirect(mut self, url: impl ToString) -> Self {
        self.redirect.replace(url.to_string());
        self
    }

    /// The JSON payload for the info header (or the `vwflow_info` form field)
    pub fn info(&self) -> String {
        #[derive(Serialize)]
        struct Info<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            redirect: Option<&'a str>,
            msg_data: &'a str,
            msg_timestamp: String,
            client_data: &'a str,
        }

        let info = Info {
            redirect: self.redirect.as_deref(),
            msg_data: &self.msg_data,
            msg_timestamp: self.msg_timestamp.to_string(),
            client_data: &self.client_data,
        };

        // only strings in there
        serde_json::to_string(&info).unwrap_or_default()
    }

    /// The headers for an `items-hmac` upload
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            (INFO_HEADER, self.info()),
            (HMAC_HEADER, self.signature.clone()),
        ]
    }

    /// The hidden fields for a browser form posting to `items-hmac-redirect`
    pub fn form_fields(&self) -> [(&'static str, String); 2] {
        [
            ("vwflow_info", self.info()),
            ("vwflow_hmac", self.signature.clone()),
        ]
    }
}

/// Parameters for [`VWflow::create_item_with_hmac`](crate::VWflow::create_item_with_hmac)
#[derive(Debug, Clone, PartialEq)]
pub struct HmacUpload {
    pub path: std::path::PathBuf,
    pub account_id: String,
    pub wprofile_id: String,
    pub secret: String,
    pub valid_for: Duration,
    pub client_data: String,
}

impl HmacUpload {
    pub fn new(
        path: impl Into<std::path::PathBuf>,
        account_id: impl ToString,
        wprofile_id: impl ToString,
        secret: impl ToString,
    ) -> Self {
        Self {
            path: path.into(),
            account_id: account_id.to_string(),
            wprofile_id: wprofile_id.to_string(),
            secret: secret.to_string(),
            valid_for: DEFAULT_VALID_FOR,
            client_data: String::new(),
        }
    }

    pub fn valid_for(mut self, valid_for: Duration) -> Self {
        self.valid_for = valid_for;
        self
    }

    pub fn client_data(mut self, data: impl ToString) -> Self {
        self.client_data = data.to_string();
        self
    }

    pub fn token(&self, now: OffsetDateTime) -> HmacToken {
        HmacToken::generate(&self.secret, self.valid_for, now).client_data(&self.client_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic() {
        let a = sign("s3cr3t", 1_700_000_030, "12345abc.001");
        let b = sign("s3cr3t", 1_700_000_030, "12345abc.001");
        assert_eq!(a, b);
        assert_eq!(a, "8fe7608f66bed4ea78fb4bddc8055f8c");
        assert_ne!(a, sign("s3cr3t", 1_700_000_031, "12345abc.001"));
    }

    #[test]
    fn known_signature() {
        assert_eq!(
            sign("secret", 1_457_100_118, "nonce"),
            "30bac89ce216dac0562a39a14b1307dc"
        );
    }

    #[test]
    fn nonce_is_fresh() {
        assert_ne!(nonce(), nonce());
    }

    #[test]
    fn generate_uses_given_time() {
        let now = OffsetDateTime::from_unix_timestamp(1_457_100_118).unwrap();
        let token = HmacToken::generate("secret", DEFAULT_VALID_FOR, now);
        assert_eq!(token.msg_timestamp, 1_457_100_148);
        assert_eq!(
            token.signature,
            sign("secret", token.msg_timestamp, &token.msg_data)
        );
    }

    #[test]
    fn info_payload() {
        let token = HmacToken::new("secret", "nonce", 1_457_100_118).client_data(r#"{"a":1}"#);
        assert_eq!(
            token.info(),
            r#"{"msg_data":"nonce","msg_timestamp":"1457100118","client_data":"{\"a\":1}"}"#
        );

        let token = token.redirect("http://example.com/");
        let [(info_key, info), (hmac_key, hmac)] = token.form_fields();
        assert_eq!(info_key, "vwflow_info");
        assert_eq!(hmac_key, "vwflow_hmac");
        assert!(info.starts_with(r#"{"redirect":"http://example.com/","msg_data":"nonce""#));
        assert_eq!(hmac, token.signature);
    }
}
