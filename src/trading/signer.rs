//! Message authentication for the signed trading protocol.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use url::form_urlencoded;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::trading::nonce::NonceCounter;

/// API credentials for one venue account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read `apikey`/`apisecret` for a venue, or `None` when either is
    /// absent and trading should stay unavailable.
    #[must_use]
    pub fn from_settings(settings: &Settings, venue: &str) -> Option<Self> {
        let api_key = settings.get(venue, "apikey")?;
        let api_secret = settings.get(venue, "apisecret")?;
        Some(Self::new(api_key, api_secret))
    }
}

/// A signed request body with its authentication headers.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Form-urlencoded body, nonce included.
    pub body: String,
    /// `API-Key` and `API-Sign` header values.
    pub headers: Vec<(&'static str, String)>,
}

impl SignedRequest {
    /// Render the headers for an HTTP client.
    ///
    /// # Errors
    ///
    /// [`Error::SigningFailed`] if a value is not a valid header value.
    pub fn header_map(&self) -> Result<reqwest::header::HeaderMap> {
        let mut map = reqwest::header::HeaderMap::new();
        for (name, value) in &self.headers {
            let value = value
                .parse()
                .map_err(|_| Error::SigningFailed(format!("bad {name} header value")))?;
            map.insert(*name, value);
        }
        Ok(map)
    }
}

/// Signs request bodies for one venue account.
///
/// The signature is HMAC-SHA512 over `path ‖ SHA256(nonce ‖ body)`, keyed
/// with the base64-decoded account secret and emitted base64-encoded.
/// Every issued nonce is written back to the settings store under
/// `lastnonce`, so a restart resumes above it.
pub struct RequestSigner {
    venue: &'static str,
    credentials: Credentials,
    nonce: NonceCounter,
    settings: Arc<Settings>,
}

impl RequestSigner {
    /// Build a signer for `venue`, loading the nonce floor from
    /// `lastnonce` in the settings.
    #[must_use]
    pub fn new(venue: &'static str, credentials: Credentials, settings: Arc<Settings>) -> Self {
        let floor = settings.get_i64(venue, "lastnonce").unwrap_or(0);
        Self {
            venue,
            credentials,
            nonce: NonceCounter::new(floor),
            settings,
        }
    }

    /// Issue the next nonce and record it in the settings store.
    pub fn next_nonce(&self) -> i64 {
        let nonce = self.nonce.next();
        self.settings
            .set(self.venue, "lastnonce", &nonce.to_string());
        nonce
    }

    /// Sign a request to `path` with the given form parameters.
    ///
    /// # Errors
    ///
    /// [`Error::SigningFailed`] when the configured secret is not valid
    /// base64.
    pub fn sign(&self, path: &str, params: &[(&str, &str)]) -> Result<SignedRequest> {
        let nonce = self.next_nonce();
        self.sign_with_nonce(path, params, nonce)
    }

    fn sign_with_nonce(
        &self,
        path: &str,
        params: &[(&str, &str)],
        nonce: i64,
    ) -> Result<SignedRequest> {
        let nonce_str = nonce.to_string();
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            serializer.append_pair(key, value);
        }
        serializer.append_pair("nonce", &nonce_str);
        let body = serializer.finish();

        let mut hasher = Sha256::new();
        hasher.update(nonce_str.as_bytes());
        hasher.update(body.as_bytes());
        let digest = hasher.finalize();

        let secret = BASE64
            .decode(&self.credentials.api_secret)
            .map_err(|e| Error::SigningFailed(format!("secret is not valid base64: {e}")))?;
        let mut mac = Hmac::<Sha512>::new_from_slice(&secret)
            .map_err(|e| Error::SigningFailed(e.to_string()))?;
        mac.update(path.as_bytes());
        mac.update(&digest);
        let signature = BASE64.encode(mac.finalize().into_bytes());

        Ok(SignedRequest {
            body,
            headers: vec![
                ("API-Key", self.credentials.api_key.clone()),
                ("API-Sign", signature),
            ],
        })
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never render the secret
        f.debug_struct("RequestSigner")
            .field("venue", &self.venue)
            .field("api_key", &self.credentials.api_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> RequestSigner {
        let secret = BASE64.encode(b"super secret signing key");
        RequestSigner::new(
            "testvenue",
            Credentials::new("the-key", secret),
            Arc::new(Settings::new()),
        )
    }

    #[test]
    fn body_carries_params_and_nonce() {
        let signed = signer()
            .sign("/0/private/AddOrder", &[("pair", "XXBTZEUR"), ("type", "buy")])
            .unwrap();

        assert!(signed.body.starts_with("pair=XXBTZEUR&type=buy&nonce="));
    }

    #[test]
    fn same_nonce_signs_identically_different_nonce_differently() {
        let s = signer();
        let a = s.sign_with_nonce("/path", &[("k", "v")], 42).unwrap();
        let b = s.sign_with_nonce("/path", &[("k", "v")], 42).unwrap();
        let c = s.sign_with_nonce("/path", &[("k", "v")], 43).unwrap();

        assert_eq!(a.headers, b.headers);
        assert_ne!(a.headers, c.headers);
    }

    #[test]
    fn malformed_secret_is_signing_failure() {
        let s = RequestSigner::new(
            "testvenue",
            Credentials::new("the-key", "not base64!!!"),
            Arc::new(Settings::new()),
        );

        assert!(matches!(
            s.sign("/path", &[]),
            Err(Error::SigningFailed(_))
        ));
    }

    #[test]
    fn issued_nonces_are_recorded_in_settings() {
        let settings = Arc::new(Settings::new());
        let secret = BASE64.encode(b"k");
        let s = RequestSigner::new(
            "testvenue",
            Credentials::new("key", secret),
            Arc::clone(&settings),
        );

        let n1 = s.next_nonce();
        assert_eq!(settings.get_i64("testvenue", "lastnonce"), Some(n1));

        let n2 = s.next_nonce();
        assert!(n2 > n1);
        assert_eq!(settings.get_i64("testvenue", "lastnonce"), Some(n2));
    }

    #[test]
    fn nonce_floor_survives_restart() {
        let settings = Arc::new(Settings::new());
        settings.set("testvenue", "lastnonce", "9999999999999999");
        let secret = BASE64.encode(b"k");
        let s = RequestSigner::new(
            "testvenue",
            Credentials::new("key", secret),
            Arc::clone(&settings),
        );

        assert!(s.next_nonce() > 9_999_999_999_999_999);
    }

    #[test]
    fn header_map_renders_both_headers() {
        let signed = signer().sign("/path", &[]).unwrap();
        let map = signed.header_map().unwrap();

        assert!(map.contains_key("API-Key"));
        assert!(map.contains_key("API-Sign"));
    }
}
