//! Arweave signing key material.
//!
//! An Arweave wallet is an RSA key serialized as a JSON Web Key. Uploaded key
//! files are validated here and reduced to the recognized JWK members before
//! they are used to sign storage transactions.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::{traits::PrivateKeyParts, BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Mandatory JWK members: key type, public exponent, modulus
const REQUIRED_MEMBERS: [&str; 3] = ["kty", "e", "n"];

/// RSA private components kept when present
const PRIVATE_MEMBERS: [&str; 6] = ["d", "p", "q", "dp", "dq", "qi"];

/// Arweave wallets are 4096-bit RSA keys with e = 65537
const GENERATED_KEY_BITS: usize = 4096;

/// RSA key in JWK form, restricted to the members Arweave uses.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    pub kty: String,
    pub e: String,
    pub n: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,
}

impl SigningKey {
    /// Parse JWK text, keeping only the recognized members.
    pub fn from_json(contents: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(contents)
            .map_err(|e| Error::InvalidKeyFormat(format!("invalid JSON: {e}")))?;
        let Value::Object(object) = value else {
            return Err(Error::InvalidKeyFormat("not a JSON object".into()));
        };

        if let Some(missing) = REQUIRED_MEMBERS.iter().find(|m| !object.contains_key(**m)) {
            return Err(Error::InvalidKeyFormat(format!("missing `{missing}`")));
        }

        let picked: Map<String, Value> = object
            .into_iter()
            .filter(|(k, _)| {
                REQUIRED_MEMBERS.contains(&k.as_str()) || PRIVATE_MEMBERS.contains(&k.as_str())
            })
            .collect();

        serde_json::from_value(Value::Object(picked))
            .map_err(|e| Error::InvalidKeyFormat(e.to_string()))
    }

    /// Generate a fresh Arweave wallet key.
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, GENERATED_KEY_BITS)
            .map_err(|e| Error::Signing(format!("key generation failed: {e}")))?;
        Self::from_rsa(&private)
    }

    pub fn from_rsa(private: &RsaPrivateKey) -> Result<Self> {
        use rsa::traits::PublicKeyParts;

        let [p, q] = private.primes() else {
            return Err(Error::Signing("multi-prime keys are not supported".into()));
        };
        let encode = |n: &BigUint| URL_SAFE_NO_PAD.encode(n.to_bytes_be());

        Ok(Self {
            kty: "RSA".to_string(),
            e: encode(private.e()),
            n: encode(private.n()),
            d: Some(encode(private.d())),
            p: Some(encode(p)),
            q: Some(encode(q)),
            dp: private.dp().map(encode),
            dq: private.dq().map(encode),
            qi: private.crt_coefficient().as_ref().map(encode),
        })
    }

    pub fn has_private_key(&self) -> bool {
        self.d.is_some()
    }

    /// Raw modulus bytes; the transaction `owner` field.
    pub fn owner_bytes(&self) -> Result<Vec<u8>> {
        decode_member("n", &self.n)
    }

    /// Wallet address: base64url(SHA-256(modulus)).
    pub fn address(&self) -> Result<String> {
        let digest = Sha256::digest(self.owner_bytes()?);
        Ok(URL_SAFE_NO_PAD.encode(digest))
    }

    /// Rebuild the RSA private key for signing.
    pub fn to_rsa(&self) -> Result<RsaPrivateKey> {
        if self.kty != "RSA" {
            let kty = &self.kty;
            return Err(Error::InvalidKeyFormat(format!("unsupported kty `{kty}`")));
        }
        let d = self
            .d
            .as_deref()
            .ok_or_else(|| Error::InvalidKeyFormat("no private exponent".into()))?;

        let mut primes = Vec::with_capacity(2);
        if let (Some(p), Some(q)) = (self.p.as_deref(), self.q.as_deref()) {
            primes.push(decode_uint("p", p)?);
            primes.push(decode_uint("q", q)?);
        }

        let n = decode_uint("n", &self.n)?;
        let e = decode_uint("e", &self.e)?;
        let mut key = RsaPrivateKey::from_components(n, e, decode_uint("d", d)?, primes)
            .map_err(|err| Error::InvalidKeyFormat(err.to_string()))?;
        key.precompute()
            .map_err(|err| Error::InvalidKeyFormat(err.to_string()))?;
        Ok(key)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn decode_member(name: &str, raw: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(|e| {
            Error::InvalidKeyFormat(format!("member `{name}` is not base64url: {e}"))
        })
}

fn decode_uint(name: &str, raw: &str) -> Result<BigUint> {
    decode_member(name, raw).map(|b| BigUint::from_bytes_be(&b))
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n: String = self.n.chars().take(12).collect();
        f.debug_struct("SigningKey")
            .field("kty", &self.kty)
            .field("e", &self.e)
            .field("n", &format_args!("{n}…"))
            .field("private", &self.has_private_key())
            .finish()
    }
}

// =============================================================================
// KEY FILE
// =============================================================================

#[derive(Debug, Clone)]
enum KeySource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A user-supplied key file together with its declared content type.
#[derive(Debug, Clone)]
pub struct KeyFile {
    content_type: String,
    source: KeySource,
}

impl KeyFile {
    /// Key file on disk; the content type is inferred from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => "application/json",
            _ => "application/octet-stream",
        };
        Self {
            content_type: content_type.to_string(),
            source: KeySource::Path(path),
        }
    }

    pub fn from_bytes(content_type: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            source: KeySource::Bytes(contents.into()),
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Validate the declared type, then read and parse the key.
    ///
    /// The content is never read when the declared type is not JSON.
    pub async fn load(&self) -> Result<SigningKey> {
        if !self.content_type.starts_with("application/json") {
            return Err(Error::InvalidFileType(self.content_type.clone()));
        }
        let contents = match &self.source {
            KeySource::Path(path) => tokio::fs::read(path).await?,
            KeySource::Bytes(bytes) => bytes.clone(),
        };
        SigningKey::from_json(&contents)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn public_jwk() -> Value {
        json!({
            "kty": "RSA",
            "e": "AQAB",
            "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1Wl",
        })
    }

    #[tokio::test]
    async fn non_json_type_is_rejected_without_reading() {
        let file = KeyFile::from_path("/definitely/not/here/key.txt");
        assert_eq!(
            file.load().await,
            Err(Error::InvalidFileType("application/octet-stream".into()))
        );
    }

    #[tokio::test]
    async fn json_with_charset_is_accepted() {
        let body = serde_json::to_vec(&public_jwk()).unwrap();
        let file = KeyFile::from_bytes("application/json; charset=utf-8", body);
        let key = file.load().await.unwrap();
        assert_eq!(key.kty, "RSA");
        assert!(!key.has_private_key());
    }

    #[rstest]
    #[case::kty("kty")]
    #[case::exponent("e")]
    #[case::modulus("n")]
    fn missing_required_member(#[case] member: &str) {
        let mut jwk = public_jwk();
        jwk.as_object_mut().unwrap().remove(member);
        let err = SigningKey::from_json(&serde_json::to_vec(&jwk).unwrap()).unwrap_err();
        assert!(matches!(&err, Error::InvalidKeyFormat(_)));
        assert!(err.to_string().contains(member));
    }

    #[rstest]
    #[case::array(b"[1, 2, 3]".as_slice())]
    #[case::null(b"null".as_slice())]
    #[case::string(b"\"kty\"".as_slice())]
    #[case::garbage(b"{not json".as_slice())]
    fn non_object_content(#[case] body: &[u8]) {
        assert!(matches!(
            SigningKey::from_json(body),
            Err(Error::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn extraneous_members_are_dropped() {
        let mut jwk = public_jwk();
        let object = jwk.as_object_mut().unwrap();
        object.insert("d".into(), json!("ZA"));
        object.insert("qi".into(), json!("cWk"));
        object.insert("alg".into(), json!("RS256"));
        object.insert("kid".into(), json!("wallet-1"));

        let key = SigningKey::from_json(&serde_json::to_vec(&jwk).unwrap()).unwrap();
        let round: Value = serde_json::from_str(&key.to_json().unwrap()).unwrap();
        let mut members: Vec<_> = round.as_object().unwrap().keys().cloned().collect();
        members.sort();

        assert_eq!(members, vec!["d", "e", "kty", "n", "qi"]);
        assert_eq!(key.d.as_deref(), Some("ZA"));
        assert_eq!(key.qi.as_deref(), Some("cWk"));
    }

    #[test]
    fn address_is_hash_of_modulus() {
        let key = SigningKey::from_json(br#"{"kty":"RSA","e":"AQAB","n":"AQID"}"#).unwrap();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest([1u8, 2, 3]));
        assert_eq!(key.address().unwrap(), expected);
    }

    #[test]
    fn debug_hides_private_members() {
        let key = SigningKey::from_json(
            br#"{"kty":"RSA","e":"AQAB","n":"AQIDBAUGBwgJCgsMDQ4P","d":"c2VjcmV0"}"#,
        )
        .unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("c2VjcmV0"));
        assert!(rendered.contains("private: true"));
    }

    #[tokio::test]
    async fn debug_truncates_non_ascii_modulus_by_character() {
        let body = br#"{"kty":"RSA","e":"AQAB","n":"aaaaaaaaaaa\u00e9bbbb"}"#;
        let key = KeyFile::from_bytes("application/json", body.to_vec())
            .load()
            .await
            .unwrap();

        let rendered = format!("{key:?}");
        assert!(rendered.contains("aaaaaaaaaaaé…"));
        assert!(!rendered.contains("bbbb"));
    }

    #[test]
    fn rsa_round_trip() {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let jwk = SigningKey::from_rsa(&private).unwrap();
        assert_eq!(jwk.to_rsa().unwrap(), private);
    }

    #[test]
    fn public_only_key_cannot_sign() {
        let key = SigningKey::from_json(&serde_json::to_vec(&public_jwk()).unwrap()).unwrap();
        assert!(matches!(key.to_rsa(), Err(Error::InvalidKeyFormat(_))));
    }
}
