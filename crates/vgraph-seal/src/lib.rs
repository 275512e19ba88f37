//! Message authentication for encoded graphs.
//!
//! Digests, HMACs, base64 and Ed25519 signatures over opaque byte strings.
//! Nothing here looks at the record format; callers hand in the encoder's
//! output as-is.

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine as _;
use ed25519_dalek::pkcs8::DecodePrivateKey as _;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::{Digest as _, Sha224, Sha256, Sha384, Sha512};

pub const KEY_B64_LEN: usize = 44;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DigestAlg {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlg {
    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlg::Sha224 => "sha224",
            DigestAlg::Sha256 => "sha256",
            DigestAlg::Sha384 => "sha384",
            DigestAlg::Sha512 => "sha512",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha224" => Some(DigestAlg::Sha224),
            "sha256" => Some(DigestAlg::Sha256),
            "sha384" => Some(DigestAlg::Sha384),
            "sha512" => Some(DigestAlg::Sha512),
            _ => None,
        }
    }

    pub fn from_name(s: &str) -> Result<Self> {
        Self::parse(s).with_context(|| format!("unknown hash {s:?}"))
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlg::Sha224 => Sha224::digest(data).to_vec(),
            DigestAlg::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlg::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlg::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Lowercase hex of [`DigestAlg::digest`].
    pub fn hex_digest(self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }

    pub fn hmac(self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        macro_rules! mac {
            ($d:ty) => {{
                let mut mac = <Hmac<$d> as Mac>::new_from_slice(key)
                    .map_err(|e| anyhow::anyhow!("hmac key: {e}"))?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }};
        }
        Ok(match self {
            DigestAlg::Sha224 => mac!(Sha224),
            DigestAlg::Sha256 => mac!(Sha256),
            DigestAlg::Sha384 => mac!(Sha384),
            DigestAlg::Sha512 => mac!(Sha512),
        })
    }
}

pub fn digest(alg: &str, data: &[u8]) -> Result<Vec<u8>> {
    Ok(DigestAlg::from_name(alg)?.digest(data))
}

pub fn hmac(alg: &str, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    DigestAlg::from_name(alg)?.hmac(key, data)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    DigestAlg::Sha256.hex_digest(bytes)
}

pub fn base64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decodes standard padded base64, ignoring ASCII whitespace.
pub fn base64_decode(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .context("invalid base64")
}

fn decode_key_b64(text: &str) -> Result<[u8; 32]> {
    let text = text.trim();
    if text.len() != KEY_B64_LEN {
        anyhow::bail!(
            "key must be {KEY_B64_LEN} base64 characters, got {}",
            text.len()
        );
    }
    let raw = base64_decode(text)?;
    raw.as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("key must decode to 32 bytes, got {}", raw.len()))
}

/// An Ed25519 signing key.
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn from_bytes(raw: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(raw))
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        Ok(Self::from_bytes(&decode_key_b64(text)?))
    }

    /// Parses a PKCS#8 PEM private key.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| anyhow::anyhow!("parse PKCS#8 private key: {e}"))?;
        Ok(Self(key))
    }

    /// Loads a key file holding either a PEM block or a bare base64 key.
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        if text.contains("-----BEGIN") {
            Self::from_pem(&text).with_context(|| format!("load {}", path.display()))
        } else {
            Self::from_base64(&text).with_context(|| format!("load {}", path.display()))
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.0.sign(msg).to_bytes().to_vec()
    }

    pub fn verify(&self, signature: &[u8], msg: &[u8]) -> bool {
        self.public_key().verify(signature, msg)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey")
            .field(&self.public_key().to_base64())
            .finish()
    }
}

/// An Ed25519 verifying key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_bytes(raw: &[u8; 32]) -> Result<Self> {
        let key = VerifyingKey::from_bytes(raw)
            .map_err(|e| anyhow::anyhow!("invalid public key: {e}"))?;
        Ok(Self(key))
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        Self::from_bytes(&decode_key_b64(text)?)
    }

    pub fn to_base64(&self) -> String {
        base64_encode(self.0.as_bytes())
    }

    /// False for malformed signatures as well as mismatches.
    pub fn verify(&self, signature: &[u8], msg: &[u8]) -> bool {
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        self.0.verify(msg, &sig).is_ok()
    }
}
