use cisync_application::SignatureVerifier;
use cisync_core::{AppError, AppResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC-SHA256 verifier for `sha256=<hex>` body signatures.
#[derive(Clone)]
pub struct HmacSha256SignatureVerifier {
    secret: Vec<u8>,
}

impl HmacSha256SignatureVerifier {
    /// Creates a verifier for one shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> AppResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(AppError::Validation(
                "signature secret must not be empty".to_owned(),
            ));
        }

        Ok(Self { secret })
    }

    /// Computes the header value a sender attaches to `body`.
    pub fn sign(&self, body: &[u8]) -> AppResult<String> {
        Ok(format!(
            "{SIGNATURE_PREFIX}{}",
            hex::encode(self.digest(body)?)
        ))
    }

    fn digest(&self, body: &[u8]) -> AppResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_slice())
            .map_err(|error| AppError::Internal(format!("invalid hmac key: {error}")))?;
        mac.update(body);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl SignatureVerifier for HmacSha256SignatureVerifier {
    fn verify(&self, body: &[u8], signature: &str) -> bool {
        let Some(signature_hex) = signature.trim().strip_prefix(SIGNATURE_PREFIX) else {
            return false;
        };
        let Ok(provided) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(expected) = self.digest(body) else {
            return false;
        };

        expected.ct_eq(provided.as_slice()).into()
    }
}
