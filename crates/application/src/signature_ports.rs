/// Port that authenticates raw inbound event bodies.
pub trait SignatureVerifier: Send + Sync {
    /// Returns whether the signature header value matches the exact body bytes.
    fn verify(&self, body: &[u8], signature: &str) -> bool;
}
