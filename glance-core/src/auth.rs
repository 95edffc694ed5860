//! Shared-secret check for the AUTH handshake.

/// The server's copy of the shared secret.
///
/// Only the BLAKE3 digest is kept; `blake3::Hash` equality is
/// constant-time, so the comparison does not leak a matching prefix.
#[derive(Clone)]
pub struct AuthSecret {
    digest: blake3::Hash,
}

impl AuthSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: blake3::hash(secret.as_bytes()),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        blake3::hash(candidate.as_bytes()) == self.digest
    }
}

impl std::fmt::Debug for AuthSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthSecret(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_exact_match_only() {
        let secret = AuthSecret::new("secret");
        assert!(secret.verify("secret"));
        assert!(!secret.verify("Secret"));
        assert!(!secret.verify("secret "));
        assert!(!secret.verify(""));
    }

    #[test]
    fn debug_does_not_leak() {
        let secret = AuthSecret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
    }
}
