//! Ledger wallet credentials.

use zeroize::Zeroizing;

/// A ledger account: public address plus the signing seed.
///
/// The seed is zeroized on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct Wallet {
    pub address: String,
    secret: Zeroizing<String>,
}

impl Wallet {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }

    /// The signing seed. Only ledger adapters should call this.
    pub fn secret(&self) -> &str {
        self.secret.as_str()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for Wallet {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.secret.as_str() == other.secret.as_str()
    }
}

impl Eq for Wallet {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let w = Wallet::new("rAlice", "sEdSecretSeed");
        let dbg = format!("{w:?}");
        assert!(dbg.contains("rAlice"));
        assert!(!dbg.contains("sEdSecretSeed"));
    }

    #[test]
    fn secret_is_retrievable() {
        let w = Wallet::new("rAlice", "seed");
        assert_eq!(w.secret(), "seed");
    }
}
