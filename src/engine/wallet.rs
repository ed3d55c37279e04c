use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::Amount;
use crate::model::UserId;

type HmacSha256 = Hmac<Sha256>;

/// PINs are exactly four ASCII digits.
pub fn pin_is_well_formed(pin: &str) -> bool {
    pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit())
}

/// Salted MAC of a wallet PIN.
///
/// The salt keys an HMAC-SHA256 over the PIN, so equal PINs hash
/// differently per wallet and verification never branches on how much of
/// the digest matches.
#[derive(Clone)]
pub struct PinHash {
    salt: [u8; 16],
    mac: [u8; 32],
}

impl PinHash {
    pub fn new(pin: &str) -> Self {
        let salt: [u8; 16] = rand::thread_rng().r#gen();
        let mac = Self::digest(&salt, pin);
        Self { salt, mac }
    }

    fn digest(salt: &[u8; 16], pin: &str) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(salt).expect("hmac key");
        mac.update(pin.as_bytes());
        mac.finalize().into_bytes().into()
    }

    /// Constant-time comparison against the stored MAC.
    pub fn verify(&self, pin: &str) -> bool {
        let candidate = Self::digest(&self.salt, pin);
        self.mac[..].ct_eq(&candidate[..]).unwrap_u8() == 1
    }
}

impl std::fmt::Debug for PinHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the MAC itself
        f.debug_struct("PinHash")
            .field("salt", &hex::encode(self.salt))
            .finish_non_exhaustive()
    }
}

/// A user's wallet: balance, PIN hash, and the discount the owner grants
/// when paid as a provider.
#[derive(Debug, Clone)]
pub struct WalletAccount {
    pub owner: UserId,
    pin: PinHash,
    balance: Amount,
    discount_percent: u8,
}

impl WalletAccount {
    pub fn new(owner: UserId, pin: &str) -> Self {
        Self {
            owner,
            pin: PinHash::new(pin),
            balance: Amount::ZERO,
            discount_percent: 0,
        }
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn discount_percent(&self) -> u8 {
        self.discount_percent
    }

    pub fn pin_matches(&self, pin: &str) -> bool {
        self.pin.verify(pin)
    }

    pub fn set_pin(&mut self, pin: &str) {
        self.pin = PinHash::new(pin);
    }

    pub fn set_discount(&mut self, percent: u8) {
        self.discount_percent = percent;
    }

    pub fn credit(&mut self, amount: Amount) {
        self.balance += amount;
    }

    /// Caller must have checked the balance; debiting below zero is a bug.
    pub fn debit(&mut self, amount: Amount) {
        self.balance -= amount;
        debug_assert!(!self.balance.is_negative());
    }
}
