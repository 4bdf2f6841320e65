//! Stealth message protocol
//!
//! A sender who knows a recipient's [`StealthAddress`] creates a one-time
//! spend key for them and an encrypted message carrying the blinding
//! scalar. Only the holder of the channel private key can read it back.
//!
//! ```text
//! Sender                                   Recipient
//! ──────                                   ─────────
//! ρs, ρc ← random scalars
//! child  = ρs · root_pub                   S  = channel_priv · E
//! S      = ρc · channel_pub                k‖iv = pack(S)
//! k‖iv   = pack(S)                         ρs = AES-CBC⁻¹(ct, k, iv)
//! ct     = AES-CBC(be32(ρs), k, iv)        top 4 bits zero?  else not ours
//! E      = ρc · Base                       spend_priv = root_priv · ρs
//! msg    = pack(E) ‖ ct   (64 bytes)
//! ```
//!
//! The marker check is only a cheap filter that passes roughly one foreign
//! message in sixteen. A note is ours only once its commitment recomputes
//! from the recovered spend key.

use std::fmt;

use ark_ff::Zero;
use rand::{CryptoRng, RngCore};
use shade_keychain::{
    ECPoint, KeyError, Keypair, PACKED_POINT_LEN, Scalar, derive_child_private_key,
    derive_child_public_key, ensure_valid_point, mul_base, mul_point, pack_point, random_scalar,
    scalar_from_be_bytes, scalar_to_be_bytes, unpack_point,
};
use subtle::ConstantTimeEq;

use crate::address::StealthAddress;
use crate::cipher::{BLOCK_PAIR_LEN, SymmetricKey, decrypt_block_pair, encrypt_block_pair};
use crate::commitment::{Commitment, NoteMetadata};
use crate::error::StealthError;

/// Wire length: packed ephemeral key followed by two AES blocks
pub const MESSAGE_LEN: usize = PACKED_POINT_LEN + BLOCK_PAIR_LEN;

/// Leading plaintext bits that must be zero for a message to be ours
pub const MARKER_BITS: u32 = 4;

/// A fixed-size stealth message as published next to a commitment
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StealthMessage([u8; MESSAGE_LEN]);

impl StealthMessage {
    fn from_parts(ephemeral: &ECPoint, ciphertext: &[u8; BLOCK_PAIR_LEN]) -> Self {
        let mut bytes = [0u8; MESSAGE_LEN];
        bytes[..PACKED_POINT_LEN].copy_from_slice(&pack_point(ephemeral));
        bytes[PACKED_POINT_LEN..].copy_from_slice(ciphertext);
        Self(bytes)
    }

    /// Length-checked parse; point validation happens on recovery
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StealthError> {
        let array: [u8; MESSAGE_LEN] =
            bytes
                .try_into()
                .map_err(|_| StealthError::MalformedMessage {
                    expected: MESSAGE_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; MESSAGE_LEN] {
        &self.0
    }

    pub fn ephemeral_bytes(&self) -> &[u8] {
        &self.0[..PACKED_POINT_LEN]
    }

    pub fn ciphertext(&self) -> [u8; BLOCK_PAIR_LEN] {
        let mut ct = [0u8; BLOCK_PAIR_LEN];
        ct.copy_from_slice(&self.0[PACKED_POINT_LEN..]);
        ct
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, StealthError> {
        let digits = s
            .strip_prefix("0x")
            .ok_or(StealthError::MalformedMessageHex("must start with 0x"))?;
        let bytes = hex::decode(digits)
            .map_err(|_| StealthError::MalformedMessageHex("not valid hex"))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for StealthMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StealthMessage({})", self.to_hex())
    }
}

impl From<[u8; MESSAGE_LEN]> for StealthMessage {
    fn from(bytes: [u8; MESSAGE_LEN]) -> Self {
        Self(bytes)
    }
}

/// Everything the sender produces for one output note
#[derive(Clone)]
pub struct StealthOutput {
    /// One-time spend public key; goes into the commitment
    pub child_spend_pub: ECPoint,
    /// Message published alongside the commitment
    pub message: StealthMessage,
    /// Blinding scalar, kept by the sender only if it needs to audit the note
    pub rho_spend: Scalar,
}

impl StealthOutput {
    /// Commitment binding this output's spend key to the note metadata
    pub fn commitment(&self, metadata: &NoteMetadata) -> Commitment {
        Commitment::compute(&self.child_spend_pub, metadata)
    }
}

impl fmt::Debug for StealthOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StealthOutput")
            .field("child_spend_pub", &self.child_spend_pub)
            .field("message", &self.message)
            .field("rho_spend", &"<redacted>")
            .finish()
    }
}

/// Spend material recovered from a message addressed to us
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveredSpend {
    pub rho_spend: Scalar,
    pub spend_priv: Scalar,
    pub spend_pub: ECPoint,
}

impl RecoveredSpend {
    /// Recompute the commitment from the recovered key and compare
    pub fn matches_commitment(&self, metadata: &NoteMetadata, commitment: &Commitment) -> bool {
        Commitment::compute(&self.spend_pub, metadata) == *commitment
    }

    pub fn keypair(&self) -> Result<Keypair, KeyError> {
        Keypair::from_private_key(self.spend_priv)
    }
}

impl fmt::Debug for RecoveredSpend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveredSpend")
            .field("spend_pub", &self.spend_pub)
            .field("rho_spend", &"<redacted>")
            .field("spend_priv", &"<redacted>")
            .finish()
    }
}

/// Outcome of trying a message with our keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    Recovered(RecoveredSpend),
    NotAddressedToUs,
}

impl Recovery {
    pub fn is_recovered(&self) -> bool {
        matches!(self, Recovery::Recovered(_))
    }

    pub fn into_spend(self) -> Option<RecoveredSpend> {
        match self {
            Recovery::Recovered(spend) => Some(spend),
            Recovery::NotAddressedToUs => None,
        }
    }
}

/// True when the leading [`MARKER_BITS`] of the plaintext are zero.
///
/// Evaluated in constant time.
pub fn marker_matches(plaintext: &[u8; BLOCK_PAIR_LEN]) -> bool {
    let marker = plaintext[0] >> (8 - MARKER_BITS);
    marker.ct_eq(&0u8).into()
}

/// Create a stealth output with fresh randoms
pub fn create_stealth<R: RngCore + CryptoRng + ?Sized>(
    rng: &mut R,
    root_pub: &ECPoint,
    channel_pub: &ECPoint,
) -> Result<StealthOutput, StealthError> {
    let rho_spend = non_zero_scalar(rng);
    let rho_channel = non_zero_scalar(rng);
    create_with_randoms(root_pub, channel_pub, &rho_spend, &rho_channel)
}

/// Deterministic variant of [`create_stealth`]
pub fn create_with_randoms(
    root_pub: &ECPoint,
    channel_pub: &ECPoint,
    rho_spend: &Scalar,
    rho_channel: &Scalar,
) -> Result<StealthOutput, StealthError> {
    ensure_valid_point(root_pub)?;
    ensure_valid_point(channel_pub)?;
    if rho_spend.is_zero() || rho_channel.is_zero() {
        return Err(KeyError::InvalidScalar.into());
    }

    let child_spend_pub = derive_child_public_key(root_pub, rho_spend);

    let shared = mul_point(channel_pub, rho_channel);
    let key = SymmetricKey::from_shared_point(&shared);
    let ciphertext = encrypt_block_pair(&scalar_to_be_bytes(rho_spend), &key)?;

    let ephemeral = mul_base(rho_channel);
    Ok(StealthOutput {
        child_spend_pub,
        message: StealthMessage::from_parts(&ephemeral, &ciphertext),
        rho_spend: *rho_spend,
    })
}

/// Try to recover the spend key carried by `message`.
///
/// Hard errors are reserved for malformed input; a message meant for
/// someone else yields `Ok(Recovery::NotAddressedToUs)`.
pub fn recover_stealth(
    message: &[u8],
    channel_priv: &Scalar,
    root: &Keypair,
) -> Result<Recovery, StealthError> {
    let message = StealthMessage::from_bytes(message)?;
    let ephemeral = unpack_point(message.ephemeral_bytes())?;

    let shared = mul_point(&ephemeral, channel_priv);
    let key = SymmetricKey::from_shared_point(&shared);
    let plaintext = decrypt_block_pair(&message.ciphertext(), &key)?;

    if !marker_matches(&plaintext) {
        return Ok(Recovery::NotAddressedToUs);
    }
    let rho_spend = match scalar_from_be_bytes(&plaintext) {
        Ok(rho) if !rho.is_zero() => rho,
        _ => return Ok(Recovery::NotAddressedToUs),
    };

    let spend_priv = derive_child_private_key(root.private_key(), &rho_spend);
    Ok(Recovery::Recovered(RecoveredSpend {
        rho_spend,
        spend_priv,
        spend_pub: mul_base(&spend_priv),
    }))
}

fn non_zero_scalar<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Scalar {
    loop {
        let s = random_scalar(rng);
        if !s.is_zero() {
            return s;
        }
    }
}

/// Sender side bound to one recipient address
#[derive(Debug, Clone)]
pub struct StealthSender {
    address: StealthAddress,
}

impl StealthSender {
    pub fn new(address: StealthAddress) -> Self {
        Self { address }
    }

    pub fn address(&self) -> &StealthAddress {
        &self.address
    }

    pub fn create<R: RngCore + CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<StealthOutput, StealthError> {
        create_stealth(rng, self.address.root_pub(), self.address.channel_pub())
    }

    pub fn create_with_randoms(
        &self,
        rho_spend: &Scalar,
        rho_channel: &Scalar,
    ) -> Result<StealthOutput, StealthError> {
        create_with_randoms(
            self.address.root_pub(),
            self.address.channel_pub(),
            rho_spend,
            rho_channel,
        )
    }
}

/// Recipient side: the root keypair plus the channel keypair
#[derive(Debug, Clone)]
pub struct StealthRecipient {
    root: Keypair,
    channel: Keypair,
}

impl StealthRecipient {
    pub fn new(root: Keypair, channel: Keypair) -> Self {
        Self { root, channel }
    }

    pub fn random<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        Self {
            root: Keypair::random(rng),
            channel: Keypair::random(rng),
        }
    }

    /// The address to publish
    pub fn address(&self) -> StealthAddress {
        StealthAddress::from_keypairs(&self.root, &self.channel)
    }

    pub fn root(&self) -> &Keypair {
        &self.root
    }

    pub fn channel(&self) -> &Keypair {
        &self.channel
    }

    pub fn recover(&self, message: &[u8]) -> Result<Recovery, StealthError> {
        recover_stealth(message, self.channel.private_key(), &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use shade_keychain::derive_from_seed_hex;

    #[test]
    fn test_send_and_recover() {
        let mut rng = StdRng::seed_from_u64(0);
        let recipient = StealthRecipient::random(&mut rng);
        let sender = StealthSender::new(recipient.address());

        let output = sender.create(&mut rng).unwrap();
        let spend = recipient
            .recover(output.message.as_bytes())
            .unwrap()
            .into_spend()
            .expect("message should be addressed to recipient");

        assert_eq!(spend.rho_spend, output.rho_spend);
        assert_eq!(spend.spend_pub, output.child_spend_pub);
        assert_eq!(spend.keypair().unwrap().public_key(), &output.child_spend_pub);
    }

    #[test]
    fn test_seed_scenario_with_fixed_randoms() {
        let root = derive_from_seed_hex("0xAABBCCDDEEFF").unwrap();
        let channel = derive_from_seed_hex("0x0102030405").unwrap();
        let recipient = StealthRecipient::new(root, channel);

        let rho_spend = Scalar::from(123_456_789u64);
        let rho_channel = Scalar::from(987_654_321u64);
        let output = StealthSender::new(recipient.address())
            .create_with_randoms(&rho_spend, &rho_channel)
            .unwrap();

        // Same inputs give the same wire bytes
        let again = StealthSender::new(recipient.address())
            .create_with_randoms(&rho_spend, &rho_channel)
            .unwrap();
        assert_eq!(output.message, again.message);

        let spend = recipient
            .recover(output.message.as_bytes())
            .unwrap()
            .into_spend()
            .unwrap();
        assert_eq!(spend.rho_spend, rho_spend);
        assert_eq!(spend.spend_pub, output.child_spend_pub);
    }

    #[test]
    fn test_foreign_recipient_never_matches_commitment() {
        let mut rng = StdRng::seed_from_u64(1);
        let alice = StealthRecipient::random(&mut rng);
        let bob = StealthRecipient::random(&mut rng);
        let meta = NoteMetadata::new(50, 1, 1_700_000_000);

        for _ in 0..32 {
            let output = create_stealth(
                &mut rng,
                alice.address().root_pub(),
                alice.address().channel_pub(),
            )
            .unwrap();
            let commitment = output.commitment(&meta);

            match bob.recover(output.message.as_bytes()).unwrap() {
                Recovery::NotAddressedToUs => {}
                Recovery::Recovered(spend) => {
                    assert!(!spend.matches_commitment(&meta, &commitment))
                }
            }
        }
    }

    #[test]
    fn test_malformed_length() {
        let mut rng = StdRng::seed_from_u64(2);
        let recipient = StealthRecipient::random(&mut rng);
        assert_eq!(
            recipient.recover(&[0u8; 63]),
            Err(StealthError::MalformedMessage {
                expected: 64,
                actual: 63
            })
        );
    }

    #[test]
    fn test_invalid_ephemeral_point() {
        let mut rng = StdRng::seed_from_u64(3);
        let recipient = StealthRecipient::random(&mut rng);
        let mut bytes = [0u8; MESSAGE_LEN];
        bytes[..PACKED_POINT_LEN].copy_from_slice(&pack_point(&mul_base(&Scalar::zero())));

        assert!(matches!(
            recipient.recover(&bytes),
            Err(StealthError::Key(KeyError::InvalidPoint(_)))
        ));
    }

    #[test]
    fn test_rejects_zero_randoms_and_identity_keys() {
        let mut rng = StdRng::seed_from_u64(4);
        let recipient = StealthRecipient::random(&mut rng);
        let address = recipient.address();
        let one = Scalar::from(1u64);

        assert_eq!(
            create_with_randoms(address.root_pub(), address.channel_pub(), &Scalar::zero(), &one)
                .unwrap_err(),
            StealthError::Key(KeyError::InvalidScalar)
        );

        let identity = mul_base(&Scalar::zero());
        assert!(create_with_randoms(&identity, address.channel_pub(), &one, &one).is_err());
    }

    #[test]
    fn test_marker_false_positive_rate() {
        let mut rng = StdRng::seed_from_u64(5);
        let key = SymmetricKey::from_bytes(&[0x5au8; 32]);
        let plaintext = scalar_to_be_bytes(&random_scalar(&mut rng));
        let ciphertext = encrypt_block_pair(&plaintext, &key).unwrap();

        const TRIALS: usize = 4096;
        let mut hits = 0usize;
        for _ in 0..TRIALS {
            let mut raw = [0u8; 32];
            rng.fill_bytes(&mut raw);
            let wrong = SymmetricKey::from_bytes(&raw);
            if marker_matches(&decrypt_block_pair(&ciphertext, &wrong).unwrap()) {
                hits += 1;
            }
        }

        // Expected TRIALS / 2^MARKER_BITS = 256, sigma about 15.5
        assert!((176..=336).contains(&hits), "marker hits: {hits}");
    }

    #[test]
    fn test_message_hex_round_trip() {
        let mut rng = StdRng::seed_from_u64(6);
        let recipient = StealthRecipient::random(&mut rng);
        let output = StealthSender::new(recipient.address())
            .create(&mut rng)
            .unwrap();
        let parsed = StealthMessage::from_hex(&output.message.to_hex()).unwrap();
        assert_eq!(parsed, output.message);
    }

    #[test]
    fn test_message_from_bad_hex() {
        let mut rng = StdRng::seed_from_u64(8);
        let recipient = StealthRecipient::random(&mut rng);
        let output = StealthSender::new(recipient.address())
            .create(&mut rng)
            .unwrap();
        let hex = output.message.to_hex();

        assert_eq!(
            StealthMessage::from_hex(&hex[2..]),
            Err(StealthError::MalformedMessageHex("must start with 0x"))
        );
        assert_eq!(
            StealthMessage::from_hex("0xzz"),
            Err(StealthError::MalformedMessageHex("not valid hex"))
        );
        assert_eq!(
            StealthMessage::from_hex(&hex[..hex.len() - 2]),
            Err(StealthError::MalformedMessage {
                expected: MESSAGE_LEN,
                actual: MESSAGE_LEN - 1
            })
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut rng = StdRng::seed_from_u64(7);
        let recipient = StealthRecipient::random(&mut rng);
        let output = StealthSender::new(recipient.address())
            .create(&mut rng)
            .unwrap();
        assert!(format!("{output:?}").contains("<redacted>"));
    }
}
