//! Poseidon hash over the circuit field
//!
//! Two arities share one parameter family (alpha = 5, 8 full rounds, 57
//! partial rounds, capacity 1) and differ only in the sponge rate:
//!
//! ```text
//! hash2(a, b)    : rate 2   (binary tree nodes, signature keys)
//! hash3(a, b, c) : rate 3   (triad leaf nodes, note commitments)
//! ```

use std::sync::OnceLock;

use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};

use crate::field::FieldElement;

static POSEIDON_RATE_2: OnceLock<PoseidonConfig<FieldElement>> = OnceLock::new();
static POSEIDON_RATE_3: OnceLock<PoseidonConfig<FieldElement>> = OnceLock::new();

/// Poseidon configuration for Shade
///
/// Field: BLS12-381 Fr (255 bits)
/// Capacity: 1
/// Security: 128 bits
fn poseidon_config(rate: usize) -> PoseidonConfig<FieldElement> {
    let prime_bits: u64 = 255;
    let capacity: usize = 1;
    let full_rounds: u64 = 8;
    let partial_rounds: u64 = 57;
    let alpha: u64 = 5;
    let skip_matrices: u64 = 0;

    let (ark, mds) = find_poseidon_ark_and_mds::<FieldElement>(
        prime_bits,
        rate,
        full_rounds,
        partial_rounds,
        skip_matrices,
    );

    PoseidonConfig::new(
        full_rounds as usize,
        partial_rounds as usize,
        alpha,
        mds,
        ark,
        rate,
        capacity,
    )
}

fn squeeze(config: &PoseidonConfig<FieldElement>, inputs: &[FieldElement]) -> FieldElement {
    let mut sponge = PoseidonSponge::new(config);
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_field_elements::<FieldElement>(1)[0]
}

/// 2-ary Poseidon
pub fn hash2(a: &FieldElement, b: &FieldElement) -> FieldElement {
    let config = POSEIDON_RATE_2.get_or_init(|| poseidon_config(2));
    squeeze(config, &[*a, *b])
}

/// 3-ary Poseidon
pub fn hash3(a: &FieldElement, b: &FieldElement, c: &FieldElement) -> FieldElement {
    let config = POSEIDON_RATE_3.get_or_init(|| poseidon_config(3));
    squeeze(config, &[*a, *b, *c])
}
