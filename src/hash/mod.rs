//! Domain-separated Poseidon2 hashing over the BN254 scalar field.
//!
//! These functions mirror the hash gadget of the external proof circuit value
//! for value. Each arity folds its own domain tag into the permutation input,
//! so `hash2(a, b)` can never equal `hash4(a, b, 0, 0)`.

pub mod poseidon2;

use ark_bn254::Fr;

use crate::field::FieldElement;

/// Domain tag for two-input hashing ("H2M").
pub const DOMAIN_HASH2: u64 = 0x48324d;
/// Domain tag for three-input hashing ("H3M").
pub const DOMAIN_HASH3: u64 = 0x48334d;
/// Domain tag for four-input hashing ("H4M").
pub const DOMAIN_HASH4: u64 = 0x48344d;

/// Hash two field elements. Ordering matters: Merkle left/right position is
/// encoded by argument order.
pub fn hash2(a: &FieldElement, b: &FieldElement) -> FieldElement {
    let state = poseidon2::permutation(&[
        a.inner(),
        b.inner(),
        Fr::from(DOMAIN_HASH2),
        Fr::from(0u64),
    ]);
    state[0].into()
}

/// Hash three field elements.
pub fn hash3(a: &FieldElement, b: &FieldElement, c: &FieldElement) -> FieldElement {
    let state = poseidon2::permutation(&[a.inner(), b.inner(), c.inner(), Fr::from(DOMAIN_HASH3)]);
    state[0].into()
}

/// Hash four field elements with a two-block sponge: the fourth input is
/// absorbed into the first lane after the first permutation.
pub fn hash4(
    a: &FieldElement,
    b: &FieldElement,
    c: &FieldElement,
    d: &FieldElement,
) -> FieldElement {
    let mut state = [a.inner(), b.inner(), c.inner(), Fr::from(DOMAIN_HASH4)];
    poseidon2::permutation_in_place(&mut state);
    state[0] += d.inner();
    poseidon2::permutation_in_place(&mut state);
    state[0].into()
}

/// Poseidon2 hasher handle for callers that prefer a value to thread around.
#[derive(Clone, Copy, Debug, Default)]
pub struct Poseidon2Hasher;

impl Poseidon2Hasher {
    /// Create a hasher. Parameters are shared process-wide.
    pub fn new() -> Self {
        Self
    }

    /// Hash two field elements into one.
    pub fn hash_two(&self, left: &FieldElement, right: &FieldElement) -> FieldElement {
        hash2(left, right)
    }

    /// Hash up to four field elements, dispatching on arity.
    ///
    /// Returns `None` for arities without a circuit counterpart.
    pub fn hash_many(&self, elements: &[FieldElement]) -> Option<FieldElement> {
        match elements {
            [a, b] => Some(hash2(a, b)),
            [a, b, c] => Some(hash3(a, b, c)),
            [a, b, c, d] => Some(hash4(a, b, c, d)),
            _ => None,
        }
    }
}
