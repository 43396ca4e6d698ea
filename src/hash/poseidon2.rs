//! Poseidon2 permutation over the BN254 scalar field, width 4.
//!
//! Parameters follow the Horizen Labs reference instance (α = 5, R_F = 8,
//! R_P = 56). Round constants are regenerated from the Grain LFSR on first
//! use; the internal diagonal is fixed by the reference parameters.

use ark_bn254::Fr;
use ark_ff::{Field, PrimeField};
use num_bigint::BigUint;
use std::sync::OnceLock;

use crate::field::hex_to_field;

/// State width.
pub const WIDTH: usize = 4;
/// Number of full rounds (split evenly before and after the partial rounds).
pub const FULL_ROUNDS: usize = 8;
/// Number of partial rounds.
pub const PARTIAL_ROUNDS: usize = 56;

const FIELD_BITS: u16 = 254;

/// `diag(M_I) - 1` for t = 4.
const INTERNAL_DIAG_MINUS_ONE: [&str; WIDTH] = [
    "0x10dc6e9c006ea38b04b1e03b4bd9490c0d03f98929ca1d7fb56821fd19d3b6e7",
    "0x0c28145b6a44df3e0149b3d0a30b3bb599df9756d4dd9b84a86b38cfb45a740b",
    "0x00544b8338791518b2c7645a50392798b21f75bb60e3596170067d00141cac15",
    "0x222c01175718386f2e2e82eb122789e352e105a3b8fa852613bc534433ee428b",
];

/// Round constants and matrices for one Poseidon2 instance.
#[derive(Clone, Debug)]
pub struct Poseidon2Params {
    /// Constants for the first half of the full rounds.
    pub external_initial: Vec<[Fr; WIDTH]>,
    /// One constant per partial round, added to the first lane.
    pub internal: Vec<Fr>,
    /// Constants for the second half of the full rounds.
    pub external_terminal: Vec<[Fr; WIDTH]>,
    /// Internal matrix diagonal, minus one.
    pub internal_diag: [Fr; WIDTH],
}

impl Poseidon2Params {
    /// Generate the BN254 t = 4 parameters.
    fn generate() -> Self {
        let mut grain = GrainLfsr::new(FIELD_BITS, WIDTH as u16, FULL_ROUNDS as u16, PARTIAL_ROUNDS as u16);

        let half = FULL_ROUNDS / 2;
        let external_initial = (0..half).map(|_| grain.next_round()).collect();
        let internal = (0..PARTIAL_ROUNDS).map(|_| grain.next_field_element()).collect();
        let external_terminal = (0..half).map(|_| grain.next_round()).collect();

        let mut internal_diag = [Fr::from(0u64); WIDTH];
        for (slot, hex) in internal_diag.iter_mut().zip(INTERNAL_DIAG_MINUS_ONE) {
            *slot = hex_to_field(hex)
                .expect("reference diagonal constants are canonical field elements")
                .into();
        }

        Self {
            external_initial,
            internal,
            external_terminal,
            internal_diag,
        }
    }
}

/// Process-wide parameters, built once and shared read-only.
pub fn params() -> &'static Poseidon2Params {
    static PARAMS: OnceLock<Poseidon2Params> = OnceLock::new();
    PARAMS.get_or_init(Poseidon2Params::generate)
}

/// Apply the permutation to a width-4 state.
pub fn permutation(input: &[Fr; WIDTH]) -> [Fr; WIDTH] {
    let mut state = *input;
    permutation_in_place(&mut state);
    state
}

/// Apply the permutation in place.
pub fn permutation_in_place(state: &mut [Fr; WIDTH]) {
    let params = params();

    external_matrix(state);

    for round in &params.external_initial {
        full_round(state, round);
    }

    for constant in &params.internal {
        state[0] += constant;
        state[0] = sbox(state[0]);
        internal_matrix(state, &params.internal_diag);
    }

    for round in &params.external_terminal {
        full_round(state, round);
    }
}

fn full_round(state: &mut [Fr; WIDTH], constants: &[Fr; WIDTH]) {
    for (lane, constant) in state.iter_mut().zip(constants) {
        *lane = sbox(*lane + constant);
    }
    external_matrix(state);
}

fn sbox(x: Fr) -> Fr {
    let x2 = x.square();
    let x4 = x2.square();
    x4 * x
}

/// Multiply by `[[5,7,1,3],[4,6,1,1],[1,3,5,7],[1,1,4,6]]`.
fn external_matrix(state: &mut [Fr; WIDTH]) {
    let [x0, x1, x2, x3] = *state;
    let t0 = x0 + x1;
    let t1 = x2 + x3;
    let t2 = x1.double() + t1;
    let t3 = x3.double() + t0;
    let t4 = t1.double().double() + t3;
    let t5 = t0.double().double() + t2;
    let t6 = t3 + t5;
    let t7 = t2 + t4;
    *state = [t6, t5, t7, t4];
}

fn internal_matrix(state: &mut [Fr; WIDTH], diag: &[Fr; WIDTH]) {
    let sum: Fr = state.iter().copied().sum();
    for (lane, d) in state.iter_mut().zip(diag) {
        *lane = *lane * d + sum;
    }
}

/// Grain LFSR in self-shrinking mode, as used to derive Poseidon round constants.
struct GrainLfsr {
    bits: [bool; 80],
    head: usize,
    field_bits: u16,
}

impl GrainLfsr {
    fn new(field_bits: u16, width: u16, full_rounds: u16, partial_rounds: u16) -> Self {
        let mut bits = [true; 80];
        let mut pos = 0;
        let mut push = |value: u16, len: usize| {
            for i in (0..len).rev() {
                bits[pos] = (value >> i) & 1 == 1;
                pos += 1;
            }
        };
        // field = 1 (prime field), sbox = 0 (x^alpha)
        push(1, 2);
        push(0, 4);
        push(field_bits, 12);
        push(width, 12);
        push(full_rounds, 10);
        push(partial_rounds, 10);
        // remaining 30 bits stay set

        let mut lfsr = Self {
            bits,
            head: 0,
            field_bits,
        };
        for _ in 0..160 {
            lfsr.clock();
        }
        lfsr
    }

    fn clock(&mut self) -> bool {
        let tap = |i: usize| self.bits[(self.head + i) % 80];
        let new_bit = tap(62) ^ tap(51) ^ tap(38) ^ tap(23) ^ tap(13) ^ tap(0);
        self.bits[self.head] = new_bit;
        self.head = (self.head + 1) % 80;
        new_bit
    }

    fn next_bit(&mut self) -> bool {
        loop {
            let keep = self.clock();
            let bit = self.clock();
            if keep {
                return bit;
            }
        }
    }

    fn next_field_element(&mut self) -> Fr {
        let modulus = BigUint::from(Fr::MODULUS);
        loop {
            let mut candidate = BigUint::from(0u8);
            for _ in 0..self.field_bits {
                candidate <<= 1;
                if self.next_bit() {
                    candidate += 1u8;
                }
            }
            if candidate < modulus {
                return Fr::from(candidate);
            }
        }
    }

    fn next_round(&mut self) -> [Fr; WIDTH] {
        [
            self.next_field_element(),
            self.next_field_element(),
            self.next_field_element(),
            self.next_field_element(),
        ]
    }
}
