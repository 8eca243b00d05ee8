use soroban_sdk::contracttype;

use crate::CommonError;

/// Largest modulus the engine accepts. Keeping `n` below 2^63 keeps `n^2`
/// below 2^126, so the sum of two residues never overflows a `u128`.
pub const MAX_MODULUS: u128 = 1 << 63;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PaillierPublicKey {
    pub n: u128,  // n = p * q
    pub nn: u128, // n^2
    pub g: u128,  // g = n + 1
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PaillierPrivateKey {
    pub lambda: u128, // (p-1)(q-1)
    pub mu: u128,     // lambda^-1 mod n
}

/// Non-interactive proof that the submitter knows the plaintext and
/// randomness behind a ciphertext `c`.
///
/// Commitment `a = g^x * s^n`, challenge `e`, response `z = x + e*m mod n` and
/// `w = s * r^e mod n`. The verifier checks `g^z * w^n = a * c^e (mod n^2)`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PlaintextProof {
    pub commitment: u128,
    pub z: u128,
    pub w: u128,
}

pub struct HomomorphicEngine;

impl HomomorphicEngine {
    /// Builds a key pair from two distinct primes. Returns `None` when the
    /// modulus is too large for the engine or `lambda` is not invertible.
    pub fn keypair_from_primes(p: u64, q: u64) -> Option<(PaillierPublicKey, PaillierPrivateKey)> {
        if p < 3 || q < 3 || p == q {
            return None;
        }
        let n = (p as u128).checked_mul(q as u128)?;
        if n >= MAX_MODULUS {
            return None;
        }
        let lambda = (p as u128 - 1) * (q as u128 - 1);
        let mu = Self::mod_inverse(lambda % n, n)?;
        Some((
            PaillierPublicKey {
                n,
                nn: n * n,
                g: n + 1,
            },
            PaillierPrivateKey { lambda, mu },
        ))
    }

    /// c = g^m * r^n mod n^2. `r` must be a unit modulo `n`.
    pub fn encrypt(pub_key: &PaillierPublicKey, m: u64, r: u128) -> Result<u128, CommonError> {
        if r == 0 || r >= pub_key.n || Self::gcd(r, pub_key.n) != 1 {
            return Err(CommonError::InvalidInput);
        }
        let gm = Self::g_pow(pub_key, m);
        let rn = Self::pow_mod(r, pub_key.n, pub_key.nn);
        Ok(Self::mul_mod(gm, rn, pub_key.nn))
    }

    /// Deterministic encryption with r = 1. Used for public constants such as
    /// the zero that seeds a running sum.
    pub fn trivial(pub_key: &PaillierPublicKey, m: u64) -> u128 {
        Self::g_pow(pub_key, m)
    }

    pub fn decrypt(pub_key: &PaillierPublicKey, priv_key: &PaillierPrivateKey, c: u128) -> u64 {
        let n = pub_key.n;
        // L(u) = (u - 1) / n
        let u = Self::pow_mod(c, priv_key.lambda, pub_key.nn);
        let l_u = (u.wrapping_sub(1) / n) % n;
        // Result lies in [0, n) and n < 2^63.
        Self::mul_mod(l_u, priv_key.mu, n) as u64
    }

    /// Additive property: E(m1 + m2) = E(m1) * E(m2) mod n^2
    pub fn add_ciphertexts(pub_key: &PaillierPublicKey, c1: u128, c2: u128) -> u128 {
        Self::mul_mod(c1, c2, pub_key.nn)
    }

    /// Proves knowledge of `(m, r)` behind `encrypt(m, r)`. `x` and `s` are
    /// fresh masking values; `challenge` maps the commitment to the challenge.
    pub fn prove_plaintext(
        pub_key: &PaillierPublicKey,
        m: u64,
        r: u128,
        x: u64,
        s: u128,
        challenge: impl FnOnce(u128) -> u64,
    ) -> Result<PlaintextProof, CommonError> {
        let n = pub_key.n;
        let commitment = Self::encrypt(pub_key, x, s)?;
        let e = challenge(commitment) as u128;
        let z = ((x as u128) % n + Self::mul_mod(e, m as u128, n)) % n;
        let w = Self::mul_mod(s, Self::pow_mod(r, e, n), n);
        Ok(PlaintextProof { commitment, z, w })
    }

    pub fn verify_plaintext(
        pub_key: &PaillierPublicKey,
        c: u128,
        proof: &PlaintextProof,
        challenge: u64,
    ) -> bool {
        let n = pub_key.n;
        if !Self::is_valid_ciphertext(pub_key, proof.commitment)
            || proof.z >= n
            || proof.w == 0
            || proof.w >= n
            || Self::gcd(proof.w, n) != 1
        {
            return false;
        }
        let lhs = Self::mul_mod(
            Self::g_pow(pub_key, proof.z as u64),
            Self::pow_mod(proof.w, n, pub_key.nn),
            pub_key.nn,
        );
        let rhs = Self::mul_mod(
            proof.commitment,
            Self::pow_mod(c, challenge as u128, pub_key.nn),
            pub_key.nn,
        );
        lhs == rhs
    }

    pub fn is_valid_ciphertext(pub_key: &PaillierPublicKey, c: u128) -> bool {
        c > 0 && c < pub_key.nn && Self::gcd(c, pub_key.n) == 1
    }

    // g = n + 1, so g^m = 1 + m*n (mod n^2).
    fn g_pow(pub_key: &PaillierPublicKey, m: u64) -> u128 {
        let m = (m as u128) % pub_key.n;
        (1 + Self::mul_mod(m, pub_key.n, pub_key.nn)) % pub_key.nn
    }

    pub fn pow_mod(base: u128, mut exp: u128, modulus: u128) -> u128 {
        if modulus == 1 {
            return 0;
        }
        let mut res = 1u128;
        let mut base = base % modulus;
        while exp > 0 {
            if exp & 1 == 1 {
                res = Self::mul_mod(res, base, modulus);
            }
            base = Self::mul_mod(base, base, modulus);
            exp >>= 1;
        }
        res
    }

    /// (a * b) mod m without overflow, for m < 2^127.
    pub fn mul_mod(a: u128, b: u128, modulus: u128) -> u128 {
        let mut a = a % modulus;
        let mut b = b % modulus;
        if let Some(product) = a.checked_mul(b) {
            return product % modulus;
        }
        let mut res = 0u128;
        while b > 0 {
            if b & 1 == 1 {
                res = (res + a) % modulus;
            }
            a = (a << 1) % modulus;
            b >>= 1;
        }
        res
    }

    pub fn gcd(mut a: u128, mut b: u128) -> u128 {
        while b != 0 {
            let t = a % b;
            a = b;
            b = t;
        }
        a
    }

    fn mod_inverse(a: u128, m: u128) -> Option<u128> {
        // Extended Euclid; operands are below 2^63 so i128 cannot overflow.
        let (mut old_r, mut r) = (a as i128, m as i128);
        let (mut old_s, mut s) = (1i128, 0i128);
        while r != 0 {
            let q = old_r / r;
            (old_r, r) = (r, old_r - q * r);
            (old_s, s) = (s, old_s - q * s);
        }
        if old_r != 1 {
            return None;
        }
        Some(old_s.rem_euclid(m as i128) as u128)
    }
}
