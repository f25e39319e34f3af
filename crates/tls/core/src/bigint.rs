//! Arbitrary-precision arithmetic surface for the DH code paths.
//! The capability set is deliberately small: construct, arithmetic,
//! modular exponentiation, comparison, and raw-byte import/export.
//! The backing implementation is `num-bigint`; nothing outside this
//! module names it.

use std::cmp::Ordering;

use num_bigint::BigUint;
use num_traits::Zero;

/// A non-negative big integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mpi(BigUint);

impl Mpi {
    /// Scan a network-order byte string.
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    pub fn from_u64(v: u64) -> Self {
        Self(BigUint::from(v))
    }

    /// Print to a network-order byte string, minimal length.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    /// Print to a network-order byte string of exactly `len` bytes.
    /// Returns `None` if the value does not fit.
    pub fn to_bytes_be_padded(&self, len: usize) -> Option<Vec<u8>> {
        let bytes = self.0.to_bytes_be();
        if bytes.len() > len {
            return None;
        }
        let mut out = vec![0u8; len - bytes.len()];
        out.extend_from_slice(&bytes);
        Some(out)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Number of significant bits.
    pub fn bits(&self) -> usize {
        self.0.bits() as usize
    }

    pub fn add(&self, other: &Self) -> Self {
        Self(&self.0 + &other.0)
    }

    /// Saturating subtraction; the surface has no negative values.
    pub fn sub(&self, other: &Self) -> Self {
        if self.0 >= other.0 {
            Self(&self.0 - &other.0)
        } else {
            Self(BigUint::zero())
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self(&self.0 * &other.0)
    }

    /// self^exponent mod modulus.
    pub fn modpow(&self, exponent: &Self, modulus: &Self) -> Self {
        Self(self.0.modpow(&exponent.0, &modulus.0))
    }

    pub fn cmp_value(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        let m = Mpi::from_bytes_be(&[0x01, 0x00, 0x01]);
        assert_eq!(m.to_bytes_be(), vec![0x01, 0x00, 0x01]);
        assert_eq!(m.bits(), 17);
    }

    #[test]
    fn padded_export() {
        let m = Mpi::from_u64(0x0102);
        assert_eq!(
            m.to_bytes_be_padded(4).unwrap(),
            vec![0x00, 0x00, 0x01, 0x02]
        );
        assert!(m.to_bytes_be_padded(1).is_none());
    }

    #[test]
    fn small_modpow() {
        // 5^3 mod 13 = 8
        let r = Mpi::from_u64(5).modpow(&Mpi::from_u64(3), &Mpi::from_u64(13));
        assert_eq!(r, Mpi::from_u64(8));
    }

    #[test]
    fn arithmetic() {
        let a = Mpi::from_u64(7);
        let b = Mpi::from_u64(3);
        assert_eq!(a.add(&b), Mpi::from_u64(10));
        assert_eq!(a.sub(&b), Mpi::from_u64(4));
        assert_eq!(b.sub(&a), Mpi::from_u64(0));
        assert_eq!(a.mul(&b), Mpi::from_u64(21));
        assert_eq!(a.cmp_value(&b), Ordering::Greater);
    }
}
