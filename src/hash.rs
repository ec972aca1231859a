use std::fmt::{Display, Formatter};

use digest::{consts::U32, Digest};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;

/// A digest function usable by the tree: any [`Digest`] with 32 bytes of output.
///
/// `sha2::Sha256` is the default; `blake2::Blake2s256` and `blake3::Hasher`
/// are available behind the `blake2` and `blake3` features.
pub trait TreeDigest: Digest<OutputSize = U32> {}

impl<D: Digest<OutputSize = U32>> TreeDigest for D {}

/// Node and root digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Hash([u8; 32]);

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Arbitrary for Hash {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        any::<[u8; 32]>().prop_map(Hash::new).boxed()
    }
}

impl Hash {
    /// Creates a new Hash from any type that can be converted into [u8; 32].
    pub fn new<T: Into<[u8; 32]>>(data: T) -> Self {
        Hash(data.into())
    }

    /// Returns a zero hash (all bytes set to 0).
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a new Hash from a hexadecimal string.
    pub fn from_hex(input: &str) -> Result<Self, hex::FromHexError> {
        let mut inner = [0u8; 32];
        hex::decode_to_slice(input, &mut inner)?;
        Ok(Self(inner))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn digest<D: TreeDigest>(data: &[u8]) -> Self {
        let mut hasher = D::new();
        hasher.update(data);
        Self::finalize(hasher)
    }

    /// Finishes a running hasher into a [`Hash`].
    pub fn finalize<D: TreeDigest>(hasher: D) -> Self {
        let mut inner = [0u8; 32];
        inner.copy_from_slice(&hasher.finalize());
        Hash(inner)
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::zero()
    }
}

impl From<[u8; 32]> for Hash {
    fn from(array: [u8; 32]) -> Self {
        Hash(array)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Hash> for [u8; 32] {
    fn from(val: Hash) -> Self {
        val.0
    }
}
