// 128-bit content digest carried in the patch header.
//
// A fresh hashing context is built for every call, so concurrent diff/apply
// invocations never share digest state.

use crate::error::PatchError;

#[cfg(feature = "md5")]
use md5::{Digest as _, Md5};

/// Length in bytes of the header digest.
pub const DIGEST_LEN: usize = 16;

/// Raw MD5 digest bytes.
pub type Digest = [u8; DIGEST_LEN];

/// Compute the digest of a complete buffer.
///
/// Fails with [`PatchError::DigestUnavailable`] when the crate is built
/// without the `md5` feature.
#[cfg(feature = "md5")]
pub fn compute(data: &[u8]) -> Result<Digest, PatchError> {
    let mut hasher = Md5::new();
    hasher.update(data);
    Ok(hasher.finalize().into())
}

#[cfg(not(feature = "md5"))]
pub fn compute(_data: &[u8]) -> Result<Digest, PatchError> {
    Err(PatchError::DigestUnavailable(
        "MD5 digests require the 'md5' feature".into(),
    ))
}

/// Check `data` against an expected digest.
pub fn verify(data: &[u8], expected: &Digest) -> Result<(), PatchError> {
    let actual = compute(data)?;
    if actual != *expected {
        return Err(PatchError::DigestMismatch {
            expected: *expected,
            actual,
        });
    }
    Ok(())
}
