//! Binary codec for instruction buffers.
//!
//! Unlike the intermediate text form, the binary form carries nested
//! instruction buffers, so declared overloads survive a round trip.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::instruction::Instruction;

/// File magic; the trailing byte doubles as a format version.
const MAGIC: [u8; 4] = *b"cin\x01";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode instructions: {0}")]
    Encode(postcard::Error),

    #[error("failed to decode instructions: {0}")]
    Decode(postcard::Error),

    #[error("not a compiled instruction buffer (bad magic)")]
    BadMagic,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    instructions: Vec<Instruction>,
}

/// Encode a buffer into its binary form, including the magic header.
pub fn encode(instructions: &[Instruction]) -> Result<Vec<u8>, CodecError> {
    let envelope = Envelope {
        instructions: instructions.to_vec(),
    };

    let mut out = MAGIC.to_vec();
    let payload = postcard::to_allocvec(&envelope).map_err(CodecError::Encode)?;
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a binary buffer produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Vec<Instruction>, CodecError> {
    let payload = bytes.strip_prefix(&MAGIC).ok_or(CodecError::BadMagic)?;

    let envelope: Envelope = postcard::from_bytes(payload).map_err(CodecError::Decode)?;
    Ok(envelope.instructions)
}
