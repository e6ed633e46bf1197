//! Quorum envelope assembly.
//!
//! Open and interim state updates need only the participant's signature;
//! closing a session needs the full 2-of-2 quorum. Both signatures must
//! cover the identical canonical request; the clearing node rejects an
//! envelope whose signatures disagree about the payload. The quorum
//! logic lives here, once, so no call site re-implements signature
//! collection.

use crate::errors::ChannelError;
use crate::protocol::{RpcPayload, SignedEnvelope};
use crate::signing::SessionKey;

/// Wrap a payload with a single participant signature.
pub fn sign_envelope(
    signer: &SessionKey,
    payload: RpcPayload,
) -> Result<SignedEnvelope, ChannelError> {
    let signature = signer.sign(&payload)?;
    Ok(SignedEnvelope {
        req: payload,
        sig: vec![signature],
    })
}

/// Wrap a payload with the full 2-of-2 quorum: the primary signs first,
/// the counterparty's signature over the same request is appended.
pub fn quorum_envelope(
    primary: &SessionKey,
    counterparty: &SessionKey,
    payload: RpcPayload,
) -> Result<SignedEnvelope, ChannelError> {
    let mut envelope = sign_envelope(primary, payload)?;
    let second = counterparty.sign(&envelope.req)?;
    envelope.sig.push(second);
    Ok(envelope)
}
