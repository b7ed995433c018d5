//! Wire-format seam.
//!
//! The engine never looks at XML. A [`TrustSerializer`] turns a
//! [`TrustRequest`] into an addressed [`TransportMessage`] and turns the
//! issuer's reply back into a [`TrustResponse`] or a [`FaultDetail`].

use std::fmt::Debug;

use wstrust_transport_traits::TransportMessage;

use crate::error::{FaultDetail, SerializationError};
use crate::model::{TrustRequest, TrustResponse, TrustVersion};

/// Converts between the trust model and transport messages.
pub trait TrustSerializer: Send + Sync + Debug {
    /// Serializes `request` into a message addressed with `action`.
    fn serialize_request(
        &self,
        request: &TrustRequest,
        action: &str,
    ) -> Result<TransportMessage, SerializationError>;

    /// Returns `true` if `message` carries a SOAP fault.
    fn is_fault(&self, message: &TransportMessage) -> bool {
        message.is_fault()
    }

    /// Extracts the fault code and reason from a fault message.
    fn deserialize_fault(&self, message: &TransportMessage)
    -> Result<FaultDetail, SerializationError>;

    /// Parses a `RequestSecurityTokenResponse` body.
    fn deserialize_response(
        &self,
        message: &TransportMessage,
        version: TrustVersion,
    ) -> Result<TrustResponse, SerializationError>;
}
