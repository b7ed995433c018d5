//! SOAP envelopes as seen by a request channel.
//!
//! The channel never looks inside [`TransportMessage::payload`]. Everything it
//! may need for routing (WS-Addressing `MessageID`, `Action`, `RelatesTo`) is
//! lifted into plain fields so that HTTP, TCP or in-memory channels can set
//! headers without an XML parser.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Upper bound on transport headers attached to one envelope.
pub const HEADER_LIMIT: usize = 64;

/// One outbound or inbound envelope.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    /// WS-Addressing `MessageID`
    pub id: String,
    /// WS-Addressing `Action`
    pub action: String,
    /// Serialized envelope bytes
    pub payload: Bytes,
    /// Addressing and transport hints
    pub metadata: TransportMessageMetadata,
}

impl TransportMessage {
    /// Envelope with empty metadata.
    pub fn new(id: impl Into<String>, action: impl Into<String>, payload: Bytes) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            payload,
            metadata: TransportMessageMetadata::default(),
        }
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: TransportMessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Payload length in bytes. This is what size limits are checked against.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Payload media type.
    pub fn content_type(&self) -> Option<&str> {
        self.metadata.content_type.as_deref()
    }

    /// `RelatesTo` of a reply.
    pub fn relates_to(&self) -> Option<&str> {
        self.metadata.relates_to.as_deref()
    }

    /// Whether the channel flagged this envelope as a SOAP fault.
    pub fn is_fault(&self) -> bool {
        self.metadata.is_fault
    }
}

/// Out-of-band data carried next to an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessageMetadata {
    /// Payload media type, usually `application/soap+xml` or `text/xml`
    pub content_type: Option<String>,

    /// `MessageID` of the request a reply answers
    pub relates_to: Option<String>,

    /// Extra transport headers (`SOAPAction`, cookies, ...)
    pub headers: HashMap<String, String>,

    /// Set by channels that detect a fault before the body is parsed, for
    /// example an HTTP 500 with a SOAP fault body.
    #[serde(default)]
    pub is_fault: bool,
}

impl TransportMessageMetadata {
    /// Rejects metadata carrying more than [`HEADER_LIMIT`] headers.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.headers.len() > HEADER_LIMIT {
            Err("envelope carries too many transport headers")
        } else {
            Ok(())
        }
    }

    /// Metadata with only a media type set.
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    /// Metadata for the reply to `request_id`.
    pub fn reply_to(request_id: impl Into<String>) -> Self {
        Self {
            relates_to: Some(request_id.into()),
            ..Self::default()
        }
    }

    /// Adds one transport header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Flags the envelope as a fault.
    #[must_use]
    pub const fn fault(mut self) -> Self {
        self.is_fault = true;
        self
    }
}
