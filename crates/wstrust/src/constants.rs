//! Versioned WS-Trust URIs.
//!
//! Only the identifiers the engine needs to pick an outbound action and to
//! interpret key-material fields live here. Namespaces and element names are
//! the serializer's business.

/// WS-Trust February 2005 namespace.
pub const TRUST_FEB2005_NS: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust";

/// WS-Trust 1.3 namespace. WS-Trust 1.4 reuses its action and key-type URIs.
pub const TRUST_13_NS: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200512";

/// WS-Trust 1.4 namespace (extension elements only).
pub const TRUST_14_NS: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200802";

pub(crate) mod feb2005 {
    pub(crate) const RST_ISSUE: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue";
    pub(crate) const RST_CANCEL: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Cancel";
    pub(crate) const RST_RENEW: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Renew";
    pub(crate) const RST_VALIDATE: &str =
        "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Validate";

    pub(crate) const RSTR_ISSUE: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/RSTR/Issue";
    pub(crate) const RSTR_CANCEL: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/RSTR/Cancel";
    pub(crate) const RSTR_RENEW: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/RSTR/Renew";
    pub(crate) const RSTR_VALIDATE: &str =
        "http://schemas.xmlsoap.org/ws/2005/02/trust/RSTR/Validate";

    pub(crate) const PSHA1: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/CK/PSHA1";

    pub(crate) const SYMMETRIC_KEY: &str =
        "http://schemas.xmlsoap.org/ws/2005/02/trust/SymmetricKey";
    pub(crate) const PUBLIC_KEY: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/PublicKey";
    // Feb2005 has no bearer key type; issuers use the identity namespace one.
    pub(crate) const NO_PROOF_KEY: &str =
        "http://schemas.xmlsoap.org/ws/2005/05/identity/NoProofKey";
}

pub(crate) mod trust13 {
    pub(crate) const RST_ISSUE: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue";
    pub(crate) const RST_CANCEL: &str =
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Cancel";
    pub(crate) const RST_RENEW: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Renew";
    pub(crate) const RST_VALIDATE: &str =
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Validate";

    pub(crate) const RSTRC_ISSUE_FINAL: &str =
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RSTRC/IssueFinal";
    pub(crate) const RSTR_CANCEL_FINAL: &str =
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RSTR/CancelFinal";
    pub(crate) const RSTR_RENEW_FINAL: &str =
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RSTR/RenewFinal";
    pub(crate) const RSTR_VALIDATE_FINAL: &str =
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RSTR/ValidateFinal";

    pub(crate) const PSHA1: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/CK/PSHA1";

    pub(crate) const SYMMETRIC_KEY: &str =
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/SymmetricKey";
    pub(crate) const PUBLIC_KEY: &str =
        "http://docs.oasis-open.org/ws-sx/ws-trust/200512/PublicKey";
    pub(crate) const BEARER: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Bearer";
}

/// Returns `true` if `algorithm` is the P_SHA1 computed-key URI of any trust version.
pub fn is_psha1(algorithm: &str) -> bool {
    algorithm == feb2005::PSHA1 || algorithm == trust13::PSHA1
}
