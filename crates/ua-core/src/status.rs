//! Status-code taxonomy (SPEC_FULL §4.A).
//!
//! `StatusCode` is the internal currency every fallible boundary in this
//! workspace converts into. The mapping to the 32-bit wire status code is
//! total and bijective for the named reasons; unrecognised wire codes
//! collapse to one of the three generic severities by their top two bits,
//! matching `util_b2c.c`'s `SOPC_IsGoodStatus`/`SOPC_IsUncertainStatus`
//! checks in the original source.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bitmask isolating the severity field of a wire status code.
const SEVERITY_MASK: u32 = 0xC000_0000;
/// Severity value meaning "uncertain".
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;

/// Internal status outcome. `Ok` carries no payload on the wire
/// (0x00000000); every other variant maps to a specific `Bad*`/`Uncertain*`
/// 32-bit code via [`StatusCode::as_wire`] / [`StatusCode::from_wire`].
///
/// Serialized as its wire `u32` rather than the Rust variant name, so a
/// `StatusCode` round-trips through JSON fixtures the same way it round-trips
/// through the binary codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum StatusCode {
    Ok,
    UncertainGeneric,
    BadGeneric,

    BadAttributeIdInvalid,
    BadIndexRangeInvalid,
    BadIndexRangeNoData,
    BadNodeIdUnknown,
    BadNodeIdInvalid,
    BadNotWritable,
    BadNotReadable,
    BadNotImplemented,
    BadNotSupported,
    BadTypeMismatch,
    BadOutOfRange,
    BadDataEncodingInvalid,
    BadDataEncodingUnsupported,

    BadTooManyOperations,
    BadNothingToDo,
    BadInvalidArgument,
    BadOutOfMemory,
    BadTimeout,
    BadRequestInterrupted,
    BadRequestTimeout,
    BadRequestTooLarge,
    BadResponseTooLarge,
    BadQueryTooComplex,

    BadUserAccessDenied,
    BadSecurityChecksFailed,
    BadIdentityTokenInvalid,
    BadIdentityTokenRejected,
    BadCertificateInvalid,
    BadUserSignatureInvalid,

    BadSessionIdInvalid,
    BadSessionNotActivated,
    BadSessionClosed,
    BadTooManySessions,
    BadSecureChannelIdInvalid,
    BadSecureChannelClosed,

    BadSubscriptionIdInvalid,
    BadTooManySubscriptions,
    BadMonitoredItemIdInvalid,
    BadMonitoringModeInvalid,
    BadFilterNotAllowed,
    BadNoSubscription,
    BadSequenceNumberUnknown,
    BadMessageNotAvailable,
    BadTooManyPublishRequests,

    BadContinuationPointInvalid,
    BadNoContinuationPoints,
    BadBrowseDirectionInvalid,
    BadNodeIdExists,

    BadMaxAgeInvalid,
    BadTimestampsToReturnInvalid,
    BadWriteNotSupported,
    BadServiceUnsupported,
    BadShutdown,
    BadConnectionClosed,
    BadEncodingLimitsExceeded,
}

impl StatusCode {
    /// `true` for `Ok`.
    pub const fn is_good(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }

    /// `true` for `UncertainGeneric` (the only uncertain variant we name
    /// explicitly; module-local errors that want a different uncertain
    /// reason still encode to the `Uncertain` severity band via
    /// [`StatusCode::from_wire`]).
    pub const fn is_uncertain(&self) -> bool {
        matches!(self, StatusCode::UncertainGeneric)
    }

    /// `true` for every `Bad*` variant.
    pub const fn is_bad(&self) -> bool {
        !self.is_good() && !self.is_uncertain()
    }

    /// Encode to the 32-bit wire status code.
    pub const fn as_wire(&self) -> u32 {
        use StatusCode::*;
        match self {
            Ok => 0x0000_0000,
            UncertainGeneric => 0x4000_0000,
            BadGeneric => 0x8000_0000,

            BadAttributeIdInvalid => 0x8035_0000,
            BadIndexRangeInvalid => 0x8086_0000,
            BadIndexRangeNoData => 0x8087_0000,
            BadNodeIdUnknown => 0x8033_0000,
            BadNodeIdInvalid => 0x8034_0000,
            BadNotWritable => 0x803B_0000,
            BadNotReadable => 0x803A_0000,
            BadNotImplemented => 0x8004_0000,
            BadNotSupported => 0x805E_0000,
            BadTypeMismatch => 0x80ED_0000,
            BadOutOfRange => 0x803C_0000,
            BadDataEncodingInvalid => 0x80BC_0000,
            BadDataEncodingUnsupported => 0x80BB_0000,

            BadTooManyOperations => 0x80E5_0000,
            BadNothingToDo => 0x800F_0000,
            BadInvalidArgument => 0x80AB_0000,
            BadOutOfMemory => 0x8000_0001,
            BadTimeout => 0x800A_0000,
            BadRequestInterrupted => 0x80AF_0000,
            BadRequestTimeout => 0x800E_0000,
            BadRequestTooLarge => 0x80B8_0000,
            BadResponseTooLarge => 0x80B9_0000,
            BadQueryTooComplex => 0x804A_0000,

            BadUserAccessDenied => 0x801F_0000,
            BadSecurityChecksFailed => 0x8013_0000,
            BadIdentityTokenInvalid => 0x8020_0000,
            BadIdentityTokenRejected => 0x8021_0000,
            BadCertificateInvalid => 0x8010_0000,
            BadUserSignatureInvalid => 0x8022_0000,

            BadSessionIdInvalid => 0x8025_0000,
            BadSessionNotActivated => 0x8037_0000,
            BadSessionClosed => 0x8026_0000,
            BadTooManySessions => 0x8029_0000,
            BadSecureChannelIdInvalid => 0x8006_0000,
            BadSecureChannelClosed => 0x8005_0000,

            BadSubscriptionIdInvalid => 0x8065_0000,
            BadTooManySubscriptions => 0x80EE_0000,
            BadMonitoredItemIdInvalid => 0x808E_0000,
            BadMonitoringModeInvalid => 0x8079_0000,
            BadFilterNotAllowed => 0x80CC_0000,
            BadNoSubscription => 0x8078_0000,
            BadSequenceNumberUnknown => 0x8007_0000,
            BadMessageNotAvailable => 0x803D_0000,
            BadTooManyPublishRequests => 0x803E_0000,

            BadContinuationPointInvalid => 0x8043_0000,
            BadNoContinuationPoints => 0x804B_0000,
            BadBrowseDirectionInvalid => 0x8044_0000,
            BadNodeIdExists => 0x8032_0000,

            BadMaxAgeInvalid => 0x8139_0000,
            BadTimestampsToReturnInvalid => 0x8038_0000,
            BadWriteNotSupported => 0x80E3_0000,
            BadServiceUnsupported => 0x800B_0000,
            BadShutdown => 0x800C_0000,
            BadConnectionClosed => 0x80AE_0000,
            BadEncodingLimitsExceeded => 0x80B3_0000,
        }
    }

    /// Decode a 32-bit wire status code. Recognised codes map back to their
    /// named variant; everything else collapses to one of the three
    /// generic severities by its top two bits (`0xC0000000` mask), per
    /// `util_b2c.c`'s severity check.
    pub fn from_wire(code: u32) -> StatusCode {
        for variant in Self::ALL {
            if variant.as_wire() == code {
                return *variant;
            }
        }
        match code & SEVERITY_MASK {
            0 => StatusCode::Ok,
            SEVERITY_UNCERTAIN => StatusCode::UncertainGeneric,
            _ => StatusCode::BadGeneric,
        }
    }

    /// All named variants, used by [`StatusCode::from_wire`] and by tests
    /// that check the mapping is total and lossless.
    pub const ALL: &'static [StatusCode] = &[
        StatusCode::Ok,
        StatusCode::UncertainGeneric,
        StatusCode::BadGeneric,
        StatusCode::BadAttributeIdInvalid,
        StatusCode::BadIndexRangeInvalid,
        StatusCode::BadIndexRangeNoData,
        StatusCode::BadNodeIdUnknown,
        StatusCode::BadNodeIdInvalid,
        StatusCode::BadNotWritable,
        StatusCode::BadNotReadable,
        StatusCode::BadNotImplemented,
        StatusCode::BadNotSupported,
        StatusCode::BadTypeMismatch,
        StatusCode::BadOutOfRange,
        StatusCode::BadDataEncodingInvalid,
        StatusCode::BadDataEncodingUnsupported,
        StatusCode::BadTooManyOperations,
        StatusCode::BadNothingToDo,
        StatusCode::BadInvalidArgument,
        StatusCode::BadOutOfMemory,
        StatusCode::BadTimeout,
        StatusCode::BadRequestInterrupted,
        StatusCode::BadRequestTimeout,
        StatusCode::BadRequestTooLarge,
        StatusCode::BadResponseTooLarge,
        StatusCode::BadQueryTooComplex,
        StatusCode::BadUserAccessDenied,
        StatusCode::BadSecurityChecksFailed,
        StatusCode::BadIdentityTokenInvalid,
        StatusCode::BadIdentityTokenRejected,
        StatusCode::BadCertificateInvalid,
        StatusCode::BadUserSignatureInvalid,
        StatusCode::BadSessionIdInvalid,
        StatusCode::BadSessionNotActivated,
        StatusCode::BadSessionClosed,
        StatusCode::BadTooManySessions,
        StatusCode::BadSecureChannelIdInvalid,
        StatusCode::BadSecureChannelClosed,
        StatusCode::BadSubscriptionIdInvalid,
        StatusCode::BadTooManySubscriptions,
        StatusCode::BadMonitoredItemIdInvalid,
        StatusCode::BadMonitoringModeInvalid,
        StatusCode::BadFilterNotAllowed,
        StatusCode::BadNoSubscription,
        StatusCode::BadSequenceNumberUnknown,
        StatusCode::BadMessageNotAvailable,
        StatusCode::BadTooManyPublishRequests,
        StatusCode::BadContinuationPointInvalid,
        StatusCode::BadNoContinuationPoints,
        StatusCode::BadBrowseDirectionInvalid,
        StatusCode::BadNodeIdExists,
        StatusCode::BadMaxAgeInvalid,
        StatusCode::BadTimestampsToReturnInvalid,
        StatusCode::BadWriteNotSupported,
        StatusCode::BadServiceUnsupported,
        StatusCode::BadShutdown,
        StatusCode::BadConnectionClosed,
        StatusCode::BadEncodingLimitsExceeded,
    ];
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Ok
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> u32 {
        code.as_wire()
    }
}

impl TryFrom<u32> for StatusCode {
    type Error = std::convert::Infallible;

    /// Never fails: unrecognised codes collapse by severity, matching
    /// [`StatusCode::from_wire`].
    fn try_from(code: u32) -> Result<StatusCode, Self::Error> {
        Ok(StatusCode::from_wire(code))
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:08X})", self, self.as_wire())
    }
}

/// The value a `Value` attribute takes on a freshly-created NS0 node before
/// any write has occurred (SPEC_FULL §3).
pub const GOOD_GENERIC_STATUS: StatusCode = StatusCode::Ok;

/// The value a `Value` attribute takes on a freshly-created non-NS0 node
/// (SPEC_FULL §3). Modelled as its own constant, distinct from
/// `UncertainGeneric`, because the original source gives it a dedicated
/// wire code.
pub const UNCERTAIN_INITIAL_VALUE: StatusCode = StatusCode::UncertainGeneric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_identity_for_named_codes() {
        for variant in StatusCode::ALL {
            let wire = variant.as_wire();
            assert_eq!(StatusCode::from_wire(wire), *variant, "{variant:?}");
        }
    }

    #[test]
    fn all_variants_have_distinct_wire_codes() {
        let mut seen = std::collections::HashSet::new();
        for variant in StatusCode::ALL {
            assert!(seen.insert(variant.as_wire()), "duplicate wire code for {variant:?}");
        }
    }

    #[test]
    fn unrecognised_code_collapses_by_severity() {
        assert_eq!(StatusCode::from_wire(0x1234_5678), StatusCode::Ok);
        assert_eq!(StatusCode::from_wire(0x4ABC_DEF0), StatusCode::UncertainGeneric);
        assert_eq!(StatusCode::from_wire(0x8FFF_FFFF), StatusCode::BadGeneric);
        assert_eq!(StatusCode::from_wire(0xCFFF_FFFF), StatusCode::BadGeneric);
    }

    #[test]
    fn severity_predicates_agree_with_wire_bits() {
        for variant in StatusCode::ALL {
            let severity = variant.as_wire() & SEVERITY_MASK;
            if variant.is_good() {
                assert_eq!(severity, 0);
            } else if variant.is_uncertain() {
                assert_eq!(severity, SEVERITY_UNCERTAIN);
            } else {
                assert!(severity == 0x8000_0000 || severity == 0xC000_0000);
            }
        }
    }
}
