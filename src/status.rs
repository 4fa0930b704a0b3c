//! PKI status model: PKIStatus, PKIFailureInfo and PKIStatusInfo
//! (RFC 4210 Section 5.2.3), plus human-readable rendering.
//!
//! Rendering is side-effect free: [`PkiStatusInfo::render`] works from the
//! value alone and never consults shared state.

use der::flagset::{flags, FlagSet};
use der::{Enumerated, Sequence};

use crate::types::PkiFreeText;

/// `PKIStatus` as defined in RFC 4210 Section 5.2.3.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
pub enum PkiStatus {
    /// The request was granted exactly as asked.
    Accepted = 0,
    /// Granted with modifications; the requester must check the differences.
    GrantedWithMods = 1,
    /// The request was refused.
    Rejection = 2,
    /// The request has not been processed yet; poll for the result.
    Waiting = 3,
    /// A revocation of the certificate is imminent.
    RevocationWarning = 4,
    /// A revocation has occurred.
    RevocationNotification = 5,
    /// An update was already done for the referenced certificate.
    KeyUpdateWarning = 6,
}

impl PkiStatus {
    /// Human-readable phrase for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "PKIStatus: accepted",
            Self::GrantedWithMods => "PKIStatus: granted with modifications",
            Self::Rejection => "PKIStatus: rejection",
            Self::Waiting => "PKIStatus: waiting",
            Self::RevocationWarning => {
                "PKIStatus: revocation warning - a revocation of the cert is imminent"
            }
            Self::RevocationNotification => {
                "PKIStatus: revocation notification - a revocation of the cert has occurred"
            }
            Self::KeyUpdateWarning => {
                "PKIStatus: key update warning - update already done for the cert"
            }
        }
    }
}

impl std::fmt::Display for PkiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest defined PKIFailureInfo bit index.
pub const PKI_FAILURE_INFO_MAX: u8 = 26;

flags! {
    /// `PKIFailureInfo` bits as defined in RFC 4210 Section 5.2.3.
    #[allow(missing_docs)]
    pub enum PkiFailureInfoValues: u32 {
        BadAlg = 1 << 0,
        BadMessageCheck = 1 << 1,
        BadRequest = 1 << 2,
        BadTime = 1 << 3,
        BadCertId = 1 << 4,
        BadDataFormat = 1 << 5,
        WrongAuthority = 1 << 6,
        IncorrectData = 1 << 7,
        MissingTimeStamp = 1 << 8,
        BadPop = 1 << 9,
        CertRevoked = 1 << 10,
        CertConfirmed = 1 << 11,
        WrongIntegrity = 1 << 12,
        BadRecipientNonce = 1 << 13,
        TimeNotAvailable = 1 << 14,
        UnacceptedPolicy = 1 << 15,
        UnacceptedExtension = 1 << 16,
        AddInfoNotAvailable = 1 << 17,
        BadSenderNonce = 1 << 18,
        BadCertTemplate = 1 << 19,
        SignerNotTrusted = 1 << 20,
        TransactionIdInUse = 1 << 21,
        UnsupportedVersion = 1 << 22,
        NotAuthorized = 1 << 23,
        SystemUnavail = 1 << 24,
        SystemFailure = 1 << 25,
        DuplicateCertReq = 1 << 26,
    }
}

/// BIT STRING flag set over [`PkiFailureInfoValues`].
pub type PkiFailureInfo = FlagSet<PkiFailureInfoValues>;

/// Name of a single failure bit, by bit index.
fn failure_bit_name(bit: u8) -> Option<&'static str> {
    Some(match bit {
        0 => "badAlg",
        1 => "badMessageCheck",
        2 => "badRequest",
        3 => "badTime",
        4 => "badCertId",
        5 => "badDataFormat",
        6 => "wrongAuthority",
        7 => "incorrectData",
        8 => "missingTimeStamp",
        9 => "badPOP",
        10 => "certRevoked",
        11 => "certConfirmed",
        12 => "wrongIntegrity",
        13 => "badRecipientNonce",
        14 => "timeNotAvailable",
        15 => "unacceptedPolicy",
        16 => "unacceptedExtension",
        17 => "addInfoNotAvailable",
        18 => "badSenderNonce",
        19 => "badCertTemplate",
        20 => "signerNotTrusted",
        21 => "transactionIdInUse",
        22 => "unsupportedVersion",
        23 => "notAuthorized",
        24 => "systemUnavail",
        25 => "systemFailure",
        26 => "duplicateCertReq",
        _ => return None,
    })
}

/// `PKIStatusInfo` as defined in RFC 4210 Section 5.2.3.
///
/// ```text
/// PKIStatusInfo ::= SEQUENCE {
///     status        PKIStatus,
///     statusString  PKIFreeText     OPTIONAL,
///     failInfo      PKIFailureInfo  OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    /// The outcome proper.
    pub status: PkiStatus,

    /// Free-text details intended for humans.
    pub status_string: Option<PkiFreeText>,

    /// Failure bits; must be absent for accepted/grantedWithMods.
    pub fail_info: Option<PkiFailureInfo>,
}

impl PkiStatusInfo {
    /// Build a status info with the given status, failure bits and
    /// optional free text.
    ///
    /// A granting status never carries failure bits; any passed for
    /// accepted/grantedWithMods are dropped.
    pub fn new(
        status: PkiStatus,
        fail_info: PkiFailureInfo,
        text: Option<&str>,
    ) -> Self {
        let granted = matches!(status, PkiStatus::Accepted | PkiStatus::GrantedWithMods);
        Self {
            status,
            status_string: text.map(|t| vec![t.to_string()]),
            fail_info: if granted || fail_info.is_empty() {
                None
            } else {
                Some(fail_info)
            },
        }
    }

    /// Plain `accepted` with no failure info.
    pub fn accepted() -> Self {
        Self::new(PkiStatus::Accepted, PkiFailureInfo::default(), None)
    }

    /// `waiting`, used to trigger client polling.
    pub fn waiting() -> Self {
        Self::new(PkiStatus::Waiting, PkiFailureInfo::default(), None)
    }

    /// Returns true if the given failure bit is set.
    pub fn has_failure(&self, bit: PkiFailureInfoValues) -> bool {
        self.fail_info.map(|fi| fi.contains(bit)).unwrap_or(false)
    }

    /// Returns true when the status grants the request (accepted or
    /// grantedWithMods).
    pub fn is_granted(&self) -> bool {
        matches!(
            self.status,
            PkiStatus::Accepted | PkiStatus::GrantedWithMods
        )
    }

    /// Render the status, failure bits and free text in one line, e.g.
    /// `PKIStatus: rejection; PKIFailureInfo: signerNotTrusted; StatusString: "sorry"`.
    pub fn render(&self) -> String {
        let mut out = String::from(self.status.as_str());

        let mut named = 0;
        if let Some(fail_info) = self.fail_info {
            if !fail_info.is_empty() {
                out.push_str("; PKIFailureInfo: ");
                for bit in 0..=PKI_FAILURE_INFO_MAX {
                    if fail_info.bits() & (1u32 << bit) != 0 {
                        if let Some(name) = failure_bit_name(bit) {
                            if named > 0 {
                                out.push_str(", ");
                            }
                            out.push_str(name);
                            named += 1;
                        }
                    }
                }
            }
        }
        if named == 0 && !self.is_granted() {
            out.push_str("; <no failure info>");
        }

        if let Some(strings) = &self.status_string {
            if !strings.is_empty() {
                if strings.len() > 1 {
                    out.push_str("; StatusStrings: ");
                } else {
                    out.push_str("; StatusString: ");
                }
                for (i, text) in strings.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push('"');
                    out.push_str(text);
                    out.push('"');
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::{Decode, Encode};

    #[test]
    fn granted_statuses_carry_no_fail_info() {
        let si = PkiStatusInfo::accepted();
        assert!(si.fail_info.is_none());
        assert!(si.is_granted());

        // Bits passed alongside a granting status are dropped.
        let si = PkiStatusInfo::new(
            PkiStatus::GrantedWithMods,
            PkiFailureInfoValues::BadRequest.into(),
            None,
        );
        assert!(si.fail_info.is_none());
        assert!(si.is_granted());
    }

    #[test]
    fn empty_fail_info_is_dropped() {
        let si = PkiStatusInfo::new(PkiStatus::Rejection, PkiFailureInfo::default(), None);
        assert!(si.fail_info.is_none());
    }

    #[test]
    fn render_rejection_with_bits_and_text() {
        let si = PkiStatusInfo::new(
            PkiStatus::Rejection,
            PkiFailureInfoValues::SignerNotTrusted | PkiFailureInfoValues::BadMessageCheck,
            Some("request refused"),
        );
        let text = si.render();
        assert_eq!(
            text,
            "PKIStatus: rejection; PKIFailureInfo: badMessageCheck, signerNotTrusted; \
             StatusString: \"request refused\""
        );
    }

    #[test]
    fn render_rejection_without_bits() {
        let si = PkiStatusInfo::new(PkiStatus::Rejection, PkiFailureInfo::default(), None);
        assert_eq!(si.render(), "PKIStatus: rejection; <no failure info>");
    }

    #[test]
    fn render_accepted_is_bare() {
        assert_eq!(PkiStatusInfo::accepted().render(), "PKIStatus: accepted");
    }

    #[test]
    fn highest_failure_bit_survives_round_trip() {
        let si = PkiStatusInfo::new(
            PkiStatus::Rejection,
            PkiFailureInfoValues::DuplicateCertReq.into(),
            None,
        );
        let der = si.to_der().unwrap();
        let back = PkiStatusInfo::from_der(&der).unwrap();
        assert!(back.has_failure(PkiFailureInfoValues::DuplicateCertReq));
        assert_eq!(si, back);
    }

    #[test]
    fn failure_bit_names_cover_all_bits() {
        for bit in 0..=PKI_FAILURE_INFO_MAX {
            assert!(failure_bit_name(bit).is_some(), "bit {bit} unnamed");
        }
        assert!(failure_bit_name(PKI_FAILURE_INFO_MAX + 1).is_none());
    }
}
