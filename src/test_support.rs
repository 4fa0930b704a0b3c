//! Hand-built certificate fixtures for unit tests.
//!
//! The certificates carry placeholder signatures; nothing in the engine
//! verifies certificate signatures itself, that is the crypto seam's job.

use std::str::FromStr;

use der::asn1::BitString;
use der::DateTime;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

fn time(year: u16) -> Time {
    let dt = DateTime::new(year, 1, 1, 0, 0, 0).expect("valid fixture date");
    Time::GeneralTime(der::asn1::GeneralizedTime::from_date_time(dt))
}

/// Build a syntactically valid certificate with the given names and serial.
pub(crate) fn make_cert(subject: &str, issuer: &str, serial: u8) -> Certificate {
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&[serial]).expect("valid fixture serial"),
        signature: AlgorithmIdentifierOwned {
            oid: der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2"),
            parameters: None,
        },
        issuer: Name::from_str(issuer).expect("valid fixture issuer"),
        validity: Validity {
            not_before: time(2024),
            not_after: time(2034),
        },
        subject: Name::from_str(subject).expect("valid fixture subject"),
        subject_public_key_info: SubjectPublicKeyInfoOwned {
            algorithm: AlgorithmIdentifierOwned {
                oid: der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.2.1"),
                parameters: None,
            },
            subject_public_key: BitString::from_bytes(&[0x04, 0x11, 0x22, 0x33])
                .expect("valid fixture key"),
        },
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };

    Certificate {
        tbs_certificate: tbs,
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: der::asn1::ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2"),
            parameters: None,
        },
        signature: BitString::from_bytes(&[0xde, 0xad, 0xbe, 0xef]).expect("valid fixture sig"),
    }
}

/// The default end-entity fixture.
pub(crate) fn dummy_cert() -> Certificate {
    make_cert("CN=device.test", "CN=Mock CA", 0x2a)
}
