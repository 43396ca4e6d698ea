//! District residency credentials.
//!
//! A credential binds a subject (a `did:key`, or a pseudonymous URN) to the
//! districts an address resolved to. The raw address never enters the
//! credential. The proof is a detached Ed25519 signature over the compact
//! JSON of the credential without its `proof` member.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::{ConfigError, CoreConfig};
use crate::did::{did_key_fragment, ed25519_did_key};
use crate::pseudonym::PseudonymSalt;

pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const ED25519_2020_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2020/v1";
pub const CREDENTIAL_TYPE: &str = "DistrictResidencyCredential";
pub const PROOF_TYPE: &str = "Ed25519Signature2020";
pub const PROOF_PURPOSE: &str = "assertionMethod";
pub const FALLBACK_SUBJECT_PREFIX: &str = "urn:civic:user:";

pub const DEFAULT_VALIDITY_DAYS: i64 = 90;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("userId must not be empty")]
    EmptyUserId,

    #[error("congressional district must not be empty")]
    EmptyCongressional,

    #[error("{0} district must not be empty when supplied")]
    EmptyOptionalDistrict(&'static str),

    #[error("expiration overflows the calendar: issued {issued} plus {days} days")]
    ValidityOverflow { issued: DateTime<Utc>, days: i64 },

    #[error("credential serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How the address behind a credential was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressVerificationMethod {
    CivicApi,
    Postal,
}

/// Districts the verified address falls in. Optional districts are either
/// present with a value or absent; an explicit `null` does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DistrictMembership {
    pub congressional: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_string"
    )]
    pub state_senate: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_string"
    )]
    pub state_assembly: Option<String>,
}

/// Who the credential is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CredentialSubject {
    /// The holder's `did:key`, or `urn:civic:user:<pseudonymous id>`.
    pub id: String,
    pub district_membership: DistrictMembership,
    pub address_verification_method: AddressVerificationMethod,
}

/// Detached `Ed25519Signature2020` proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CredentialProof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub created: String,
    pub verification_method: String,
    pub proof_purpose: String,
    pub proof_value: String,
}

/// A W3C-style verifiable credential attesting district residency.
///
/// Unknown members are rejected on deserialization: the signature covers the
/// re-serialized struct, so anything serde would drop must not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DistrictResidencyCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    pub issuer: String,
    pub issuance_date: String,
    pub expiration_date: String,
    pub credential_subject: CredentialSubject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<CredentialProof>,
}

impl DistrictResidencyCredential {
    /// Compact JSON of the credential without `proof`. This is what gets signed.
    pub fn canonical_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        let unsigned = DistrictResidencyCredential {
            proof: None,
            ..self.clone()
        };
        serde_json::to_vec(&unsigned)
    }

    /// Parsed `expirationDate`; `None` if malformed.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.expiration_date)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.issuance_date)
    }

    /// An unparseable expiration date counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |exp| now >= exp)
    }

    /// Whether the credential expires within `window` of `now`.
    pub fn needs_reissue(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        match (self.expires_at(), now.checked_add_signed(window)) {
            (Some(exp), Some(horizon)) => horizon >= exp,
            _ => true,
        }
    }
}

/// Input to [`CredentialIssuer::issue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCredentialRequest {
    pub user_id: String,
    #[serde(default)]
    pub did_key: Option<String>,
    pub congressional: String,
    #[serde(default)]
    pub state_senate: Option<String>,
    #[serde(default)]
    pub state_assembly: Option<String>,
    pub verification_method: AddressVerificationMethod,
}

/// Signs district credentials with the configured Ed25519 key.
pub struct CredentialIssuer {
    signing_key: SigningKey,
    salt: PseudonymSalt,
    issuer: String,
    validity: chrono::Duration,
}

impl CredentialIssuer {
    pub fn new(signing_key: SigningKey, salt: PseudonymSalt, validity: chrono::Duration) -> Self {
        let issuer = ed25519_did_key(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            salt,
            issuer,
            validity,
        }
    }

    /// Fails with [`ConfigError::MissingSigningKey`] when no key is configured.
    pub fn from_config(config: &CoreConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.signing_key()?,
            config.pseudonym_salt()?,
            config.credential_validity()?,
        ))
    }

    /// The issuer's own `did:key`.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Issue and sign a credential valid from now.
    pub fn issue(
        &self,
        request: &IssueCredentialRequest,
    ) -> Result<DistrictResidencyCredential, CredentialError> {
        self.issue_at(request, Utc::now())
    }

    /// Issue with an explicit issuance time.
    pub fn issue_at(
        &self,
        request: &IssueCredentialRequest,
        now: DateTime<Utc>,
    ) -> Result<DistrictResidencyCredential, CredentialError> {
        if request.user_id.is_empty() {
            return Err(CredentialError::EmptyUserId);
        }
        if request.congressional.trim().is_empty() {
            return Err(CredentialError::EmptyCongressional);
        }
        if matches!(request.state_senate.as_deref(), Some(s) if s.trim().is_empty()) {
            return Err(CredentialError::EmptyOptionalDistrict("stateSenate"));
        }
        if matches!(request.state_assembly.as_deref(), Some(s) if s.trim().is_empty()) {
            return Err(CredentialError::EmptyOptionalDistrict("stateAssembly"));
        }

        let (subject_id, subject_is_did) =
            match request.did_key.as_deref().filter(|d| !d.is_empty()) {
                Some(did) => (did.to_string(), true),
                None => (
                    format!(
                        "{FALLBACK_SUBJECT_PREFIX}{}",
                        self.salt.pseudonymize(&request.user_id)
                    ),
                    false,
                ),
            };
        let expires = now
            .checked_add_signed(self.validity)
            .ok_or(CredentialError::ValidityOverflow {
                issued: now,
                days: self.validity.num_days(),
            })?;
        let issuance_date = format_timestamp(now);

        let mut credential = DistrictResidencyCredential {
            context: vec![CREDENTIALS_CONTEXT.to_string(), ED25519_2020_CONTEXT.to_string()],
            credential_type: vec!["VerifiableCredential".to_string(), CREDENTIAL_TYPE.to_string()],
            issuer: self.issuer.clone(),
            issuance_date: issuance_date.clone(),
            expiration_date: format_timestamp(expires),
            credential_subject: CredentialSubject {
                id: subject_id,
                district_membership: DistrictMembership {
                    congressional: request.congressional.clone(),
                    state_senate: request.state_senate.clone(),
                    state_assembly: request.state_assembly.clone(),
                },
                address_verification_method: request.verification_method,
            },
            proof: None,
        };

        let signature = self.signing_key.sign(&credential.canonical_body()?);
        credential.proof = Some(CredentialProof {
            proof_type: PROOF_TYPE.to_string(),
            created: issuance_date,
            verification_method: verification_method_for(&self.issuer),
            proof_purpose: PROOF_PURPOSE.to_string(),
            proof_value: STANDARD.encode(signature.to_bytes()),
        });

        tracing::info!(
            issuer = %self.issuer,
            subject_is_did,
            expires = %credential.expiration_date,
            "issued district credential"
        );
        Ok(credential)
    }

    /// [`verify_district_credential`] against this issuer's key.
    pub fn verify(&self, credential: &DistrictResidencyCredential) -> bool {
        verify_district_credential(credential, &self.verifying_key())
    }
}

impl fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("issuer", &self.issuer)
            .field("validity_days", &self.validity.num_days())
            .finish_non_exhaustive()
    }
}

/// Check a credential's proof against the issuer's verifying key.
///
/// Returns `false` for any mismatch; never errors.
pub fn verify_district_credential(
    credential: &DistrictResidencyCredential,
    issuer_key: &VerifyingKey,
) -> bool {
    let Some(proof) = credential.proof.as_ref() else {
        return false;
    };
    let expected_issuer = ed25519_did_key(issuer_key.as_bytes());
    if credential.issuer != expected_issuer
        || proof.proof_type != PROOF_TYPE
        || proof.proof_purpose != PROOF_PURPOSE
        || proof.verification_method != verification_method_for(&expected_issuer)
    {
        return false;
    }

    let Ok(raw) = STANDARD.decode(&proof.proof_value) else {
        return false;
    };
    let Ok(bytes) = <[u8; 64]>::try_from(raw.as_slice()) else {
        return false;
    };
    let Ok(body) = credential.canonical_body() else {
        return false;
    };
    issuer_key
        .verify_strict(&body, &Signature::from_bytes(&bytes))
        .is_ok()
}

/// Lowercase hex SHA-256 of the credential's compact JSON.
pub fn hash_credential(credential: &DistrictResidencyCredential) -> Result<String, CredentialError> {
    Ok(hex::encode(Sha256::digest(serde_json::to_vec(credential)?)))
}

/// Lowercase hex SHA-256 of a district code.
pub fn hash_district(district: &str) -> String {
    hex::encode(Sha256::digest(district.as_bytes()))
}

fn verification_method_for(issuer: &str) -> String {
    let fragment = did_key_fragment(issuer).unwrap_or(issuer);
    format!("{issuer}#{fragment}")
}

fn present_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    String::deserialize(deserializer).map(Some)
}

fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SEED: [u8; 32] = [7u8; 32];
    const SALT: &str = "credential-test-salt-0123456789abcdef";
    const SUBJECT_DID: &str = "did:key:z6MkeTGwHmLmuCmgg4ABYhzWVh6ZX7hTwWt8gguAretUfc9c";

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new(
            SigningKey::from_bytes(&SEED),
            PseudonymSalt::new(SALT).unwrap(),
            chrono::Duration::days(DEFAULT_VALIDITY_DAYS),
        )
    }

    fn request() -> IssueCredentialRequest {
        IssueCredentialRequest {
            user_id: "user-1234".to_string(),
            did_key: Some(SUBJECT_DID.to_string()),
            congressional: "CA-12".to_string(),
            state_senate: Some("CA-SD-11".to_string()),
            state_assembly: None,
            verification_method: AddressVerificationMethod::CivicApi,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let issuer = issuer();
        let credential = issuer.issue_at(&request(), now()).unwrap();
        assert!(issuer.verify(&credential));
        assert!(verify_district_credential(&credential, &issuer.verifying_key()));

        assert!(credential.issuer.starts_with("did:key:z6Mk"));
        assert_eq!(credential.credential_subject.id, SUBJECT_DID);
        assert_eq!(credential.issuance_date, "2026-01-15T12:00:00Z");
        assert_eq!(credential.expiration_date, "2026-04-15T12:00:00Z");
        let proof = credential.proof.as_ref().unwrap();
        assert_eq!(proof.created, credential.issuance_date);
        assert_eq!(
            proof.verification_method,
            format!("{}#{}", credential.issuer, &credential.issuer["did:key:".len()..])
        );
    }

    #[test]
    fn test_omitted_districts_are_absent() {
        let credential = issuer().issue_at(&request(), now()).unwrap();
        let json = serde_json::to_string(&credential).unwrap();
        assert!(json.contains("\"stateSenate\":\"CA-SD-11\""));
        assert!(!json.contains("stateAssembly"));
        assert!(!json.contains("null"));
        assert!(json.contains("\"addressVerificationMethod\":\"civic_api\""));
    }

    #[test]
    fn test_fallback_subject_hides_user_id() {
        let mut req = request();
        req.did_key = None;
        let credential = issuer().issue_at(&req, now()).unwrap();
        let subject = &credential.credential_subject.id;
        assert!(subject.starts_with(FALLBACK_SUBJECT_PREFIX));
        assert!(!subject.contains("user-1234"));
        let pseudonym = PseudonymSalt::new(SALT).unwrap().pseudonymize("user-1234");
        assert_eq!(subject, &format!("{FALLBACK_SUBJECT_PREFIX}{pseudonym}"));
    }

    #[test]
    fn test_tampering_flips_verification() {
        let issuer = issuer();
        let key = issuer.verifying_key();
        let original = issuer.issue_at(&request(), now()).unwrap();

        let mut c = original.clone();
        c.credential_subject.district_membership.congressional = "CA-13".to_string();
        assert!(!verify_district_credential(&c, &key));

        let mut c = original.clone();
        c.issuer = ed25519_did_key(&[9u8; 32]);
        assert!(!verify_district_credential(&c, &key));

        let mut c = original.clone();
        c.credential_subject.id = "did:key:z6MkOther".to_string();
        assert!(!verify_district_credential(&c, &key));

        let mut c = original.clone();
        c.expiration_date = "2030-01-01T00:00:00Z".to_string();
        assert!(!verify_district_credential(&c, &key));

        let mut c = original.clone();
        let proof = c.proof.as_mut().unwrap();
        let mut sig = STANDARD.decode(&proof.proof_value).unwrap();
        sig[0] ^= 0x01;
        proof.proof_value = STANDARD.encode(sig);
        assert!(!verify_district_credential(&c, &key));

        let mut c = original.clone();
        c.proof.as_mut().unwrap().proof_value = "not base64".to_string();
        assert!(!verify_district_credential(&c, &key));

        let mut c = original;
        c.proof = None;
        assert!(!verify_district_credential(&c, &key));
    }

    #[test]
    fn test_wrong_issuer_key_rejected() {
        let credential = issuer().issue_at(&request(), now()).unwrap();
        let other = SigningKey::from_bytes(&[8u8; 32]).verifying_key();
        assert!(!verify_district_credential(&credential, &other));
    }

    #[test]
    fn test_survives_json_round_trip() {
        let issuer = issuer();
        let credential = issuer.issue_at(&request(), now()).unwrap();
        let json = serde_json::to_string(&credential).unwrap();
        let parsed: DistrictResidencyCredential = serde_json::from_str(&json).unwrap();
        assert!(issuer.verify(&parsed));
        assert_eq!(hash_credential(&parsed).unwrap(), hash_credential(&credential).unwrap());
    }

    #[test]
    fn test_validity_overflow_is_an_error() {
        let issuer = CredentialIssuer::new(
            SigningKey::from_bytes(&SEED),
            PseudonymSalt::new(SALT).unwrap(),
            chrono::Duration::days(4_000_000_000),
        );
        assert!(matches!(
            issuer.issue_at(&request(), now()),
            Err(CredentialError::ValidityOverflow { days: 4_000_000_000, .. })
        ));
        assert!(matches!(
            issuer.issue(&request()),
            Err(CredentialError::ValidityOverflow { .. })
        ));
    }

    #[test]
    fn test_wire_form_must_match_signed_body() {
        let issuer = issuer();
        let credential = issuer.issue_at(&request(), now()).unwrap();
        let mut value = serde_json::to_value(&credential).unwrap();

        value["credentialSubject"]["districtMembership"]["stateAssembly"] = serde_json::Value::Null;
        assert!(serde_json::from_value::<DistrictResidencyCredential>(value.clone()).is_err());

        let mut value = serde_json::to_value(&credential).unwrap();
        value["credentialSubject"]["note"] = serde_json::json!("extra");
        assert!(serde_json::from_value::<DistrictResidencyCredential>(value).is_err());

        let mut value = serde_json::to_value(&credential).unwrap();
        value["evidence"] = serde_json::json!([]);
        assert!(serde_json::from_value::<DistrictResidencyCredential>(value).is_err());

        let mut value = serde_json::to_value(&credential).unwrap();
        value["proof"]["nonce"] = serde_json::json!("x");
        assert!(serde_json::from_value::<DistrictResidencyCredential>(value).is_err());
    }

    #[test]
    fn test_empty_did_key_uses_fallback_subject() {
        let mut req = request();
        req.did_key = Some(String::new());
        let credential = issuer().issue_at(&req, now()).unwrap();
        assert!(credential.credential_subject.id.starts_with(FALLBACK_SUBJECT_PREFIX));
    }

    #[test]
    fn test_expiry_helpers() {
        let credential = issuer().issue_at(&request(), now()).unwrap();
        assert_eq!(credential.issued_at(), Some(now()));
        assert_eq!(credential.expires_at(), Some(now() + chrono::Duration::days(90)));
        assert!(!credential.is_expired(now()));
        assert!(credential.is_expired(now() + chrono::Duration::days(90)));

        let window = chrono::Duration::days(7);
        assert!(!credential.needs_reissue(now(), window));
        assert!(credential.needs_reissue(now() + chrono::Duration::days(84), window));

        let mut broken = credential;
        broken.expiration_date = "soon".to_string();
        assert!(broken.is_expired(now()));
    }

    #[test]
    fn test_validation() {
        let issuer = issuer();
        let mut req = request();
        req.congressional = " ".to_string();
        assert!(matches!(issuer.issue_at(&req, now()), Err(CredentialError::EmptyCongressional)));

        let mut req = request();
        req.state_assembly = Some(String::new());
        assert!(matches!(
            issuer.issue_at(&req, now()),
            Err(CredentialError::EmptyOptionalDistrict("stateAssembly"))
        ));

        let mut req = request();
        req.user_id = String::new();
        assert!(matches!(issuer.issue_at(&req, now()), Err(CredentialError::EmptyUserId)));
    }

    #[test]
    fn test_hashes() {
        let credential = issuer().issue_at(&request(), now()).unwrap();
        let h = hash_credential(&credential).unwrap();
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_credential(&credential).unwrap());

        assert_eq!(hash_district("CA-12"), hash_district("CA-12"));
        assert_ne!(hash_district("CA-12"), hash_district("CA-13"));
        assert_eq!(
            hash_district(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_issuer_debug_hides_key() {
        let debug = format!("{:?}", issuer());
        assert!(debug.contains("did:key:z6Mk"));
        assert!(!debug.contains("signing_key"));
    }
}
