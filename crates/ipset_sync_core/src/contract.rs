use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const ADDRESS_COLUMN: &str = "ipnet";
pub const NOTE_COLUMN: &str = "note";

/// S3 "object created" notification as delivered to the function.
///
/// Only the fields the synchronizer reads are modelled; everything else in
/// the payload is ignored during deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3NotificationEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Object {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IpSetScope {
    Regional,
    Cloudfront,
}

impl IpSetScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regional => "REGIONAL",
            Self::Cloudfront => "CLOUDFRONT",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("REGIONAL") {
            Ok(Self::Regional)
        } else if value.eq_ignore_ascii_case("CLOUDFRONT") {
            Ok(Self::Cloudfront)
        } else {
            Err(ValidationError::new(format!(
                "Unknown IP set scope '{value}' (expected REGIONAL or CLOUDFRONT)"
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpSetIdentity {
    pub name: String,
    pub id: String,
    pub scope: IpSetScope,
}

/// How strictly CSV rows and lock tokens are checked.
///
/// `Lenient` accepts any row with a network value and writes with an empty
/// token when none is returned. `Strict` also requires a note on every row
/// and refuses to write without a lock token.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    #[default]
    Lenient,
    Strict,
}

impl SyncPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(ValidationError::new(format!(
                "Unknown sync policy '{other}' (expected lenient or strict)"
            ))),
        }
    }

    pub fn requires_note(self) -> bool {
        matches!(self, Self::Strict)
    }

    pub fn requires_lock_token(self) -> bool {
        matches!(self, Self::Strict)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Resolves the bucket and decoded key of the first record in the event.
pub fn object_location(event: &S3NotificationEvent) -> Result<ObjectLocation, ValidationError> {
    let Some(record) = event.records.first() else {
        return Err(ValidationError::new(
            "Notification event must include at least one record",
        ));
    };

    let bucket = record.s3.bucket.name.clone();
    if bucket.is_empty() {
        return Err(ValidationError::new("Notification bucket name is empty"));
    }

    let key = decode_object_key(&record.s3.object.key)?;
    if key.is_empty() {
        return Err(ValidationError::new("Notification object key is empty"));
    }

    Ok(ObjectLocation { bucket, key })
}

/// Decodes an S3 notification key: `+` is a space, `%XX` is a UTF-8 byte.
pub fn decode_object_key(raw: &str) -> Result<String, ValidationError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|error| ValidationError::new(format!("Object key is not valid UTF-8: {error}")))
}

pub fn address_fingerprint(addresses: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(addresses));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
