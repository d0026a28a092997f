use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compress::{deflate_b64, inflate_b64};
use crate::{actions, Codec, CodecError};

/// The canonical enriched job record published downstream and upserted
/// into the enriched store, keyed by `url`.
///
/// `posted_at` is an instant (derived from the scrape time); `apply_by`
/// is the naive local deadline printed on the page. `wage` is an
/// annualized USD range.
///
/// The serde derives give stores a document form; the wire form is the
/// codec's, not this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedJob {
    pub about: Option<String>,
    pub apply_by: Option<NaiveDateTime>,
    pub apply_type: Option<String>,
    pub company: Option<String>,
    pub documents: Vec<String>,
    pub employment_type: Option<String>,
    pub industry: Option<String>,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub location_type: Vec<String>,
    pub position: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub url: String,
    pub wage: Option<[i64; 2]>,
}

/// Schema rejection of an enriched record. Fatal for the message that
/// carried it.
#[derive(Debug, Error)]
pub enum InvalidRecord {
    #[error("record has an empty url")]
    EmptyUrl,

    #[error("apply_type {0:?} is not one of internal/external")]
    ApplyType(String),

    #[error("location_type {0:?} is not one of onsite/remote/hybrid")]
    LocationType(String),

    #[error("wage range [{0}, {1}] is inverted")]
    WageRange(i64, i64),
}

impl EnrichedJob {
    /// Check the constraints the wire schema cannot express.
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if self.url.is_empty() {
            return Err(InvalidRecord::EmptyUrl);
        }
        if let Some(apply_type) = &self.apply_type {
            if apply_type != "internal" && apply_type != "external" {
                return Err(InvalidRecord::ApplyType(apply_type.clone()));
            }
        }
        for lt in &self.location_type {
            if lt != "onsite" && lt != "remote" && lt != "hybrid" {
                return Err(InvalidRecord::LocationType(lt.clone()));
            }
        }
        if let Some([low, high]) = self.wage {
            if low > high {
                return Err(InvalidRecord::WageRange(low, high));
            }
        }
        Ok(())
    }
}

const APPLY_BY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Serialize, Deserialize)]
struct Wire {
    topic: String,
    action: String,
    about_codec: String,
    about: Option<String>,
    apply_by: Option<String>,
    apply_type: Option<String>,
    company: Option<String>,
    documents: Vec<String>,
    employment_type: Option<String>,
    industry: Option<String>,
    job_type: Option<String>,
    location: Option<String>,
    location_type: Vec<String>,
    position: Option<String>,
    posted_at: Option<String>,
    url: String,
    wage: Option<[i64; 2]>,
}

/// Codec for [`EnrichedJob`].
pub struct EnrichedJobCodec;

impl Codec for EnrichedJobCodec {
    type Message = EnrichedJob;

    const TOPIC: &'static str = "load.handshake.job.v1";

    fn serialize(message: &Self::Message) -> Result<Vec<u8>, CodecError> {
        let about = match &message.about {
            Some(text) => Some(deflate_b64(text)?),
            None => None,
        };
        let wire = Wire {
            topic: Self::TOPIC.to_string(),
            action: actions::START_LOAD.to_string(),
            about_codec: "zlib".to_string(),
            about,
            apply_by: message
                .apply_by
                .map(|t| t.format(APPLY_BY_FORMAT).to_string()),
            apply_type: message.apply_type.clone(),
            company: message.company.clone(),
            documents: message.documents.clone(),
            employment_type: message.employment_type.clone(),
            industry: message.industry.clone(),
            job_type: message.job_type.clone(),
            location: message.location.clone(),
            location_type: message.location_type.clone(),
            position: message.position.clone(),
            posted_at: message.posted_at.map(|t| t.to_rfc3339()),
            url: message.url.clone(),
            wage: message.wage,
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Message, CodecError> {
        let wire: Wire = serde_json::from_slice(bytes)?;
        let about = match &wire.about {
            Some(b64) => Some(inflate_b64(b64)?),
            None => None,
        };
        let apply_by = match &wire.apply_by {
            Some(s) => Some(NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")?),
            None => None,
        };
        let posted_at = match &wire.posted_at {
            Some(s) => Some(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)),
            None => None,
        };
        Ok(EnrichedJob {
            about,
            apply_by,
            apply_type: wire.apply_type,
            company: wire.company,
            documents: wire.documents,
            employment_type: wire.employment_type,
            industry: wire.industry,
            job_type: wire.job_type,
            location: wire.location,
            location_type: wire.location_type,
            position: wire.position,
            posted_at,
            url: wire.url,
            wage: wire.wage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn sample() -> EnrichedJob {
        EnrichedJob {
            about: Some("# About\n\nWe build things.".to_string()),
            apply_by: Some(
                NaiveDate::from_ymd_opt(2026, 1, 15)
                    .unwrap()
                    .and_hms_opt(23, 59, 0)
                    .unwrap(),
            ),
            apply_type: Some("internal".to_string()),
            company: Some("acme".to_string()),
            documents: vec!["resume".to_string(), "cover letter".to_string()],
            employment_type: Some("full-time".to_string()),
            industry: Some("software".to_string()),
            job_type: Some("full-time internship".to_string()),
            location: Some("portland, or".to_string()),
            location_type: vec!["hybrid".to_string()],
            position: Some("software engineer".to_string()),
            posted_at: Some(Utc.with_ymd_and_hms(2026, 1, 7, 12, 0, 0).unwrap()),
            url: "https://app.joinhandshake.com/jobs/111".to_string(),
            wage: Some([80_000, 100_000]),
        }
    }

    #[test]
    fn roundtrip_full_record() {
        let record = sample();
        let bytes = EnrichedJobCodec::serialize(&record).unwrap();
        assert_eq!(EnrichedJobCodec::deserialize(&bytes).unwrap(), record);
    }

    #[test]
    fn roundtrip_nulls() {
        let record = EnrichedJob {
            about: None,
            apply_by: None,
            apply_type: None,
            company: None,
            documents: Vec::new(),
            employment_type: None,
            industry: None,
            job_type: None,
            location: None,
            location_type: Vec::new(),
            position: None,
            posted_at: None,
            url: "https://app.joinhandshake.com/jobs/1".to_string(),
            wage: None,
        };
        let bytes = EnrichedJobCodec::serialize(&record).unwrap();
        assert_eq!(EnrichedJobCodec::deserialize(&bytes).unwrap(), record);
    }

    #[test]
    fn absent_values_serialize_as_null_not_omitted() {
        let mut record = sample();
        record.about = None;
        record.wage = None;
        let bytes = EnrichedJobCodec::serialize(&record).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("about"));
        assert!(obj["about"].is_null());
        assert!(obj.contains_key("wage"));
        assert!(obj["wage"].is_null());
        assert_eq!(obj["topic"], "load.handshake.job.v1");
        assert_eq!(obj["action"], "START_LOAD");
        assert_eq!(obj["about_codec"], "zlib");
    }

    #[test]
    fn about_is_compressed_on_the_wire() {
        let record = sample();
        let bytes = EnrichedJobCodec::serialize(&record).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let b64 = value["about"].as_str().unwrap();
        assert_eq!(
            crate::compress::inflate_b64(b64).unwrap(),
            record.about.unwrap()
        );
    }

    #[test]
    fn validation_rejects_bad_apply_type() {
        let mut record = sample();
        record.apply_type = Some("walk-in".to_string());
        assert!(matches!(
            record.validate(),
            Err(InvalidRecord::ApplyType(_))
        ));
    }

    #[test]
    fn validation_rejects_empty_url() {
        let mut record = sample();
        record.url.clear();
        assert!(matches!(record.validate(), Err(InvalidRecord::EmptyUrl)));
    }

    #[test]
    fn validation_accepts_sample() {
        assert!(sample().validate().is_ok());
    }
}
