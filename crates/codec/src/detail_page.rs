use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compress::{deflate_b64, inflate_b64};
use crate::{actions, Codec, CodecError};

/// One raw job-detail page plus the instant it was scraped, handed from
/// the detail extractor to the detail transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    pub url: String,
    pub html: String,
    pub created_at: DateTime<Utc>,
    pub action: String,
}

impl DetailPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            created_at,
            action: actions::START_TRANSFORM.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Wire {
    action: String,
    params: Params,
}

#[derive(Serialize, Deserialize)]
struct Params {
    codec: String,
    created_at: String,
    url: String,
    b64: String,
}

/// Codec for [`DetailPage`].
pub struct DetailPageCodec;

impl Codec for DetailPageCodec {
    type Message = DetailPage;

    const TOPIC: &'static str = "raw.handshake.job.stage2.v1";

    fn serialize(message: &Self::Message) -> Result<Vec<u8>, CodecError> {
        let wire = Wire {
            action: message.action.clone(),
            params: Params {
                codec: "zlib".to_string(),
                created_at: message.created_at.to_rfc3339(),
                url: message.url.clone(),
                b64: deflate_b64(&message.html)?,
            },
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Message, CodecError> {
        let wire: Wire = serde_json::from_slice(bytes)?;
        let created_at = DateTime::parse_from_rfc3339(&wire.params.created_at)?.with_timezone(&Utc);
        Ok(DetailPage {
            url: wire.params.url,
            html: inflate_b64(&wire.params.b64)?,
            created_at,
            action: wire.action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn roundtrip() {
        let scraped = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let page = DetailPage::new(
            "https://app.joinhandshake.com/jobs/111",
            "<body>detail</body>",
            scraped,
        );
        let bytes = DetailPageCodec::serialize(&page).unwrap();
        assert_eq!(DetailPageCodec::deserialize(&bytes).unwrap(), page);
    }

    #[test]
    fn timestamp_roundtrips_to_identical_instant() {
        let scraped = Utc.timestamp_opt(1_735_689_600, 123_456_789).unwrap();
        let page = DetailPage::new("u", "h", scraped);
        let bytes = DetailPageCodec::serialize(&page).unwrap();
        let decoded = DetailPageCodec::deserialize(&bytes).unwrap();
        assert_eq!(decoded.created_at, scraped);
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let bytes = br#"{"action":"START_TRANSFORM","params":{"codec":"zlib","created_at":"yesterday","url":"u","b64":"eJwDAAAAAAE="}}"#;
        assert!(DetailPageCodec::deserialize(bytes).is_err());
    }
}
