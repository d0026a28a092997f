use serde::{Deserialize, Serialize};

use crate::compress::{deflate_b64, inflate_b64};
use crate::{actions, Codec, CodecError};

/// One raw search-result page, handed from the listing extractor to the
/// listing transformer. The HTML rides compressed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub html: String,
    pub action: String,
}

impl ListingPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
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
    b64: String,
}

/// Codec for [`ListingPage`].
pub struct ListingPageCodec;

impl Codec for ListingPageCodec {
    type Message = ListingPage;

    const TOPIC: &'static str = "raw.handshake.job.stage1.v1";

    fn serialize(message: &Self::Message) -> Result<Vec<u8>, CodecError> {
        let wire = Wire {
            action: message.action.clone(),
            params: Params {
                codec: "zlib".to_string(),
                b64: deflate_b64(&message.html)?,
            },
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Message, CodecError> {
        let wire: Wire = serde_json::from_slice(bytes)?;
        Ok(ListingPage {
            html: inflate_b64(&wire.params.b64)?,
            action: wire.action,
        })
    }
}
