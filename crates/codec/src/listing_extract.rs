use serde::{Deserialize, Serialize};

use crate::{actions, Codec, CodecError};

/// Command that kicks off a listing-extraction run over a page range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingExtractCmd {
    pub start_page: u32,
    pub end_page: u32,
    pub per_page: u32,
    pub action: String,
}

impl ListingExtractCmd {
    pub fn new(start_page: u32, end_page: u32, per_page: u32) -> Self {
        Self {
            start_page,
            end_page,
            per_page,
            action: actions::START_EXTRACT.to_string(),
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
    start_page: u32,
    end_page: u32,
    per_page: u32,
}

/// Codec for [`ListingExtractCmd`].
pub struct ListingExtractCodec;

impl Codec for ListingExtractCodec {
    type Message = ListingExtractCmd;

    const TOPIC: &'static str = "extract.handshake.job.stage1.v1";

    fn serialize(message: &Self::Message) -> Result<Vec<u8>, CodecError> {
        let wire = Wire {
            action: message.action.clone(),
            params: Params {
                start_page: message.start_page,
                end_page: message.end_page,
                per_page: message.per_page,
            },
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Message, CodecError> {
        let wire: Wire = serde_json::from_slice(bytes)?;
        Ok(ListingExtractCmd {
            start_page: wire.params.start_page,
            end_page: wire.params.end_page,
            per_page: wire.params.per_page,
            action: wire.action,
        })
    }
}
