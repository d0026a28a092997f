use serde::{Deserialize, Serialize};

use crate::{actions, Codec, CodecError};

/// Command to fetch one job's detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailExtractCmd {
    pub job_id: i64,
    pub role: String,
    pub url: String,
    pub action: String,
}

impl DetailExtractCmd {
    pub fn new(job_id: i64, role: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            job_id,
            role: role.into(),
            url: url.into(),
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
    job_id: i64,
    role: String,
    url: String,
}

/// Codec for [`DetailExtractCmd`].
pub struct DetailExtractCodec;

impl Codec for DetailExtractCodec {
    type Message = DetailExtractCmd;

    const TOPIC: &'static str = "extract.handshake.job.stage2.v1";

    fn serialize(message: &Self::Message) -> Result<Vec<u8>, CodecError> {
        let wire = Wire {
            action: message.action.clone(),
            params: Params {
                job_id: message.job_id,
                role: message.role.clone(),
                url: message.url.clone(),
            },
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self::Message, CodecError> {
        let wire: Wire = serde_json::from_slice(bytes)?;
        Ok(DetailExtractCmd {
            job_id: wire.params.job_id,
            role: wire.params.role,
            url: wire.params.url,
            action: wire.action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cmd = DetailExtractCmd::new(111, "Alpha", "https://app.joinhandshake.com/jobs/111");
        let bytes = DetailExtractCodec::serialize(&cmd).unwrap();
        assert_eq!(DetailExtractCodec::deserialize(&bytes).unwrap(), cmd);
    }

    #[test]
    fn wire_shape() {
        let cmd = DetailExtractCmd::new(222, "Beta", "https://app.joinhandshake.com/jobs/222");
        let bytes = DetailExtractCodec::serialize(&cmd).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["action"], "START_EXTRACT");
        assert_eq!(value["params"]["job_id"], 222);
        assert_eq!(value["params"]["role"], "Beta");
    }
}
