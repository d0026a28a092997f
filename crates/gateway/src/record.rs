use std::time::Duration;

/// One record as read from the log. Keys and values are opaque bytes;
/// partition and offset are broker-assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

/// Where a produced record landed, reported back through `on_delivery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Provisioning parameters for one topic. Applied out of band by
/// whatever administers the log; carried here so every deployment
/// provisions the same shape.
#[derive(Debug, Clone, Copy)]
pub struct TopicSpec {
    pub name: &'static str,
    pub partitions: i32,
    pub replication: i16,
    pub cleanup_policy: &'static str,
    pub retention: Duration,
    pub segment: Duration,
}

const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
const SEGMENT: Duration = Duration::from_secs(12 * 60 * 60);

const fn spec(name: &'static str) -> TopicSpec {
    TopicSpec {
        name,
        partitions: 3,
        replication: 1,
        cleanup_policy: "delete",
        retention: RETENTION,
        segment: SEGMENT,
    }
}

/// The five topics the pipeline runs on.
pub fn pipeline_topics() -> [TopicSpec; 5] {
    [
        spec("extract.handshake.job.stage1.v1"),
        spec("raw.handshake.job.stage1.v1"),
        spec("extract.handshake.job.stage2.v1"),
        spec("raw.handshake.job.stage2.v1"),
        spec("load.handshake.job.v1"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobrail_codec::{
        Codec, DetailExtractCodec, DetailPageCodec, EnrichedJobCodec, ListingExtractCodec,
        ListingPageCodec,
    };

    #[test]
    fn topic_specs_cover_every_codec_topic() {
        let names: Vec<&str> = pipeline_topics().iter().map(|s| s.name).collect();
        assert!(names.contains(&ListingExtractCodec::TOPIC));
        assert!(names.contains(&ListingPageCodec::TOPIC));
        assert!(names.contains(&DetailExtractCodec::TOPIC));
        assert!(names.contains(&DetailPageCodec::TOPIC));
        assert!(names.contains(&EnrichedJobCodec::TOPIC));
    }

    #[test]
    fn topic_specs_share_the_pipeline_shape() {
        for spec in pipeline_topics() {
            assert_eq!(spec.partitions, 3);
            assert_eq!(spec.replication, 1);
            assert_eq!(spec.cleanup_policy, "delete");
            assert_eq!(spec.retention, Duration::from_secs(86_400));
            assert_eq!(spec.segment, Duration::from_secs(43_200));
        }
    }
}
