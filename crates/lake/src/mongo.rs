//! MongoDB-backed repositories (`mongo` feature).
//!
//! One collection per repository. `upsert_many` issues per-document
//! upserts (the 2.x driver has no typed bulk write) and reports the
//! indices whose result carried an `upserted_id`, which is the same
//! new-vs-updated signal the contract requires.

use async_trait::async_trait;
use bson::spec::BinarySubtype;
use bson::{doc, Binary, Bson};
use chrono::Utc;
use mongodb::options::UpdateOptions;
use mongodb::{Client, Collection, Database};
use tracing::warn;

use jobrail_codec::{compress, EnrichedJob};
use jobrail_core::LakeConfig;

use crate::error::LakeError;
use crate::model::{PostingTriple, SOURCE};
use crate::traits::{EnrichedStore, PostingStore, RawPageStore};

fn storage_err(err: mongodb::error::Error) -> LakeError {
    LakeError::Storage(err.to_string())
}

/// Connection handle; hand out one repository per collection.
pub struct MongoLake {
    database: Database,
}

impl MongoLake {
    pub async fn connect(config: &LakeConfig) -> Result<Self, LakeError> {
        let client = Client::with_uri_str(config.uri())
            .await
            .map_err(|e| LakeError::Unreachable(e.to_string()))?;
        Ok(Self {
            database: client.database(&config.database),
        })
    }

    pub fn raw_pages(&self, collection: &str) -> MongoRawPages {
        MongoRawPages {
            collection: self.database.collection(collection),
        }
    }

    pub fn postings(&self, collection: &str) -> MongoPostings {
        MongoPostings {
            collection: self.database.collection(collection),
        }
    }

    pub fn enriched(&self, collection: &str) -> MongoEnriched {
        MongoEnriched {
            collection: self.database.collection(collection),
        }
    }
}

pub struct MongoRawPages {
    collection: Collection<bson::Document>,
}

#[async_trait]
impl RawPageStore for MongoRawPages {
    async fn insert(&self, url: &str, html: &str) -> Result<String, LakeError> {
        let payload = compress::deflate(html)?;
        let document = doc! {
            "source": SOURCE,
            "created_at": bson::DateTime::from_chrono(Utc::now()),
            "url": url,
            "codec": "zlib",
            "payload": Binary { subtype: BinarySubtype::Generic, bytes: payload },
        };
        let result = self
            .collection
            .insert_one(document, None)
            .await
            .map_err(storage_err)?;
        Ok(result.inserted_id.to_string())
    }
}

pub struct MongoPostings {
    collection: Collection<bson::Document>,
}

#[async_trait]
impl PostingStore for MongoPostings {
    async fn upsert_many(&self, triples: &[PostingTriple]) -> Result<Vec<usize>, LakeError> {
        let options = UpdateOptions::builder().upsert(true).build();
        let mut inserted = Vec::new();
        for (index, triple) in triples.iter().enumerate() {
            let result = self
                .collection
                .update_one(
                    doc! { "job_id": triple.job_id },
                    doc! {
                        "$setOnInsert": {
                            "created_at": bson::DateTime::from_chrono(Utc::now()),
                            "job_id": triple.job_id,
                        },
                        "$set": {
                            "role": &triple.role,
                            "url": &triple.url,
                        },
                    },
                    options.clone(),
                )
                .await
                .map_err(storage_err)?;
            if result.upserted_id.is_some() {
                inserted.push(index);
            }
        }
        Ok(inserted)
    }

    async fn set_e2_success(&self, url: &str, success: bool) -> Result<(), LakeError> {
        let options = UpdateOptions::builder().upsert(true).build();
        self.collection
            .update_one(
                doc! { "url": url },
                doc! { "$set": { "url": url, "e2_success": success } },
                options,
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

pub struct MongoEnriched {
    collection: Collection<bson::Document>,
}

#[async_trait]
impl EnrichedStore for MongoEnriched {
    async fn upsert(&self, record: &EnrichedJob) -> Result<(), LakeError> {
        record.validate()?;
        let mut document =
            bson::to_document(record).map_err(|e| LakeError::Storage(e.to_string()))?;
        document.insert("created_at", Bson::DateTime(bson::DateTime::from_chrono(Utc::now())));
        let options = UpdateOptions::builder().upsert(true).build();
        let result = self
            .collection
            .update_one(
                doc! { "url": &record.url },
                doc! { "$set": document },
                options,
            )
            .await
            .map_err(storage_err)?;
        if result.upserted_id.is_none() && result.matched_count == 0 {
            warn!(url = %record.url, "enriched upsert matched nothing and inserted nothing");
        }
        Ok(())
    }
}
