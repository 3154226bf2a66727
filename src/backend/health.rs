//! Cluster health and the notes index definition

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
    #[default]
    #[serde(other)]
    Unknown,
}

impl HealthStatus {
    /// Green and yellow clusters accept writes
    #[must_use]
    pub fn is_available(self) -> bool {
        matches!(self, HealthStatus::Green | HealthStatus::Yellow)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Green => "green",
            HealthStatus::Yellow => "yellow",
            HealthStatus::Red => "red",
            HealthStatus::Unknown => "unknown",
        }
    }
}

/// Subset of `GET /_cluster/health` the client cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealth {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub status: HealthStatus,
    #[serde(default)]
    pub number_of_nodes: u32,
    #[serde(default)]
    pub active_shards: u32,
    #[serde(default)]
    pub unassigned_shards: u32,
}

/// Settings and mappings for a freshly created notes index
#[must_use]
pub fn notes_index_definition(shards: u32, replicas: u32) -> Value {
    json!({
        "settings": {
            "number_of_shards": shards,
            "number_of_replicas": replicas,
            "refresh_interval": "1s",
            "analysis": {
                "analyzer": {
                    "note_text": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "user_id": { "type": "keyword" },
                "username": { "type": "keyword" },
                "display_name": { "type": "text" },
                "content": { "type": "text", "analyzer": "note_text" },
                "hashtags": { "type": "keyword" },
                "mentions": { "type": "keyword" },
                "media_urls": { "type": "keyword", "index": false },
                "language": { "type": "keyword" },
                "topics": { "type": "keyword" },
                "sentiment": { "type": "keyword" },
                "spam_score": { "type": "float" },
                "visibility": { "type": "keyword" },
                "nsfw": { "type": "boolean" },
                "sensitive": { "type": "boolean" },
                "is_reply": { "type": "boolean" },
                "reply_to_id": { "type": "keyword" },
                "is_renote": { "type": "boolean" },
                "renote_of_id": { "type": "keyword" },
                "thread_id": { "type": "keyword" },
                "location": { "type": "geo_point" },
                "place_name": { "type": "text" },
                "metrics": {
                    "properties": {
                        "likes_count": { "type": "long" },
                        "renotes_count": { "type": "long" },
                        "replies_count": { "type": "long" },
                        "views_count": { "type": "long" },
                        "engagement_score": { "type": "float" },
                        "virality_score": { "type": "float" },
                        "trending_score": { "type": "float" }
                    }
                },
                "user_metrics": {
                    "properties": {
                        "followers_count": { "type": "long" },
                        "following_count": { "type": "long" },
                        "reputation_score": { "type": "float" },
                        "verification_level": { "type": "keyword" },
                        "is_verified": { "type": "boolean" }
                    }
                },
                "content_quality_score": { "type": "float" },
                "boost_factors": {
                    "properties": {
                        "recency_boost": { "type": "float" },
                        "engagement_boost": { "type": "float" },
                        "author_boost": { "type": "float" },
                        "content_quality_boost": { "type": "float" }
                    }
                },
                "created_at": { "type": "date", "format": "epoch_millis" },
                "updated_at": { "type": "date", "format": "epoch_millis" },
                "indexing_metadata": {
                    "properties": {
                        "indexed_at": { "type": "date", "format": "epoch_millis" },
                        "version": { "type": "integer" },
                        "source": { "type": "keyword" }
                    }
                }
            }
        }
    })
}
