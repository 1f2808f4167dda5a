//! 长期记忆的数据模型与 JSON 编解码
//!
//! 每个用户对应一份 JSON 文档（整个集合，而非逐条对象），向量直接内联为数组：
//!
//! ```json
//! {
//!   "memories": [
//!     { "data": { "id": 1718000000, "content": "...", "importance": 0.8,
//!                 "category": "preferences", "topics": ["rust"] },
//!       "embedding": [0.01, -0.2, ...] }
//!   ],
//!   "updated_at": "2026-10-16T08:00:00Z",
//!   "last_deduplicated_at": null
//! }
//! ```

use crate::error::{MemoryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 对外暴露的记忆内容（不含向量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryData {
    /// 创建时刻的 Unix 秒，仅作不透明标识，高频写入下不保证唯一
    pub id: i64,
    pub content: String,
    /// 重要程度，取值 [0, 1]
    pub importance: f64,
    pub category: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// 一条完整的记忆记录：内容 + 向量
///
/// 创建后不可变，只能整体删除后重新写入。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub data: MemoryData,
    pub embedding: Vec<f32>,
}

/// 单个用户的全部记忆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCollection {
    /// 追加顺序，不具备语义
    #[serde(default)]
    pub memories: Vec<MemoryRecord>,
    /// 最近一次成功去重的时间，仅由去重流程刷新
    #[serde(default)]
    pub last_deduplicated_at: Option<DateTime<Utc>>,
    /// 每次持久化时刷新
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self {
            memories: Vec::new(),
            last_deduplicated_at: None,
            updated_at: Utc::now(),
        }
    }
}

impl MemoryCollection {
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// 从后端读到的字节解析集合
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| MemoryError::SerializationError(e.to_string()).into())
    }

    /// 序列化为紧凑 JSON
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MemoryError::SerializationError(e.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: i64, content: &str) -> MemoryRecord {
        MemoryRecord {
            data: MemoryData {
                id,
                content: content.to_string(),
                importance: 0.5,
                category: "general".to_string(),
                topics: vec!["rust".to_string()],
            },
            embedding: vec![0.1, 0.2, 0.3],
        }
    }

    #[test]
    fn test_decode_document_layout() {
        let raw = r#"{
            "memories": [
                {"data": {"id": 1, "content": "likes tea", "importance": 0.9,
                          "category": "preferences", "topics": ["drinks"]},
                 "embedding": [1.0, 0.0]}
            ],
            "updated_at": "2026-01-02T03:04:05Z",
            "last_deduplicated_at": null
        }"#;
        let collection = MemoryCollection::decode(raw.as_bytes()).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.memories[0].data.content, "likes tea");
        assert_eq!(collection.memories[0].embedding, vec![1.0, 0.0]);
        assert!(collection.last_deduplicated_at.is_none());
        assert_eq!(
            collection.updated_at,
            Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
        );
    }

    #[test]
    fn test_decode_tolerates_missing_optional_fields() {
        let raw = r#"{"memories": [{"data": {"id": 7, "content": "x", "importance": 0.1,
                      "category": "c"}, "embedding": []}]}"#;
        let collection = MemoryCollection::decode(raw.as_bytes()).unwrap();
        assert!(collection.memories[0].data.topics.is_empty());
        assert!(collection.last_deduplicated_at.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(MemoryCollection::decode(b"not json").is_err());
        assert!(MemoryCollection::decode(br#"{"memories": 3}"#).is_err());
    }

    #[test]
    fn test_encode_keeps_records_and_timestamps() {
        let mut collection = MemoryCollection::default();
        collection.memories.push(record(1, "a"));
        collection.last_deduplicated_at = Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());

        let bytes = collection.encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["memories"][0]["data"]["topics"][0], "rust");
        assert_eq!(value["last_deduplicated_at"], "2026-05-01T00:00:00Z");

        let back = MemoryCollection::decode(&bytes).unwrap();
        assert_eq!(back, collection);
    }
}
