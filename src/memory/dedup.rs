//! 近似去重
//!
//! 单轮贪心、非传递的聚类：对每条记录取其 `k = min(neighbors, N)` 个近邻（不含自身），
//! 相似度超过阈值的一对中保留重要程度更高的一条；重要程度相同时保留下标更小的一条。
//! 某条记录一旦被标记删除，就不再检查它剩余的近邻。
//! 长度超过近邻上限的近似重复链可能无法完全合并，这是有意保留的近似行为。

use crate::config::MemorySettings;
use crate::memory::index::SimilarityIndex;
use crate::memory::types::{MemoryCollection, MemoryRecord};
use chrono::{DateTime, Duration, Utc};

/// 去重触发与判定参数
#[derive(Debug, Clone)]
pub struct Deduplicator {
    /// 两次去重的最小间隔
    pub interval: Duration,
    /// 相似度严格大于该值视为重复
    pub threshold: f32,
    /// 每条记录检查的近邻数量上限（含自身）
    pub neighbors: usize,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            interval: Duration::hours(24),
            threshold: 0.75,
            neighbors: 10,
        }
    }
}

impl Deduplicator {
    pub fn from_settings(settings: &MemorySettings) -> Self {
        Self {
            interval: Duration::hours(settings.dedup_interval_hours),
            threshold: settings.dedup_threshold,
            neighbors: settings.dedup_neighbors,
        }
    }

    /// 从未去重过，或距上次去重已超过间隔
    pub fn is_due(&self, collection: &MemoryCollection, now: DateTime<Utc>) -> bool {
        match collection.last_deduplicated_at {
            None => true,
            Some(last) => now - last > self.interval,
        }
    }

    /// 返回去重后的记录（保持原有相对顺序）
    pub fn deduplicate(&self, memories: &[MemoryRecord]) -> Vec<MemoryRecord> {
        let n = memories.len();
        if n < 2 {
            return memories.to_vec();
        }

        let index = SimilarityIndex::build(memories.iter().map(|m| m.embedding.as_slice()));
        // k 包含自身，因此实际检查 k - 1 个近邻
        let k = self.neighbors.min(n);
        let mut removed = vec![false; n];

        for i in 0..n {
            if removed[i] {
                continue;
            }
            for neighbor in index.neighbors_of(i, k.saturating_sub(1)) {
                let j = neighbor.index;
                if removed[j] {
                    continue;
                }
                if neighbor.score > self.threshold {
                    if memories[i].data.importance >= memories[j].data.importance {
                        removed[j] = true;
                    } else {
                        removed[i] = true;
                        break;
                    }
                }
            }
        }

        memories
            .iter()
            .zip(removed)
            .filter(|(_, gone)| !gone)
            .map(|(m, _)| m.clone())
            .collect()
    }

    /// 生成去重后的新集合，`last_deduplicated_at` 置为 `now`
    pub fn run(&self, collection: &MemoryCollection, now: DateTime<Utc>) -> MemoryCollection {
        MemoryCollection {
            memories: self.deduplicate(&collection.memories),
            last_deduplicated_at: Some(now),
            updated_at: collection.updated_at,
        }
    }
}
