//! Mock 向量化器
//!
//! 未预设的文本由其 SHA-256 摘要展开成固定维度向量，相同文本总是得到相同向量，
//! 因此“写入后用原文检索”必然命中自身。需要精确控制相似度时用
//! [`with_vector`](MockEmbedder::with_vector) 指定向量。

use crate::embedding::Embedder;
use crate::error::{EmbeddingError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const DIM: usize = 32;

pub struct MockEmbedder {
    scripted: Mutex<HashMap<String, Vec<f32>>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// 为指定文本预设向量
    pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.scripted.lock().unwrap().insert(text.into(), vector);
        self
    }

    /// 之后的调用全部失败（或恢复）
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// `encode` 被调用的次数（一次批量调用计一次）
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.scripted.lock().unwrap().get(text) {
            return v.clone();
        }
        let digest = Sha256::digest(text.as_bytes());
        (0..DIM)
            .map(|i| digest[i % digest.len()] as f32 / 127.5 - 1.0)
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::RequestFailed("injected failure".to_string()).into());
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic_and_scripted() {
        let embedder = MockEmbedder::new().with_vector("fixed", vec![1.0, 0.0]);
        let a = embedder.encode_one("hello").await.unwrap();
        let b = embedder.encode_one("hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DIM);
        assert_eq!(embedder.encode_one("fixed").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(embedder.call_count(), 3);

        embedder.set_failing(true);
        assert!(embedder.encode_one("hello").await.is_err());
    }
}
