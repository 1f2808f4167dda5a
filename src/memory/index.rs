//! 内积相似度索引
//!
//! 每次检索 / 去重时基于当前集合全量重建，不缓存、不增量更新。
//! 向量先做 L2 归一化，内积即余弦相似度。零向量归一化后仍为零向量，
//! 与任何向量的相似度都是 0，不会出现除零。

/// 单个近邻结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// 在建索引时的下标
    pub index: usize,
    pub score: f32,
}

/// 扁平的内积索引，按行保存归一化后的向量
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    vectors: Vec<Vec<f32>>,
}

impl SimilarityIndex {
    /// 用一组向量建索引，下标与输入顺序一致
    pub fn build<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Self {
        Self {
            vectors: vectors.into_iter().map(normalized).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// 查询与 `query` 最相近的 `k` 个向量，按相似度降序
    ///
    /// `k` 会被钳制到 `[0, len]`；相似度相同的按建索引顺序排列。
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let query = normalized(query);
        let mut scored: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, v)| Neighbor {
                index,
                score: inner_product(&query, v),
            })
            .collect();
        rank(&mut scored);
        scored.truncate(k.min(self.vectors.len()));
        scored
    }

    /// 第 `row` 个向量的近邻（不含自身），最多 `k` 个
    pub fn neighbors_of(&self, row: usize, k: usize) -> Vec<Neighbor> {
        let Some(base) = self.vectors.get(row) else {
            return Vec::new();
        };
        let mut scored: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != row)
            .map(|(index, v)| Neighbor {
                index,
                score: inner_product(base, v),
            })
            .collect();
        rank(&mut scored);
        scored.truncate(k);
        scored
    }
}

/// L2 归一化，零范数向量原样返回（全零）
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / norm).collect()
}

/// 维度不一致时视为不相关
fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// 稳定排序：分数相同保留下标顺序
fn rank(scored: &mut [Neighbor]) {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(vectors: &[Vec<f32>]) -> SimilarityIndex {
        SimilarityIndex::build(vectors.iter().map(Vec::as_slice))
    }

    #[test]
    fn test_search_ranks_by_cosine() {
        let index = index_of(&[vec![0.0, 1.0], vec![10.0, 0.0], vec![1.0, 1.0]]);
        let hits = index.search(&[2.0, 0.0], 3);
        let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
    }

    #[test]
    fn test_search_clamps_k() {
        let index = index_of(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(index.search(&[1.0, 0.0], 50).len(), 2);
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_ties_keep_build_order() {
        let index = index_of(&[vec![1.0, 0.0], vec![2.0, 0.0], vec![3.0, 0.0]]);
        let order: Vec<usize> = index.search(&[1.0, 0.0], 3).iter().map(|n| n.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let index = index_of(&[vec![0.0, 0.0], vec![1.0, 0.0]]);
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[1].score, 0.0);

        let zero_query = index.search(&[0.0, 0.0], 2);
        assert!(zero_query.iter().all(|n| n.score == 0.0));
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        let index = index_of(&[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn test_neighbors_exclude_self() {
        let index = index_of(&[vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]);
        let neighbors = index.neighbors_of(1, 10);
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].index, 0);
        assert!(neighbors.iter().all(|n| n.index != 1));
        assert!(index.neighbors_of(9, 3).is_empty());
    }

    #[test]
    fn test_normalized_unit_length() {
        let v = normalized(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalized(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }
}
