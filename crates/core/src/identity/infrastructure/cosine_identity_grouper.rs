/// Clusters identity embeddings by cosine similarity.
///
/// Every pair at or above the threshold is linked; connected components
/// become identities, numbered by first appearance in row order.
use crate::identity::domain::identity_grouper::IdentityGrouper;
use crate::shared::constants::DEFAULT_IDENTITY_THRESHOLD;

use super::math;

pub struct CosineIdentityGrouper {
    threshold: f64,
}

impl CosineIdentityGrouper {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for CosineIdentityGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_THRESHOLD)
    }
}

impl IdentityGrouper for CosineIdentityGrouper {
    fn group(&self, embeddings: &[Option<Vec<f32>>]) -> Vec<Option<usize>> {
        // (row, normalized embedding) for rows that have a usable one
        let valid: Vec<(usize, Vec<f32>)> = embeddings
            .iter()
            .enumerate()
            .filter_map(|(row, e)| {
                let e = e.as_ref()?;
                if e.is_empty() || e.iter().any(|v| !v.is_finite()) {
                    return None;
                }
                let mut e = e.clone();
                math::l2_normalize(&mut e);
                Some((row, e))
            })
            .collect();

        let n = valid.len();
        let mut parent: Vec<usize> = (0..n).collect();
        for i in 0..n {
            for j in (i + 1)..n {
                if math::cosine_similarity(&valid[i].1, &valid[j].1) >= self.threshold {
                    math::union(&mut parent, i, j);
                }
            }
        }

        let members: Vec<usize> = (0..n).collect();
        let labels = math::label_by_first_appearance(&mut parent, &members);
        let mut out = vec![None; embeddings.len()];
        for ((row, _), label) in valid.iter().zip(labels) {
            out[*row] = Some(label);
        }
        log::debug!(
            "Grouped {n} embeddings into {} identities",
            out.iter().flatten().max().map_or(0, |m| m + 1)
        );
        out
    }
}
