//! Union-find helpers for embedding clustering.

/// Find root of element `i` with path halving for amortized near-O(1).
pub fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
pub fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Label every member with its cluster number, clusters numbered in order
/// of their first member.
pub fn label_by_first_appearance(parent: &mut [usize], members: &[usize]) -> Vec<usize> {
    let mut labels: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    members
        .iter()
        .map(|&m| {
            let root = find(parent, m);
            let next = labels.len();
            *labels.entry(root).or_insert(next)
        })
        .collect()
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Dot product of L2-normalized vectors equals cosine similarity.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}
