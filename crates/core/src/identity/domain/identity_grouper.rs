/// Domain interface for clustering face embeddings into identities.
///
/// Takes one optional embedding per result row and returns, per row, the
/// index of the identity it belongs to. Rows without an embedding (or with
/// a NaN one) get `None`.
pub trait IdentityGrouper: Send {
    fn group(&self, embeddings: &[Option<Vec<f32>>]) -> Vec<Option<usize>>;
}

/// Display label for an identity index.
pub fn identity_label(index: usize) -> String {
    format!("Person_{index}")
}
