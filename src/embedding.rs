use rand::Rng;

/// Turns extracted text into a vector stored alongside the record.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// NOT a semantic embedding: returns random values of a fixed width so the
/// storage path is exercised until a real model is plugged in.
#[derive(Debug, Clone)]
pub struct PlaceholderEmbedder {
    dims: usize,
}

impl PlaceholderEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for PlaceholderEmbedder {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Embedder for PlaceholderEmbedder {
    fn embed(&self, _text: &str) -> Vec<f32> {
        let mut rng = rand::thread_rng();
        (0..self.dims).map(|_| rng.gen_range(0.0f32..1.0)).collect()
    }
}
