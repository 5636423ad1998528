//! Embedding providers
//!
//! The ranking core only consumes vectors; this module is the collaborator
//! that produces them. `HarmonicEmbedder` is a local, deterministic,
//! training-free provider (Harmonic Token Projection, arXiv:2511.20665):
//! each token is read as a base-2^16 integer, reduced modulo a set of primes,
//! and every residue is placed on the unit circle. Token vectors are
//! mean-pooled and L2-normalized.

use std::f64::consts::PI;

use thiserror::Error;

use super::vector::normalize;

/// Largest dimension the local provider supports (192 prime moduli)
pub const MAX_HARMONIC_DIM: usize = 384;

/// Tokens longer than this are cut (Unicode scalar values)
const MAX_TOKEN_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Provider misconfigured (e.g. unsupported dimension)
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
    /// The computation itself failed (remote error, timeout, ...)
    #[error("Embedding failed: {0}")]
    Failed(String),
}

/// Turns text into a fixed-dimension vector
///
/// Implementations must always return `dimension()` values; the engine
/// rejects anything else.
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Harmonic Token Projection embedder
#[derive(Debug, Clone)]
pub struct HarmonicEmbedder {
    moduli: Vec<u64>,
}

impl HarmonicEmbedder {
    /// `dimension` must be even, positive and at most `MAX_HARMONIC_DIM`
    pub fn new(dimension: usize) -> Result<Self, ProviderError> {
        if dimension == 0 || dimension % 2 != 0 || dimension > MAX_HARMONIC_DIM {
            return Err(ProviderError::InvalidConfig(format!(
                "harmonic embedder needs an even dimension in 2..={}, got {}",
                MAX_HARMONIC_DIM, dimension
            )));
        }
        Ok(Self {
            moduli: first_primes(dimension / 2),
        })
    }

    fn embed_token(&self, token: &str, acc: &mut [f64]) {
        let n = token_to_integer(token);
        for (i, &m) in self.moduli.iter().enumerate() {
            let theta = 2.0 * PI * ((n % m) as f64) / (m as f64);
            acc[2 * i] += theta.sin();
            acc[2 * i + 1] += theta.cos();
        }
    }
}

impl Default for HarmonicEmbedder {
    fn default() -> Self {
        Self {
            moduli: first_primes(MAX_HARMONIC_DIM / 2),
        }
    }
}

impl EmbeddingProvider for HarmonicEmbedder {
    fn name(&self) -> &str {
        "harmonic"
    }

    fn dimension(&self) -> usize {
        self.moduli.len() * 2
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let tokens = tokenize(text);

        // No tokens: zero vector, which cosine treats as "similar to nothing"
        if tokens.is_empty() {
            return Ok(vec![0.0; self.dimension()]);
        }

        let mut acc = vec![0.0f64; self.dimension()];
        for token in &tokens {
            self.embed_token(token, &mut acc);
        }
        let count = tokens.len() as f64;
        let mut embedding: Vec<f32> = acc.iter().map(|x| (x / count) as f32).collect();
        normalize(&mut embedding);

        Ok(embedding)
    }
}

/// Lowercased words split on whitespace and ASCII punctuation
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// N = Σ u_j · 2^16^(L-j), wrapping on overflow
fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_LENGTH)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}
