//! Credential rotation over a fixed, ordered pool.

use crate::error::{AuthError, Result};
use bridge_traits::catalog::CredentialPair;
use core_runtime::config::PipelineConfig;
use rand::Rng;

/// Selects a credential pair per request batch.
///
/// The pool is read-only after construction, so a rotator can be shared
/// freely behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CredentialRotator {
    pool: Vec<CredentialPair>,
}

impl CredentialRotator {
    pub fn new(pool: Vec<CredentialPair>) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.credentials.clone())
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Pair scheduled for `hour` (0-23): `pool[hour % pool_size]`.
    ///
    /// Spreading hours across the pool keeps each pair's quota usage even
    /// over a day.
    pub fn pair_for_hour(&self, hour: u32) -> Result<CredentialPair> {
        if self.pool.is_empty() {
            return Err(AuthError::Configuration(
                "credential pool is empty".to_string(),
            ));
        }

        let index = hour as usize % self.pool.len();
        self.checked(index)
    }

    /// Uniformly random pair. Fallback only, for batches that keep failing on
    /// their scheduled pair.
    pub fn random_pair(&self) -> Result<CredentialPair> {
        self.random_pair_with(&mut rand::thread_rng())
    }

    pub fn random_pair_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<CredentialPair> {
        if self.pool.is_empty() {
            return Err(AuthError::Configuration(
                "credential pool is empty".to_string(),
            ));
        }

        let index = rng.gen_range(0..self.pool.len());
        self.checked(index)
    }

    /// Fails fast on the first incomplete pair, for use at startup.
    pub fn validate(&self) -> Result<()> {
        if self.pool.is_empty() {
            return Err(AuthError::Configuration(
                "credential pool is empty".to_string(),
            ));
        }
        (0..self.pool.len()).try_for_each(|index| self.checked(index).map(|_| ()))
    }

    fn checked(&self, index: usize) -> Result<CredentialPair> {
        let pair = &self.pool[index];
        if !pair.is_complete() {
            return Err(AuthError::Configuration(format!(
                "credential pair at index {} is incomplete",
                index
            )));
        }
        Ok(pair.clone())
    }
}
