//! Commit/reveal fairness primitives.
//!
//! A round's randomness is derived from three components: a server seed the
//! house generates fresh per round, a client seed the player controls, and a
//! per-round nonce. The house publishes `sha256(server_seed)` before funds
//! move and reveals the seed itself only at settlement, so every draw can be
//! recomputed and audited after the fact.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Server seeds are 32 random bytes, hex-encoded.
const SERVER_SEED_BYTES: usize = 32;

/// Client seeds are free-form but bounded.
const MAX_CLIENT_SEED_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FairnessError {
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Draw range must be non-zero")]
    EmptyRange,

    #[error("Commitment mismatch: expected {expected}, computed {computed}")]
    CommitmentMismatch { expected: String, computed: String },
}

/// The seed triple that fully determines a round's draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedPair {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
}

/// A freshly generated server seed together with its published commitment.
#[derive(Debug, Clone)]
pub struct RevealedSeed {
    pub server_seed: String,
    pub commitment: String,
}

/// Generate a server seed and the commitment hash to publish ahead of the
/// round. The seed itself stays secret until settlement.
pub fn commit() -> RevealedSeed {
    let mut bytes = [0u8; SERVER_SEED_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let server_seed = hex::encode(bytes);
    let commitment = hex::encode(Sha256::digest(server_seed.as_bytes()));

    RevealedSeed {
        server_seed,
        commitment,
    }
}

/// Compute the commitment hash for a server seed.
pub fn commitment_for(server_seed: &str) -> Result<String, FairnessError> {
    validate_server_seed(server_seed)?;
    Ok(hex::encode(Sha256::digest(server_seed.as_bytes())))
}

/// Derive the bounded draw for a seed triple.
///
/// SHA-256 over `server:client:nonce`, first 8 digest bytes as a big-endian
/// integer, reduced modulo `range`. Same triple, same range, same draw.
pub fn draw(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    range: usize,
) -> Result<usize, FairnessError> {
    validate_server_seed(server_seed)?;
    validate_client_seed(client_seed)?;
    if range == 0 {
        return Err(FairnessError::EmptyRange);
    }

    let digest = Sha256::digest(format!("{}:{}:{}", server_seed, client_seed, nonce).as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);

    Ok((u64::from_be_bytes(prefix) % range as u64) as usize)
}

/// Recompute the commitment from a revealed server seed and compare it with
/// the hash published before the round. Returns the recomputed draw alongside
/// so a player can confirm the outcome independently.
pub fn verify(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    range: usize,
    expected_commitment: &str,
) -> Result<VerifiedDraw, FairnessError> {
    let computed = commitment_for(server_seed)?;
    let matches = computed.eq_ignore_ascii_case(expected_commitment);
    let draw = draw(server_seed, client_seed, nonce, range)?;

    Ok(VerifiedDraw {
        commitment_matches: matches,
        draw,
    })
}

/// Outcome of a post-hoc verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDraw {
    pub commitment_matches: bool,
    pub draw: usize,
}

/// Strict variant of [`verify`] used by audit paths: any disagreement is an
/// error rather than a `false`.
pub fn audit(
    seeds: &SeedPair,
    range: usize,
    expected_commitment: &str,
    expected_draw: usize,
) -> Result<(), FairnessError> {
    let verified = verify(
        &seeds.server_seed,
        &seeds.client_seed,
        seeds.nonce,
        range,
        expected_commitment,
    )?;

    if !verified.commitment_matches {
        return Err(FairnessError::CommitmentMismatch {
            expected: expected_commitment.to_string(),
            computed: commitment_for(&seeds.server_seed)?,
        });
    }

    if verified.draw != expected_draw {
        return Err(FairnessError::CommitmentMismatch {
            expected: format!("draw {}", expected_draw),
            computed: format!("draw {}", verified.draw),
        });
    }

    Ok(())
}

pub fn validate_client_seed(client_seed: &str) -> Result<(), FairnessError> {
    if client_seed.is_empty() {
        return Err(FairnessError::InvalidSeed("client seed is empty".to_string()));
    }
    if client_seed.len() > MAX_CLIENT_SEED_LEN {
        return Err(FairnessError::InvalidSeed(format!(
            "client seed exceeds {} bytes",
            MAX_CLIENT_SEED_LEN
        )));
    }
    Ok(())
}

fn validate_server_seed(server_seed: &str) -> Result<(), FairnessError> {
    if server_seed.len() != SERVER_SEED_BYTES * 2 {
        return Err(FairnessError::InvalidSeed(format!(
            "server seed must be {} hex chars, got {}",
            SERVER_SEED_BYTES * 2,
            server_seed.len()
        )));
    }
    if hex::decode(server_seed).is_err() {
        return Err(FairnessError::InvalidSeed(
            "server seed is not valid hex".to_string(),
        ));
    }
    Ok(())
}

/// Generate a client seed for players that do not supply one.
pub fn random_client_seed() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
