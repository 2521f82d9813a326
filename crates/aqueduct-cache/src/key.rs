use sha2::{Digest, Sha256};

use aqueduct_core::{AqueductError, TaskArgs};

/// Derive the cache key for an operation call: `"{op_name}:{hex_digest}"`.
///
/// Positional and keyword arguments are serialized independently and joined
/// with a separator before hashing; keyword keys are sorted by construction
/// (`BTreeMap`), so two calls with the same content always hash identically.
/// The digest is SHA-256 truncated to 128 bits — wide enough that collisions
/// are not a practical concern, and short enough to keep keys compact.
pub fn cache_key(op_name: &str, args: &TaskArgs) -> Result<String, AqueductError> {
    let positional = serde_json::to_string(&args.positional)
        .map_err(|e| AqueductError::Cache(format!("positional args not serializable: {e}")))?;
    let keyword = serde_json::to_string(&args.keyword)
        .map_err(|e| AqueductError::Cache(format!("keyword args not serializable: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(positional.as_bytes());
    hasher.update(b":");
    hasher.update(keyword.as_bytes());
    let digest = hasher.finalize();

    Ok(format!("{op_name}:{}", hex::encode(&digest[..16])))
}
