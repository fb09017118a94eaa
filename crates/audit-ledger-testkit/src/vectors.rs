//! Golden test vectors for cross-implementation verification.
//!
//! Every implementation of the audit ledger must produce identical canonical
//! bytes and digests for these inputs. The expected values were produced
//! independently of this crate.

use serde::Serialize;

use audit_ledger_core::{canonical_string, compute_hash, ChangeSet, Digest};

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Change set as JSON, in deliberately unsorted key order.
    pub changes: &'static str,
    /// Predecessor digest (hex), `None` for genesis.
    pub prev_hash: Option<&'static str>,
    /// Expected canonical encoding.
    pub canonical: &'static str,
    /// Expected SHA-256 digest (hex).
    pub hash: &'static str,
}

const AUSTIN_GENESIS: &str = "2775dc092450091e3704512bf6b9168fffb641cf30a0b266a29ebb42108d8907";

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "genesis: single field",
            changes: r#"{"location":"Austin"}"#,
            prev_hash: None,
            canonical: r#"{"location":"Austin"}"#,
            hash: AUSTIN_GENESIS,
        },
        GoldenVector {
            name: "linked: verification update",
            changes: r#"{"verification":"verified"}"#,
            prev_hash: Some(AUSTIN_GENESIS),
            canonical: r#"{"prev_hash":"2775dc092450091e3704512bf6b9168fffb641cf30a0b266a29ebb42108d8907","verification":"verified"}"#,
            hash: "6bbc0fdf8d1f6bcd7331af534a0b6a25dd49d275c7ab5780ba3862d820d933d7",
        },
        GoldenVector {
            name: "genesis: empty changes",
            changes: "{}",
            prev_hash: None,
            canonical: "{}",
            hash: "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a",
        },
        GoldenVector {
            name: "linked: empty changes (delete)",
            changes: "{}",
            prev_hash: Some(AUSTIN_GENESIS),
            canonical: r#"{"prev_hash":"2775dc092450091e3704512bf6b9168fffb641cf30a0b266a29ebb42108d8907"}"#,
            hash: "c6e8974ac3b9571daf0bec8911e6f9f8bd6d5769e875474415d989e0c356d450",
        },
        GoldenVector {
            name: "listing snapshot",
            changes: r#"{"verification":"verified","owner":{"name":"Alice Smith","email":"alice@example.com"},"location":"New York, NY","terms":"Full payment upfront","buyer_intent":"sale"}"#,
            prev_hash: None,
            canonical: r#"{"buyer_intent":"sale","location":"New York, NY","owner":{"email":"alice@example.com","name":"Alice Smith"},"terms":"Full payment upfront","verification":"verified"}"#,
            hash: "6ce3dc4090284de073dd6ceb1677acdf0768f27a7f41be0ec2bc226c82ec3dff",
        },
        GoldenVector {
            name: "nested maps inside lists",
            changes: r#"{"owner":{"name":"Charlie Lee","email":"charlie@example.com"},"location":"Austin, TX","history":[{"b":1,"a":2}]}"#,
            prev_hash: None,
            canonical: r#"{"history":[{"a":2,"b":1}],"location":"Austin, TX","owner":{"email":"charlie@example.com","name":"Charlie Lee"}}"#,
            hash: "72e74a4e48638c06f62ec1305b8a08f36ba07d6eececc71e2a323a9b52fefbfa",
        },
        GoldenVector {
            name: "scalars and escapes",
            changes: r#"{"unicode":"Zürich \"quoted\"\n","tags":["garden","garage"],"price":450000,"notes":null,"delta":-12,"active":true}"#,
            prev_hash: None,
            canonical: r#"{"active":true,"delta":-12,"notes":null,"price":450000,"tags":["garden","garage"],"unicode":"Zürich \"quoted\"\n"}"#,
            hash: "972ce4ef265ba5e2bd1bdd1ba7bf712c733ccd7cb492b34d7da28b7beaa7c82e",
        },
        GoldenVector {
            name: "floats keep a fraction",
            changes: r#"{"whole":2.0,"ratio":1.5}"#,
            prev_hash: None,
            canonical: r#"{"ratio":1.5,"whole":2.0}"#,
            hash: "7559054ba6c35c9938fc047d65d3d0765a07e4b942ab6dae4247a412aca8917f",
        },
    ]
}

/// Outcome of checking one vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorResult {
    pub name: &'static str,
    pub canonical: String,
    pub hash: String,
    pub passed: bool,
}

/// Compute canonical bytes and digest for a vector.
pub fn check_vector(vector: &GoldenVector) -> Result<VectorResult, String> {
    let json: serde_json::Value = serde_json::from_str(vector.changes).map_err(|e| e.to_string())?;
    let changes = ChangeSet::from_json(json).map_err(|e| e.to_string())?;
    let prev = vector
        .prev_hash
        .map(Digest::from_hex)
        .transpose()
        .map_err(|e| e.to_string())?;

    let canonical = canonical_string(&changes, prev.as_ref()).map_err(|e| e.to_string())?;
    let hash = compute_hash(&changes, prev.as_ref())
        .map_err(|e| e.to_string())?
        .to_hex();
    let passed = canonical == vector.canonical && hash == vector.hash;

    Ok(VectorResult {
        name: vector.name,
        canonical,
        hash,
        passed,
    })
}

/// Check every vector, returning the failures.
pub fn verify_all_vectors() -> Vec<VectorResult> {
    all_vectors()
        .iter()
        .filter_map(|v| match check_vector(v) {
            Ok(result) if result.passed => None,
            Ok(result) => Some(result),
            Err(e) => Some(VectorResult {
                name: v.name,
                canonical: String::new(),
                hash: e,
                passed: false,
            }),
        })
        .collect()
}

/// Print vectors as JSON for other implementations to consume.
pub fn vectors_json() -> String {
    serde_json::to_string_pretty(&all_vectors()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        let failures = verify_all_vectors();
        assert!(failures.is_empty(), "failing vectors: {failures:#?}");
    }

    #[test]
    fn test_vector_names_unique() {
        let vectors = all_vectors();
        let mut names: Vec<_> = vectors.iter().map(|v| v.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), vectors.len());
    }

    #[test]
    fn test_vectors_json_lists_every_vector() {
        let parsed: serde_json::Value = serde_json::from_str(&vectors_json()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), all_vectors().len());
    }
}
