use crate::error::QualityError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Descriptor of a trained ensemble model: provenance metadata plus the
/// file path and content hash the loader needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub trainer: String,
    pub description: String,
    pub version: String,
    pub path: String,
    pub hash: String,
}

impl ModelInfo {
    pub const KEY_NAME: &'static str = "Name";
    pub const KEY_TRAINER: &'static str = "Trainer";
    pub const KEY_DESCRIPTION: &'static str = "Description";
    pub const KEY_VERSION: &'static str = "Version";
    pub const KEY_PATH: &'static str = "Path";
    pub const KEY_HASH: &'static str = "Hash";

    /// Loads a descriptor from a `Key = value` text file.
    ///
    /// A relative `Path` value is resolved against the descriptor's own
    /// directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, QualityError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| QualityError::ModelIo(format!("{}: {e}", path.display())))?;

        let mut info = ModelInfo::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(QualityError::Parse(format!("model info line without '=': {line}")));
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                Self::KEY_NAME => info.name = value.to_string(),
                Self::KEY_TRAINER => info.trainer = value.to_string(),
                Self::KEY_DESCRIPTION => info.description = value.to_string(),
                Self::KEY_VERSION => info.version = value.to_string(),
                Self::KEY_PATH => info.path = value.to_string(),
                Self::KEY_HASH => info.hash = value.to_string(),
                _ => {
                    warn!("skip unknown model info key: {key}");
                }
            }
        }

        if info.path.is_empty() {
            return Err(QualityError::Parse("model info is missing the Path key".to_string()));
        }
        if info.hash.is_empty() {
            return Err(QualityError::Parse("model info is missing the Hash key".to_string()));
        }

        let model_path = Path::new(&info.path);
        if model_path.is_relative() {
            if let Some(parent) = path.parent() {
                info.path = parent.join(model_path).to_string_lossy().into_owned();
            }
        }
        Ok(info)
    }
}

/// One node of a decision tree, stored in the tree's arena.
///
/// Child references are arena indices and always point forward (to a larger
/// index), so traversal terminates structurally.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Split {
        /// Feature ID looked up in the feature vector.
        feature: String,
        threshold: f64,
        left: u32,
        right: u32,
        /// Branch taken when the feature is absent or failed.
        default_left: bool,
    },
    Leaf {
        value: f64,
    },
}

/// A binary decision tree as an arena of nodes, root at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
}

impl Tree {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// A pre-trained decision-tree ensemble.
///
/// Loaded once, immutable thereafter; safe for concurrent read-only use by
/// any number of simultaneous scoring calls.
#[derive(Debug, Clone)]
pub struct Ensemble {
    pub name: String,
    pub trainer: String,
    pub description: String,
    pub version: String,
    pub(crate) trees: Vec<Tree>,
    pub(crate) hash: String,
}

impl Ensemble {
    /// Loads an ensemble from `path` and verifies its SHA-256 content hash.
    ///
    /// # Errors
    /// `ModelIo` when the file is unreadable, `Parse` when the ensemble is
    /// malformed, `HashMismatch` when the computed hash disagrees with
    /// `expected_hash` (case-insensitive hex). No partially verified model
    /// is ever returned.
    pub fn from_file(path: impl AsRef<Path>, expected_hash: &str) -> Result<Self, QualityError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| QualityError::ModelIo(format!("{}: {e}", path.display())))?;
        let ensemble: Ensemble = text.parse()?;
        let expected = expected_hash.to_lowercase();
        if ensemble.hash != expected {
            return Err(QualityError::HashMismatch {
                expected,
                actual: ensemble.hash,
            });
        }
        debug!("loaded ensemble `{}` ({} trees) from {}", ensemble.name, ensemble.trees.len(), path.display());
        Ok(ensemble)
    }

    /// Loads the ensemble referenced by a [`ModelInfo`] descriptor.
    pub fn from_model_info(info: &ModelInfo) -> Result<Self, QualityError> {
        Self::from_file(&info.path, &info.hash)
    }

    /// Loads the default ensemble embedded in the library.
    ///
    /// The embedded resource is trusted; its hash is computed and queryable
    /// via [`Ensemble::parameter_hash`] but not checked against an external
    /// value.
    pub fn load_default() -> Result<Self, QualityError> {
        include_str!("../config/quality.model").parse()
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Lowercase hex SHA-256 of the loaded model text.
    pub fn parameter_hash(&self) -> &str {
        &self.hash
    }
}

/// Lowercase hex SHA-256 digest of `text`.
pub(crate) fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn content_hash_is_stable_lowercase_hex() {
        let h = content_hash("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn model_info_parses_all_keys() {
        let text = "; descriptor\nName = Test Model\nTrainer = Lab\nDescription = A test\nVersion = 1.2.3\nPath = /tmp/m.model\nHash = abc123\n";
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let info = ModelInfo::from_file(file.path()).unwrap();
        assert_eq!(info.name, "Test Model");
        assert_eq!(info.trainer, "Lab");
        assert_eq!(info.description, "A test");
        assert_eq!(info.version, "1.2.3");
        assert_eq!(info.path, "/tmp/m.model");
        assert_eq!(info.hash, "abc123");
    }

    #[test]
    fn model_info_resolves_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let info_path = dir.path().join("model.txt");
        std::fs::write(&info_path, "Path = sub/m.model\nHash = abc\n").unwrap();

        let info = ModelInfo::from_file(&info_path).unwrap();
        assert_eq!(info.path, dir.path().join("sub/m.model").to_string_lossy());
    }

    #[test]
    fn model_info_requires_path_and_hash() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Name = incomplete\n").unwrap();
        assert!(matches!(ModelInfo::from_file(file.path()), Err(QualityError::Parse(_))));
    }

    #[test]
    fn default_ensemble_loads() {
        let ensemble = Ensemble::load_default().unwrap();
        assert!(ensemble.tree_count() >= 1);
        assert_eq!(ensemble.parameter_hash().len(), 64);
    }
}
