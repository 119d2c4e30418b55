// src/core/classifier.rs

//! Inference side of the phishing URL detector.
//!
//! The model artifact is a JSON export of a decision-tree ensemble: the
//! feature columns it was trained on, its class labels, and one node array
//! per tree. Splits send a row left when `row[feature] <= threshold`; leaves
//! carry per-class sample counts or probabilities.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::models::{FeatureVector, Verdict};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("cannot read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("malformed model: {0}")]
    MalformedModel(String),

    #[error("feature schema mismatch: model expects {expected:?}, got {found:?}")]
    SchemaMismatch { expected: Vec<String>, found: Vec<String> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelArtifact {
    #[serde(default)]
    name: Option<String>,
    features: Vec<String>,
    classes: Vec<Value>,
    trees: Vec<Tree>,
}

impl Tree {
    /// Walks from the root to a leaf. Bounded by the node count so a cyclic
    /// tree is reported instead of looping.
    fn leaf_for(&self, row: &[f64]) -> Result<&[f64], ClassifierError> {
        let mut index = 0;
        for _ in 0..=self.nodes.len() {
            match &self.nodes[index] {
                Node::Leaf { value } => return Ok(value),
                Node::Split { feature, threshold, left, right } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
        Err(ClassifierError::MalformedModel("tree does not terminate".into()))
    }
}

/// A loaded, immutable tree-ensemble classifier.
#[derive(Debug)]
pub struct Classifier {
    artifact: ModelArtifact,
    evaluations: AtomicU64,
}

impl Classifier {
    /// Reads and validates the model artifact at `path`.
    ///
    /// # Arguments
    /// * `path` - JSON export of the tree ensemble.
    ///
    /// # Returns
    /// The classifier, or a `ClassifierError` when the file is missing,
    /// unparsable or structurally invalid.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let text = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let classifier = Self::from_json(&text)?;
        info!(
            path = %path.display(),
            name = classifier.artifact.name.as_deref().unwrap_or("unnamed"),
            trees = classifier.artifact.trees.len(),
            "Classifier model loaded."
        );
        Ok(classifier)
    }

    /// Parses and validates a model artifact held in memory.
    pub fn from_json(text: &str) -> Result<Self, ClassifierError> {
        let artifact: ModelArtifact = serde_json::from_str(text)?;
        validate(&artifact)?;
        Ok(Self { artifact, evaluations: AtomicU64::new(0) })
    }

    /// Column names the model was trained on.
    pub fn features(&self) -> &[String] {
        &self.artifact.features
    }

    /// How many predictions this instance has evaluated.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Predicts the raw class label for one feature row.
    ///
    /// Leaf distributions are normalized and averaged across trees; the
    /// first class with the highest mean wins.
    pub fn predict_label(&self, features: &FeatureVector) -> Result<Value, ClassifierError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        if !features.names().eq(self.artifact.features.iter().map(String::as_str)) {
            return Err(ClassifierError::SchemaMismatch {
                expected: self.artifact.features.clone(),
                found: features.names().map(String::from).collect(),
            });
        }

        let row: Vec<f64> = features.values().into_iter().map(|v| v as f64).collect();
        let mut scores = vec![0.0; self.artifact.classes.len()];
        for tree in &self.artifact.trees {
            let leaf = tree.leaf_for(&row)?;
            let total: f64 = leaf.iter().sum();
            if total > 0.0 {
                for (score, value) in scores.iter_mut().zip(leaf) {
                    *score += value / total;
                }
            }
        }

        let mut best = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = i;
            }
        }
        debug!(?scores, label = %self.artifact.classes[best], "Prediction evaluated.");
        Ok(self.artifact.classes[best].clone())
    }

    /// Classifies one URL's features.
    ///
    /// # Arguments
    /// * `features` - A vector whose names match [`Classifier::features`] in order.
    ///
    /// # Returns
    /// `Malicious` for the true class, `Safe` for the false class and
    /// `Unknown` for any other label, or an error when the vector does not
    /// fit the model.
    pub fn predict(&self, features: &FeatureVector) -> Result<Verdict, ClassifierError> {
        self.predict_label(features).map(|label| label_to_verdict(&label))
    }
}

/// `true`/`1` is the malicious class, `false`/`0` the safe one. Any other label is unknown.
pub fn label_to_verdict(label: &Value) -> Verdict {
    match label {
        Value::Bool(true) => Verdict::Malicious,
        Value::Bool(false) => Verdict::Safe,
        Value::Number(n) if n.as_f64() == Some(1.0) => Verdict::Malicious,
        Value::Number(n) if n.as_f64() == Some(0.0) => Verdict::Safe,
        _ => Verdict::Unknown,
    }
}

fn validate(artifact: &ModelArtifact) -> Result<(), ClassifierError> {
    if artifact.classes.is_empty() {
        return Err(ClassifierError::MalformedModel("no classes".into()));
    }
    if artifact.trees.is_empty() {
        return Err(ClassifierError::MalformedModel("no trees".into()));
    }
    for (t, tree) in artifact.trees.iter().enumerate() {
        if tree.nodes.is_empty() {
            return Err(ClassifierError::MalformedModel(format!("tree {} is empty", t)));
        }
        for node in &tree.nodes {
            match node {
                Node::Split { feature, left, right, .. } => {
                    if *feature >= artifact.features.len() {
                        return Err(ClassifierError::MalformedModel(format!(
                            "tree {} splits on unknown feature {}",
                            t, feature
                        )));
                    }
                    if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                        return Err(ClassifierError::MalformedModel(format!(
                            "tree {} references a missing node",
                            t
                        )));
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != artifact.classes.len() {
                        return Err(ClassifierError::MalformedModel(format!(
                            "tree {} has a leaf with {} values for {} classes",
                            t,
                            value.len(),
                            artifact.classes.len()
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{lexical_features, to_feature_vector, FEATURE_SCHEMA};
    use serde_json::json;

    /// One tree: plain-http URLs are malicious, https ones safe.
    fn tls_model(classes: Value) -> String {
        json!({
            "name": "tls-only",
            "features": FEATURE_SCHEMA,
            "classes": classes,
            "trees": [{"nodes": [
                {"feature": 10, "threshold": 0.5, "left": 1, "right": 2},
                {"value": [0.0, 5.0]},
                {"value": [7.0, 0.0]}
            ]}]
        })
        .to_string()
    }

    fn vector(url: &str) -> FeatureVector {
        to_feature_vector(&lexical_features(url))
    }

    #[test]
    fn test_true_class_is_malicious() {
        let classifier = Classifier::from_json(&tls_model(json!([false, true]))).unwrap();
        let verdict = classifier.predict(&vector("http://example.com/")).unwrap();
        assert_eq!(verdict.message(), "This website might be malicious!");
    }

    #[test]
    fn test_false_class_is_safe() {
        let classifier = Classifier::from_json(&tls_model(json!([0, 1]))).unwrap();
        let verdict = classifier.predict(&vector("https://example.com/")).unwrap();
        assert_eq!(verdict.message(), "Website is safe to proceed!");
    }

    #[test]
    fn test_other_labels_are_unknown() {
        let classifier = Classifier::from_json(&tls_model(json!(["legit", "phishing"]))).unwrap();
        assert_eq!(classifier.predict(&vector("http://example.com/")).unwrap(), Verdict::Unknown);
        assert_eq!(label_to_verdict(&json!(2)), Verdict::Unknown);
        assert_eq!(label_to_verdict(&json!(1.0)), Verdict::Malicious);
    }

    #[test]
    fn test_identical_input_is_evaluated_again() {
        let classifier = Classifier::from_json(&tls_model(json!([0, 1]))).unwrap();
        let features = vector("http://example.com/");
        let first = classifier.predict(&features).unwrap();
        let second = classifier.predict(&features).unwrap();
        assert_eq!(first, second);
        assert_eq!(classifier.evaluations(), 2);
    }

    #[test]
    fn test_schema_mismatch_is_an_error() {
        let classifier = Classifier::from_json(&tls_model(json!([0, 1]))).unwrap();
        let short = FeatureVector { entries: vec![("length_url".into(), 10)] };
        assert!(matches!(classifier.predict(&short), Err(ClassifierError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_forest_averages_normalized_leaves() {
        let model = json!({
            "features": FEATURE_SCHEMA,
            "classes": [0, 1],
            "trees": [
                {"nodes": [{"value": [100.0, 0.0]}]},
                {"nodes": [{"value": [0.0, 1.0]}]},
                {"nodes": [{"value": [0.0, 3.0]}]}
            ]
        });
        let classifier = Classifier::from_json(&model.to_string()).unwrap();
        assert_eq!(classifier.predict(&vector("https://a.example/")).unwrap(), Verdict::Malicious);
    }

    #[test]
    fn test_malformed_models_are_rejected() {
        let dangling = json!({
            "features": FEATURE_SCHEMA,
            "classes": [0, 1],
            "trees": [{"nodes": [{"feature": 0, "threshold": 1.0, "left": 1, "right": 9}, {"value": [1.0, 0.0]}]}]
        });
        assert!(matches!(
            Classifier::from_json(&dangling.to_string()),
            Err(ClassifierError::MalformedModel(_))
        ));
        assert!(matches!(Classifier::from_json("{"), Err(ClassifierError::Parse(_))));
    }

    #[test]
    fn test_missing_model_file() {
        let err = Classifier::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ClassifierError::Io { .. }));
    }

    #[test]
    fn test_bundled_model_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/phishing_url_detector.json");
        let classifier = Classifier::load(&path).unwrap();
        assert_eq!(classifier.features(), FEATURE_SCHEMA);
        assert!(classifier.predict(&vector("https://www.example.com/")).is_ok());
    }
}
