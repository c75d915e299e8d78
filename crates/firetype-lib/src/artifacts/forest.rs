//! Tree-ensemble classifier artifact
//!
//! Trees are stored as parallel node arrays (children, split feature,
//! threshold, per-class value, sample weight). A row goes left when
//! `x[feature] <= threshold`. Leaf class distributions are normalised to
//! probabilities and averaged over the ensemble.

use crate::error::ArtifactError;
use crate::models::ClassLabel;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Classifier file format understood by this build
pub const CLASSIFIER_FORMAT_VERSION: u32 = 1;

const ARTIFACT: &str = "classifier";

/// Marker used in `children_left`/`children_right` for leaves
const LEAF: i64 = -1;

/// Deepest tree accepted; evaluation and explanation recurse once per level
pub const MAX_TREE_DEPTH: usize = 256;

/// Relative slack allowed between a node's weight and its children's sum
const COVER_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleKind {
    RandomForest,
    ExtraTrees,
    DecisionTree,
}

impl EnsembleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EnsembleKind::RandomForest => "random_forest",
            EnsembleKind::ExtraTrees => "extra_trees",
            EnsembleKind::DecisionTree => "decision_tree",
        }
    }
}

/// On-disk representation of the classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierFile {
    pub format_version: u32,
    pub model_type: EnsembleKind,
    #[serde(default = "default_version")]
    pub version: String,
    pub n_features: usize,
    pub classes: Vec<ClassLabel>,
    pub trees: Vec<TreeArrays>,
}

fn default_version() -> String {
    "unversioned".to_string()
}

/// Parallel node arrays of one tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
    pub node_sample_weight: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

impl Split {
    /// Child the row is routed to
    #[inline]
    pub fn route(&self, x: &[f64]) -> usize {
        if x[self.feature] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub split: Option<Split>,
    /// Training sample weight that reached this node
    pub cover: f64,
    /// Class probabilities, in `classes` order
    pub probabilities: Vec<f64>,
}

/// A validated decision tree; node 0 is the root
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Validate node arrays and build a tree for `n_features` inputs and `n_classes` outputs
    pub fn from_arrays(
        arrays: &TreeArrays,
        n_features: usize,
        n_classes: usize,
    ) -> Result<Self, ArtifactError> {
        let n = arrays.children_left.len();
        if n == 0 {
            return Err(ArtifactError::invalid(ARTIFACT, "tree has no nodes"));
        }
        let lengths = [
            ("children_right", arrays.children_right.len()),
            ("feature", arrays.feature.len()),
            ("threshold", arrays.threshold.len()),
            ("value", arrays.value.len()),
            ("node_sample_weight", arrays.node_sample_weight.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(ArtifactError::invalid(
                    ARTIFACT,
                    format!("{} has {} entries, expected {}", name, len, n),
                ));
            }
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let cover = arrays.node_sample_weight[i];
            if !cover.is_finite() || cover <= 0.0 {
                return Err(ArtifactError::invalid(
                    ARTIFACT,
                    format!("node {} has non-positive sample weight {}", i, cover),
                ));
            }

            let row = &arrays.value[i];
            if row.len() != n_classes {
                return Err(ArtifactError::invalid(
                    ARTIFACT,
                    format!("node {} has {} class values, expected {}", i, row.len(), n_classes),
                ));
            }

            let (left, right) = (arrays.children_left[i], arrays.children_right[i]);
            let split = match (left == LEAF, right == LEAF) {
                (true, true) => None,
                (false, false) => Some(Self::check_split(arrays, i, n, n_features)?),
                _ => {
                    return Err(ArtifactError::invalid(
                        ARTIFACT,
                        format!("node {} has exactly one child", i),
                    ))
                }
            };

            let probabilities = normalise(row).ok_or_else(|| {
                ArtifactError::invalid(ARTIFACT, format!("node {} has an invalid class distribution", i))
            })?;
            if split.is_none() && probabilities.iter().all(|p| *p == 0.0) {
                return Err(ArtifactError::invalid(
                    ARTIFACT,
                    format!("leaf {} has an empty class distribution", i),
                ));
            }

            nodes.push(Node {
                split,
                cover,
                probabilities,
            });
        }

        Self::check_structure(&nodes)?;
        Ok(Self { nodes })
    }

    /// Every non-root node has exactly one parent, weights add up, depth is bounded
    fn check_structure(nodes: &[Node]) -> Result<(), ArtifactError> {
        let mut depth: Vec<Option<usize>> = vec![None; nodes.len()];
        depth[0] = Some(0);
        for (i, node) in nodes.iter().enumerate() {
            let Some(split) = node.split else { continue };
            // Children follow their parent, so a node is reached before it is visited
            let parent_depth = depth[i].ok_or_else(|| {
                ArtifactError::invalid(ARTIFACT, format!("node {} is unreachable from the root", i))
            })?;
            if parent_depth + 1 > MAX_TREE_DEPTH {
                return Err(ArtifactError::invalid(
                    ARTIFACT,
                    format!("tree is deeper than {} levels", MAX_TREE_DEPTH),
                ));
            }
            for child in [split.left, split.right] {
                if depth[child].is_some() {
                    return Err(ArtifactError::invalid(
                        ARTIFACT,
                        format!("node {} has more than one parent", child),
                    ));
                }
                depth[child] = Some(parent_depth + 1);
            }

            let children = nodes[split.left].cover + nodes[split.right].cover;
            if (node.cover - children).abs() > COVER_TOLERANCE * node.cover {
                return Err(ArtifactError::invalid(
                    ARTIFACT,
                    format!(
                        "node {} has sample weight {} but its children sum to {}",
                        i, node.cover, children
                    ),
                ));
            }
        }
        if let Some(i) = depth.iter().position(Option::is_none) {
            return Err(ArtifactError::invalid(
                ARTIFACT,
                format!("node {} is unreachable from the root", i),
            ));
        }
        Ok(())
    }

    fn check_split(
        arrays: &TreeArrays,
        i: usize,
        n: usize,
        n_features: usize,
    ) -> Result<Split, ArtifactError> {
        let child = |raw: i64| -> Result<usize, ArtifactError> {
            // Children must follow their parent, which also rules out cycles
            usize::try_from(raw)
                .ok()
                .filter(|c| *c > i && *c < n)
                .ok_or_else(|| {
                    ArtifactError::invalid(ARTIFACT, format!("node {} has invalid child {}", i, raw))
                })
        };
        let left = child(arrays.children_left[i])?;
        let right = child(arrays.children_right[i])?;

        let feature = usize::try_from(arrays.feature[i])
            .ok()
            .filter(|f| *f < n_features)
            .ok_or_else(|| {
                ArtifactError::invalid(
                    ARTIFACT,
                    format!("node {} splits on invalid feature {}", i, arrays.feature[i]),
                )
            })?;

        let threshold = arrays.threshold[i];
        if !threshold.is_finite() {
            return Err(ArtifactError::invalid(
                ARTIFACT,
                format!("node {} has non-finite threshold", i),
            ));
        }

        Ok(Split {
            feature,
            threshold,
            left,
            right,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Leaf reached by the row
    pub fn leaf(&self, x: &[f64]) -> &Node {
        let mut node = &self.nodes[0];
        while let Some(split) = &node.split {
            node = &self.nodes[split.route(x)];
        }
        node
    }

    /// Cover-weighted mean leaf probability of one class
    pub fn expected_value(&self, class_index: usize) -> f64 {
        self.subtree_expectation(0, class_index)
    }

    fn subtree_expectation(&self, index: usize, class_index: usize) -> f64 {
        let node = &self.nodes[index];
        match node.split {
            None => node.probabilities[class_index],
            Some(split) => {
                let left = self.nodes[split.left].cover * self.subtree_expectation(split.left, class_index);
                let right =
                    self.nodes[split.right].cover * self.subtree_expectation(split.right, class_index);
                (left + right) / node.cover
            }
        }
    }
}

/// Scale a class-count or class-fraction row to probabilities
fn normalise(row: &[f64]) -> Option<Vec<f64>> {
    if row.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }
    let total: f64 = row.iter().sum();
    if total == 0.0 {
        return Some(vec![0.0; row.len()]);
    }
    Some(row.iter().map(|v| v / total).collect())
}

/// Validated tree-ensemble classifier
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    kind: EnsembleKind,
    version: String,
    n_features: usize,
    classes: Vec<ClassLabel>,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    /// Validate a decoded classifier file
    pub fn from_file(file: ClassifierFile) -> Result<Self, ArtifactError> {
        if file.format_version != CLASSIFIER_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                artifact: ARTIFACT,
                found: file.format_version,
                expected: CLASSIFIER_FORMAT_VERSION,
            });
        }
        if file.trees.is_empty() {
            return Err(ArtifactError::invalid(ARTIFACT, "ensemble has no trees"));
        }
        if file.model_type == EnsembleKind::DecisionTree && file.trees.len() != 1 {
            return Err(ArtifactError::invalid(
                ARTIFACT,
                format!("decision_tree model carries {} trees", file.trees.len()),
            ));
        }

        let trees = file
            .trees
            .iter()
            .enumerate()
            .map(|(i, arrays)| {
                Tree::from_arrays(arrays, file.n_features, file.classes.len()).map_err(|e| match e {
                    ArtifactError::Invalid { artifact, reason } => ArtifactError::Invalid {
                        artifact,
                        reason: format!("tree {}: {}", i, reason),
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(file.model_type, file.version, file.n_features, file.classes, trees)
    }

    /// Assemble an ensemble from already-validated trees
    pub fn new(
        kind: EnsembleKind,
        version: impl Into<String>,
        n_features: usize,
        classes: Vec<ClassLabel>,
        trees: Vec<Tree>,
    ) -> Result<Self, ArtifactError> {
        if n_features == 0 {
            return Err(ArtifactError::invalid(ARTIFACT, "n_features must be positive"));
        }
        if classes.is_empty() {
            return Err(ArtifactError::invalid(ARTIFACT, "no classes"));
        }
        let unique: HashSet<_> = classes.iter().collect();
        if unique.len() != classes.len() {
            return Err(ArtifactError::invalid(ARTIFACT, "duplicate class labels"));
        }
        if trees.is_empty() {
            return Err(ArtifactError::invalid(ARTIFACT, "ensemble has no trees"));
        }
        if trees
            .iter()
            .flat_map(|t| t.nodes())
            .any(|n| n.probabilities.len() != classes.len())
        {
            return Err(ArtifactError::invalid(
                ARTIFACT,
                "tree outputs do not match the class count",
            ));
        }

        Ok(Self {
            kind,
            version: version.into(),
            n_features,
            classes,
            trees,
        })
    }

    pub fn kind(&self) -> EnsembleKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Position of a label in the per-class outputs
    pub fn class_index(&self, label: ClassLabel) -> Option<usize> {
        self.classes.iter().position(|c| *c == label)
    }

    /// Mean leaf probabilities over all trees
    ///
    /// Callers must pass a row of `n_features` values.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.n_features);
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (p, leaf_p) in proba.iter_mut().zip(&tree.leaf(x).probabilities) {
                *p += leaf_p;
            }
        }
        let n_trees = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        proba
    }

    /// Label with the highest mean probability; ties go to the earlier class
    pub fn predict(&self, x: &[f64]) -> ClassLabel {
        let proba = self.predict_proba(x);
        let mut best = 0;
        for (i, p) in proba.iter().enumerate().skip(1) {
            if *p > proba[best] {
                best = i;
            }
        }
        self.classes[best]
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// One split on `feature` at `threshold`; left leaf favours `classes[0]`, right `classes[1]`
    pub fn stump(feature: i64, threshold: f64, n_classes: usize) -> TreeArrays {
        let mut left = vec![0.0; n_classes];
        let mut right = vec![0.0; n_classes];
        left[0] = 10.0;
        right[1.min(n_classes - 1)] = 10.0;
        let mut root = vec![0.0; n_classes];
        root[0] += 10.0;
        root[1.min(n_classes - 1)] += 10.0;
        TreeArrays {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![feature, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![root, left, right],
            node_sample_weight: vec![20.0, 10.0, 10.0],
        }
    }

    /// Right-leaning chain of `depth` splits on feature 0; every left child is a leaf
    pub fn chain(depth: usize) -> TreeArrays {
        let n = 2 * depth + 1;
        let mut arrays = TreeArrays {
            children_left: vec![LEAF; n],
            children_right: vec![LEAF; n],
            feature: vec![-2; n],
            threshold: vec![-2.0; n],
            value: vec![vec![1.0, 0.0]; n],
            node_sample_weight: vec![1.0; n],
        };
        for k in 0..depth {
            let i = 2 * k;
            arrays.children_left[i] = (i + 1) as i64;
            arrays.children_right[i] = (i + 2) as i64;
            arrays.feature[i] = 0;
            arrays.threshold[i] = k as f64;
            arrays.node_sample_weight[i] = (depth - k + 1) as f64;
            arrays.value[i] = vec![(depth - k) as f64, 1.0];
        }
        arrays.value[n - 1] = vec![0.0, 1.0];
        arrays
    }

    pub fn ensemble_file(classes: Vec<ClassLabel>, trees: Vec<TreeArrays>) -> ClassifierFile {
        ClassifierFile {
            format_version: CLASSIFIER_FORMAT_VERSION,
            model_type: EnsembleKind::RandomForest,
            version: "v-test".to_string(),
            n_features: 6,
            classes,
            trees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_stump_routes_on_threshold() {
        let model = TreeEnsemble::from_file(ensemble_file(vec![0, 2], vec![stump(0, 0.5, 2)])).unwrap();
        assert_eq!(model.predict(&[0.5, 0.0, 0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(model.predict(&[0.51, 0.0, 0.0, 0.0, 0.0, 0.0]), 2);
    }

    #[test]
    fn test_probabilities_averaged_over_trees() {
        let file = ensemble_file(vec![0, 3], vec![stump(0, 0.0, 2), stump(1, 0.0, 2)]);
        let model = TreeEnsemble::from_file(file).unwrap();
        let proba = model.predict_proba(&[-1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert!((proba[0] - 0.5).abs() < 1e-12);
        assert!((proba[1] - 0.5).abs() < 1e-12);
        // Tie goes to the earlier class
        assert_eq!(model.predict(&[-1.0, 1.0, 0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(model.predict(&[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]), 3);
    }

    #[test]
    fn test_expected_value_is_cover_weighted() {
        let mut arrays = stump(0, 0.0, 2);
        arrays.node_sample_weight = vec![40.0, 30.0, 10.0];
        let tree = Tree::from_arrays(&arrays, 6, 2).unwrap();
        assert!((tree.expected_value(0) - 0.75).abs() < 1e-12);
        assert!((tree.expected_value(1) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_unknown_format_version() {
        let mut file = ensemble_file(vec![0, 2], vec![stump(0, 0.5, 2)]);
        file.format_version = 2;
        let err = TreeEnsemble::from_file(file).unwrap_err();
        assert!(matches!(err, ArtifactError::UnsupportedVersion { found: 2, .. }));
    }

    #[test]
    fn test_rejects_bad_feature_index() {
        let file = ensemble_file(vec![0, 2], vec![stump(6, 0.5, 2)]);
        let err = TreeEnsemble::from_file(file).unwrap_err();
        assert!(err.to_string().contains("tree 0"), "{}", err);
        assert!(err.to_string().contains("invalid feature 6"), "{}", err);
    }

    #[test]
    fn test_rejects_backward_child() {
        let mut arrays = stump(0, 0.5, 2);
        arrays.children_left[0] = 0;
        assert!(Tree::from_arrays(&arrays, 6, 2).is_err());
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let mut arrays = stump(0, 0.5, 2);
        arrays.threshold.pop();
        let err = Tree::from_arrays(&arrays, 6, 2).unwrap_err();
        assert!(err.to_string().contains("threshold"), "{}", err);
    }

    #[test]
    fn test_rejects_value_width_mismatch() {
        let file = ensemble_file(vec![0, 2, 3], vec![stump(0, 0.5, 2)]);
        assert!(TreeEnsemble::from_file(file).is_err());
    }

    #[test]
    fn test_rejects_duplicate_classes_and_empty_ensemble() {
        assert!(TreeEnsemble::from_file(ensemble_file(vec![0, 0], vec![stump(0, 0.5, 2)])).is_err());
        assert!(TreeEnsemble::from_file(ensemble_file(vec![0, 2], vec![])).is_err());
    }

    #[test]
    fn test_decodes_json_layout() {
        let json = r#"{
            "format_version": 1,
            "model_type": "random_forest",
            "version": "v1.0.0",
            "n_features": 6,
            "classes": [0, 1, 2, 3],
            "trees": [{
                "children_left":  [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature":        [2, -2, -2],
                "threshold":      [0.5, -2.0, -2.0],
                "value":          [[10, 0, 5, 5], [9, 0, 1, 0], [1, 0, 4, 5]],
                "node_sample_weight": [20, 10, 10]
            }]
        }"#;
        let file: ClassifierFile = serde_json::from_str(json).unwrap();
        let model = TreeEnsemble::from_file(file).unwrap();
        assert_eq!(model.version(), "v1.0.0");
        assert_eq!(model.classes(), &[0, 1, 2, 3]);
        assert_eq!(model.predict(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(model.predict(&[0.0, 0.0, 1.0, 0.0, 0.0, 0.0]), 3);
        assert_eq!(model.class_index(2), Some(2));
        assert_eq!(model.class_index(7), None);
    }

    #[test]
    fn test_chain_at_depth_limit_is_accepted() {
        let tree = Tree::from_arrays(&chain(MAX_TREE_DEPTH), 6, 2).unwrap();
        let x = [MAX_TREE_DEPTH as f64, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(tree.leaf(&x).probabilities, vec![0.0, 1.0]);
        let expected = 1.0 / (MAX_TREE_DEPTH + 1) as f64;
        assert!((tree.expected_value(1) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_tree_deeper_than_limit() {
        for depth in [MAX_TREE_DEPTH + 1, 5000] {
            let err = Tree::from_arrays(&chain(depth), 6, 2).unwrap_err();
            assert!(matches!(err, ArtifactError::Invalid { .. }));
            assert!(err.to_string().contains("deeper than"), "{}", err);
        }
    }

    #[test]
    fn test_rejects_cover_not_matching_children() {
        let mut arrays = stump(0, 0.5, 2);
        arrays.node_sample_weight = vec![25.0, 10.0, 10.0];
        let err = Tree::from_arrays(&arrays, 6, 2).unwrap_err();
        assert!(err.to_string().contains("children sum to 20"), "{}", err);
    }

    #[test]
    fn test_rejects_shared_child() {
        // Nodes 1 and 2 both point at node 3
        let arrays = TreeArrays {
            children_left: vec![1, 3, 3, -1, -1, -1],
            children_right: vec![2, 4, 5, -1, -1, -1],
            feature: vec![0, 1, 1, -2, -2, -2],
            threshold: vec![0.0, 0.0, 0.0, -2.0, -2.0, -2.0],
            value: vec![vec![1.0, 1.0]; 6],
            node_sample_weight: vec![4.0, 2.0, 2.0, 1.0, 1.0, 1.0],
        };
        let err = Tree::from_arrays(&arrays, 6, 2).unwrap_err();
        assert!(err.to_string().contains("node 3 has more than one parent"), "{}", err);

        let mut same = stump(0, 0.5, 2);
        same.children_right[0] = 1;
        assert!(Tree::from_arrays(&same, 6, 2).is_err());
    }

    #[test]
    fn test_rejects_unreachable_node() {
        let mut arrays = stump(0, 0.5, 2);
        arrays.children_left.push(-1);
        arrays.children_right.push(-1);
        arrays.feature.push(-2);
        arrays.threshold.push(-2.0);
        arrays.value.push(vec![1.0, 0.0]);
        arrays.node_sample_weight.push(1.0);
        let err = Tree::from_arrays(&arrays, 6, 2).unwrap_err();
        assert!(err.to_string().contains("node 3 is unreachable"), "{}", err);
    }
}
