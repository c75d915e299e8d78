//! Local feature attribution for a prediction
//!
//! Produces the attribution values only; drawing them is left to
//! `render::waterfall`.

use super::treeshap::tree_shap;
use super::Explainer;
use crate::artifacts::TreeEnsemble;
use crate::error::ExplainError;
use crate::models::{ClassLabel, ScaledFeatures, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Per-feature contributions to one class output, relative to a base value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Class whose output is explained
    pub label: ClassLabel,
    /// Expected model output over the training distribution
    pub base_value: f64,
    /// One contribution per feature, in model order
    pub values: Vec<f64>,
    pub feature_names: Vec<String>,
    /// Feature values the model saw (scaled)
    pub data: Vec<f64>,
}

impl Attribution {
    /// Model output for the explained class: base value plus all contributions
    pub fn output_value(&self) -> f64 {
        self.base_value + self.values.iter().sum::<f64>()
    }
}

/// Exact TreeSHAP over the loaded ensemble
pub struct TreeShapExplainer {
    model: Arc<TreeEnsemble>,
    feature_names: Vec<String>,
}

impl TreeShapExplainer {
    pub fn new(model: Arc<TreeEnsemble>) -> Self {
        let feature_names = (0..model.n_features())
            .map(|i| {
                FEATURE_NAMES
                    .get(i)
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| format!("feature_{}", i))
            })
            .collect();
        Self {
            model,
            feature_names,
        }
    }
}

impl Explainer for TreeShapExplainer {
    fn explain(&self, features: &ScaledFeatures, label: ClassLabel) -> Result<Attribution, ExplainError> {
        let x = features.as_slice();
        if x.len() != self.model.n_features() {
            return Err(ExplainError::ArityMismatch {
                expected: self.model.n_features(),
                found: x.len(),
            });
        }

        // Base values are per class position, not per raw label value
        let class_index = self
            .model
            .class_index(label)
            .ok_or(ExplainError::ClassNotInModel { label })?;

        let trees = self.model.trees();
        let mut values = vec![0.0; x.len()];
        let mut base_value = 0.0;
        for tree in trees {
            for (total, phi) in values.iter_mut().zip(tree_shap(tree, x, class_index)) {
                *total += phi;
            }
            base_value += tree.expected_value(class_index);
        }
        let n_trees = trees.len() as f64;
        values.iter_mut().for_each(|v| *v /= n_trees);
        base_value /= n_trees;

        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ExplainError::NonFinite { index });
        }

        debug!(label, class_index, base_value, "Attribution computed");

        Ok(Attribution {
            label,
            base_value,
            values,
            feature_names: self.feature_names.clone(),
            data: x.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::test_support::{ensemble_file, stump};
    use crate::artifacts::TreeArrays;

    fn forest() -> Arc<TreeEnsemble> {
        let deeper = TreeArrays {
            children_left: vec![1, 3, -1, -1, -1],
            children_right: vec![2, 4, -1, -1, -1],
            feature: vec![0, 5, -2, -2, -2],
            threshold: vec![0.0, 0.5, -2.0, -2.0, -2.0],
            value: vec![
                vec![6.0, 2.0, 2.0],
                vec![5.0, 0.0, 1.0],
                vec![1.0, 2.0, 1.0],
                vec![4.0, 0.0, 0.0],
                vec![1.0, 0.0, 1.0],
            ],
            node_sample_weight: vec![10.0, 6.0, 4.0, 4.0, 2.0],
        };
        let file = ensemble_file(vec![0, 2, 3], vec![stump(2, 0.0, 3), deeper]);
        Arc::new(TreeEnsemble::from_file(file).unwrap())
    }

    #[test]
    fn test_additive_against_predicted_probability() {
        let model = forest();
        let explainer = TreeShapExplainer::new(model.clone());
        for x in [
            vec![-1.0, 0.0, -1.0, 0.0, 0.0, 0.0],
            vec![-1.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0, 0.0, 0.0, 2.0],
        ] {
            let proba = model.predict_proba(&x);
            for (i, label) in model.classes().iter().enumerate() {
                let attribution = explainer.explain(&ScaledFeatures(x.clone()), *label).unwrap();
                assert!(
                    (attribution.output_value() - proba[i]).abs() < 1e-9,
                    "class {}: {} vs {}",
                    label,
                    attribution.output_value(),
                    proba[i]
                );
            }
        }
    }

    #[test]
    fn test_names_and_data_attached() {
        let explainer = TreeShapExplainer::new(forest());
        let x = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let attribution = explainer.explain(&ScaledFeatures(x.clone()), 0).unwrap();
        assert_eq!(attribution.feature_names, FEATURE_NAMES.to_vec());
        assert_eq!(attribution.data, x);
        assert_eq!(attribution.values.len(), 6);
        assert_eq!(attribution.label, 0);
    }

    #[test]
    fn test_label_outside_classes_fails_fast() {
        let explainer = TreeShapExplainer::new(forest());
        let err = explainer.explain(&ScaledFeatures(vec![0.0; 6]), 1).unwrap_err();
        assert_eq!(err, ExplainError::ClassNotInModel { label: 1 });
    }

    #[test]
    fn test_base_value_indexed_by_class_position() {
        // Label 3 sits at position 2; indexing by the raw value would be out of range
        let explainer = TreeShapExplainer::new(forest());
        let attribution = explainer.explain(&ScaledFeatures(vec![0.0; 6]), 3).unwrap();
        // stump: class 3 never wins a leaf; deeper: (1/6*6/10 + 1/4*4/10)
        let expected = (0.0 + (1.0 / 6.0 * 0.6 + 0.25 * 0.4)) / 2.0;
        assert!((attribution.base_value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_binary_forest_supported() {
        let model = Arc::new(
            TreeEnsemble::from_file(ensemble_file(vec![0, 2], vec![stump(0, 0.0, 2)])).unwrap(),
        );
        let explainer = TreeShapExplainer::new(model);
        let attribution = explainer.explain(&ScaledFeatures(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]), 2).unwrap();
        assert!((attribution.base_value - 0.5).abs() < 1e-12);
        assert!((attribution.values[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_arity_mismatch() {
        let explainer = TreeShapExplainer::new(forest());
        assert!(matches!(
            explainer.explain(&ScaledFeatures(vec![0.0; 3]), 0),
            Err(ExplainError::ArityMismatch { expected: 6, found: 3 })
        ));
    }
}
