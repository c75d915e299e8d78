//! Exact path-dependent TreeSHAP for a single tree
//!
//! Walks every root-to-leaf path once while tracking, for each distinct
//! feature on the path, the fraction of "feature absent" (zero) and
//! "feature present" (one) flow together with the permutation weights of
//! all subset sizes. Runs in O(leaves * depth^2). Recursion depth is
//! bounded by `MAX_TREE_DEPTH`, which tree validation enforces.

use crate::artifacts::Tree;

#[derive(Debug, Clone, Copy, Default)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// SHAP values of one class probability for the row `x`
///
/// The result satisfies `tree.expected_value(class) + sum == leaf probability`.
pub fn tree_shap(tree: &Tree, x: &[f64], class_index: usize) -> Vec<f64> {
    let mut walker = Walker {
        tree,
        x,
        class_index,
        phi: vec![0.0; x.len()],
    };
    walker.recurse(0, &[], 0, 1.0, 1.0, None);
    walker.phi
}

struct Walker<'a> {
    tree: &'a Tree,
    x: &'a [f64],
    class_index: usize,
    phi: Vec<f64>,
}

impl<'a> Walker<'a> {
    fn recurse(
        &mut self,
        node_index: usize,
        parent_path: &[PathElement],
        unique_depth: usize,
        parent_zero_fraction: f64,
        parent_one_fraction: f64,
        parent_feature: Option<usize>,
    ) {
        let mut path = Vec::with_capacity(unique_depth + 1);
        path.extend_from_slice(&parent_path[..unique_depth]);
        path.push(PathElement::default());
        extend_path(
            &mut path,
            unique_depth,
            parent_zero_fraction,
            parent_one_fraction,
            parent_feature,
        );

        let tree = self.tree;
        let node = &tree.nodes()[node_index];

        let Some(split) = node.split else {
            let value = node.probabilities[self.class_index];
            for i in 1..=unique_depth {
                let w = unwound_path_sum(&path, unique_depth, i);
                let el = path[i];
                if let Some(feature) = el.feature {
                    self.phi[feature] += w * (el.one_fraction - el.zero_fraction) * value;
                }
            }
            return;
        };

        let hot = split.route(self.x);
        let cold = if hot == split.left { split.right } else { split.left };
        let hot_zero_fraction = tree.nodes()[hot].cover / node.cover;
        let cold_zero_fraction = tree.nodes()[cold].cover / node.cover;

        let mut unique_depth = unique_depth;
        let mut incoming_zero_fraction = 1.0;
        let mut incoming_one_fraction = 1.0;

        // A feature already split on higher up is undone and redone here
        if let Some(k) = (1..=unique_depth).find(|&k| path[k].feature == Some(split.feature)) {
            incoming_zero_fraction = path[k].zero_fraction;
            incoming_one_fraction = path[k].one_fraction;
            unwind_path(&mut path, unique_depth, k);
            unique_depth -= 1;
        }

        self.recurse(
            hot,
            &path,
            unique_depth + 1,
            hot_zero_fraction * incoming_zero_fraction,
            incoming_one_fraction,
            Some(split.feature),
        );
        self.recurse(
            cold,
            &path,
            unique_depth + 1,
            cold_zero_fraction * incoming_zero_fraction,
            0.0,
            Some(split.feature),
        );
    }
}

fn extend_path(
    path: &mut [PathElement],
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    path[unique_depth] = PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
    };
    let d = unique_depth as f64;
    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += one_fraction * path[i].pweight * (fi + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - fi) / (d + 1.0);
    }
}

fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let d = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - fi) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - fi));
        }
    }

    // pweights stay in place, only the feature slots shift down
    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let d = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (d - fi) / (d + 1.0);
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((d - fi) / (d + 1.0));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::test_support::{chain, stump};
    use crate::artifacts::MAX_TREE_DEPTH;
    use crate::artifacts::TreeArrays;

    fn two_level_tree() -> Tree {
        // root: f0 <= 0 ; left: f1 <= 0 ; right: f1 <= 1 (reuses f1 on both sides)
        let arrays = TreeArrays {
            children_left: vec![1, 3, 5, -1, -1, -1, -1],
            children_right: vec![2, 4, 6, -1, -1, -1, -1],
            feature: vec![0, 1, 1, -2, -2, -2, -2],
            threshold: vec![0.0, 0.0, 1.0, -2.0, -2.0, -2.0, -2.0],
            value: vec![
                vec![50.0, 50.0],
                vec![30.0, 10.0],
                vec![20.0, 40.0],
                vec![25.0, 5.0],
                vec![5.0, 5.0],
                vec![2.0, 18.0],
                vec![18.0, 22.0],
            ],
            node_sample_weight: vec![100.0, 40.0, 60.0, 30.0, 10.0, 20.0, 40.0],
        };
        Tree::from_arrays(&arrays, 3, 2).unwrap()
    }

    fn deep_repeat_tree() -> Tree {
        // f0 appears twice on one path
        let arrays = TreeArrays {
            children_left: vec![1, 3, -1, -1, -1],
            children_right: vec![2, 4, -1, -1, -1],
            feature: vec![0, 0, -2, -2, -2],
            threshold: vec![1.0, -1.0, -2.0, -2.0, -2.0],
            value: vec![
                vec![6.0, 4.0],
                vec![5.0, 1.0],
                vec![1.0, 3.0],
                vec![3.0, 0.0],
                vec![2.0, 1.0],
            ],
            node_sample_weight: vec![10.0, 6.0, 4.0, 3.0, 3.0],
        };
        Tree::from_arrays(&arrays, 2, 2).unwrap()
    }

    fn assert_additive(tree: &Tree, x: &[f64], class_index: usize) {
        let phi = tree_shap(tree, x, class_index);
        let fx = tree.leaf(x).probabilities[class_index];
        let total = tree.expected_value(class_index) + phi.iter().sum::<f64>();
        assert!(
            (total - fx).abs() < 1e-9,
            "base + sum(phi) = {} but f(x) = {} for x = {:?}",
            total,
            fx,
            x
        );
    }

    #[test]
    fn test_stump_attribution() {
        let tree = Tree::from_arrays(&stump(0, 0.5, 2), 6, 2).unwrap();
        let x = [0.0, 9.0, 9.0, 9.0, 9.0, 9.0];

        let phi = tree_shap(&tree, &x, 0);
        assert!((phi[0] - 0.5).abs() < 1e-12);
        assert!(phi[1..].iter().all(|v| *v == 0.0));

        let phi = tree_shap(&tree, &x, 1);
        assert!((phi[0] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_additivity_two_level() {
        let tree = two_level_tree();
        for x in [
            [-1.0, -1.0, 0.0],
            [-1.0, 1.0, 0.0],
            [1.0, 0.5, 0.0],
            [1.0, 2.0, 0.0],
        ] {
            assert_additive(&tree, &x, 0);
            assert_additive(&tree, &x, 1);
        }
    }

    #[test]
    fn test_additivity_with_repeated_feature() {
        let tree = deep_repeat_tree();
        for x in [[-2.0, 0.0], [0.0, 0.0], [2.0, 0.0]] {
            assert_additive(&tree, &x, 0);
            assert_additive(&tree, &x, 1);
        }
        // Only feature 0 is used, so it carries the whole difference
        let phi = tree_shap(&tree, &[-2.0, 0.0], 1);
        assert_eq!(phi[1], 0.0);
    }

    #[test]
    fn test_additivity_at_depth_limit() {
        let tree = Tree::from_arrays(&chain(MAX_TREE_DEPTH), 1, 2).unwrap();
        for x0 in [-1.0, 100.5, MAX_TREE_DEPTH as f64] {
            assert_additive(&tree, &[x0], 0);
            assert_additive(&tree, &[x0], 1);
        }
    }

    #[test]
    fn test_unused_feature_gets_zero() {
        let tree = two_level_tree();
        let phi = tree_shap(&tree, &[1.0, 2.0, 123.0], 0);
        assert_eq!(phi[2], 0.0);
    }

    #[test]
    fn test_two_feature_symmetry() {
        // AND of two independent, equally likely binary features
        let arrays = TreeArrays {
            children_left: vec![1, 3, 5, -1, -1, -1, -1],
            children_right: vec![2, 4, 6, -1, -1, -1, -1],
            feature: vec![0, 1, 1, -2, -2, -2, -2],
            threshold: vec![0.5, 0.5, 0.5, -2.0, -2.0, -2.0, -2.0],
            value: vec![
                vec![3.0, 1.0],
                vec![2.0, 0.0],
                vec![1.0, 1.0],
                vec![1.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
            ],
            node_sample_weight: vec![4.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0],
        };
        let tree = Tree::from_arrays(&arrays, 2, 2).unwrap();
        let phi = tree_shap(&tree, &[1.0, 1.0], 1);
        // f(x) = 1, E[f] = 0.25, split evenly
        assert!((phi[0] - 0.375).abs() < 1e-12, "{:?}", phi);
        assert!((phi[1] - 0.375).abs() < 1e-12, "{:?}", phi);
    }
}
