//! Deterministic one-dimensional k-means.
//!
//! Used to split the tokens of a plain-numbered question into sub-questions by
//! their vertical position. Initial centers are taken at evenly spaced
//! quantiles of the distinct input values, so identical input always produces
//! identical labels. Input with fewer distinct values than `k` collapses to one
//! cluster per distinct value.

use thiserror::Error;

use crate::core::constants::DEFAULT_KMEANS_MAX_ITERATIONS;

/// Reasons clustering cannot run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusteringError {
    /// `k` was zero.
    #[error("cluster count must be positive")]
    ZeroClusters,
    /// Fewer values than clusters.
    #[error("{values} values cannot form {k} clusters")]
    TooFewValues {
        /// Number of input values.
        values: usize,
        /// Requested clusters.
        k: usize,
    },
    /// An input value was NaN or infinite.
    #[error("input contains a non-finite value")]
    NonFinite,
}

/// Result of [`cluster`].
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster index per input value; cluster `0` has the smallest center.
    pub labels: Vec<usize>,
    /// Cluster centers in ascending order. Shorter than `k` when the input
    /// has fewer distinct values.
    pub centers: Vec<f32>,
    /// Lloyd iterations performed.
    pub iterations: usize,
}

/// Clusters `values` into `k` groups with the default iteration cap.
pub fn cluster(values: &[f32], k: usize) -> Result<Clustering, ClusteringError> {
    cluster_with_limit(values, k, DEFAULT_KMEANS_MAX_ITERATIONS)
}

/// Clusters `values` into `k` groups, stopping after `max_iterations`.
pub fn cluster_with_limit(
    values: &[f32],
    k: usize,
    max_iterations: usize,
) -> Result<Clustering, ClusteringError> {
    if k == 0 {
        return Err(ClusteringError::ZeroClusters);
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ClusteringError::NonFinite);
    }
    if values.len() < k {
        return Err(ClusteringError::TooFewValues {
            values: values.len(),
            k,
        });
    }

    let mut distinct = values.to_vec();
    distinct.sort_by(f32::total_cmp);
    distinct.dedup();
    if distinct.len() < k {
        let labels = values
            .iter()
            .map(|v| distinct.partition_point(|d| d < v))
            .collect();
        return Ok(Clustering {
            labels,
            centers: distinct,
            iterations: 0,
        });
    }

    let mut centers: Vec<f32> = if k == 1 {
        vec![values.iter().sum::<f32>() / values.len() as f32]
    } else {
        (0..k)
            .map(|i| distinct[i * (distinct.len() - 1) / (k - 1)])
            .collect()
    };

    let mut labels = vec![usize::MAX; values.len()];
    let mut iterations = 0;
    while iterations < max_iterations.max(1) {
        iterations += 1;
        let mut changed = false;
        for (label, &value) in labels.iter_mut().zip(values) {
            let nearest = nearest_center(&centers, value);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![0.0f64; k];
        let mut counts = vec![0usize; k];
        for (&label, &value) in labels.iter().zip(values) {
            sums[label] += value as f64;
            counts[label] += 1;
        }
        for (c, center) in centers.iter_mut().enumerate() {
            if counts[c] > 0 {
                *center = (sums[c] / counts[c] as f64) as f32;
            }
        }
    }

    // Relabel so cluster indices follow ascending centers.
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| centers[a].total_cmp(&centers[b]).then(a.cmp(&b)));
    let mut rank = vec![0usize; k];
    for (new, &old) in order.iter().enumerate() {
        rank[old] = new;
    }

    Ok(Clustering {
        labels: labels.into_iter().map(|l| rank[l]).collect(),
        centers: order.iter().map(|&i| centers[i]).collect(),
        iterations,
    })
}

fn nearest_center(centers: &[f32], value: f32) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (i, &center) in centers.iter().enumerate() {
        let distance = (value - center).abs();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_rows_cluster_in_ascending_order() {
        let values = [500.0, 100.0, 300.0];
        let result = cluster(&values, 3).unwrap();
        assert_eq!(result.labels, vec![2, 0, 1]);
        assert_eq!(result.centers, vec![100.0, 300.0, 500.0]);
    }

    #[test]
    fn test_noisy_rows_group_together() {
        let values = [102.0, 98.0, 305.0, 295.0, 100.0, 300.0];
        let result = cluster(&values, 2).unwrap();
        assert_eq!(result.labels, vec![0, 0, 1, 1, 0, 1]);
        assert!((result.centers[0] - 100.0).abs() < 1e-3);
        assert!((result.centers[1] - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_single_cluster() {
        let result = cluster(&[1.0, 2.0, 3.0], 1).unwrap();
        assert_eq!(result.labels, vec![0, 0, 0]);
        assert!((result.centers[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_inputs_are_errors() {
        assert_eq!(cluster(&[1.0], 0), Err(ClusteringError::ZeroClusters));
        assert_eq!(
            cluster(&[1.0, 2.0], 3),
            Err(ClusteringError::TooFewValues { values: 2, k: 3 })
        );
        assert_eq!(cluster(&[1.0, f32::NAN], 1), Err(ClusteringError::NonFinite));
    }

    #[test]
    fn test_repeated_values_collapse_to_distinct_clusters() {
        let result = cluster(&[300.0, 100.0, 100.0, 300.0], 3).unwrap();
        assert_eq!(result.labels, vec![1, 0, 0, 1]);
        assert_eq!(result.centers, vec![100.0, 300.0]);

        let single = cluster(&[5.0, 5.0, 5.0], 2).unwrap();
        assert_eq!(single.labels, vec![0, 0, 0]);
        assert_eq!(single.centers, vec![5.0]);
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let values = [10.0, 11.0, 40.0, 42.0, 41.0, 90.0, 12.0, 88.0];
        let a = cluster(&values, 3).unwrap();
        let b = cluster(&values, 3).unwrap();
        assert_eq!(a, b);
    }
}
