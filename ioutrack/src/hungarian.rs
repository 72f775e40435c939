/// Hungarian algorithm for optimal detection-to-track assignment
///
/// Used by the tracker when optimal association is requested instead of the
/// default greedy pass. Maximises total IoU over the pairs that clear the
/// association threshold.
use ndarray::ArrayView2;
use pathfinding::prelude::{kuhn_munkres, Matrix};
use rayon::prelude::*;

/// Fixed-point scale applied to IoU values before solving
const IOU_SCALE: f32 = 1_000_000.0;

/// Result of Hungarian assignment algorithm
#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    /// Assignments as (detection_idx, track_idx) pairs, ordered by detection
    pub assignments: Vec<(usize, usize)>,
    /// Indices of unassigned detections
    pub unassigned_detections: Vec<usize>,
    /// Indices of unassigned tracks
    pub unassigned_tracks: Vec<usize>,
    /// Sum of IoU over the accepted assignments
    pub total_iou: f32,
}

/// Hungarian assignment solver
pub struct HungarianSolver;

impl HungarianSolver {
    /// Solve assignment with an IoU matrix
    ///
    /// # Arguments
    /// * `iou_matrix` - (n_detections, n_tracks) matrix of IoU values
    /// * `iou_threshold` - pairs must have IoU strictly above this to be assigned
    pub fn solve_iou(iou_matrix: ArrayView2<f32>, iou_threshold: f32) -> AssignmentResult {
        let num_detections = iou_matrix.nrows();
        let num_tracks = iou_matrix.ncols();

        if num_detections == 0 || num_tracks == 0 {
            return AssignmentResult {
                assignments: Vec::new(),
                unassigned_detections: (0..num_detections).collect(),
                unassigned_tracks: (0..num_tracks).collect(),
                total_iou: 0.0,
            };
        }

        // Pad to square; pairs at or below the threshold weigh nothing so the
        // solver never trades a real match for one that would be rejected
        let size = num_detections.max(num_tracks);
        let mut weights = Matrix::new(size, size, 0_i64);

        let weight_data: Vec<(usize, usize, i64)> = (0..num_detections)
            .into_par_iter()
            .flat_map_iter(|i| {
                (0..num_tracks).map(move |j| {
                    let iou = iou_matrix[(i, j)];
                    let weight = if iou > iou_threshold {
                        (iou * IOU_SCALE) as i64
                    } else {
                        0
                    };
                    (i, j, weight)
                })
            })
            .collect();

        for (i, j, weight) in weight_data {
            weights[(i, j)] = weight;
        }

        let (_total, raw_assignments) = kuhn_munkres(&weights);

        let assignments: Vec<(usize, usize)> = raw_assignments
            .iter()
            .enumerate()
            .filter(|&(det_idx, &track_idx)| {
                det_idx < num_detections
                    && track_idx < num_tracks
                    && iou_matrix[(det_idx, track_idx)] > iou_threshold
            })
            .map(|(det_idx, &track_idx)| (det_idx, track_idx))
            .collect();

        let mut assigned_detections = vec![false; num_detections];
        let mut assigned_tracks = vec![false; num_tracks];
        let mut total_iou = 0.0;
        for &(d, t) in &assignments {
            assigned_detections[d] = true;
            assigned_tracks[t] = true;
            total_iou += iou_matrix[(d, t)];
        }

        AssignmentResult {
            assignments,
            unassigned_detections: (0..num_detections)
                .filter(|&i| !assigned_detections[i])
                .collect(),
            unassigned_tracks: (0..num_tracks).filter(|&i| !assigned_tracks[i]).collect(),
            total_iou,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_empty_inputs() {
        let m = ndarray::Array2::<f32>::zeros((3, 0));
        let result = HungarianSolver::solve_iou(m.view(), 0.3);
        assert!(result.assignments.is_empty());
        assert_eq!(result.unassigned_detections, vec![0, 1, 2]);
        assert!(result.unassigned_tracks.is_empty());
    }

    #[test]
    fn test_prefers_globally_best_pairs() {
        // Greedy in detection order would give det0 -> track0 (0.6) and leave
        // det1 with nothing above threshold; the optimum is det0 -> track1,
        // det1 -> track0.
        let m = array![[0.6, 0.5], [0.55, 0.0]];
        let result = HungarianSolver::solve_iou(m.view(), 0.3);
        assert_eq!(result.assignments, vec![(0, 1), (1, 0)]);
        assert!(result.unassigned_detections.is_empty());
        assert!(result.unassigned_tracks.is_empty());
        assert_abs_diff_eq!(result.total_iou, 1.05, epsilon = 1e-5);
    }

    #[test]
    fn test_threshold_rejects_weak_pairs() {
        let m = array![[0.2, 0.0, 0.0], [0.0, 0.9, 0.0]];
        let result = HungarianSolver::solve_iou(m.view(), 0.3);
        assert_eq!(result.assignments, vec![(1, 1)]);
        assert_eq!(result.unassigned_detections, vec![0]);
        assert_eq!(result.unassigned_tracks, vec![0, 2]);
    }

    #[test]
    fn test_more_detections_than_tracks() {
        let m = array![[0.1], [0.8], [0.5]];
        let result = HungarianSolver::solve_iou(m.view(), 0.3);
        assert_eq!(result.assignments, vec![(1, 0)]);
        assert_eq!(result.unassigned_detections, vec![0, 2]);
    }
}
