//! Pure Rust IoU-based tracking library
//!
//! Links per-frame detections into persistent tracks using box overlap only.
//! Tracks are born on an unmatched detection, become visible once they have
//! been matched `min_hits` times, age on every frame they miss, and are
//! dropped once they miss more than `max_age` consecutive frames.
//!
//! ```rust,ignore
//! use ioutrack::{Bbox, Detection, IouMultiTracker};
//!
//! let mut tracker = IouMultiTracker::new(30, 3, 0.3);
//! let frame = vec![Detection::new(Bbox::new(10.0, 10.0, 50.0, 50.0), 0.9, 0, "can")];
//! let confirmed = tracker.update(&frame);
//! ```

pub mod bbox;
pub mod detection;
pub mod hungarian; // Hungarian algorithm for optimal assignment
pub mod track;
pub mod trackers;

pub use bbox::{calculate_iou, Bbox};
pub use detection::Detection;
pub use hungarian::{AssignmentResult, HungarianSolver};
pub use track::{Track, TrackSnapshot, TrackState};
pub use trackers::{Association, IouMultiTracker};
