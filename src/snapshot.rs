//! Builds immutable pose snapshots from raw detector output.

use crate::detection::{RawDetection, RawFace};
use crate::types::{ExpressionWeights, PoseSnapshot};
use std::time::Duration;

/// Normalize a frame's raw detection into a snapshot.
///
/// Returns `None` (not an error) when no face with landmarks was detected.
/// Expression weights are copied as reported; clamping is left to the
/// smoothing stage.
#[must_use]
pub fn build_snapshot(raw: Option<&RawDetection>, timestamp: Duration) -> Option<PoseSnapshot> {
    let face = raw?.faces.first()?;
    snapshot_from_face(face, timestamp)
}

/// Snapshot for a single detected face
#[must_use]
pub fn snapshot_from_face(face: &RawFace, timestamp: Duration) -> Option<PoseSnapshot> {
    if face.landmarks.is_empty() {
        return None;
    }

    let transform = face.transform.as_ref().and_then(|m| m.to_canonical());

    let expressions = face.expressions.as_ref().map(|categories| {
        let mut weights = ExpressionWeights::new();
        for category in categories {
            weights.entry(category.name.clone()).or_insert(category.score);
        }
        weights
    });

    Some(PoseSnapshot::new(face.landmarks.clone(), transform, expressions, timestamp))
}
