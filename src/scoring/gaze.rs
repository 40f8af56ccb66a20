use crate::detector::{Landmarks, Point};

/// Gaze score used when no usable landmarks are available.
pub const DEFAULT_GAZE_SCORE: f64 = 50.0;
/// Points lost per pixel of horizontal eye/nose misalignment.
pub const MISALIGNMENT_PENALTY: f64 = 2.0;

/// Estimate how directly the face is turned to the camera.
///
/// Averages the two eye centroids and compares the result against the middle
/// nose point; the smaller the horizontal offset, the higher the score.
pub fn gaze_score(landmarks: Option<&Landmarks>) -> f64 {
    let Some(landmarks) = landmarks else {
        return DEFAULT_GAZE_SCORE;
    };
    let (Some(left), Some(right)) = (centroid(&landmarks.left_eye), centroid(&landmarks.right_eye))
    else {
        return DEFAULT_GAZE_SCORE;
    };
    let Some(nose) = landmarks.nose.get(landmarks.nose.len() / 2) else {
        return DEFAULT_GAZE_SCORE;
    };

    let eye_center_x = (left.x + right.x) / 2.0;
    let misalignment = (eye_center_x - nose.x).abs();
    (100.0 - misalignment * MISALIGNMENT_PENALTY).clamp(0.0, 100.0)
}

fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let count = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), point| (x + point.x, y + point.y));
    Some(Point::new(sum_x / count, sum_y / count))
}
