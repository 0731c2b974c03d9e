//! Face box derivation tests

mod test_helpers;

use face_overlay::face_box::{derive_face_box, BoxPadding, LandmarkExtent};
use face_overlay::types::{FrameSize, LandmarkPoint};
use proptest::prelude::*;
use test_helpers::face_mesh;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn test_full_mesh_mask_profile() {
    let mesh = face_mesh(0.1, 0.9);
    assert_eq!(mesh.len(), face_overlay::constants::NUM_FACE_MESH_LANDMARKS);

    let b = derive_face_box(&mesh, FrameSize::new(640, 480), BoxPadding::MASK, false).unwrap();
    assert!(approx(b.x, 12.8), "x = {}", b.x);
    assert!(approx(b.y, 1.92), "y = {}", b.y);
    assert!(approx(b.width, 614.4), "width = {}", b.width);
    assert!(approx(b.height, 537.6), "height = {}", b.height);
}

#[test]
fn test_corner_landmarks_define_extent() {
    // Centre-clustered mesh; only the four corners reach the extent
    let mut mesh = vec![LandmarkPoint::new(0.5, 0.5); 468];
    mesh[0] = LandmarkPoint::new(0.1, 0.1);
    mesh[1] = LandmarkPoint::new(0.9, 0.1);
    mesh[2] = LandmarkPoint::new(0.1, 0.9);
    mesh[3] = LandmarkPoint::new(0.9, 0.9);

    let padding = BoxPadding {
        pad_x: 0.2,
        pad_y: 0.4,
        y_shift: 0.3,
    };
    assert_eq!(padding, BoxPadding::MASK);

    let b = derive_face_box(&mesh, FrameSize::new(640, 480), padding, false).unwrap();
    assert!(approx(b.x, 12.8), "x = {}", b.x);
    assert!(approx(b.y, 1.92), "y = {}", b.y);
    assert!(approx(b.width, 614.4), "width = {}", b.width);
    assert!(approx(b.height, 537.6), "height = {}", b.height);
}

#[test]
fn test_avatar_profile_is_wider_and_higher() {
    let mesh = face_mesh(0.3, 0.6);
    let frame = FrameSize::new(1280, 720);
    let mask = derive_face_box(&mesh, frame, BoxPadding::MASK, false).unwrap();
    let avatar = derive_face_box(&mesh, frame, BoxPadding::AVATAR, false).unwrap();
    assert!(avatar.width > mask.width);
    assert!(avatar.height > mask.height);
    assert!(avatar.y < mask.y);
}

#[test]
fn test_mirror_on_symmetric_mesh_is_identity() {
    let mesh = face_mesh(0.2, 0.8);
    let frame = FrameSize::new(640, 480);
    let plain = derive_face_box(&mesh, frame, BoxPadding::MASK, false).unwrap();
    let mirrored = derive_face_box(&mesh, frame, BoxPadding::MASK, true).unwrap();
    assert!(approx(plain.x, mirrored.x));
    assert!(approx(plain.width, mirrored.width));
}

#[test]
fn test_extent_order_independent() {
    let mut mesh = face_mesh(0.25, 0.75);
    let forward = LandmarkExtent::scan(&mesh).unwrap();
    mesh.reverse();
    assert_eq!(LandmarkExtent::scan(&mesh).unwrap(), forward);
}

fn landmark() -> impl Strategy<Value = LandmarkPoint> {
    (0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(x, y)| LandmarkPoint::new(x, y))
}

proptest! {
    #[test]
    fn prop_unpadded_box_bounds_every_landmark(
        points in prop::collection::vec(landmark(), 1..100),
        width in 1u32..4000,
        height in 1u32..4000,
    ) {
        let b = derive_face_box(&points, FrameSize::new(width, height), BoxPadding::NONE, false).unwrap();
        let tol = 1e-2;
        for p in &points {
            let (px, py) = (p.x * width as f32, p.y * height as f32);
            prop_assert!(px >= b.x - tol && px <= b.right() + tol);
            prop_assert!(py >= b.y - tol && py <= b.bottom() + tol);
        }
    }

    #[test]
    fn prop_mirror_flag_matches_mirrored_landmarks(
        points in prop::collection::vec(landmark(), 1..100),
        width in 1u32..4000,
        height in 1u32..4000,
    ) {
        let frame = FrameSize::new(width, height);
        let flagged = derive_face_box(&points, frame, BoxPadding::AVATAR, true).unwrap();
        let reflected: Vec<_> = points.iter().map(LandmarkPoint::mirrored).collect();
        let direct = derive_face_box(&reflected, frame, BoxPadding::AVATAR, false).unwrap();
        let tol = 1e-2 * width.max(height) as f32 / 100.0 + 1e-2;
        prop_assert!((flagged.x - direct.x).abs() < tol);
        prop_assert!((flagged.width - direct.width).abs() < tol);
        prop_assert!((flagged.y - direct.y).abs() < tol);
    }

    #[test]
    fn prop_padding_grows_box(
        points in prop::collection::vec(landmark(), 2..50),
        pad_x in 0.0f32..2.0,
        pad_y in 0.0f32..2.0,
        y_shift in 0.0f32..=1.0,
    ) {
        let frame = FrameSize::new(640, 480);
        let tight = derive_face_box(&points, frame, BoxPadding::NONE, false).unwrap();
        let padded = derive_face_box(&points, frame, BoxPadding { pad_x, pad_y, y_shift }, false).unwrap();
        prop_assert!(padded.width >= tight.width);
        prop_assert!(padded.height >= tight.height);
        prop_assert!(padded.y <= tight.y + 1e-3);
        prop_assert!(padded.bottom() >= tight.bottom() - 1e-3);
    }
}
