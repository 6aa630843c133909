//! End-to-end pipeline tests on synthetic imagery.

use image::{GrayImage, Luma};

use coinscan::core::{CoinFace, LineValue, RectF};
use coinscan::detect::DetectedRegion;
use coinscan::{calibrate_profile, classify_regions, detect_coins, matcher_for};

/// Light background with six dark disks in a vertical column, each with a
/// light square hole at its center.
fn six_coin_photo() -> GrayImage {
    let mut img = GrayImage::from_pixel(480, 640, Luma([225]));
    for i in 0..6 {
        draw_coin(&mut img, 240.0, 80.0 + 96.0 * i as f32, 34.0);
    }
    img
}

fn draw_coin(img: &mut GrayImage, cx: f32, cy: f32, radius: f32) {
    for y in 0..img.height() {
        for x in 0..img.width() {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if (dx * dx + dy * dy).sqrt() <= radius {
                img.put_pixel(x, y, Luma([45]));
            }
        }
    }
    for y in (cy as u32 - 9)..=(cy as u32 + 9) {
        for x in (cx as u32 - 9)..=(cx as u32 + 9) {
            img.put_pixel(x, y, Luma([225]));
        }
    }
}

/// Rotation-invariant face texture: a dark disk with its edge at the given
/// radius fraction.
fn face_texture(side: u32, radius_frac: f32) -> GrayImage {
    let c = (side as f32 - 1.0) / 2.0;
    GrayImage::from_fn(side, side, |x, y| {
        let r = (x as f32 - c).hypot(y as f32 - c) / side as f32;
        if r < radius_frac {
            Luma([60])
        } else {
            Luma([210])
        }
    })
}

const FRONT_RADIUS: f32 = 0.20;
const BACK_RADIUS: f32 = 0.42;

fn region_at(position: u8, patch: GrayImage) -> DetectedRegion {
    let rect = RectF::new(0.0, position as f32 * 100.0, 96.0, 96.0);
    DetectedRegion {
        image: patch,
        masked: None,
        position,
        rect_px: rect,
        rect_norm: rect.normalized(480, 640),
    }
}

#[test]
fn detect_returns_six_distinct_ordered_positions() {
    let regions = detect_coins(&six_coin_photo()).expect("detection succeeds");
    assert_eq!(regions.len(), 6);

    let positions: Vec<u8> = regions.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![6, 5, 4, 3, 2, 1]);

    for pair in regions.windows(2) {
        assert!(pair[0].rect_px.center().y < pair[1].rect_px.center().y);
    }
}

#[test]
fn calibration_always_respects_the_floors() {
    let front: Vec<GrayImage> = (0..3).map(|i| face_texture(96 + 2 * i, FRONT_RADIUS)).collect();
    let back: Vec<GrayImage> = (0..3).map(|i| face_texture(96 + 2 * i, BACK_RADIUS)).collect();
    let calibrated = calibrate_profile(&front, &back).expect("calibration succeeds");
    assert!(calibrated.descriptor_calibration.min_gap >= 0.03);
    assert!(calibrated.descriptor_calibration.min_score >= 0.55);

    // Nearly identical faces: the floors still hold.
    let near_front: Vec<GrayImage> = (0..3).map(|_| face_texture(96, 0.30)).collect();
    let near_back: Vec<GrayImage> = (0..3).map(|_| face_texture(97, 0.30)).collect();
    let merged = calibrate_profile(&near_front, &near_back).expect("calibration succeeds");
    assert!(merged.descriptor_calibration.min_gap >= 0.03);
    assert!(merged.descriptor_calibration.min_score >= 0.55);
}

#[test]
fn end_to_end_classification_matches_every_face() {
    let front: Vec<GrayImage> = (0..3).map(|i| face_texture(96 + 2 * i, FRONT_RADIUS)).collect();
    let back: Vec<GrayImage> = (0..3).map(|i| face_texture(96 + 2 * i, BACK_RADIUS)).collect();
    let matcher = matcher_for(calibrate_profile(&front, &back).expect("calibration"));

    // Alternate faces bottom-to-top: positions 1, 3, 5 front; 2, 4, 6 back.
    let regions: Vec<DetectedRegion> = (1..=6u8)
        .map(|position| {
            let radius = if position % 2 == 1 {
                FRONT_RADIUS
            } else {
                BACK_RADIUS
            };
            region_at(position, face_texture(100, radius))
        })
        .collect();

    let reading = classify_regions(&regions, &matcher).expect("full reading");
    for result in reading.results() {
        assert!(
            result.face.is_decisive(),
            "slot {} is {:?}",
            result.position,
            result.face
        );
        let expected = if result.position % 2 == 1 {
            CoinFace::Front
        } else {
            CoinFace::Back
        };
        assert_eq!(result.face, expected, "slot {}", result.position);
        let expected_line = if expected == CoinFace::Front {
            LineValue::Yin
        } else {
            LineValue::Yang
        };
        assert_eq!(result.line, expected_line);
    }
}

#[test]
fn classification_is_idempotent() {
    let front: Vec<GrayImage> = (0..3).map(|i| face_texture(96 + 2 * i, FRONT_RADIUS)).collect();
    let back: Vec<GrayImage> = (0..3).map(|i| face_texture(96 + 2 * i, BACK_RADIUS)).collect();
    let matcher = matcher_for(calibrate_profile(&front, &back).expect("calibration"));

    let regions: Vec<DetectedRegion> = (1..=6u8)
        .map(|position| region_at(position, face_texture(100, FRONT_RADIUS)))
        .collect();

    let first = classify_regions(&regions, &matcher).expect("reading");
    let second = classify_regions(&regions, &matcher).expect("reading");
    assert_eq!(first, second);
}

/// Rotation-tolerant contrast class with no circular structure at all.
fn checker_texture(side: u32, cell: u32) -> GrayImage {
    GrayImage::from_fn(side, side, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Luma([60])
        } else {
            Luma([210])
        }
    })
}

#[test]
fn detect_then_classify_a_full_photo() {
    // The synthetic photo's coins all look alike; calibrate on crops of the
    // same pattern as "front" and a distinct texture as "back", then expect
    // six decisive front results.
    let photo = six_coin_photo();
    let regions = detect_coins(&photo).expect("detection succeeds");

    let front: Vec<GrayImage> = regions.iter().take(3).map(|r| r.image.clone()).collect();
    let back: Vec<GrayImage> = (0..3).map(|i| checker_texture(96, 8 + i)).collect();
    let matcher = matcher_for(calibrate_profile(&front, &back).expect("calibration"));

    let reading = classify_regions(&regions, &matcher).expect("full reading");
    let decisive_front = reading
        .results()
        .iter()
        .filter(|r| r.face == CoinFace::Front)
        .count();
    assert_eq!(decisive_front, 6, "results: {:?}", reading.results());
}
