//! Kernel semantics checked against the CPU reference implementation
//!
//! These tests pin down the behavioral contract of the six passes: the
//! luminance formula and its fixed point, the inverted gradient map, the
//! no-op guarantee on uniform neighborhoods, the asymmetry between the
//! keep-largest sharpen and the early-exit refine, alpha restoration, and a
//! small end-to-end checkerboard scenario.

mod common;

use common::*;

const EPS: f32 = 1e-5;

fn assert_rgb_eq(actual: [f32; 4], expected: [f32; 3], context: &str) {
    for i in 0..3 {
        assert!((actual[i] - expected[i]).abs() < EPS, "{context}: channel {i} was {} instead of {}", actual[i], expected[i]);
    }
}

#[test]
fn test_luminance_formula() {
    let image = RefImage::filled(2, 2, [0.3, 0.6, 0.9, 1.0]);
    let lum = luminance(&image);

    let expected = (0.3f32 + 0.3 + 0.6 + 0.6 + 0.6 + 0.9) / 6.0;
    for px in &lum.pixels {
        assert!((px[0] - expected).abs() < EPS);
        assert_eq!(px[0], px[1]);
        assert_eq!(px[0], px[2]);
        assert_eq!(px[0], px[3]);
    }
}

#[test]
fn test_luminance_is_idempotent_on_uniform_channels() {
    // A buffer whose channels are already equal maps to itself.
    let image = RefImage::filled(3, 3, [0.42, 0.42, 0.42, 0.42]);
    let once = luminance(&image);
    let twice = luminance(&once);

    assert_eq!(once, twice);
    assert!((once.at(1, 1)[0] - 0.42).abs() < EPS);
}

#[test]
fn test_gradient_is_one_on_flat_regions() {
    let color = RefImage::filled(5, 5, [0.5, 0.5, 0.5, 1.0]);
    let signal = luminance(&color);
    let grad = gradient(&color, &signal);

    for px in &grad.pixels {
        assert_eq!(*px, [1.0; 4]);
    }
}

#[test]
fn test_sharpen_is_noop_on_uniform_neighborhood() {
    let color = RefImage::filled(4, 4, [0.3, 0.5, 0.7, 1.0]);
    let signal = luminance(&color);

    for strength in [0.1, 0.5, 1.0] {
        let pushed = sharpen(&color, &signal, strength);
        for y in 0..4 {
            for x in 0..4 {
                assert_rgb_eq(pushed.at(x, y), [0.3, 0.5, 0.7], "sharpen on uniform input");
            }
        }
    }
}

#[test]
fn test_refine_is_noop_on_uniform_neighborhood() {
    let color = RefImage::filled(4, 4, [0.3, 0.5, 0.7, 1.0]);
    let signal = RefImage::filled(4, 4, [0.9, 0.9, 0.9, 0.9]);

    for strength in [0.1, 0.5, 1.0] {
        let refined = refine(&color, &signal, strength);
        for y in 0..4 {
            for x in 0..4 {
                assert_rgb_eq(refined.at(x, y), [0.3, 0.5, 0.7], "refine on uniform input");
            }
        }
    }
}

/// Builds the 3x3 fixture shared by the asymmetry tests. Colors are gray
/// levels equal to their signal value; hypothesis 1 (top row light) and
/// hypothesis 2 (upper-right wedge light) both fire at the center.
fn two_hypothesis_fixture() -> (RefImage, RefImage) {
    let lums = [
        [0.6, 0.6, 0.7], // tl t tr
        [0.05, 0.1, 0.9], // l cc r
        [0.05, 0.05, 0.05], // bl b br
    ];
    let mut pixels = Vec::new();
    for row in lums {
        for v in row {
            pixels.push([v, v, v, 1.0]);
        }
    }
    let color = RefImage::from_pixels(3, 3, pixels);
    let signal_pixels = color.pixels.iter().map(|px| [px[0]; 4]).collect();
    let signal = RefImage::from_pixels(3, 3, signal_pixels);
    (color, signal)
}

#[test]
fn test_sharpen_keeps_largest_candidate() {
    let (color, signal) = two_hypothesis_fixture();
    let strength = 0.5;

    // Hypothesis 1 candidate averages (tl, t, tr); hypothesis 2 averages
    // (r, t, tr) which is strictly lighter, so it must win.
    let hypothesis2 = 0.1 * (1.0 - strength) + (0.9f32 + 0.6 + 0.7) / 3.0 * strength;
    let pushed = sharpen(&color, &signal, strength);
    assert_rgb_eq(pushed.at(1, 1), [hypothesis2; 3], "keep-largest selection");
}

#[test]
fn test_refine_takes_first_firing_hypothesis() {
    let (color, signal) = two_hypothesis_fixture();
    let strength = 0.5;

    // Same fixture, but the refine pass stops at hypothesis 1 even though
    // hypothesis 2 would produce a lighter result.
    let hypothesis1 = 0.1 * (1.0 - strength) + (0.6f32 + 0.6 + 0.7) / 3.0 * strength;
    let refined = refine(&color, &signal, strength);
    assert_rgb_eq(refined.at(1, 1), [hypothesis1; 3], "early-exit selection");
}

#[test]
fn test_sharpen_breaks_ties_in_evaluation_order() {
    // Two firing hypotheses with identical blended luminance but different
    // colors: the strictly-greater replacement keeps the earlier candidate.
    let lum_rows = [
        [0.6, 0.6, 0.6], // tl t tr
        [0.05, 0.1, 0.6], // l cc r
        [0.05, 0.05, 0.05], // bl b br
    ];
    let reddish = [0.8, 0.1, 0.1];
    let bluish = [0.1, 0.1, 0.8];
    let mut pixels = Vec::new();
    for (y, row) in lum_rows.iter().enumerate() {
        for (x, lum) in row.iter().enumerate() {
            let rgb = if y == 0 { reddish } else if y == 1 && x == 2 { bluish } else { [*lum; 3] };
            pixels.push([rgb[0], rgb[1], rgb[2], *lum]);
        }
    }
    let color = RefImage::from_pixels(3, 3, pixels);
    let signal_pixels = color.pixels.iter().map(|px| [px[3]; 4]).collect();
    let signal = RefImage::from_pixels(3, 3, signal_pixels);

    let strength = 0.5;
    let pushed = sharpen(&color, &signal, strength);

    // Hypothesis 1 blends toward the reddish top row, hypothesis 2 toward a
    // mixed triple containing the bluish right neighbor. Equal luminance
    // means hypothesis 1's candidate survives.
    let expected_red = 0.1 * (1.0 - strength) + 0.8 * strength;
    let got = pushed.at(1, 1);
    assert!((got[0] - expected_red).abs() < EPS, "tie was not broken toward the first hypothesis: red channel {}", got[0]);
}

#[test]
fn test_composite_restores_original_alpha() {
    let refined = RefImage::filled(4, 4, [0.6, 0.4, 0.2, 0.123]);
    let original = RefImage::filled(2, 2, [0.9, 0.9, 0.9, 0.25]);

    let out = composite(&refined, &original);
    for y in 0..4 {
        for x in 0..4 {
            let px = out.at(x, y);
            assert_rgb_eq(px, [0.6, 0.4, 0.2], "composite rgb passthrough");
            assert!((px[3] - 0.25).abs() < EPS, "alpha was {} instead of the original 0.25", px[3]);
        }
    }
}

#[test]
fn test_sharpen_at_full_strength_replaces_center_with_triple_average() {
    let (color, signal) = two_hypothesis_fixture();
    let pushed = sharpen(&color, &signal, 1.0);

    let expected = (0.9f32 + 0.6 + 0.7) / 3.0;
    assert_rgb_eq(pushed.at(1, 1), [expected; 3], "full-strength blend");
}

#[test]
fn test_upscale_preserves_flat_images() {
    let flat = RefImage::filled(4, 4, [0.25, 0.5, 0.75, 1.0]);
    let scaled = upscale(&flat, 8, 8);

    assert_eq!((scaled.width, scaled.height), (8, 8));
    for px in &scaled.pixels {
        assert_rgb_eq(*px, [0.25, 0.5, 0.75], "bilinear on flat input");
    }
}

#[test]
fn test_checkerboard_end_to_end() {
    // Native 4x4 checkerboard, scale 2.0, bold 6.0, blur 2.0.
    let input = checkerboard_4x4();
    let scaled = upscale(&input, 8, 8);
    let lum_scaled = luminance(&scaled);

    let sharpen_strength = (2.0f32 / 6.0).min(1.0);
    let pushed = sharpen(&scaled, &lum_scaled, sharpen_strength);
    let lum_pushed = luminance(&pushed);
    let grad = gradient(&pushed, &lum_pushed);

    let refine_strength = (2.0f32 / 2.0).min(1.0);
    let refined = refine(&pushed, &grad, refine_strength);
    let out = composite(&refined, &input);

    assert_eq!((out.width, out.height), (8, 8));

    // Flat tile interiors pass through the directional passes unchanged.
    for (x, y, tile) in [(1, 1, 0.2), (6, 1, 0.8), (1, 6, 0.8), (6, 6, 0.2)] {
        assert_rgb_eq(out.at(x, y), [tile; 3], "tile interior");
        assert_rgb_eq(scaled.at(x, y), [tile; 3], "scaled tile interior");
    }

    // Pixels straddling a tile boundary see a measurable luminance step.
    assert!(grad.at(3, 1)[0] < 1.0, "gradient at a vertical boundary was {}", grad.at(3, 1)[0]);
    assert!(grad.at(1, 3)[0] < 1.0, "gradient at a horizontal boundary was {}", grad.at(1, 3)[0]);

    // The source frame was fully opaque; the composite restores that.
    for px in &out.pixels {
        assert!((px[3] - 1.0).abs() < EPS);
    }
}
