//! Screen-space geometry shared by the input normalizer, the axis remapper
//! and target placement.
//!
//! Angles are in degrees. Screen coordinates grow rightwards and downwards,
//! so the raw `atan2` of a screen vector already runs clockwise from the
//! positive x axis. [`vector_angle`] and [`vector_to_pos`] pin the single
//! convention the rest of the workspace uses: 0° points straight up and
//! angles increase clockwise (90° is right, 180° is down).

/// A position in screen pixels (or any other y-down plane).
pub type Point = (f64, f64);

/// Rotation offset that moves 0° from "right" to "up".
pub const UP_ROTATION: f64 = -90.0;

/// Euclidean distance between two points.
pub fn linear_distance(p1: Point, p2: Point) -> f64 {
    (p2.0 - p1.0).hypot(p2.1 - p1.1)
}

/// Angle of the vector `origin -> p`, in `[0, 360)`.
///
/// `rotation` shifts the zero direction; `clockwise` selects the direction in
/// which angles grow on screen.
pub fn angle_between(origin: Point, p: Point, rotation: f64, clockwise: bool) -> f64 {
    let raw = (p.1 - origin.1).atan2(p.0 - origin.0).to_degrees();
    let directed = if clockwise { raw } else { -raw };
    let angle = (directed - rotation).rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if angle >= 360.0 { 0.0 } else { angle }
}

/// Inverse of [`angle_between`]: endpoint of a vector of length `amplitude`
/// leaving `origin` at `angle` under the same rotation convention.
pub fn point_pos(origin: Point, amplitude: f64, angle: f64, rotation: f64, clockwise: bool) -> Point {
    let directed = angle + rotation;
    let theta = if clockwise { directed } else { -directed }.to_radians();
    (
        origin.0 + amplitude * theta.cos(),
        origin.1 + amplitude * theta.sin(),
    )
}

/// Angle of `origin -> p` with 0° up and clockwise increasing.
pub fn vector_angle(origin: Point, p: Point) -> f64 {
    angle_between(origin, p, UP_ROTATION, true)
}

/// Endpoint of a vector with 0° up and clockwise increasing.
pub fn vector_to_pos(origin: Point, amplitude: f64, angle: f64) -> Point {
    point_pos(origin, amplitude, angle, UP_ROTATION, true)
}

/// Pixels subtended by one degree of visual angle at the centre of a screen
/// `screen_width_px` wide and `screen_width_cm` across, viewed from
/// `view_distance_cm`.
pub fn pixels_per_degree(screen_width_px: u32, screen_width_cm: f64, view_distance_cm: f64) -> f64 {
    let px_per_cm = screen_width_px as f64 / screen_width_cm;
    let cm_per_deg = 2.0 * view_distance_cm * (0.5f64).to_radians().tan();
    px_per_cm * cm_per_deg
}

pub fn deg_to_px(deg: f64, px_per_deg: f64) -> f64 {
    deg * px_per_deg
}

pub fn px_to_deg(px: f64, px_per_deg: f64) -> f64 {
    px / px_per_deg
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: Point, b: Point) -> bool {
        (a.0 - b.0).abs() < EPS && (a.1 - b.1).abs() < EPS
    }

    #[test]
    fn zero_degrees_points_up_and_angles_run_clockwise() {
        let c = (100.0, 100.0);
        assert!((vector_angle(c, (100.0, 50.0)) - 0.0).abs() < EPS);
        assert!((vector_angle(c, (150.0, 100.0)) - 90.0).abs() < EPS);
        assert!((vector_angle(c, (100.0, 150.0)) - 180.0).abs() < EPS);
        assert!((vector_angle(c, (50.0, 100.0)) - 270.0).abs() < EPS);
    }

    #[test]
    fn vector_to_pos_uses_the_same_convention() {
        let c = (0.0, 0.0);
        assert!(close(vector_to_pos(c, 10.0, 0.0), (0.0, -10.0)));
        assert!(close(vector_to_pos(c, 10.0, 90.0), (10.0, 0.0)));
        assert!(close(vector_to_pos(c, 10.0, 180.0), (0.0, 10.0)));
        assert!(close(vector_to_pos(c, 10.0, 270.0), (-10.0, 0.0)));
    }

    #[test]
    fn angle_and_position_invert_each_other() {
        let origin = (640.0, 360.0);
        for angle in (0..360).step_by(15) {
            let p = vector_to_pos(origin, 200.0, angle as f64);
            let back = vector_angle(origin, p);
            let diff = (back - angle as f64).abs();
            assert!(diff < 1e-6 || (360.0 - diff) < 1e-6, "{angle} -> {back}");
            assert!((linear_distance(origin, p) - 200.0).abs() < 1e-6);
        }
    }

    #[test]
    fn counter_clockwise_round_trip() {
        let origin = (0.0, 0.0);
        let p = (3.0, -4.0);
        let angle = angle_between(origin, p, 0.0, false);
        assert!(close(point_pos(origin, 5.0, angle, 0.0, false), p));
    }

    #[test]
    fn angle_is_never_360() {
        let a = angle_between((0.0, 0.0), (1.0, -1e-18), 0.0, true);
        assert!((0.0..360.0).contains(&a));
    }

    #[test]
    fn degree_pixel_conversion() {
        assert_eq!(deg_to_px(3.0, 40.0), 120.0);
        assert_eq!(px_to_deg(120.0, 40.0), 3.0);
        // 1920 px over 53 cm at 57 cm: roughly 36 px per degree
        let ppd = pixels_per_degree(1920, 53.0, 57.0);
        assert!((ppd - 36.04).abs() < 0.1, "{ppd}");
    }
}
