//! Convex hull of the aligned landmarks, rasterized into a face mask.

use ndarray::Array2;

/// Andrew's monotone chain. Returns hull vertices counter-clockwise (in
/// y-up terms), without repeating the first point. Collinear points are
/// dropped.
pub fn convex_hull(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    pts.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// True when `p` lies inside or on the boundary of the convex polygon.
pub fn contains(hull: &[(f64, f64)], p: (f64, f64)) -> bool {
    if hull.len() < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..hull.len() {
        let c = cross(hull[i], hull[(i + 1) % hull.len()], p);
        if c.abs() < 1e-9 {
            continue;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    true
}

/// `(height, width)` mask, true for pixels whose center `(col, row)` falls
/// inside the hull of `points`.
pub fn hull_mask(points: &[(f64, f64)], width: usize, height: usize) -> Array2<bool> {
    let hull = convex_hull(points);
    Array2::from_shape_fn((height, width), |(r, c)| contains(&hull, (c as f64, r as f64)))
}
