use nalgebra as na;

use crate::{LabeledPoint, P2};

/// Squared distance between a query position and a labeled point
pub(crate) fn dist_sq<T: LabeledPoint>(query: &P2, item: &T) -> f64 {
    na::distance_squared(query, &item.point())
}

/// Squared distance from `query` to `best`, with a missing best treated as
/// infinitely far away
pub(crate) fn dist_sq_or_inf<T: LabeledPoint>(query: &P2, best: Option<&T>) -> f64 {
    best.map_or(f64::INFINITY, |b| dist_sq(query, b))
}

#[cfg(test)]
pub(crate) mod tests {
    use nalgebra::point;

    use crate::{shapes::Rect, Airport};

    use super::*;

    pub(crate) fn make_rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Rect {
        Rect::new(point![x1, y1], point![x2, y2])
    }

    pub(crate) fn make_airport(code: &str, x: f64, y: f64) -> Airport {
        Airport::new(code, format!("{code}-city"), x, y)
    }

    #[test]
    fn test_dist_sq() {
        let a = make_airport("A", 10.0, 10.0);
        assert_eq!(dist_sq(&point![20.0, 20.0], &a), 200.0);
        assert_eq!(dist_sq(&point![10.0, 10.0], &a), 0.0);
    }

    #[test]
    fn test_dist_sq_or_inf() {
        let a = make_airport("A", 0.0, 0.0);
        assert_eq!(
            dist_sq_or_inf(&point![3.0, 4.0], Some(&a)),
            25.0,
            "Known best gives its squared distance"
        );
        assert_eq!(
            dist_sq_or_inf::<Airport>(&point![3.0, 4.0], None),
            f64::INFINITY,
            "Missing best is infinitely far"
        );
    }
}
