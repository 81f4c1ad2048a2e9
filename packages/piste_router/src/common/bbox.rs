//! Latitude/longitude boxes, used to frame a finished route on a map.

use serde::Serialize;

use crate::common::geometry::Position;

/// Axis aligned box in degrees
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct BBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BBox {
    /// Smallest bounding box containing all of the provided positions, or
    /// None if there aren't any
    pub fn from_positions<'a>(
        positions: impl IntoIterator<Item = &'a Position>,
    ) -> Option<Self> {
        positions.into_iter().fold(None, |bbox, pos| {
            Some(match bbox {
                None => BBox {
                    min_lat: pos.lat,
                    min_lon: pos.lng,
                    max_lat: pos.lat,
                    max_lon: pos.lng,
                },
                Some(b) => BBox {
                    min_lat: b.min_lat.min(pos.lat),
                    min_lon: b.min_lon.min(pos.lng),
                    max_lat: b.max_lat.max(pos.lat),
                    max_lon: b.max_lon.max(pos.lng),
                },
            })
        })
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_from_positions() {
        let positions = vec![
            Position::new(6.8712, 45.9237, 1035.0),
            Position::new(6.9281, 45.8786, 3842.0),
            Position::new(6.8905, 45.9011, 2525.0),
        ];

        let result = BBox::from_positions(&positions).unwrap();

        let target = BBox {
            max_lat: 45.9237,
            max_lon: 6.9281,
            min_lat: 45.8786,
            min_lon: 6.8712,
        };
        assert_eq!(result, target);
        assert!(BBox::from_positions(&Vec::<Position>::new()).is_none());
    }
}
