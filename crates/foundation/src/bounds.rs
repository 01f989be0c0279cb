use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geographic bounding box in WGS84 degrees.
///
/// `min` and `max` are `[lon, lat]` pairs. The wire order is
/// `minLon,minLat,maxLon,maxLat`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    #[error("expected 4 values: minLon,minLat,maxLon,maxLat")]
    WrongArity,
    #[error("value {0} is not a valid number")]
    NotANumber(usize),
    #[error("coordinates must be finite")]
    NonFinite,
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("min corner ({min_lon}, {min_lat}) exceeds max corner ({max_lon}, {max_lat})")]
    Inverted {
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    },
}

impl GeoBounds {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        GeoBounds {
            min: [min_lon, min_lat],
            max: [max_lon, max_lat],
        }
    }

    pub fn min_lon(&self) -> f64 {
        self.min[0]
    }

    pub fn min_lat(&self) -> f64 {
        self.min[1]
    }

    pub fn max_lon(&self) -> f64 {
        self.max[0]
    }

    pub fn max_lat(&self) -> f64 {
        self.max[1]
    }

    pub fn validate(&self) -> Result<(), BoundsError> {
        let all = [self.min[0], self.min[1], self.max[0], self.max[1]];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(BoundsError::NonFinite);
        }
        for lon in [self.min[0], self.max[0]] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(BoundsError::LongitudeOutOfRange(lon));
            }
        }
        for lat in [self.min[1], self.max[1]] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(BoundsError::LatitudeOutOfRange(lat));
            }
        }
        if self.min[0] > self.max[0] || self.min[1] > self.max[1] {
            return Err(BoundsError::Inverted {
                min_lon: self.min[0],
                min_lat: self.min[1],
                max_lon: self.max[0],
                max_lat: self.max[1],
            });
        }
        Ok(())
    }
}

impl fmt::Display for GeoBounds {
    /// Query-string form: `minLon,minLat,maxLon,maxLat`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min[0], self.min[1], self.max[0], self.max[1]
        )
    }
}

impl FromStr for GeoBounds {
    type Err = BoundsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(BoundsError::WrongArity);
        }

        let mut vals = [0.0f64; 4];
        for (i, part) in parts.iter().enumerate() {
            vals[i] = part
                .trim()
                .parse()
                .map_err(|_| BoundsError::NotANumber(i + 1))?;
        }

        let bounds = Self::new(vals[0], vals[1], vals[2], vals[3]);
        bounds.validate()?;
        Ok(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundsError, GeoBounds};

    #[test]
    fn display_is_query_order() {
        let b = GeoBounds::new(-10.5, 20.0, 30.0, 40.25);
        assert_eq!(b.to_string(), "-10.5,20,30,40.25");
    }

    #[test]
    fn parses_and_round_trips_through_display() {
        let b: GeoBounds = " -10.5, 20 ,30,40.25".parse().unwrap();
        assert_eq!(b, GeoBounds::new(-10.5, 20.0, 30.0, 40.25));
        assert_eq!(b.to_string().parse::<GeoBounds>().unwrap(), b);
    }

    #[test]
    fn rejects_wrong_arity_and_garbage() {
        assert_eq!("1,2,3".parse::<GeoBounds>(), Err(BoundsError::WrongArity));
        assert_eq!(
            "1,2,x,4".parse::<GeoBounds>(),
            Err(BoundsError::NotANumber(3))
        );
    }

    #[test]
    fn validate_catches_inverted_and_out_of_range() {
        assert!(matches!(
            GeoBounds::new(10.0, 0.0, -10.0, 5.0).validate(),
            Err(BoundsError::Inverted { .. })
        ));
        assert_eq!(
            GeoBounds::new(-181.0, 0.0, 0.0, 5.0).validate(),
            Err(BoundsError::LongitudeOutOfRange(-181.0))
        );
        assert_eq!(
            GeoBounds::new(0.0, 0.0, 1.0, 95.0).validate(),
            Err(BoundsError::LatitudeOutOfRange(95.0))
        );
        assert_eq!(
            GeoBounds::new(f64::NAN, 0.0, 1.0, 1.0).validate(),
            Err(BoundsError::NonFinite)
        );
        assert!(GeoBounds::new(-180.0, -90.0, 180.0, 90.0).validate().is_ok());
    }
}
