use itertools::Itertools;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two coordinates.
pub fn haversine_distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Sum of the distances between consecutive points, 0 for less than 2 points.
pub fn path_distance_km<I>(points: I) -> f64
where
    I: IntoIterator,
    I::Item: Into<Coordinate>,
{
    points
        .into_iter()
        .map(Into::<Coordinate>::into)
        .tuple_windows()
        .map(|(a, b): (Coordinate, Coordinate)| haversine_distance_km(&a, &b))
        .sum()
}

impl From<&Coordinate> for Coordinate {
    fn from(coordinate: &Coordinate) -> Self {
        *coordinate
    }
}

impl From<&crate::geo_sample::GeoSample> for Coordinate {
    fn from(sample: &crate::geo_sample::GeoSample) -> Self {
        sample.coordinate()
    }
}
