use geo_types::Point;
use std::str::FromStr;
use wkt::{ToWkt, Wkt};

use crate::gtfs::table::Value;
use crate::store::error::{Error, InsertError};

/// Builds a point from a longitude/latitude pair of cells.
///
/// Both cells must hold a finite number, or text that parses as one.
pub fn point_from_xy(x: &Value, y: &Value) -> Result<Point<f64>, InsertError> {
    let coord = |v: &Value, axis: &str| {
        v.as_f64()
            .filter(|c| c.is_finite())
            .ok_or_else(|| InsertError::Geometry(format!("{axis} '{v}' is not a number")))
    };
    Ok(Point::new(coord(x, "x")?, coord(y, "y")?))
}

pub fn to_wkt(point: &Point<f64>) -> String {
    point.wkt_string()
}

pub fn point_from_wkt(wkt_str: &str) -> Result<Point<f64>, Error> {
    let wkt = Wkt::<f64>::from_str(wkt_str).map_err(|e| Error::Geometry(e.to_string()))?;
    Point::try_from(wkt).map_err(|e| Error::Geometry(e.to_string()))
}
