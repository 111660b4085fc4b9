//! Just enough of the GeoJSON data model (RFC7946) to serialize marker layers.

use serde::Serialize;

/// Longitude-latitude pair, GeoJSON position order.
pub type Position = [f64; 2];

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
}

#[derive(Debug, Clone, Serialize)]
pub struct Properties {
    #[serde(rename = "cciso2")]
    pub country_code: String,
    #[serde(rename = "countryName")]
    pub country_name: String,
    pub name: String,
    #[serde(rename = "marker-color")]
    pub marker_color: String,
    #[serde(rename = "marker-size")]
    pub marker_size: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Every sample address the feed advertised for this country.
    #[serde(rename = "ip-samples", skip_serializing_if = "Option::is_none")]
    pub ip_samples: Option<Vec<String>>,
}
