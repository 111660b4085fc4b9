use crate::config::Feed;
use crate::geocode::LocationData;
use crate::geojson::{Feature, FeatureCollection, Geometry, Position, Properties};
use crate::sample::SampleSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const METADATA_FILE: &str = "rfc8805.meta.json";
pub const SAMPLES_FILE: &str = "samples.json";

const MARKER_SIZE: &str = "large";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error(r#"Error while writing "{path}": {error}"#)]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Starlink brands in white on black, so its markers go grey.
fn marker_color(feed_key: &str) -> &'static str {
    match feed_key {
        "starlink" => "#5A5A5A",
        // Viasat blue doubles as the default
        _ => "#009FE3",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetadata {
    pub provider: String,
    pub feed_url: String,
    pub last_modified: String,
    pub visible_countries: Vec<String>,
}

impl FeedMetadata {
    pub fn new(feed: &Feed, last_modified: DateTime<Utc>, samples: &SampleSet) -> Self {
        Self {
            provider: feed.provider.clone(),
            feed_url: feed.url.to_string(),
            last_modified: last_modified.to_rfc3339_opts(SecondsFormat::Secs, true),
            visible_countries: samples.visible_countries(),
        }
    }
}

pub fn countries_document(samples: &SampleSet) -> BTreeMap<&str, Vec<String>> {
    samples
        .by_country
        .iter()
        .map(|(country, addrs)| {
            let addrs = addrs.iter().map(|addr| addr.to_string()).collect();
            (country.as_str(), addrs)
        })
        .collect()
}

/// One feature per country the annotator reported, in country-code order.
pub fn feature_collection(
    feed: &Feed,
    annotated: &[(IpAddr, LocationData)],
    samples: &SampleSet,
) -> FeatureCollection {
    let mut countries: BTreeMap<&str, Vec<&(IpAddr, LocationData)>> = BTreeMap::new();
    for entry in annotated {
        countries
            .entry(entry.1.country_code.as_str())
            .or_default()
            .push(entry);
    }
    let features = countries
        .into_values()
        .map(|entries| feature(feed, &entries, samples))
        .collect();
    FeatureCollection { features }
}

fn feature(feed: &Feed, entries: &[&(IpAddr, LocationData)], samples: &SampleSet) -> Feature {
    let positions: Vec<Position> = entries
        .iter()
        .map(|(_, location)| [location.lng, location.lat])
        .collect();
    let geometry = if let [position] = positions[..] {
        Geometry::Point {
            coordinates: position,
        }
    } else {
        Geometry::MultiPoint {
            coordinates: positions,
        }
    };
    let single = entries.len() == 1;
    let sample_addr = entries[0].0;
    let location = &entries[0].1;
    // the annotator may disagree with the feed about the country, in which
    // case there is no per-country sample list to attach
    let ip_samples = samples
        .by_country
        .get(location.country_code.as_str())
        .map(|addrs| addrs.iter().map(|addr| addr.to_string()).collect());
    Feature {
        geometry,
        properties: Properties {
            country_code: location.country_code.clone(),
            country_name: location.country_name.clone(),
            name: if single {
                location.display_name()
            } else {
                location.country_name.clone()
            },
            marker_color: marker_color(&feed.key).to_owned(),
            marker_size: MARKER_SIZE.to_owned(),
            title: feed.provider.clone(),
            description: format!("Approximate location as advertised by {}", feed.provider),
            ip: single.then(|| sample_addr.to_string()),
            ip_samples,
        },
    }
}

/// Whole-file overwrites under `output_dir/<feed key, lowercased>/`.
pub fn write_feed_outputs<T: Serialize>(
    output_dir: &Path,
    feed_key: &str,
    metadata: &FeedMetadata,
    samples_document: &T,
) -> Result<PathBuf, OutputError> {
    let dir = output_dir.join(feed_key.to_lowercase());
    std::fs::create_dir_all(&dir).map_err(|error| OutputError::Io {
        path: dir.clone(),
        error,
    })?;
    write_json(&dir.join(METADATA_FILE), metadata)?;
    write_json(&dir.join(SAMPLES_FILE), samples_document)?;
    Ok(dir)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let blob = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, blob).map_err(|error| OutputError::Io {
        path: path.to_owned(),
        error,
    })
}
