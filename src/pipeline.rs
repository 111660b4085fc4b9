use crate::config::{Config, Feed, SamplesFormat};
use crate::feed::{fetch_feed, FeedError, FetchedFeed};
use crate::geocode::{GeocodeError, Geocoder, LocationData};
use crate::output::{
    countries_document, feature_collection, write_feed_outputs, FeedMetadata, OutputError,
};
use crate::sample::{collect_samples, SampleSet};

use hyper::body::Body;
use hyper::client::connect::HttpConnector;
use hyper::client::Client;
use hyper_tls::HttpsConnector;
use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// A failing feed (fetch, parse or write) is logged and the remaining feeds
/// still run; an unusable annotator stops the whole run instead.
pub async fn run(config: &Config) -> Result<(), PipelineError> {
    let geocoder = match config.samples {
        SamplesFormat::GeoJson => Some(Geocoder::from_config(&config.api)?),
        SamplesFormat::Countries => None,
    };
    let https = HttpsConnector::new();
    let client = Client::builder().build::<_, Body>(https);
    for feed in &config.feeds {
        log::info!("[{}] fetching {}", feed.key, feed.url);
        match process_feed(config, &client, geocoder.as_ref(), feed).await {
            Ok(()) => {}
            Err(error @ PipelineError::Geocode(_)) => return Err(error),
            Err(error) => log::error!("[{}] skipping feed: {}", feed.key, error),
        }
    }
    Ok(())
}

async fn process_feed(
    config: &Config,
    client: &Client<HttpsConnector<HttpConnector>>,
    geocoder: Option<&Geocoder>,
    feed: &Feed,
) -> Result<(), PipelineError> {
    let FetchedFeed {
        rows,
        last_modified,
    } = fetch_feed(client, feed).await?;
    let samples = collect_samples(&feed.key, &rows, config.samples.grouping());
    log::info!(
        "[{}] kept {} sample locations across {} countries from {} rows",
        feed.key,
        samples.representatives.len(),
        samples.by_country.len(),
        rows.len()
    );
    let metadata = FeedMetadata::new(feed, last_modified, &samples);
    let dir = match geocoder {
        Some(geocoder) => {
            let annotated = annotate(geocoder, &feed.key, &samples).await?;
            let document = feature_collection(feed, &annotated, &samples);
            write_feed_outputs(&config.output_dir, &feed.key, &metadata, &document)?
        }
        None => {
            let document = countries_document(&samples);
            write_feed_outputs(&config.output_dir, &feed.key, &metadata, &document)?
        }
    };
    log::info!("[{}] wrote outputs to {}", feed.key, dir.display());
    Ok(())
}

async fn annotate(
    geocoder: &Geocoder,
    feed_key: &str,
    samples: &SampleSet,
) -> Result<Vec<(IpAddr, LocationData)>, GeocodeError> {
    let mut annotated = Vec::with_capacity(samples.representatives.len());
    for (key, addr) in &samples.representatives {
        log::debug!("[{feed_key}] looking up {key}");
        match geocoder.lookup(*addr).await {
            Ok(lookup) => {
                let location = lookup.location_data;
                log::info!(
                    "[{feed_key}] {addr} resolved to {} ({}, {})",
                    location.display_name(),
                    location.lat,
                    location.lng
                );
                if let Some(satellite) = &lookup.satellite {
                    if !satellite.provider.is_empty() {
                        log::debug!(
                            "[{feed_key}] {addr} served by satellite provider {}",
                            satellite.provider
                        );
                    }
                }
                annotated.push((*addr, location));
            }
            Err(GeocodeError::Response(error)) => {
                log::warn!("[{feed_key}] skipping {addr}: undecodable response: {error}");
            }
            Err(error) => return Err(error),
        }
    }
    Ok(annotated)
}
