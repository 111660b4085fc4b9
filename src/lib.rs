pub mod config;
pub mod feed;
pub mod geocode;
pub mod geojson;
pub mod output;
pub mod pipeline;
pub mod prefix;
pub mod sample;
