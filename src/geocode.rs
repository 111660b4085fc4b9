use crate::config::ApiConfig;

use hyper::body::Body;
use hyper::client::connect::HttpConnector;
use hyper::client::Client;
use hyper::{StatusCode, Uri};
use hyper_tls::HttpsConnector;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Countries whose state reads better as its two-letter abbreviation.
const STATE_CODE_COUNTRIES: [&str; 6] = ["US", "CA", "AU", "NZ", "GB", "CH"];

const API_KEY_HEADER: &str = "Fastah-Key";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("API key environment variable {0} is not set")]
    MissingKey(String),
    #[error(r#"API endpoint "{0}" has no scheme or authority"#)]
    Endpoint(Uri),
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    #[error(transparent)]
    Http(#[from] hyper::http::Error),
    #[error("Non-success status code: {0}")]
    NonSuccess(StatusCode),
    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Undecodable response body: {0}")]
    Response(#[from] serde_json::Error),
}

/// Every failure except [`GeocodeError::Response`] means the API itself is
/// unusable, not just one address, and callers should stop the run.
pub struct Geocoder {
    client: Client<HttpsConnector<HttpConnector>>,
    endpoint: Uri,
    api_key: String,
    timeout: Duration,
}

impl Geocoder {
    pub fn from_config(config: &ApiConfig) -> Result<Self, GeocodeError> {
        if config.endpoint.scheme().is_none() || config.endpoint.authority().is_none() {
            return Err(GeocodeError::Endpoint(config.endpoint.clone()));
        }
        let api_key = std::env::var(&config.key_env)
            .map_err(|_| GeocodeError::MissingKey(config.key_env.clone()))?;
        let https = HttpsConnector::new();
        let client = Client::builder().build::<_, Body>(https);
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            timeout: config.timeout(),
        })
    }

    fn lookup_uri(&self, address: IpAddr) -> Result<Uri, GeocodeError> {
        let (scheme, authority) = match (self.endpoint.scheme(), self.endpoint.authority()) {
            (Some(scheme), Some(authority)) => (scheme.clone(), authority.clone()),
            _ => return Err(GeocodeError::Endpoint(self.endpoint.clone())),
        };
        let address = address.to_string();
        let path = [self.endpoint.path(), address.as_str()].concat();
        Ok(Uri::builder()
            .scheme(scheme)
            .authority(authority)
            .path_and_query(path)
            .build()?)
    }

    pub async fn lookup(&self, address: IpAddr) -> Result<GeoLookup, GeocodeError> {
        let request = hyper::Request::builder()
            .uri(self.lookup_uri(address)?)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .body(Body::empty())?;
        let exchange = async {
            let response = self.client.request(request).await?;
            if !response.status().is_success() {
                return Err(GeocodeError::NonSuccess(response.status()));
            }
            Ok(hyper::body::to_bytes(response.into_body()).await?)
        };
        let body = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| GeocodeError::TimedOut(self.timeout))??;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLookup {
    pub location_data: LocationData,
    pub satellite: Option<Satellite>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    #[serde(default)]
    pub country_name: String,
    #[serde(default)]
    pub country_code: String,
    pub state_name: Option<String>,
    pub state_code: Option<String>,
    pub city_name: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Satellite {
    #[serde(default)]
    pub provider: String,
}

impl LocationData {
    /// "Boston, MA" when city and state are both known and distinct, the
    /// shorter forms otherwise, down to the bare country name.
    pub fn display_name(&self) -> String {
        let city = self.city_name.as_deref().unwrap_or_default().trim();
        let state_name = self.state_name.as_deref().unwrap_or_default().trim();
        let state_code = self.state_code.as_deref().unwrap_or_default().trim();
        let state_label = if STATE_CODE_COUNTRIES.contains(&self.country_code.as_str())
            && !state_code.is_empty()
        {
            state_code
        } else if !state_name.is_empty() {
            state_name
        } else {
            state_code
        };
        match (city.is_empty(), state_label.is_empty()) {
            (false, false) if city != state_name && city != state_label => {
                format!("{city}, {state_label}")
            }
            (false, _) => city.to_owned(),
            (true, false) => {
                let state = if state_name.is_empty() {
                    state_label
                } else {
                    state_name
                };
                state.to_owned()
            }
            (true, true) => self.country_name.clone(),
        }
    }
}
