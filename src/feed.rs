use crate::config::Feed;

use chrono::{DateTime, Utc};
use csv::StringRecord;
use hyper::body::Body;
use hyper::client::connect::Connect;
use hyper::client::Client;
use hyper::header::{HeaderValue, LAST_MODIFIED};
use hyper::{Response, StatusCode, Uri};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    #[error(transparent)]
    Http(#[from] hyper::http::Error),
    #[error("Non-success status code: {0}")]
    NonSuccess(StatusCode),
    #[error("Error while reading feed CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl From<StatusCode> for FeedError {
    fn from(status_code: StatusCode) -> Self {
        FeedError::NonSuccess(status_code)
    }
}

pub struct FetchedFeed {
    pub rows: Vec<StringRecord>,
    pub last_modified: DateTime<Utc>,
}

/// The current time stands in (with a warning) when the server sends no
/// usable `last-modified` header.
pub async fn fetch_feed<C>(client: &Client<C>, feed: &Feed) -> Result<FetchedFeed, FeedError>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let response = fetch_document(client, feed.url.clone()).await?;
    let last_modified = match parse_last_modified(response.headers().get(LAST_MODIFIED)) {
        Some(timestamp) => timestamp,
        None => {
            log::warn!(
                "[{}] no usable last-modified header sent by server, using current time",
                feed.key
            );
            Utc::now()
        }
    };
    let body = hyper::body::to_bytes(response.into_body()).await?;
    let rows = parse_rows(body.as_ref())?;
    Ok(FetchedFeed {
        rows,
        last_modified,
    })
}

async fn fetch_document<C>(client: &Client<C>, mut uri: Uri) -> Result<Response<Body>, FeedError>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    const MAX_ATTEMPTS: usize = 8;
    let mut attempt = 0;
    loop {
        let request = hyper::Request::builder().uri(&uri).body(Body::empty())?;
        let response = client.request(request).await?;

        if response.status().is_success() {
            break Ok(response);
        } else if response.status().is_redirection() {
            uri = response
                .headers()
                .get("Location")
                .ok_or_else(|| response.status())?
                .as_bytes()
                .try_into()
                .map_err(|_| response.status())?;
        } else {
            return Err(response.status().into());
        }

        attempt += 1;
        if attempt == MAX_ATTEMPTS {
            return Err(response.status().into());
        }
    }
}

/// `last-modified` arrives in the RFC1123 form `Tue, 07 May 2024 09:00:00 GMT`,
/// which is inside the RFC2822 grammar chrono parses.
fn parse_last_modified(header: Option<&HeaderValue>) -> Option<DateTime<Utc>> {
    let value = header?.to_str().ok()?;
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

fn parse_rows(document: &[u8]) -> Result<Vec<StringRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .from_reader(document);
    reader.records().collect()
}
