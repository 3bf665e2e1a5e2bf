//! REST-backed implementations of the listing, tour and geolocation services.

use std::time::Duration;

use foundation::LngLat;
use serde::Deserialize;
use tracing::debug;

use crate::filter::ListingFilter;
use crate::property::{PropertyId, PropertyPage};
use crate::service::{
    BoxFuture, GeolocationProvider, ListingService, ServiceError, TourLink, TourService,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

fn map_reqwest_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout
    } else if err.is_decode() {
        ServiceError::Malformed(err.to_string())
    } else {
        ServiceError::Network(err.to_string())
    }
}

async fn get_json<T>(request: reqwest::RequestBuilder) -> Result<T, ServiceError>
where
    T: serde::de::DeserializeOwned,
{
    let resp = request.send().await.map_err(map_reqwest_error)?;
    if !resp.status().is_success() {
        return Err(ServiceError::Status(resp.status().as_u16()));
    }
    let body = resp.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body).map_err(|e| ServiceError::Malformed(e.to_string()))
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Listing service at `{base_url}/properties/`.
pub struct HttpListingService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpListingService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout),
        }
    }

    fn url(&self) -> String {
        format!("{}/properties/", self.base_url)
    }
}

impl ListingService for HttpListingService {
    fn list_properties<'a>(
        &'a self,
        filter: &'a ListingFilter,
        page: u32,
        page_size: u32,
    ) -> BoxFuture<'a, Result<PropertyPage, ServiceError>> {
        let mut params = filter.query_pairs();
        params.push(("page".into(), page.to_string()));
        params.push(("page_size".into(), page_size.to_string()));
        let request = self.client.get(self.url()).query(&params);

        Box::pin(async move {
            debug!(page, page_size, "listing request");
            get_json::<PropertyPage>(request).await
        })
    }
}

/// Tour service at `{base_url}/properties/{id}/tours/`.
pub struct HttpTourService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTourService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(DEFAULT_TIMEOUT),
        }
    }
}

impl TourService for HttpTourService {
    fn property_tours(&self, id: PropertyId) -> BoxFuture<'_, Result<Vec<TourLink>, ServiceError>> {
        let url = format!("{}/properties/{id}/tours/", self.base_url);
        let request = self.client.get(url);
        Box::pin(async move { get_json::<Vec<TourLink>>(request).await })
    }
}

#[derive(Debug, Deserialize)]
struct IpLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Coarse IP-based geolocation, used where no device position is available.
pub struct HttpGeolocation {
    url: String,
    client: reqwest::Client,
}

impl HttpGeolocation {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: build_client(timeout),
        }
    }
}

impl GeolocationProvider for HttpGeolocation {
    fn current_position(&self) -> BoxFuture<'_, Result<LngLat, ServiceError>> {
        let request = self.client.get(&self.url);
        Box::pin(async move {
            let loc = get_json::<IpLocation>(request).await?;
            match (loc.longitude, loc.latitude) {
                (Some(lng), Some(lat)) if LngLat::new(lng, lat).is_located() => {
                    Ok(LngLat::new(lng, lat))
                }
                _ => Err(ServiceError::Unavailable),
            }
        })
    }
}
