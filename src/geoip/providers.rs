//! Built-in GeoIP providers and their response schemas.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use super::{GeoIpProvider, GeoLocation};
use crate::error::GeoIpError;

pub const BUILTIN: &[&str] = &["ipapi.co", "ipwho.is", "freeipapi.com"];

pub fn builtin(url_overrides: &HashMap<String, String>) -> Vec<Arc<dyn GeoIpProvider>> {
    let url = |name: &str, default: &str| {
        url_overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };

    vec![
        Arc::new(IpApiCo {
            base_url: url("ipapi.co", "https://ipapi.co/json/"),
        }),
        Arc::new(IpWhoIs {
            base_url: url("ipwho.is", "https://ipwho.is/"),
        }),
        Arc::new(FreeIpApi {
            base_url: url("freeipapi.com", "https://freeipapi.com/api/json"),
        }),
    ]
}

fn fetch<T: serde::de::DeserializeOwned>(
    http: &reqwest::blocking::Client,
    url: &str,
) -> Result<T, GeoIpError> {
    let request_err = |source| GeoIpError::Request {
        url: url.to_string(),
        source,
    };
    http.get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(request_err)?
        .json()
        .map_err(request_err)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ── ipapi.co ───────────────────────────────────────────────

pub struct IpApiCo {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IpApiCoResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
    country_code: Option<String>,
    country_name: Option<String>,
    region: Option<String>,
    city: Option<String>,
    postal: Option<String>,
    timezone: Option<String>,
}

impl IpApiCoResponse {
    fn into_location(self) -> Result<GeoLocation, GeoIpError> {
        if self.error {
            return Err(GeoIpError::Provider {
                provider: "ipapi.co".to_string(),
                message: self.reason.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(GeoLocation {
            country_code: non_empty(self.country_code),
            country_name: non_empty(self.country_name),
            region: non_empty(self.region),
            city: non_empty(self.city),
            postal_code: non_empty(self.postal),
            timezone: non_empty(self.timezone),
        })
    }
}

impl GeoIpProvider for IpApiCo {
    fn name(&self) -> &str {
        "ipapi.co"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn locate(&self, http: &reqwest::blocking::Client) -> Result<GeoLocation, GeoIpError> {
        fetch::<IpApiCoResponse>(http, &self.base_url)?.into_location()
    }
}

// ── ipwho.is ───────────────────────────────────────────────

pub struct IpWhoIs {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IpWhoIsResponse {
    #[serde(default = "truthy")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    country_code: Option<String>,
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
    postal: Option<String>,
    timezone: Option<IpWhoIsTimezone>,
}

#[derive(Debug, Deserialize)]
struct IpWhoIsTimezone {
    id: Option<String>,
}

fn truthy() -> bool {
    true
}

impl IpWhoIsResponse {
    fn into_location(self) -> Result<GeoLocation, GeoIpError> {
        if !self.success {
            return Err(GeoIpError::Provider {
                provider: "ipwho.is".to_string(),
                message: self.message.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(GeoLocation {
            country_code: non_empty(self.country_code),
            country_name: non_empty(self.country),
            region: non_empty(self.region),
            city: non_empty(self.city),
            postal_code: non_empty(self.postal),
            timezone: non_empty(self.timezone.and_then(|tz| tz.id)),
        })
    }
}

impl GeoIpProvider for IpWhoIs {
    fn name(&self) -> &str {
        "ipwho.is"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn locate(&self, http: &reqwest::blocking::Client) -> Result<GeoLocation, GeoIpError> {
        fetch::<IpWhoIsResponse>(http, &self.base_url)?.into_location()
    }
}

// ── freeipapi.com ──────────────────────────────────────────

pub struct FreeIpApi {
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreeIpApiResponse {
    country_code: Option<String>,
    country_name: Option<String>,
    region_name: Option<String>,
    city_name: Option<String>,
    zip_code: Option<String>,
    time_zone: Option<String>,
}

impl From<FreeIpApiResponse> for GeoLocation {
    fn from(r: FreeIpApiResponse) -> Self {
        GeoLocation {
            country_code: non_empty(r.country_code),
            country_name: non_empty(r.country_name),
            region: non_empty(r.region_name),
            city: non_empty(r.city_name),
            // freeipapi reports "-" when the postal code is unknown
            postal_code: non_empty(r.zip_code).filter(|z| z != "-"),
            timezone: non_empty(r.time_zone),
        }
    }
}

impl GeoIpProvider for FreeIpApi {
    fn name(&self) -> &str {
        "freeipapi.com"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn locate(&self, http: &reqwest::blocking::Client) -> Result<GeoLocation, GeoIpError> {
        Ok(fetch::<FreeIpApiResponse>(http, &self.base_url)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipapi_co_schema() {
        let body = r#"{"ip":"203.0.113.7","city":"Bergamo","region":"Lombardy",
            "country_code":"IT","country_name":"Italy","postal":"24121",
            "timezone":"Europe/Rome","currency":"EUR"}"#;
        let location = serde_json::from_str::<IpApiCoResponse>(body)
            .unwrap()
            .into_location()
            .unwrap();
        assert_eq!(location.country_code.as_deref(), Some("IT"));
        assert_eq!(location.city.as_deref(), Some("Bergamo"));
        assert_eq!(location.postal_code.as_deref(), Some("24121"));
        assert_eq!(location.timezone.as_deref(), Some("Europe/Rome"));
    }

    #[test]
    fn ipapi_co_error_body() {
        let body = r#"{"error":true,"reason":"RateLimited"}"#;
        let err = serde_json::from_str::<IpApiCoResponse>(body)
            .unwrap()
            .into_location()
            .unwrap_err();
        assert!(err.to_string().contains("RateLimited"));
    }

    #[test]
    fn ipwho_is_schema() {
        let body = r#"{"success":true,"country":"Kenya","country_code":"KE",
            "region":"Nairobi","city":"Nairobi","postal":"",
            "timezone":{"id":"Africa/Nairobi","utc":"+03:00"}}"#;
        let location = serde_json::from_str::<IpWhoIsResponse>(body)
            .unwrap()
            .into_location()
            .unwrap();
        assert_eq!(location.country_name.as_deref(), Some("Kenya"));
        assert_eq!(location.postal_code, None);
        assert_eq!(location.timezone.as_deref(), Some("Africa/Nairobi"));

        let failed = r#"{"success":false,"message":"Invalid IP address"}"#;
        assert!(serde_json::from_str::<IpWhoIsResponse>(failed)
            .unwrap()
            .into_location()
            .is_err());
    }

    #[test]
    fn freeipapi_schema() {
        let body = r#"{"ipVersion":4,"countryName":"Uganda","countryCode":"UG",
            "cityName":"Kampala","regionName":"Central Region","zipCode":"-",
            "timeZone":"+03:00"}"#;
        let location: GeoLocation = serde_json::from_str::<FreeIpApiResponse>(body)
            .unwrap()
            .into();
        assert_eq!(location.region.as_deref(), Some("Central Region"));
        assert_eq!(location.postal_code, None);
    }
}
