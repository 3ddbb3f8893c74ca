//! Catalog listing and month-filtered URL resolution.

use crate::clearinghouse::client::ClearinghouseClient;
use crate::clearinghouse::error::ClearinghouseError;
use crate::types::dataset::Dataset;
use crate::types::month::{month_name, MonthFilter};
use serde::Deserialize;
use std::collections::HashMap;

/// One downloadable day inside a catalog month.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    /// Download path relative to the clearinghouse base URL.
    pub url: String,
}

/// Month-grouped listing of the daily files available for one dataset and
/// year.
///
/// Month keys come back either as numeric strings ("1") or English month
/// names ("January") depending on the dataset; both are accepted. A catalog
/// is produced fresh per request and never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    data: HashMap<String, Vec<CatalogEntry>>,
}

impl Catalog {
    /// Parses a raw catalog response body.
    pub fn from_json(raw: &str) -> Result<Self, ClearinghouseError> {
        serde_json::from_str(raw).map_err(ClearinghouseError::MalformedCatalog)
    }

    /// Flattens the catalog into relative download URLs, restricted to the
    /// months `filter` selects.
    ///
    /// Months are visited in calendar order; within a month the catalog's
    /// own ordering is preserved.
    pub fn daily_urls(&self, filter: &MonthFilter) -> Vec<String> {
        let mut urls = Vec::new();
        for month in 1..=12 {
            if !filter.includes(month) {
                continue;
            }
            let entries = self
                .data
                .get(&month.to_string())
                .or_else(|| self.data.get(month_name(month)));
            if let Some(days) = entries {
                urls.extend(days.iter().map(|day| day.url.clone()));
            }
        }
        urls
    }
}

/// Requests the catalog for a dataset and year.
///
/// `district_id` of `None` asks for all districts, which is what the
/// incident dataset expects.
pub(crate) async fn fetch_catalog(
    client: &ClearinghouseClient,
    dataset: Dataset,
    year: i32,
    district_id: Option<u32>,
) -> Result<Catalog, ClearinghouseError> {
    let district = district_id.map_or_else(|| "all".to_string(), |d| d.to_string());
    let query = [
        ("srq", "clearinghouse".to_string()),
        ("district_id", district),
        ("geotag", dataset.geotag().to_string()),
        ("yy", year.to_string()),
        ("type", dataset.type_param().to_string()),
        ("returnformat", "text".to_string()),
    ];
    let url = client.base_url().to_string();
    let response = client.get_with_retry(&url, &query).await?;
    let raw = response
        .text()
        .await
        .map_err(|e| ClearinghouseError::NetworkRequest(url, e))?;
    Catalog::from_json(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_month_filtered_urls_in_order() {
        let catalog = Catalog::from_json(
            r#"{"data": {"1": [{"url": "a.zip"}], "2": [{"url": "b.zip"}]}}"#,
        )
        .unwrap();

        let january = catalog.daily_urls(&MonthFilter::single(1).unwrap());
        assert_eq!(january, vec!["a.zip"]);

        let all = catalog.daily_urls(&MonthFilter::All);
        assert_eq!(all, vec!["a.zip", "b.zip"]);
    }

    #[test]
    fn accepts_month_name_keys() {
        let catalog = Catalog::from_json(
            r#"{"data": {
                "February": [{"url": "feb_01.zip"}, {"url": "feb_02.zip"}],
                "January": [{"url": "jan_01.zip"}]
            }}"#,
        )
        .unwrap();

        let all = catalog.daily_urls(&MonthFilter::All);
        assert_eq!(all, vec!["jan_01.zip", "feb_01.zip", "feb_02.zip"]);

        let feb = catalog.daily_urls(&MonthFilter::months(vec![2]).unwrap());
        assert_eq!(feb, vec!["feb_01.zip", "feb_02.zip"]);
    }

    #[test]
    fn url_count_matches_selected_months() {
        let catalog = Catalog::from_json(
            r#"{"data": {
                "1": [{"url": "a"}, {"url": "b"}],
                "2": [{"url": "c"}],
                "3": [{"url": "d"}, {"url": "e"}, {"url": "f"}]
            }}"#,
        )
        .unwrap();
        let selected = catalog.daily_urls(&MonthFilter::months(vec![1, 3]).unwrap());
        assert_eq!(selected.len(), 5);
        assert_eq!(selected, vec!["a", "b", "d", "e", "f"]);
    }

    #[test]
    fn missing_data_key_is_malformed() {
        let result = Catalog::from_json(r#"{"files": []}"#);
        assert!(matches!(
            result,
            Err(ClearinghouseError::MalformedCatalog(_))
        ));
    }

    #[test]
    fn entry_without_url_is_malformed() {
        let result = Catalog::from_json(r#"{"data": {"1": [{"file_name": "a.zip"}]}}"#);
        assert!(matches!(
            result,
            Err(ClearinghouseError::MalformedCatalog(_))
        ));
    }

    #[test]
    fn empty_catalog_resolves_to_no_urls() {
        let catalog = Catalog::from_json(r#"{"data": {}}"#).unwrap();
        assert!(catalog.daily_urls(&MonthFilter::All).is_empty());
    }
}
