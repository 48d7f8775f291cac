//! Metadata types for the catalog hierarchy

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Resource-list envelope returned by every listing endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct Resources<T> {
    /// The listed resources
    pub resources: Vec<T>,
}

/// A catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Catalog identifier
    pub identifier: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
}

/// A dataset within a catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Dataset identifier
    pub identifier: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Publication frequency
    #[serde(default)]
    pub frequency: Option<String>,
}

/// An attribute (column) of a dataset
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Attribute identifier
    pub identifier: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Position within the dataset schema
    #[serde(default)]
    pub index: Option<i64>,
    /// Logical data type
    #[serde(default)]
    pub data_type: Option<String>,
}

/// One member of a dataset series
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMember {
    /// Series member identifier (usually a date)
    pub identifier: String,
    /// First business date the member covers
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    /// Last business date the member covers
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    /// Date the member was created
    #[serde(default)]
    pub created_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_envelope_deserializes() {
        let body = r#"{
            "resources": [
                {"identifier": "common", "title": "Common catalog"},
                {"identifier": "internal", "description": "Internal data"}
            ]
        }"#;
        let listed: Resources<Catalog> = serde_json::from_str(body).unwrap();
        assert_eq!(listed.resources.len(), 2);
        assert_eq!(listed.resources[0].identifier, "common");
        assert_eq!(listed.resources[1].title, None);
    }

    #[test]
    fn dataset_member_dates_are_optional() {
        let body = r#"{"identifier": "20260807", "fromDate": "2026-08-01"}"#;
        let member: DatasetMember = serde_json::from_str(body).unwrap();
        assert_eq!(
            member.from_date,
            Some(NaiveDate::from_ymd_opt(2026, 8, 1).unwrap())
        );
        assert_eq!(member.to_date, None);
    }
}
