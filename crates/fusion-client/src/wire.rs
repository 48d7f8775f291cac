//! Wire-level constants and path builders for the distribution endpoints

/// Dataset-scoped bearer token header
pub(crate) const HEADER_FUSION_AUTHORIZATION: &str = "Fusion-Authorization";

/// Response-header prefix carrying content checksums, completed by the
/// algorithm token (e.g. `x-jpmc-checksum-sha256`)
pub(crate) const HEADER_CHECKSUM_PREFIX: &str = "x-jpmc-checksum-";

/// Number of parts a distribution is stored as; absent, 0 or 1 means
/// single-part
pub(crate) const HEADER_PARTS_COUNT: &str = "x-jpmc-parts-count";

/// Request header carrying the payload digest, `<ALGORITHM>=<base64>`
pub(crate) const HEADER_DIGEST: &str = "Digest";

pub(crate) const HEADER_DISTRIBUTION_FROM_DATE: &str = "x-jpmc-distribution-from-date";
pub(crate) const HEADER_DISTRIBUTION_TO_DATE: &str = "x-jpmc-distribution-to-date";
pub(crate) const HEADER_DISTRIBUTION_CREATED_DATE: &str = "x-jpmc-distribution-created-date";

pub(crate) const QUERY_DOWNLOAD_PART_NUMBER: &str = "downloadPartNumber";
pub(crate) const QUERY_OPERATION_ID: &str = "operationId";
pub(crate) const QUERY_PART_NUMBER: &str = "partNumber";

/// Base path of a distribution resource, relative to the API root
pub(crate) fn distribution_path(
    catalog: &str,
    dataset: &str,
    series_member: &str,
    distribution: &str,
) -> String {
    format!(
        "catalogs/{catalog}/datasets/{dataset}/datasetseries/{series_member}/distributions/{distribution}"
    )
}

/// Metadata probe and part/whole fetch endpoint
pub(crate) fn download_path(resource: &str) -> String {
    format!("{resource}/operationType/download")
}

/// Multipart initiation endpoint
pub(crate) fn upload_initiate_path(resource: &str) -> String {
    format!("{resource}/operationType/upload")
}

/// Part upload, completion and abort endpoint (distinguished by method and
/// query parameters)
pub(crate) fn upload_operations_path(resource: &str) -> String {
    format!("{resource}/operations/upload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_path_shape() {
        assert_eq!(
            distribution_path("common", "FXO_SP", "20260807", "csv"),
            "catalogs/common/datasets/FXO_SP/datasetseries/20260807/distributions/csv",
        );
    }

    #[test]
    fn operation_paths_extend_the_resource() {
        let resource = distribution_path("c", "d", "m", "parquet");
        assert!(download_path(&resource).ends_with("/operationType/download"));
        assert!(upload_initiate_path(&resource).ends_with("/operationType/upload"));
        assert!(upload_operations_path(&resource).ends_with("/operations/upload"));
    }
}
