//! Resolve a reference id into the metadata recorded in the bag.

use std::sync::Arc;

use dp_bag::{compute_date_range, normalize_date_range, DateRange};
use dp_core::{Error, RefId, Result};

use crate::collaborators::Registry;

/// Registry metadata of one archival object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Lineage URI of the archival object.
    pub uri: String,
    /// Normalized date range of the object or its closest dated ancestor.
    pub dates: DateRange,
}

/// Looks up archival objects through the [`Registry`].
#[derive(Clone)]
pub struct MetadataResolver {
    registry: Arc<dyn Registry>,
}

impl MetadataResolver {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// URI of the single archival object carrying `refid`.
    ///
    /// # Errors
    ///
    /// [`Error::RegistryMatch`] when the registry returns zero or several
    /// objects.
    pub async fn resolve_lineage_uri(&self, refid: &RefId) -> Result<String> {
        let found = self.registry.find_by_ref_id(refid).await?;
        match <[String; 1]>::try_from(found.uris) {
            Ok([uri]) => Ok(uri),
            Err(uris) => Err(Error::RegistryMatch {
                count: uris.len(),
                query: found.query,
            }),
        }
    }

    /// Normalized date range for the object at `uri`.
    pub async fn resolve_dates(&self, uri: &str) -> Result<DateRange> {
        let records = self.registry.closest_dates(uri).await?;
        let (start, end) = compute_date_range(&records)?;
        tracing::debug!("Raw date range for {}: {} to {}", uri, start, end);
        normalize_date_range(&start, &end)
    }

    /// Resolve both the lineage URI and the date range.
    pub async fn resolve(&self, refid: &RefId) -> Result<ObjectMetadata> {
        let uri = self.resolve_lineage_uri(refid).await?;
        let dates = self.resolve_dates(&uri).await?;
        Ok(ObjectMetadata { uri, dates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StaticRegistry;
    use assert_matches::assert_matches;
    use dp_bag::DateRecord;

    const URI: &str = "/repositories/2/archival_objects/1234";

    fn resolver(registry: StaticRegistry) -> MetadataResolver {
        MetadataResolver::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn resolves_single_match() {
        let r = resolver(
            StaticRegistry::new()
                .with_object("abc", &[URI])
                .with_dates(URI, vec![DateRecord::range("1950-03", "1969")]),
        );
        let metadata = r.resolve(&RefId::new("abc").unwrap()).await.unwrap();
        assert_eq!(metadata.uri, URI);
        assert_eq!(metadata.dates.start_string(), "1950-03-01");
        assert_eq!(metadata.dates.end_string(), "1969-12-31");
    }

    #[tokio::test]
    async fn zero_matches_is_an_error() {
        let r = resolver(StaticRegistry::new());
        let err = r
            .resolve_lineage_uri(&RefId::new("abc").unwrap())
            .await
            .unwrap_err();
        assert_matches!(err, Error::RegistryMatch { count: 0, .. });
        assert!(err.to_string().starts_with("0 results found for search"));
        assert!(err.to_string().ends_with("Expected one result."));
    }

    #[tokio::test]
    async fn several_matches_is_an_error() {
        let r = resolver(StaticRegistry::new().with_object("abc", &[URI, "/other"]));
        let err = r
            .resolve_lineage_uri(&RefId::new("abc").unwrap())
            .await
            .unwrap_err();
        assert_matches!(err, Error::RegistryMatch { count: 2, ref query } if query.contains("abc"));
    }

    #[tokio::test]
    async fn empty_dates_are_a_precondition_error() {
        let r = resolver(
            StaticRegistry::new()
                .with_object("abc", &[URI])
                .with_dates(URI, vec![]),
        );
        let err = r.resolve(&RefId::new("abc").unwrap()).await.unwrap_err();
        assert_eq!(err.kind(), dp_core::ErrorKind::Precondition);
    }
}
