use std::collections::HashSet;

use sqlx::SqlitePool;

use crate::database::user_repo;

/// Per-viewer message visibility: a message is visible iff its author is not
/// in the viewer's block ∪ mute set. Built once per request; the same set
/// feeds the SQL pushdown (`exclusion_json`) and the in-process checks, so
/// lists and counters can never disagree about what "visible" means.
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    pub viewer_id: String,
    excluded: HashSet<String>,
    exclusion_json: String,
}

impl VisibilityFilter {
    pub async fn for_viewer(pool: &SqlitePool, viewer_id: &str) -> sqlx::Result<VisibilityFilter> {
        let excluded = user_repo::excluded_authors(pool, viewer_id).await?;
        Ok(VisibilityFilter::from_parts(viewer_id, excluded))
    }

    pub fn from_parts(viewer_id: &str, excluded: Vec<String>) -> VisibilityFilter {
        let exclusion_json =
            serde_json::to_string(&excluded).unwrap_or_else(|_| "[]".to_string());
        VisibilityFilter {
            viewer_id: viewer_id.to_string(),
            excluded: excluded.into_iter().collect(),
            exclusion_json,
        }
    }

    pub fn is_visible(&self, author_id: &str) -> bool {
        !self.excluded.contains(author_id)
    }

    /// JSON array of excluded author ids, for `json_each` pushdown in the
    /// repos.
    pub fn exclusion_json(&self) -> &str {
        &self.exclusion_json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_hides_excluded_authors_only() {
        let filter =
            VisibilityFilter::from_parts("viewer", vec!["bad".to_string(), "loud".to_string()]);
        assert!(!filter.is_visible("bad"));
        assert!(!filter.is_visible("loud"));
        assert!(filter.is_visible("friend"));
        assert!(filter.is_visible("viewer"));
    }

    #[test]
    fn exclusion_json_is_a_json_array() {
        let filter = VisibilityFilter::from_parts("viewer", vec!["x".to_string()]);
        let parsed: Vec<String> = serde_json::from_str(filter.exclusion_json()).unwrap();
        assert_eq!(parsed, vec!["x"]);

        let empty = VisibilityFilter::from_parts("viewer", vec![]);
        assert_eq!(empty.exclusion_json(), "[]");
    }
}
