use tracing::debug;

use crate::domain::dates::parse_date;
use crate::domain::RawArticle;
use crate::errors::{MirrorError, MirrorResult};

/// Narrow a page of records to those updated strictly after the last run.
///
/// A `None` boundary means first run or forced full fetch: everything
/// passes unfiltered. Records whose timestamp is missing or unparseable
/// pass through as-is so upstream schema drift cannot silently drop
/// content. An unparseable boundary itself is a hard error.
pub fn filter_new(
    records: Vec<RawArticle>,
    last_run: Option<&str>,
) -> MirrorResult<Vec<RawArticle>> {
    let Some(last_run) = last_run else {
        return Ok(records);
    };
    let boundary = parse_date(last_run)
        .ok_or_else(|| MirrorError::InvalidTimestamp(last_run.to_string()))?;

    Ok(records
        .into_iter()
        .filter(|record| match record.updated_timestamp() {
            // Strictly greater: the run's own boundary article is excluded.
            Some(updated) => updated > boundary,
            None => {
                debug!(id = record.id, "record has no parseable timestamp, keeping");
                true
            }
        })
        .collect())
}
