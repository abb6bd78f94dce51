//! services/api/src/maintenance.rs
//!
//! Batch jobs that repair stored data in place. They walk a table page by
//! page with a fixed pause between pages and make a single attempt per row.

use std::time::Duration;

use family_photos_core::query::normalize_tag;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::DbAdapter;

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const PAGE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub pages: usize,
    pub scanned: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Rewrites every tag whose stored name is not in normalised form, merging it
/// into the normalised tag. Rows within a page are handled concurrently.
pub async fn normalize_tags(
    db: &DbAdapter,
    page_size: i64,
    delay: Duration,
) -> Result<NormalizeReport, sqlx::Error> {
    let page_size = page_size.max(1);
    let mut report = NormalizeReport::default();
    let mut last_id = 0;

    loop {
        let page = db.tags_after(last_id, page_size).await?;
        let Some(&(max_id, _)) = page.last() else {
            break;
        };
        last_id = max_id;
        report.pages += 1;
        report.scanned += page.len();

        let stale = page
            .iter()
            .filter(|(_, name)| normalize_tag(name).as_deref() != Some(name.as_str()));
        let outcomes = join_all(stale.map(|(id, name)| async move {
            (*id, name.as_str(), db.merge_tag(*id, name).await)
        }))
        .await;

        for (id, name, outcome) in outcomes {
            match outcome {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!(tag_id = id, tag = name, "Failed to normalise tag: {}", e);
                    report.failed += 1;
                }
            }
        }

        if page.len() < page_size as usize {
            break;
        }
        tokio::time::sleep(delay).await;
    }

    info!(
        pages = report.pages,
        scanned = report.scanned,
        updated = report.updated,
        failed = report.failed,
        "Tag normalisation finished"
    );
    Ok(report)
}
