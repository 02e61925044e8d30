//! Activity statistics over drained listings
//!
//! The statistics are computed from already-collected items;
//! [`collect_activity`] and [`KarmaBreakdown::fetch`] talk to the upstream.

use crate::auth::Credential;
use crate::dedup::Collection;
use crate::error::{Error, Result};
use crate::fetch::PageFetcher;
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::PaginationController;
use crate::resources::{Resource, KARMA_PATH};
use crate::types::{Item, JsonValue};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// Thing kind of a post
pub const POST_KIND: &str = "t3";

/// Thing kind of a comment
pub const COMMENT_KIND: &str = "t1";

/// Totals over a set of items
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySummary {
    /// All items
    pub total_items: usize,
    /// Posts (`t3`)
    pub posts: usize,
    /// Comments (`t1`)
    pub comments: usize,
    /// Sum of `score`
    pub total_score: i64,
    /// Mean `score`, 0 when empty
    pub average_score: f64,
}

impl ActivitySummary {
    /// Summarize items
    pub fn from_items(items: &[Item]) -> Self {
        let mut summary = Self::default();
        for item in items {
            summary.add(item);
        }
        summary.finish()
    }

    fn add(&mut self, item: &Item) {
        self.total_items += 1;
        match item.kind.as_deref() {
            Some(POST_KIND) => self.posts += 1,
            Some(COMMENT_KIND) => self.comments += 1,
            _ => {}
        }
        self.total_score += score(item);
    }

    fn finish(mut self) -> Self {
        self.average_score = if self.total_items == 0 {
            0.0
        } else {
            self.total_score as f64 / self.total_items as f64
        };
        self
    }
}

/// Activity within one community
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunityActivity {
    /// Community name
    pub community: String,
    /// Items posted there
    pub items: usize,
    /// Their summed score
    pub score: i64,
}

/// Group items by `subreddit`, highest score first, then by name
///
/// Items without a community are left out.
pub fn community_breakdown(items: &[Item]) -> Vec<CommunityActivity> {
    let mut groups: HashMap<&str, (usize, i64)> = HashMap::new();
    for item in items {
        if let Some(community) = item.str_field("subreddit") {
            let entry = groups.entry(community).or_default();
            entry.0 += 1;
            entry.1 += score(item);
        }
    }

    let mut breakdown: Vec<CommunityActivity> = groups
        .into_iter()
        .map(|(community, (items, score))| CommunityActivity {
            community: community.to_string(),
            items,
            score,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.community.cmp(&b.community))
    });
    breakdown
}

/// The `n` highest-scoring items; ties keep listing order
pub fn top_items(items: &[Item], n: usize) -> Vec<&Item> {
    let mut ranked: Vec<&Item> = items.iter().collect();
    ranked.sort_by_key(|item| std::cmp::Reverse(score(item)));
    ranked.truncate(n);
    ranked
}

fn score(item: &Item) -> i64 {
    item.i64_field("score").unwrap_or(0)
}

/// Everything the dashboard shows for one account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityReport {
    /// Account name
    pub user: String,
    /// Items per listing (`saved:<user>`, ...)
    pub listings: BTreeMap<String, usize>,
    /// Totals over the union of all listings
    pub summary: ActivitySummary,
    /// Per-community activity
    pub communities: Vec<CommunityActivity>,
    /// Highest-scoring items
    pub top_items: Vec<Item>,
}

/// Drain the saved, submitted and comment listings of `user` and summarize
///
/// Listings are drained one after another. An item that appears in more
/// than one listing is counted once.
pub async fn collect_activity<F>(
    controller: &Arc<PaginationController<F>>,
    user: &str,
    credential: &Credential,
    top: usize,
) -> Result<ActivityReport>
where
    F: PageFetcher + 'static,
{
    let mut listings = BTreeMap::new();
    let mut all = Collection::new();

    for resource in Resource::activity(user) {
        let snapshot = controller
            .drain_all(resource.key(), Some(credential.clone()))
            .await?;
        listings.insert(resource.to_string(), snapshot.len());
        all.extend_unique(snapshot.items);
    }

    let items = all.into_items();
    info!(user, items = items.len(), "Collected activity");

    Ok(ActivityReport {
        user: user.to_string(),
        listings,
        summary: ActivitySummary::from_items(&items),
        communities: community_breakdown(&items),
        top_items: top_items(&items, top).into_iter().cloned().collect(),
    })
}

/// Karma earned in one community
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunityKarma {
    /// Community name
    pub community: String,
    /// Karma from posts
    pub link_karma: i64,
    /// Karma from comments
    pub comment_karma: i64,
}

/// Per-community karma of the signed-in account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KarmaBreakdown {
    /// Communities in upstream order
    pub communities: Vec<CommunityKarma>,
}

impl KarmaBreakdown {
    /// Parse `{"data": [{"sr", "link_karma", "comment_karma"}]}`
    pub fn from_json(body: &JsonValue) -> Result<Self> {
        let rows = body
            .get("data")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| Error::malformed("missing array at 'data'"))?;

        let communities = rows
            .iter()
            .enumerate()
            .map(|(index, row)| parse_karma_row(index, row))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { communities })
    }

    /// Fetch the breakdown for the credential's account
    pub async fn fetch(client: &HttpClient, credential: &Credential) -> Result<Self> {
        let body = client
            .get_json(KARMA_PATH, &RequestConfig::default(), credential)
            .await?;
        Self::from_json(&body)
    }

    /// Sum of post karma
    pub fn link_karma(&self) -> i64 {
        self.communities.iter().map(|c| c.link_karma).sum()
    }

    /// Sum of comment karma
    pub fn comment_karma(&self) -> i64 {
        self.communities.iter().map(|c| c.comment_karma).sum()
    }
}

fn parse_karma_row(index: usize, row: &JsonValue) -> Result<CommunityKarma> {
    let community = row
        .get("sr")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::malformed(format!("data[{index}] has no 'sr'")))?;
    let karma = |field: &str| row.get(field).and_then(JsonValue::as_i64).unwrap_or(0);

    Ok(CommunityKarma {
        community: community.to_string(),
        link_karma: karma("link_karma"),
        comment_karma: karma("comment_karma"),
    })
}
