//! Client-style browse pipeline over the available donations.
//!
//! Stages run in a fixed order: text search, category, allergen exclusion,
//! distance (and radius), then sort. Nothing is indexed; the pipeline is
//! recomputed from the full list on every request.

use std::cmp::Ordering;

use bson::DateTime;
use foodshare_db::models::Donation;
use serde::{Deserialize, Serialize};

use crate::geo::distance_between;

/// Category value that disables the category filter.
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Nearest,
    ExpiringSoon,
    HighestQuantity,
    #[default]
    MostRecent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowseFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub exclude_allergens: Vec<String>,
    #[serde(default)]
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Debug, Clone)]
pub struct BrowseItem {
    pub donation: Donation,
    pub distance_km: Option<f64>,
}

pub fn browse(
    donations: Vec<Donation>,
    filter: &BrowseFilter,
    viewer: Option<(f64, f64)>,
    now: DateTime,
) -> Vec<BrowseItem> {
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let category = filter
        .category
        .as_deref()
        .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES);

    let mut items: Vec<BrowseItem> = donations
        .into_iter()
        .filter(|d| !d.is_expired(now))
        .filter(|d| search.as_deref().is_none_or(|needle| matches_text(d, needle)))
        .filter(|d| category.is_none_or(|c| d.category == c))
        .filter(|d| !has_excluded_allergen(d, &filter.exclude_allergens))
        .map(|donation| {
            let distance_km = viewer
                .zip(donation.coordinates())
                .map(|(from, to)| distance_between(from, to));
            BrowseItem {
                donation,
                distance_km,
            }
        })
        .collect();

    if let (Some(radius), Some(_)) = (filter.radius_km, viewer) {
        items.retain(|item| item.distance_km.is_some_and(|d| d <= radius));
    }

    sort_items(&mut items, filter.sort, viewer.is_some());
    items
}

fn matches_text(donation: &Donation, needle: &str) -> bool {
    donation.food_name.to_lowercase().contains(needle)
        || donation.description.to_lowercase().contains(needle)
}

/// True when any listed allergen (ignoring the "None" sentinel) is excluded.
pub fn has_excluded_allergen(donation: &Donation, excluded: &[String]) -> bool {
    donation.listed_allergens().any(|allergen| {
        excluded
            .iter()
            .any(|ex| ex.eq_ignore_ascii_case(allergen))
    })
}

fn sort_items(items: &mut [BrowseItem], order: SortOrder, viewer_known: bool) {
    match order {
        // Without viewer coordinates "nearest" leaves the order untouched.
        SortOrder::Nearest if viewer_known => items.sort_by(|a, b| {
            match (a.distance_km, b.distance_km) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }),
        SortOrder::Nearest => {}
        SortOrder::ExpiringSoon => {
            items.sort_by(|a, b| a.donation.expiry_time.cmp(&b.donation.expiry_time))
        }
        SortOrder::HighestQuantity => {
            items.sort_by(|a, b| b.donation.quantity.cmp(&a.donation.quantity))
        }
        SortOrder::MostRecent => {
            items.sort_by(|a, b| b.donation.created_at.cmp(&a.donation.created_at))
        }
    }
}
