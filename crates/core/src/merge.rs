//! Union rule for combining a guest cart with a server cart.
//!
//! The backend owns the policy; both the reference sync endpoint and tests use
//! [`merge_carts`] so the arithmetic is defined in exactly one place.
//!
//! For every policy the result lists server lines first (server order), then
//! lines only the guest cart had (guest order). For a product present on both
//! sides the server's price wins, display metadata and stock fall back to the
//! guest line when the server has none, and the final quantity is clamped to
//! the known stock.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::CartLineItem;

/// How quantities combine when both carts hold the same `(store_id, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// `server + guest`.
    #[default]
    Sum,
    /// `max(server, guest)`.
    Max,
    /// Keep the server quantity.
    ServerWins,
}

impl MergePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Max => "max",
            Self::ServerWins => "server_wins",
        }
    }

    fn combine(self, server: u32, guest: u32) -> u64 {
        match self {
            Self::Sum => u64::from(server) + u64::from(guest),
            Self::Max => u64::from(server.max(guest)),
            Self::ServerWins => u64::from(server),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`MergePolicy`] from configuration.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown merge policy '{0}' (expected sum, max or server_wins)")]
pub struct ParseMergePolicyError(String);

impl FromStr for MergePolicy {
    type Err = ParseMergePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "max" => Ok(Self::Max),
            "server_wins" | "server-wins" => Ok(Self::ServerWins),
            other => Err(ParseMergePolicyError(other.to_string())),
        }
    }
}

/// Collapse repeated `(store_id, id)` lines into one, summing quantities.
///
/// The first occurrence keeps its position and metadata. Zero-quantity lines
/// are dropped and every result is clamped to its stock.
#[must_use]
pub fn fold_duplicates(items: Vec<CartLineItem>) -> Vec<CartLineItem> {
    let mut folded: Vec<CartLineItem> = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity == 0 {
            continue;
        }
        if let Some(existing) = folded.iter_mut().find(|line| line.same_line(&item)) {
            let total = u64::from(existing.quantity) + u64::from(item.quantity);
            existing.quantity = existing.clamp_quantity(total);
        } else {
            let mut item = item;
            item.quantity = item.clamp_quantity(u64::from(item.quantity));
            folded.push(item);
        }
    }

    folded
}

/// Merge a guest cart into a server cart under `policy`.
#[must_use]
pub fn merge_carts(
    server: &[CartLineItem],
    guest: &[CartLineItem],
    policy: MergePolicy,
) -> Vec<CartLineItem> {
    let server = fold_duplicates(server.to_vec());
    let guest = fold_duplicates(guest.to_vec());

    let mut merged: Vec<CartLineItem> = Vec::with_capacity(server.len() + guest.len());

    for server_line in server {
        let line = match guest.iter().find(|g| g.same_line(&server_line)) {
            Some(guest_line) => {
                let mut line = CartLineItem {
                    name: server_line.name.clone().or_else(|| guest_line.name.clone()),
                    image: server_line.image.clone().or_else(|| guest_line.image.clone()),
                    stock: server_line.stock.or(guest_line.stock),
                    ..server_line.clone()
                };
                line.quantity =
                    line.clamp_quantity(policy.combine(server_line.quantity, guest_line.quantity));
                line
            }
            None => server_line,
        };
        merged.push(line);
    }

    for guest_line in guest {
        if !merged.iter().any(|line| line.same_line(&guest_line)) {
            merged.push(guest_line);
        }
    }

    merged
}

/// Quantities the guest cart holds beyond `baseline`.
///
/// Lines that did not grow since the baseline are dropped; the rest carry only
/// the increase.
#[must_use]
pub fn guest_delta(guest: &[CartLineItem], baseline: &[CartLineItem]) -> Vec<CartLineItem> {
    let baseline = fold_duplicates(baseline.to_vec());
    fold_duplicates(guest.to_vec())
        .into_iter()
        .filter_map(|mut line| {
            let known = baseline
                .iter()
                .find(|b| b.same_line(&line))
                .map_or(0, |b| b.quantity);
            line.quantity = line.quantity.checked_sub(known).filter(|q| *q > 0)?;
            Some(line)
        })
        .collect()
}

/// Merge a guest cart that was last synced against `baseline`.
///
/// Under [`MergePolicy::Sum`] only the growth past the baseline is added, so
/// resending a cart that already is the server's changes nothing. The other
/// policies ignore the baseline. An empty baseline is a plain [`merge_carts`].
#[must_use]
pub fn merge_since(
    server: &[CartLineItem],
    guest: &[CartLineItem],
    baseline: &[CartLineItem],
    policy: MergePolicy,
) -> Vec<CartLineItem> {
    match policy {
        MergePolicy::Sum if !baseline.is_empty() => {
            merge_carts(server, &guest_delta(guest, baseline), policy)
        }
        MergePolicy::Sum | MergePolicy::Max | MergePolicy::ServerWins => {
            merge_carts(server, guest, policy)
        }
    }
}
