//! Firewall rule reconciliation.
//!
//! Node pools get a network tag and a firewall rule scoped to it. Once the
//! pool is gone no instance carries the tag, and the rule can go too.

use std::collections::{BTreeMap, BTreeSet};

use lbsweep_compute::DynCompute;
use lbsweep_core::{ResourceKind, ResourceRef};
use serde::Serialize;

use crate::error::{FirewallError, FirewallStage};
use crate::metrics;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FirewallReport {
    /// Rules carrying at least one controller tag.
    pub rules_considered: usize,
    /// Controller tags no instance carries, sorted.
    pub tags_unreferenced: Vec<String>,
    /// Rules deleted, or that would be deleted in a dry run.
    pub rules_deleted: Vec<String>,
    pub dry_run: bool,
}

/// Deletes firewall rules whose controller tags no instance carries.
///
/// Aborts on the first listing or delete error. A rule already gone counts
/// as deleted.
pub async fn reconcile_firewalls(
    compute: &DynCompute,
    tag_prefix: &str,
    dry_run: bool,
) -> Result<FirewallReport, FirewallError> {
    let firewalls = compute
        .list_firewalls()
        .await
        .map_err(|e| FirewallError::new(FirewallStage::ListFirewalls, "", e))?;

    // tag -> rules scoped to it
    let mut by_tag: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut rules: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for firewall in &firewalls {
        let tags: Vec<String> = firewall
            .target_tags
            .iter()
            .filter(|t| t.starts_with(tag_prefix))
            .cloned()
            .collect();
        if tags.is_empty() {
            continue;
        }
        for tag in &tags {
            by_tag
                .entry(tag.clone())
                .or_default()
                .insert(firewall.name.clone());
        }
        rules.insert(firewall.name.clone(), tags);
    }

    let mut report = FirewallReport {
        rules_considered: rules.len(),
        dry_run,
        ..Default::default()
    };
    if by_tag.is_empty() {
        tracing::info!("no controller-tagged firewall rules");
        return Ok(report);
    }

    let zones = compute
        .list_zones()
        .await
        .map_err(|e| FirewallError::new(FirewallStage::ListZones, "", e))?;

    'zones: for zone in &zones {
        let instances = compute
            .list_instances(&zone.name)
            .await
            .map_err(|e| FirewallError::new(FirewallStage::ListInstances, zone.name.clone(), e))?;
        for instance in &instances {
            for tag in instance.tag_items() {
                by_tag.remove(tag);
            }
            if by_tag.is_empty() {
                tracing::debug!(zone = %zone.name, "every controller tag is in use");
                break 'zones;
            }
        }
    }

    report.tags_unreferenced = by_tag.keys().cloned().collect();
    let doomed: BTreeSet<&String> = by_tag
        .values()
        .flatten()
        .filter(|rule| {
            rules
                .get(*rule)
                .is_some_and(|tags| tags.iter().all(|t| by_tag.contains_key(t)))
        })
        .collect();

    for rule in doomed {
        if dry_run {
            tracing::info!(rule = %rule, "dry run: would delete firewall rule");
            report.rules_deleted.push(rule.clone());
            continue;
        }

        let target = ResourceRef::global(ResourceKind::Firewall, rule.clone());
        match compute.delete(&target).await {
            Ok(()) => tracing::info!(rule = %rule, "deleted firewall rule"),
            Err(e) if e.is_not_found() => {
                tracing::debug!(rule = %rule, "firewall rule already deleted")
            }
            Err(e) => return Err(FirewallError::new(FirewallStage::DeleteRule, rule.clone(), e)),
        }
        metrics::record_firewall_rule_deleted();
        report.rules_deleted.push(rule.clone());
    }

    tracing::info!(
        considered = report.rules_considered,
        unreferenced_tags = report.tags_unreferenced.len(),
        deleted = report.rules_deleted.len(),
        dry_run,
        "firewall pass finished"
    );
    Ok(report)
}
