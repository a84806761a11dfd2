//! Fleet statistics for administrators.
//!
//! The aggregation itself is pure: [`StatsService::fleet_statistics`]
//! gathers snapshots from the store and hands them to the functions below.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use repairdesk_core::error::{RepairError, RepairResult};
use repairdesk_core::models::DateRange;
use repairdesk_core::models::identity::{Identity, IdentityFilter, IdentityStatus, Role};
use repairdesk_core::models::round::{RoundSnapshot, RoundStatus};
use repairdesk_core::models::status_event::OperatorActivity;
use repairdesk_core::repository::{
    CustomerRepository, IdentityRepository, RepairStore, ServiceCaseRepository,
    ServiceRoundRepository,
};
use serde::Serialize;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::deps::Deps;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Serialize)]
pub struct FleetStatistics {
    pub total_cases: u64,
    /// Cases counted by the status of their latest round.
    pub status_distribution: BTreeMap<RoundStatus, u64>,
    /// Mean days from start to completion of completed rounds.
    pub average_resolution_days: f64,
    pub rework_cases: u64,
    /// Percentage of cases with more than one round.
    pub rework_rate: f64,
    pub staff_performance: Vec<StaffPerformance>,
    pub activity: ActivitySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffPerformance {
    pub staff_id: Uuid,
    pub username: String,
    pub status_events: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    /// Cases opened within the recent-activity window.
    pub recent_cases: u64,
    /// Cases not yet closed.
    pub open_cases: u64,
    pub total_identities: u64,
    pub active_staff: u64,
    pub total_customers: u64,
}

pub struct StatsService<S: RepairStore> {
    deps: Arc<Deps<S>>,
}

impl<S: RepairStore> Clone for StatsService<S> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
        }
    }
}

impl<S: RepairStore> StatsService<S> {
    pub(crate) fn new(deps: Arc<Deps<S>>) -> Self {
        Self { deps }
    }

    /// Statistics over cases created within `created`.
    pub async fn fleet_statistics(
        &self,
        ctx: &RequestContext,
        created: DateRange,
    ) -> RepairResult<FleetStatistics> {
        self.deps.require_admin(ctx)?;
        let store = &*self.deps.store;

        let total_cases = store.cases().count(created).await?;
        let snapshots = store.rounds().list_snapshots(created).await?;
        let rework_cases = count_rework_cases(&snapshots);

        let active_staff = store
            .identities()
            .list_all(IdentityFilter {
                role: Some(Role::Staff),
                status: Some(IdentityStatus::Active),
            })
            .await?;
        let activity = store.rounds().count_events_by_operator(created).await?;

        let window = self.deps.config.recent_window()?;
        let since = self
            .deps
            .clock
            .now()
            .checked_sub_signed(window)
            .ok_or_else(|| RepairError::validation("recent_window_days", "out of range"))?;
        let recent = DateRange {
            from: Some(since),
            to: None,
        };

        Ok(FleetStatistics {
            total_cases,
            status_distribution: status_distribution(&snapshots),
            average_resolution_days: average_resolution_days(&snapshots),
            rework_cases,
            rework_rate: rework_rate(rework_cases, total_cases),
            staff_performance: staff_performance(
                &active_staff,
                &activity,
                self.deps.config.stats_top_staff,
            ),
            activity: ActivitySummary {
                recent_cases: store.cases().count(recent).await?,
                open_cases: store.cases().count_open().await?,
                total_identities: store.identities().count(IdentityFilter::default()).await?,
                active_staff: active_staff.len() as u64,
                total_customers: store.customers().count().await?,
            },
        })
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Latest round of each case: most recently started, ties going to the
/// higher round number.
fn latest_rounds(snapshots: &[RoundSnapshot]) -> HashMap<Uuid, &RoundSnapshot> {
    let mut latest: HashMap<Uuid, &RoundSnapshot> = HashMap::new();
    for snapshot in snapshots {
        latest
            .entry(snapshot.case_id)
            .and_modify(|current| {
                if (snapshot.started_at, snapshot.round_no)
                    > (current.started_at, current.round_no)
                {
                    *current = snapshot;
                }
            })
            .or_insert(snapshot);
    }
    latest
}

pub fn status_distribution(snapshots: &[RoundSnapshot]) -> BTreeMap<RoundStatus, u64> {
    let mut distribution = BTreeMap::new();
    for snapshot in latest_rounds(snapshots).into_values() {
        *distribution.entry(snapshot.status).or_insert(0) += 1;
    }
    distribution
}

/// Mean resolution time of completed rounds in days, rounded to one
/// decimal. Zero when nothing has completed.
pub fn average_resolution_days(snapshots: &[RoundSnapshot]) -> f64 {
    let durations: Vec<f64> = snapshots
        .iter()
        .filter_map(|s| s.completed_at.map(|done| (done - s.started_at).num_seconds()))
        .map(|secs| secs as f64 / SECONDS_PER_DAY)
        .collect();
    if durations.is_empty() {
        return 0.0;
    }
    round_one_decimal(durations.iter().sum::<f64>() / durations.len() as f64)
}

/// Cases with more than one round.
pub fn count_rework_cases(snapshots: &[RoundSnapshot]) -> u64 {
    let mut rounds_per_case: HashMap<Uuid, u32> = HashMap::new();
    for snapshot in snapshots {
        *rounds_per_case.entry(snapshot.case_id).or_insert(0) += 1;
    }
    rounds_per_case.values().filter(|&&n| n > 1).count() as u64
}

/// Rework percentage, rounded to one decimal. Zero when there are no cases.
pub fn rework_rate(rework_cases: u64, total_cases: u64) -> f64 {
    if total_cases == 0 {
        return 0.0;
    }
    round_one_decimal(rework_cases as f64 / total_cases as f64 * 100.0)
}

/// Status-event counts of active staff, busiest first, ties broken by
/// username. Staff without events are included with a zero count.
pub fn staff_performance(
    active_staff: &[Identity],
    activity: &[OperatorActivity],
    limit: usize,
) -> Vec<StaffPerformance> {
    let counts: HashMap<Uuid, u64> = activity
        .iter()
        .map(|a| (a.operator_id, a.events))
        .collect();

    let mut performance: Vec<StaffPerformance> = active_staff
        .iter()
        .map(|staff| StaffPerformance {
            staff_id: staff.id,
            username: staff.username.clone(),
            status_events: counts.get(&staff.id).copied().unwrap_or(0),
        })
        .collect();
    performance.sort_by(|a, b| {
        b.status_events
            .cmp(&a.status_events)
            .then_with(|| a.username.cmp(&b.username))
    });
    performance.truncate(limit);
    performance
}
