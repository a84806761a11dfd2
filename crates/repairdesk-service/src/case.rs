//! Service case lifecycle: cases, rounds and status transitions.

use std::sync::Arc;

use repairdesk_core::error::{RepairError, RepairResult};
use repairdesk_core::models::audit::AuditAction;
use repairdesk_core::models::capability::Capability;
use repairdesk_core::models::round::{
    CreateRound, RoundStatus, ServiceRound, TransitionStatus, UpdateRound,
};
use repairdesk_core::models::service_case::{
    CaseFilter, CreateServiceCase, ReworkFlags, ServiceCase, UpdateServiceCase,
};
use repairdesk_core::models::status_event::StatusEvent;
use repairdesk_core::repository::{
    CustomerRepository, DeviceRepository, PaginatedResult, Pagination, RepairStore,
    ServiceCaseRepository, ServiceRoundRepository,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::deps::Deps;
use crate::recorder::AuditEvent;
use crate::views::{CaseDetail, CaseSummary, rework_flags, round_details};

const READ_CASES: [Capability; 2] = [Capability::CaseReadAll, Capability::CaseReadAssigned];

/// Input for opening a new case on a device.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCase {
    pub device_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Problem reported for the first round.
    pub issue: String,
}

/// Requested status change of a round.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub to_status: RoundStatus,
    pub notes: Option<String>,
    pub location: Option<String>,
}

impl StatusChange {
    pub fn to(to_status: RoundStatus) -> Self {
        Self {
            to_status,
            notes: None,
            location: None,
        }
    }
}

pub struct CaseService<S: RepairStore> {
    deps: Arc<Deps<S>>,
}

impl<S: RepairStore> Clone for CaseService<S> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
        }
    }
}

impl<S: RepairStore> CaseService<S> {
    pub(crate) fn new(deps: Arc<Deps<S>>) -> Self {
        Self { deps }
    }

    /// Open a case and its first `PENDING` round.
    ///
    /// Creations racing for the same daily sequence number are retried up
    /// to the configured number of attempts.
    pub async fn create_case(
        &self,
        ctx: &RequestContext,
        input: NewCase,
    ) -> RepairResult<(ServiceCase, ServiceRound)> {
        self.deps
            .require_staff(ctx, &[Capability::CaseWrite])
            .await?;
        self.deps.store.devices().get_by_id(input.device_id).await?;

        let attempts = self.deps.config.case_number_attempts.max(1);
        let mut attempt = 1;
        let (case, round) = loop {
            let create = CreateServiceCase {
                device_id: input.device_id,
                title: input.title.clone(),
                description: input.description.clone(),
                issue: input.issue.clone(),
                opened_at: self.deps.clock.now(),
            };
            match self.deps.store.cases().create_with_first_round(create).await {
                Ok(created) => break created,
                Err(RepairError::Conflict { reason }) if attempt < attempts => {
                    warn!(attempt, %reason, "case number taken, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };
        info!(case_number = %case.case_number, device_id = %case.device_id, "case opened");

        self.deps
            .recorder
            .record(
                ctx,
                case.created_at,
                AuditEvent::new(AuditAction::CreateCase, "service_case", case.id).with_details(
                    json!({
                        "case_number": case.case_number,
                        "device_id": case.device_id,
                        "round_id": round.id,
                    }),
                ),
            )
            .await;

        Ok((case, round))
    }

    /// Move a round to a new status, appending a status event.
    pub async fn transition_status(
        &self,
        ctx: &RequestContext,
        round_id: Uuid,
        change: StatusChange,
    ) -> RepairResult<(StatusEvent, ServiceRound)> {
        let actor = self
            .deps
            .require_staff(ctx, &[Capability::CaseWrite])
            .await?;
        let round = self.deps.store.rounds().get_by_id(round_id).await?;

        let policy = &self.deps.config.transition_policy;
        let expected_from = if policy.is_restrictive() {
            if !policy.permits(round.status, change.to_status) {
                return Err(RepairError::InvalidState {
                    reason: format!(
                        "round cannot move from {} to {}",
                        round.status, change.to_status
                    ),
                });
            }
            Some(round.status)
        } else {
            None
        };

        let (event, round) = self
            .deps
            .store
            .rounds()
            .transition_status(TransitionStatus {
                round_id,
                event_id: Uuid::new_v4(),
                to_status: change.to_status,
                expected_from,
                notes: change.notes,
                location: change.location,
                operator_id: actor.id,
                at: self.deps.clock.now(),
            })
            .await?;
        info!(round_id = %round_id, to = %event.to_status, "round status changed");

        self.deps
            .recorder
            .record(
                ctx,
                event.created_at,
                AuditEvent::new(AuditAction::UpdateStatus, "service_round", round_id).with_details(
                    json!({
                        "case_id": round.case_id,
                        "from": event.from_status,
                        "to": event.to_status,
                    }),
                ),
            )
            .await;

        Ok((event, round))
    }

    /// Open a follow-up round once the latest round has finished.
    pub async fn open_rework_round(
        &self,
        ctx: &RequestContext,
        case_id: Uuid,
        issue: String,
    ) -> RepairResult<ServiceRound> {
        self.deps
            .require_staff(ctx, &[Capability::CaseWrite])
            .await?;
        self.deps.store.cases().get_by_id(case_id).await?;

        let rounds = self.deps.store.rounds().list_for_case(case_id).await?;
        let latest = rounds
            .iter()
            .max_by_key(|r| r.round_no)
            .ok_or_else(|| RepairError::InvalidState {
                reason: "case has no rounds".into(),
            })?;
        if !latest.status.allows_rework() {
            return Err(RepairError::InvalidState {
                reason: format!(
                    "round {} is {}; rework needs a delivered, closed, returned or cancelled round",
                    latest.round_no, latest.status
                ),
            });
        }

        let round = self
            .deps
            .store
            .rounds()
            .create(CreateRound {
                case_id,
                round_no: latest.round_no + 1,
                issue,
                started_at: self.deps.clock.now(),
            })
            .await?;
        info!(case_id = %case_id, round_no = round.round_no, "rework round opened");

        self.deps
            .recorder
            .record(
                ctx,
                round.started_at,
                AuditEvent::new(AuditAction::OpenReworkRound, "service_round", round.id)
                    .with_details(json!({ "case_id": case_id, "round_no": round.round_no })),
            )
            .await;

        Ok(round)
    }

    /// Update diagnosis, resolution, cost or warranty. Never touches the
    /// round status.
    pub async fn update_round(
        &self,
        ctx: &RequestContext,
        round_id: Uuid,
        input: UpdateRound,
    ) -> RepairResult<ServiceRound> {
        self.deps
            .require_staff(ctx, &[Capability::CaseWrite])
            .await?;
        if matches!(input.cost, Some(Some(cost)) if cost <= Decimal::ZERO) {
            return Err(RepairError::validation("cost", "must be positive"));
        }
        if matches!(input.warranty_days, Some(Some(0))) {
            return Err(RepairError::validation("warranty_days", "must be positive"));
        }

        let changed: Vec<&str> = [
            ("diagnosis", input.diagnosis.is_some()),
            ("resolution", input.resolution.is_some()),
            ("cost", input.cost.is_some()),
            ("warranty_days", input.warranty_days.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect();

        let now = self.deps.clock.now();
        let round = self
            .deps
            .store
            .rounds()
            .update_details(round_id, input, now)
            .await?;

        self.deps
            .recorder
            .record(
                ctx,
                now,
                AuditEvent::new(AuditAction::UpdateRound, "service_round", round_id)
                    .with_details(json!({ "changed": changed })),
            )
            .await;

        Ok(round)
    }

    pub async fn update_case(
        &self,
        ctx: &RequestContext,
        case_id: Uuid,
        input: UpdateServiceCase,
    ) -> RepairResult<ServiceCase> {
        self.deps
            .require_staff(ctx, &[Capability::CaseWrite])
            .await?;
        let now = self.deps.clock.now();
        let case = self.deps.store.cases().update(case_id, input, now).await?;

        self.deps
            .recorder
            .record(
                ctx,
                now,
                AuditEvent::new(AuditAction::UpdateCase, "service_case", case_id)
                    .with_details(json!({ "case_number": case.case_number })),
            )
            .await;

        Ok(case)
    }

    /// Close the case. Independent of its rounds' statuses; closing twice
    /// keeps the first closure time.
    pub async fn close_case(&self, ctx: &RequestContext, case_id: Uuid) -> RepairResult<ServiceCase> {
        self.deps
            .require_staff(ctx, &[Capability::CaseWrite])
            .await?;
        let now = self.deps.clock.now();
        let case = self.deps.store.cases().close(case_id, now).await?;
        info!(case_number = %case.case_number, "case closed");

        self.deps
            .recorder
            .record(
                ctx,
                now,
                AuditEvent::new(AuditAction::CloseCase, "service_case", case_id)
                    .with_details(json!({ "case_number": case.case_number })),
            )
            .await;

        Ok(case)
    }

    pub async fn list_cases(
        &self,
        ctx: &RequestContext,
        filter: CaseFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<CaseSummary>> {
        self.deps.require_staff(ctx, &READ_CASES).await?;
        let page = self.deps.store.cases().list(filter, pagination).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for case in page.items {
            let rounds = self.deps.store.rounds().list_for_case(case.id).await?;
            let rework = rework_flags(&rounds);
            items.push(CaseSummary {
                round_count: rounds.len(),
                latest_round: rounds.into_iter().next(),
                rework,
                case,
            });
        }

        Ok(PaginatedResult {
            items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    pub async fn get_case(&self, ctx: &RequestContext, case_id: Uuid) -> RepairResult<CaseDetail> {
        self.deps.require_staff(ctx, &READ_CASES).await?;
        let store = &*self.deps.store;

        let case = store.cases().get_by_id(case_id).await?;
        let device = store.devices().get_by_id(case.device_id).await?;
        let customer = store.customers().get_by_id(device.customer_id).await?;
        let rounds = round_details(store, case_id).await?;
        let rework = ReworkFlags::from_round_numbers(rounds.iter().map(|d| d.round.round_no));

        Ok(CaseDetail {
            case,
            device,
            customer,
            rework,
            rounds,
        })
    }
}
