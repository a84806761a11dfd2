//! Customer portal: read-only views of a customer's own devices.

use std::sync::Arc;

use repairdesk_core::error::{RepairError, RepairResult};
use repairdesk_core::models::identity::Role;
use repairdesk_core::models::service_case::ServiceCase;
use repairdesk_core::repository::{
    DeviceRepository, RepairStore, ServiceCaseRepository, ServiceRoundRepository,
    ShipmentRepository,
};
use uuid::Uuid;

use crate::authz::{Ownership, require_role};
use crate::context::RequestContext;
use crate::deps::Deps;
use crate::views::{CaseOverview, DeviceHistory, DeviceOverview, case_history, rework_flags};

/// The caller's customer profile. A customer identity without a linked
/// profile has nothing to show.
fn customer_profile(ctx: &RequestContext) -> RepairResult<Uuid> {
    let actor = require_role(ctx, &[Role::Customer])?;
    actor
        .customer_id
        .ok_or_else(|| RepairError::not_found("customer", actor.id))
}

pub struct PortalService<S: RepairStore> {
    deps: Arc<Deps<S>>,
}

impl<S: RepairStore> Clone for PortalService<S> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
        }
    }
}

impl<S: RepairStore> PortalService<S> {
    pub(crate) fn new(deps: Arc<Deps<S>>) -> Self {
        Self { deps }
    }

    /// Every device of the calling customer, newest first, with the state
    /// of its latest case.
    pub async fn device_overview(&self, ctx: &RequestContext) -> RepairResult<Vec<DeviceOverview>> {
        let customer_id = customer_profile(ctx)?;
        let store = &*self.deps.store;

        let devices = store.devices().list_for_customer(customer_id).await?;
        let mut overview = Vec::with_capacity(devices.len());
        for device in devices {
            let latest_case = match store.cases().latest_for_device(device.id).await? {
                Some(case) => Some(self.case_overview(case).await?),
                None => None,
            };
            overview.push(DeviceOverview {
                device,
                latest_case,
            });
        }
        Ok(overview)
    }

    /// Full history of one device owned by the caller.
    ///
    /// A device owned by someone else is reported exactly like a missing
    /// one.
    pub async fn device_history(
        &self,
        ctx: &RequestContext,
        device_id: Uuid,
    ) -> RepairResult<DeviceHistory> {
        customer_profile(ctx)?;
        let store = &*self.deps.store;

        let device = store.devices().get_by_id(device_id).await?;
        self.deps
            .authorizer
            .authorize(ctx, &[], Some(Ownership::customer(device.customer_id)))
            .await
            .map_err(|e| match e {
                RepairError::Forbidden { .. } => RepairError::not_found("device", device_id),
                other => other,
            })?;

        let cases = store.cases().list_for_device(device_id).await?;
        let mut history = Vec::with_capacity(cases.len());
        for case in cases {
            history.push(case_history(store, case).await?);
        }

        Ok(DeviceHistory {
            device,
            cases: history,
        })
    }

    async fn case_overview(&self, case: ServiceCase) -> RepairResult<CaseOverview> {
        let store = &*self.deps.store;
        let rounds = store.rounds().list_for_case(case.id).await?;
        let rework = rework_flags(&rounds);
        let latest_round = rounds.into_iter().next();

        let (latest_event, latest_shipment) = match &latest_round {
            Some(round) => (
                store.rounds().latest_event(round.id).await?,
                store.shipments().latest_for_round(round.id).await?,
            ),
            None => (None, None),
        };

        Ok(CaseOverview {
            case,
            rework,
            latest_round,
            latest_event,
            latest_shipment,
        })
    }
}
