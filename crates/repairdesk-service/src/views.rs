//! Read models assembled from several repositories.

use std::collections::HashMap;

use repairdesk_core::error::{RepairError, RepairResult};
use repairdesk_core::models::customer::Customer;
use repairdesk_core::models::device::Device;
use repairdesk_core::models::round::ServiceRound;
use repairdesk_core::models::service_case::{ReworkFlags, ServiceCase};
use repairdesk_core::models::shipment::Shipment;
use repairdesk_core::models::status_event::StatusEvent;
use repairdesk_core::repository::{
    IdentityRepository, RepairStore, ServiceRoundRepository, ShipmentRepository,
};
use serde::Serialize;
use uuid::Uuid;

/// Who recorded a status event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorRef {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: StatusEvent,
    /// `None` when the operator identity no longer resolves.
    pub operator: Option<OperatorRef>,
}

/// A round with its history, both newest first.
#[derive(Debug, Clone, Serialize)]
pub struct RoundDetail {
    pub round: ServiceRound,
    pub events: Vec<EventDetail>,
    pub shipments: Vec<Shipment>,
}

/// One row of the case list.
#[derive(Debug, Clone, Serialize)]
pub struct CaseSummary {
    pub case: ServiceCase,
    /// Most recently started round; its status is the case's status.
    pub latest_round: Option<ServiceRound>,
    pub round_count: usize,
    pub rework: ReworkFlags,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseDetail {
    pub case: ServiceCase,
    pub device: Device,
    pub customer: Customer,
    pub rework: ReworkFlags,
    /// Newest first.
    pub rounds: Vec<RoundDetail>,
}

/// A case with its rounds, as shown in a device history.
#[derive(Debug, Clone, Serialize)]
pub struct CaseHistory {
    pub case: ServiceCase,
    pub rework: ReworkFlags,
    pub rounds: Vec<RoundDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceDetail {
    pub device: Device,
    pub customer: Customer,
    /// Newest first.
    pub cases: Vec<ServiceCase>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    pub customer: Customer,
    /// Newest first.
    pub devices: Vec<Device>,
}

/// Current state of a customer's device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceOverview {
    pub device: Device,
    /// Absent while the device has never been serviced.
    pub latest_case: Option<CaseOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseOverview {
    pub case: ServiceCase,
    pub rework: ReworkFlags,
    pub latest_round: Option<ServiceRound>,
    pub latest_event: Option<StatusEvent>,
    pub latest_shipment: Option<Shipment>,
}

/// Full service history of one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceHistory {
    pub device: Device,
    /// Newest first.
    pub cases: Vec<CaseHistory>,
}

pub(crate) fn rework_flags(rounds: &[ServiceRound]) -> ReworkFlags {
    ReworkFlags::from_round_numbers(rounds.iter().map(|r| r.round_no))
}

/// Rounds of a case, newest first, each with its events and shipments.
pub(crate) async fn round_details<S: RepairStore>(
    store: &S,
    case_id: Uuid,
) -> RepairResult<Vec<RoundDetail>> {
    let rounds = store.rounds().list_for_case(case_id).await?;
    let mut operators: HashMap<Uuid, Option<OperatorRef>> = HashMap::new();
    let mut details = Vec::with_capacity(rounds.len());
    for round in rounds {
        let mut events = Vec::new();
        for event in store.rounds().list_events(round.id).await? {
            let operator = match operators.get(&event.operator_id) {
                Some(known) => known.clone(),
                None => {
                    let resolved = resolve_operator(store, event.operator_id).await?;
                    operators.insert(event.operator_id, resolved.clone());
                    resolved
                }
            };
            events.push(EventDetail { event, operator });
        }
        let shipments = store.shipments().list_for_round(round.id).await?;
        details.push(RoundDetail {
            round,
            events,
            shipments,
        });
    }
    Ok(details)
}

async fn resolve_operator<S: RepairStore>(
    store: &S,
    id: Uuid,
) -> RepairResult<Option<OperatorRef>> {
    match store.identities().get_by_id(id).await {
        Ok(identity) => Ok(Some(OperatorRef {
            id: identity.id,
            username: identity.username,
        })),
        Err(RepairError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

pub(crate) async fn case_history<S: RepairStore>(
    store: &S,
    case: ServiceCase,
) -> RepairResult<CaseHistory> {
    let rounds = round_details(store, case.id).await?;
    let rework = ReworkFlags::from_round_numbers(rounds.iter().map(|d| d.round.round_no));
    Ok(CaseHistory {
        case,
        rework,
        rounds,
    })
}
