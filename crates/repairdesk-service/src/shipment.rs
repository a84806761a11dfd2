//! Shipment tracking.

use std::sync::Arc;

use repairdesk_core::error::RepairResult;
use repairdesk_core::models::audit::AuditAction;
use repairdesk_core::models::capability::Capability;
use repairdesk_core::models::shipment::{
    CarrierInfo, CreateShipment, Shipment, ShipmentDirection, ShipmentFilter, UpdateShipment,
};
use repairdesk_core::repository::{
    PaginatedResult, Pagination, RepairStore, ServiceRoundRepository, ShipmentRepository,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::deps::Deps;
use crate::recorder::AuditEvent;

/// Input for registering a shipment on a round.
#[derive(Debug, Clone, Deserialize)]
pub struct NewShipment {
    pub round_id: Uuid,
    pub direction: ShipmentDirection,
    #[serde(flatten)]
    pub carrier: CarrierInfo,
}

pub struct ShipmentService<S: RepairStore> {
    deps: Arc<Deps<S>>,
}

impl<S: RepairStore> Clone for ShipmentService<S> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
        }
    }
}

impl<S: RepairStore> ShipmentService<S> {
    pub(crate) fn new(deps: Arc<Deps<S>>) -> Self {
        Self { deps }
    }

    /// Register a `PENDING` shipment operated by the caller.
    pub async fn create_shipment(
        &self,
        ctx: &RequestContext,
        input: NewShipment,
    ) -> RepairResult<Shipment> {
        let actor = self
            .deps
            .require_staff(ctx, &[Capability::ShipmentWrite])
            .await?;
        self.deps.store.rounds().get_by_id(input.round_id).await?;

        let shipment = self
            .deps
            .store
            .shipments()
            .create(CreateShipment {
                round_id: input.round_id,
                direction: input.direction,
                carrier: input.carrier,
                operator_id: actor.id,
                created_at: self.deps.clock.now(),
            })
            .await?;
        info!(shipment_id = %shipment.id, round_id = %shipment.round_id, "shipment registered");

        self.deps
            .recorder
            .record(
                ctx,
                shipment.created_at,
                AuditEvent::new(AuditAction::CreateShipment, "shipment", shipment.id).with_details(
                    json!({
                        "round_id": shipment.round_id,
                        "direction": shipment.direction,
                        "tracking_number": shipment.tracking_number,
                    }),
                ),
            )
            .await;

        Ok(shipment)
    }

    /// Apply a tracking update. `shipped_at` and `actual_arrival` are
    /// recorded once and never overwritten.
    pub async fn update_shipment(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: UpdateShipment,
    ) -> RepairResult<Shipment> {
        self.deps
            .require_staff(ctx, &[Capability::ShipmentWrite])
            .await?;
        let now = self.deps.clock.now();
        let shipment = self.deps.store.shipments().update(id, input, now).await?;

        self.deps
            .recorder
            .record(
                ctx,
                now,
                AuditEvent::new(AuditAction::UpdateShipment, "shipment", id).with_details(json!({
                    "status": shipment.status,
                    "current_location": shipment.current_location,
                })),
            )
            .await;

        Ok(shipment)
    }

    pub async fn list_shipments(
        &self,
        ctx: &RequestContext,
        filter: ShipmentFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<Shipment>> {
        self.deps
            .require_staff(ctx, &[Capability::ShipmentRead])
            .await?;
        self.deps.store.shipments().list(filter, pagination).await
    }

    pub async fn get_shipment(&self, ctx: &RequestContext, id: Uuid) -> RepairResult<Shipment> {
        self.deps
            .require_staff(ctx, &[Capability::ShipmentRead])
            .await?;
        self.deps.store.shipments().get_by_id(id).await
    }
}
