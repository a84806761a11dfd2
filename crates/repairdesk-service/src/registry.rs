//! Customer and device registry.

use std::sync::Arc;

use repairdesk_core::error::RepairResult;
use repairdesk_core::models::audit::AuditAction;
use repairdesk_core::models::capability::Capability;
use repairdesk_core::models::customer::{Customer, UpdateCustomer};
use repairdesk_core::models::device::{CreateDevice, Device, DeviceFilter, UpdateDevice};
use repairdesk_core::repository::{
    CustomerRepository, DeviceRepository, PaginatedResult, Pagination, RepairStore,
    ServiceCaseRepository,
};
use serde_json::json;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::deps::Deps;
use crate::recorder::AuditEvent;
use crate::views::{CustomerDetail, DeviceDetail};

pub struct RegistryService<S: RepairStore> {
    deps: Arc<Deps<S>>,
}

impl<S: RepairStore> Clone for RegistryService<S> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
        }
    }
}

impl<S: RepairStore> RegistryService<S> {
    pub(crate) fn new(deps: Arc<Deps<S>>) -> Self {
        Self { deps }
    }

    pub async fn list_customers(
        &self,
        ctx: &RequestContext,
        search: Option<String>,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<Customer>> {
        self.deps
            .require_staff(ctx, &[Capability::CustomerReadAll])
            .await?;
        self.deps.store.customers().list(search, pagination).await
    }

    pub async fn get_customer(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> RepairResult<CustomerDetail> {
        self.deps
            .require_staff(ctx, &[Capability::CustomerReadAll])
            .await?;
        let customer = self.deps.store.customers().get_by_id(id).await?;
        let devices = self.deps.store.devices().list_for_customer(id).await?;
        Ok(CustomerDetail { customer, devices })
    }

    pub async fn update_customer(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: UpdateCustomer,
    ) -> RepairResult<Customer> {
        self.deps
            .require_staff(ctx, &[Capability::CustomerWrite])
            .await?;
        let customer = self.deps.store.customers().update(id, input).await?;

        self.deps
            .recorder
            .record(
                ctx,
                self.deps.clock.now(),
                AuditEvent::new(AuditAction::UpdateCustomer, "customer", id)
                    .with_details(json!({ "name": customer.name })),
            )
            .await;

        Ok(customer)
    }

    pub async fn create_device(
        &self,
        ctx: &RequestContext,
        input: CreateDevice,
    ) -> RepairResult<Device> {
        self.deps
            .require_staff(ctx, &[Capability::DeviceWrite])
            .await?;
        self.deps
            .store
            .customers()
            .get_by_id(input.customer_id)
            .await?;

        let device = self.deps.store.devices().create(input).await?;

        self.deps
            .recorder
            .record(
                ctx,
                self.deps.clock.now(),
                AuditEvent::new(AuditAction::CreateDevice, "device", device.id).with_details(
                    json!({
                        "customer_id": device.customer_id,
                        "brand": device.brand,
                        "model": device.model,
                    }),
                ),
            )
            .await;

        Ok(device)
    }

    /// Update device details. The owning customer cannot change.
    pub async fn update_device(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: UpdateDevice,
    ) -> RepairResult<Device> {
        self.deps
            .require_staff(ctx, &[Capability::DeviceWrite])
            .await?;
        let device = self.deps.store.devices().update(id, input).await?;

        self.deps
            .recorder
            .record(
                ctx,
                self.deps.clock.now(),
                AuditEvent::new(AuditAction::UpdateDevice, "device", id),
            )
            .await;

        Ok(device)
    }

    pub async fn get_device(&self, ctx: &RequestContext, id: Uuid) -> RepairResult<DeviceDetail> {
        self.deps
            .require_staff(ctx, &[Capability::DeviceRead])
            .await?;
        let device = self.deps.store.devices().get_by_id(id).await?;
        let customer = self
            .deps
            .store
            .customers()
            .get_by_id(device.customer_id)
            .await?;
        let cases = self.deps.store.cases().list_for_device(id).await?;
        Ok(DeviceDetail {
            device,
            customer,
            cases,
        })
    }

    pub async fn list_devices(
        &self,
        ctx: &RequestContext,
        filter: DeviceFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<Device>> {
        self.deps
            .require_staff(ctx, &[Capability::DeviceRead])
            .await?;
        self.deps.store.devices().list(filter, pagination).await
    }
}
