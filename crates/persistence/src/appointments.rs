//! Appointment calendar
//!
//! One calendar per tenant, held in memory. Booking checks for overlap and
//! inserts under the same lock, so two calls cannot take the same slot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use call_agent_core::TenantId;

use crate::PersistenceError;

/// Appointment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Occupies its slot
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Appointment data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub room_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(summary: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            appointment_id: Uuid::new_v4(),
            room_name: None,
            customer_phone: None,
            customer_name: None,
            summary: summary.to_string(),
            start,
            end,
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.status.is_active() && self.start < end && start < self.end
    }
}

/// Appointment store trait
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// No active appointment of `tenant` overlaps `[start, end)`
    async fn is_available(
        &self,
        tenant: &TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Book the slot, failing with `Conflict` if it is taken
    async fn create(&self, tenant: &TenantId, appointment: Appointment) -> Result<Appointment, PersistenceError>;
}

/// In-memory appointment store
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    calendars: RwLock<HashMap<TenantId, Vec<Appointment>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn is_available(
        &self,
        tenant: &TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let calendars = self.calendars.read();
        let taken = calendars
            .get(tenant)
            .is_some_and(|appts| appts.iter().any(|a| a.overlaps(start, end)));
        Ok(!taken)
    }

    async fn create(&self, tenant: &TenantId, appointment: Appointment) -> Result<Appointment, PersistenceError> {
        if appointment.end <= appointment.start {
            return Err(PersistenceError::InvalidData("appointment ends before it starts".into()));
        }

        let mut calendars = self.calendars.write();
        let calendar = calendars.entry(tenant.clone()).or_default();
        if calendar.iter().any(|a| a.overlaps(appointment.start, appointment.end)) {
            return Err(PersistenceError::Conflict(format!(
                "slot {} - {} is taken",
                appointment.start, appointment.end
            )));
        }

        tracing::info!(
            tenant = %tenant,
            appointment_id = %appointment.appointment_id,
            start = %appointment.start,
            "Appointment booked"
        );
        calendar.push(appointment.clone());
        Ok(appointment)
    }
}
