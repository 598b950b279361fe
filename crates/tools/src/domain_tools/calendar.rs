//! Calendar tools
//!
//! Dates and times are spoken in the business timezone; the store keeps UTC.
//! Availability answers never reveal other appointments.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use call_agent_config::BusinessConfig;
use call_agent_core::{
    required_str, CallContext, InputSchema, PropertySchema, SideEffect, Tool, ToolError,
    ToolOutput, ToolSchema,
};
use call_agent_persistence::{Appointment, AppointmentStore, PersistenceError};

use super::utils::{local_rfc3339, parse_slot, Slot, MAX_DURATION_MINUTES};

fn slot_schema(business: &BusinessConfig) -> InputSchema {
    InputSchema::object()
        .property("date", PropertySchema::string("Date (YYYY-MM-DD)"), true)
        .property("time", PropertySchema::string("Start time (HH:MM, 24h)"), true)
        .property(
            "duration_minutes",
            PropertySchema::integer("Length of the appointment in minutes")
                .with_default(json!(business.appointment_slot_minutes))
                .with_range(1.0, MAX_DURATION_MINUTES as f64),
            false,
        )
}

fn requested_slot(business: &BusinessConfig, input: &Value) -> Result<Slot, ToolError> {
    let date = required_str(input, "date")?;
    let time = required_str(input, "time")?;
    let duration = input
        .get("duration_minutes")
        .and_then(Value::as_i64)
        .unwrap_or(i64::from(business.appointment_slot_minutes));
    parse_slot(business.tz(), date, time, duration)
}

/// Check whether a slot is free
pub struct CheckAvailabilityTool {
    appointments: Arc<dyn AppointmentStore>,
    business: BusinessConfig,
}

impl CheckAvailabilityTool {
    pub fn new(appointments: Arc<dyn AppointmentStore>, business: BusinessConfig) -> Self {
        Self {
            appointments,
            business,
        }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &str {
        "check_availability"
    }

    fn description(&self) -> &str {
        "Check whether the calendar is free at a given date and time"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: slot_schema(&self.business),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::ReadOnly
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let slot = requested_slot(&self.business, &input)?;

        let available = if slot.start <= Utc::now() {
            false
        } else {
            self.appointments
                .is_available(&ctx.tenant, slot.start, slot.end)
                .await
                .map_err(|e| ToolError::internal(format!("Calendar unavailable: {}", e)))?
        };

        Ok(ToolOutput::json(json!({
            "available": available,
            "date": input["date"],
            "time": input["time"],
            "timezone": self.business.timezone,
        })))
    }
}

/// Book a slot for the caller
pub struct BookAppointmentTool {
    appointments: Arc<dyn AppointmentStore>,
    business: BusinessConfig,
}

impl BookAppointmentTool {
    pub fn new(appointments: Arc<dyn AppointmentStore>, business: BusinessConfig) -> Self {
        Self {
            appointments,
            business,
        }
    }
}

#[async_trait]
impl Tool for BookAppointmentTool {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment after the caller has confirmed the date and time"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: slot_schema(&self.business).property(
                "summary",
                PropertySchema::string("Short description of the appointment"),
                true,
            ),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Mutating
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let slot = requested_slot(&self.business, &input)?;
        let summary = required_str(&input, "summary")?;

        if slot.start <= Utc::now() {
            return Err(ToolError::invalid_params("cannot book an appointment in the past"));
        }

        let mut appointment = Appointment::new(summary, slot.start, slot.end);
        appointment.room_name = Some(ctx.room_name.clone());
        appointment.customer_phone = ctx.caller.phone().map(String::from);
        if !ctx.user.is_anonymous() {
            appointment.customer_name = Some(ctx.user.name.clone());
        }

        match self.appointments.create(&ctx.tenant, appointment).await {
            Ok(booked) => {
                let tz = self.business.tz();
                Ok(ToolOutput::json(json!({
                    "success": true,
                    "appointment_id": booked.appointment_id.to_string(),
                    "start": local_rfc3339(tz, booked.start),
                    "end": local_rfc3339(tz, booked.end),
                    "summary": booked.summary,
                })))
            }
            Err(PersistenceError::Conflict(_)) => Ok(ToolOutput::error("time slot unavailable")),
            Err(e) => Err(ToolError::internal(format!("Failed to book appointment: {}", e))),
        }
    }
}
