//! Scheduling domain models.
//!
//! Provides the core data types for job-shop and flow-shop problems and
//! their solutions.
//!
//! # Domain Mappings
//!
//! | u-jobshop | Manufacturing | Healthcare | Logistics |
//! |-----------|--------------|------------|-----------|
//! | Job | Order | Patient Case | Shipment |
//! | Operation | Machining step | Procedure | Transport Leg |
//! | Resource | Machine | Room | Truck |
//! | Schedule | Production Plan | OR Schedule | Route Plan |

mod instance;
mod operation;
mod schedule;

pub use instance::{FlowShopMatrix, Instance};
pub use operation::Operation;
pub use schedule::{Schedule, ScheduleRow};
