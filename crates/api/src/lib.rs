//! HTTP surface over the notification service.
//!
//! Endpoints:
//! - GET  /health
//! - POST /api/notifications/message: dispatch to one guardian
//! - POST /api/notifications/bulletin: bulletin-available notice
//! - POST /api/notifications/bulk: dispatch to many guardians
//! - GET  /api/notifications/{id}/status
//! - GET  /api/notifications/guardian/{id}/history
//! - POST /api/notifications/retry-failed: start a retry sweep
//! - POST /api/notifications/cleanup?days_to_keep=N
//! - GET  /api/notifications/statistics

pub mod routes;
pub mod state;
