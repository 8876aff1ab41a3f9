//! Alert notifications for pricing events.
//!
//! Delivery is structured logging; an in-memory history supports the
//! query surface and tests. The notifier is an explicit, constructed
//! instance handed to whoever needs it — no process-wide singleton.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

use crate::arbitrage::Opportunity;

/// Kind of pricing event being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceDrop,
    ArbitrageOpportunity,
    AvailabilityChange,
    AnomalyDetected,
}

/// One recorded alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Emits and records pricing alerts.
pub struct AlertNotifier {
    enabled: bool,
    history: Mutex<Vec<Alert>>,
}

impl AlertNotifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Emit one alert. Returns false when the notifier is disabled.
    pub fn send(&self, kind: AlertKind, title: impl Into<String>, message: impl Into<String>) -> bool {
        if !self.enabled {
            return false;
        }
        let alert = Alert {
            kind,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
        };
        info!(
            kind = ?alert.kind,
            title = %alert.title,
            message = %alert.message,
            "Alert"
        );
        self.history.lock().expect("alert history lock poisoned").push(alert);
        true
    }

    /// Announce each detected opportunity. Returns the number of alerts
    /// actually sent.
    pub fn alert_opportunities(&self, opportunities: &[Opportunity]) -> usize {
        let mut sent = 0;
        for opp in opportunities {
            let proj = opp.savings_projection();
            let delivered = self.send(
                AlertKind::ArbitrageOpportunity,
                format!("Arbitrage: {}", opp.gpu_model),
                format!(
                    "{} — save ${}/hr (${}/month at 24/7 usage)",
                    opp, proj.hourly, proj.monthly
                ),
            );
            if delivered {
                sent += 1;
            }
        }
        sent
    }

    /// Alerts recorded so far, oldest first.
    pub fn history(&self) -> Vec<Alert> {
        self.history.lock().expect("alert history lock poisoned").clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().expect("alert history lock poisoned").clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
