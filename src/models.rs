use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMapping {
    pub stage_name: String,
    pub category: Option<String>,
}

impl StageMapping {
    pub fn unassigned(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            category: None,
        }
    }
}

/// Identifier fields entered alongside the stage mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentifiers {
    pub subaccount_id: String,
    pub ad_account_id: String,
    /// Calendar name (e.g. `diagnosis`) to calendar id.
    pub calendars: BTreeMap<String, String>,
}

/// Providers send ids as strings, numbers or null; all of them become strings.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(value)) => value,
        Some(Raw::Unsigned(value)) => value.to_string(),
        Some(Raw::Signed(value)) => value.to_string(),
        Some(Raw::Float(value)) => value.to_string(),
        Some(Raw::Flag(value)) => value.to_string(),
        None => String::new(),
    })
}

/// A client as returned by the clients-list provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ghl_subaccount_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub meta_ad_account_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub calendar_diagnosis_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub calendar_demo_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub calendar_presuccess_id: String,
}

impl ClientData {
    /// Stand-in used when the list provider yields nothing usable.
    pub fn placeholder() -> Self {
        Self {
            client_name: "Client A".to_string(),
            ghl_subaccount_id: "12345".to_string(),
            meta_ad_account_id: "67890".to_string(),
            calendar_diagnosis_id: "cal1".to_string(),
            calendar_demo_id: "cal2".to_string(),
            calendar_presuccess_id: "cal3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientStats {
    #[serde(default)]
    pub leads_3d: u64,
    #[serde(default)]
    pub appointments_3d: u64,
    #[serde(default)]
    pub leads_7d: u64,
    #[serde(default)]
    pub appointments_7d: u64,
    #[serde(default)]
    pub booking_rate_7d: Option<f64>,
    #[serde(default)]
    pub show_ups_7d: u64,
    #[serde(default)]
    pub total_appointments_7d: u64,
    #[serde(default)]
    pub cpl_7d: f64,
    #[serde(default)]
    pub spend_7d: f64,
    #[serde(default)]
    pub alert_count: u32,
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub trend_data: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    #[serde(default)]
    pub leads: u64,
    #[serde(default)]
    pub appointments: u64,
    #[serde(default)]
    pub show_ups: u64,
}

/// A monitored client and the state of its stats fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    pub client: ClientData,
    pub stats: Option<ClientStats>,
    pub loading: bool,
}

impl ClientRecord {
    pub fn pending(client: ClientData) -> Self {
        Self {
            client,
            stats: None,
            loading: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.client.ghl_subaccount_id
    }

    /// Stats for a client whose fetch has completed with a snapshot.
    pub fn settled_stats(&self) -> Option<&ClientStats> {
        if self.loading {
            None
        } else {
            self.stats.as_ref()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub total_clients: usize,
    pub clients_with_alerts: usize,
    pub avg_cpl: f64,
    pub avg_booking_rate: f64,
    pub avg_show_up_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_tolerate_missing_fields() {
        let stats: ClientStats = serde_json::from_str(
            r#"{
                "leads_7d": 12,
                "appointments_7d": 8,
                "booking_rate_7d": null,
                "cpl_7d": 25.0,
                "trend_data": [{"date": "2026-10-01", "leads": 3}]
            }"#,
        )
        .unwrap();

        assert_eq!(stats.leads_7d, 12);
        assert_eq!(stats.booking_rate_7d, None);
        assert!(stats.alerts.is_empty());
        assert_eq!(stats.trend_data[0].date, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(stats.trend_data[0].appointments, 0);
    }

    #[test]
    fn client_ids_accept_numbers_and_null() {
        let client: ClientData = serde_json::from_str(
            r#"{"client_name": null, "ghl_subaccount_id": 42, "meta_ad_account_id": "act_9"}"#,
        )
        .unwrap();
        assert_eq!(client.client_name, "");
        assert_eq!(client.ghl_subaccount_id, "42");
        assert_eq!(client.meta_ad_account_id, "act_9");
        assert_eq!(client.calendar_demo_id, "");
    }

    #[test]
    fn loading_record_is_not_settled() {
        let mut record = ClientRecord::pending(ClientData::placeholder());
        record.stats = Some(ClientStats::default());
        assert!(record.settled_stats().is_none());
        record.loading = false;
        assert!(record.settled_stats().is_some());
        assert_eq!(record.key(), "12345");
    }
}
