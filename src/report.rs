use std::fmt::Write;

use chrono::NaiveDate;

use crate::metrics::show_up_rate;
use crate::models::{ClientRecord, ClientStats, PortfolioMetrics};

pub fn format_currency(value: f64) -> String {
    format!("€{value:.2}")
}

pub fn format_percentage(value: f64) -> String {
    format!("{value:.1}%")
}

/// Averages of `0` mean no client contributed a value.
fn or_na(value: f64, render: fn(f64) -> String) -> String {
    if value > 0.0 {
        render(value)
    } else {
        "N/A".to_string()
    }
}

pub fn overview_lines(metrics: &PortfolioMetrics) -> Vec<String> {
    vec![
        format!("Total Clients: {}", metrics.total_clients),
        format!("Clients With Alerts: {}", metrics.clients_with_alerts),
        format!("Avg CPL: {}", or_na(metrics.avg_cpl, format_currency)),
        format!(
            "Avg Booking Rate: {}",
            or_na(metrics.avg_booking_rate, format_percentage)
        ),
        format!(
            "Avg Show-Up Rate: {}",
            or_na(metrics.avg_show_up_rate, format_percentage)
        ),
    ]
}

fn client_line(stats: &ClientStats) -> String {
    let booking_rate = stats
        .booking_rate_7d
        .map(format_percentage)
        .unwrap_or_else(|| "N/A".to_string());
    let show_ups = match show_up_rate(stats) {
        Some(_) => format!("{}/{}", stats.show_ups_7d, stats.total_appointments_7d),
        None => "No appointments".to_string(),
    };

    format!(
        "leads {} (3d) / {} (7d), appointments {} (3d) / {} (7d), booking rate {}, show-ups {}, CPL {}, spend {}",
        stats.leads_3d,
        stats.leads_7d,
        stats.appointments_3d,
        stats.appointments_7d,
        booking_rate,
        show_ups,
        format_currency(stats.cpl_7d),
        format_currency(stats.spend_7d)
    )
}

pub fn build_report(
    generated_on: NaiveDate,
    clients: &[ClientRecord],
    metrics: &PortfolioMetrics,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Client Portfolio Dashboard");
    let _ = writeln!(output, "Generated on {generated_on}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Executive Overview");
    for line in overview_lines(metrics) {
        let _ = writeln!(output, "- {line}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Client Monitoring");

    if clients.is_empty() {
        let _ = writeln!(output, "No clients to monitor.");
    }
    for record in clients {
        let name = &record.client.client_name;
        let alert_count = record.stats.as_ref().map_or(0, |s| s.alert_count);
        let summary = if record.loading {
            "loading...".to_string()
        } else {
            match &record.stats {
                Some(stats) => client_line(stats),
                None => "stats unavailable".to_string(),
            }
        };
        let badge = if alert_count > 0 {
            format!(" [{alert_count} alerts]")
        } else {
            String::new()
        };
        let _ = writeln!(output, "- {name} ({}){badge}: {summary}", record.key());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");

    let alerting: Vec<(&ClientRecord, &ClientStats)> = clients
        .iter()
        .filter_map(|c| c.settled_stats().map(|s| (c, s)))
        .filter(|(_, s)| !s.alerts.is_empty())
        .collect();

    if alerting.is_empty() {
        let _ = writeln!(output, "No alerts - All systems healthy");
    } else {
        for (record, stats) in alerting {
            let _ = writeln!(output, "### {}", record.client.client_name);
            for alert in &stats.alerts {
                let _ = writeln!(output, "- {alert}");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## 30-Day Trend");

    let mut any_trend = false;
    for record in clients {
        let Some(stats) = record.settled_stats() else {
            continue;
        };
        let Some(last) = stats.trend_data.iter().map(|p| p.date).max() else {
            continue;
        };
        any_trend = true;
        let (leads, appointments, show_ups) = stats
            .trend_data
            .iter()
            .fold((0, 0, 0), |(l, a, s), p| (l + p.leads, a + p.appointments, s + p.show_ups));
        let _ = writeln!(
            output,
            "- {}: {leads} leads, {appointments} appointments, {show_ups} show-ups over {} days (through {last})",
            record.client.client_name,
            stats.trend_data.len()
        );
    }
    if !any_trend {
        let _ = writeln!(output, "No trend data available.");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregate;
    use crate::models::{ClientData, TrendPoint};

    fn record(name: &str, id: &str, stats: Option<ClientStats>, loading: bool) -> ClientRecord {
        ClientRecord {
            client: ClientData {
                client_name: name.to_string(),
                ghl_subaccount_id: id.to_string(),
                ..ClientData::default()
            },
            stats,
            loading,
        }
    }

    #[test]
    fn zero_averages_render_as_na() {
        let lines = overview_lines(&PortfolioMetrics {
            total_clients: 3,
            ..PortfolioMetrics::default()
        });
        assert_eq!(lines[0], "Total Clients: 3");
        assert_eq!(lines[2], "Avg CPL: N/A");
        assert_eq!(lines[4], "Avg Show-Up Rate: N/A");
    }

    #[test]
    fn report_lists_clients_alerts_and_trends() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let stats = ClientStats {
            leads_7d: 12,
            appointments_7d: 8,
            show_ups_7d: 3,
            total_appointments_7d: 4,
            booking_rate_7d: Some(66.666),
            cpl_7d: 25.0,
            spend_7d: 300.0,
            alert_count: 1,
            alerts: vec!["CPL above target".to_string()],
            trend_data: vec![
                TrendPoint {
                    date: date.pred_opt().unwrap(),
                    leads: 2,
                    appointments: 1,
                    show_ups: 1,
                },
                TrendPoint {
                    date,
                    leads: 3,
                    appointments: 2,
                    show_ups: 0,
                },
            ],
            ..ClientStats::default()
        };
        let clients = vec![
            record("Acme", "a1", Some(stats), false),
            record("Globex", "g1", None, true),
        ];
        let metrics = aggregate(&clients);
        let report = build_report(date, &clients, &metrics);

        assert!(report.contains("Generated on 2026-10-17"));
        assert!(report.contains("- Avg CPL: €25.00"));
        assert!(report.contains("booking rate 66.7%, show-ups 3/4"));
        assert!(report.contains("- Acme (a1) [1 alerts]"));
        assert!(report.contains("- Globex (g1): loading..."));
        assert!(report.contains("### Acme\n- CPL above target"));
        assert!(report.contains("Acme: 5 leads, 3 appointments, 1 show-ups over 2 days (through 2026-10-17)"));
    }

    #[test]
    fn healthy_portfolio_has_no_alerts_section_entries() {
        let clients = vec![record("Acme", "a1", Some(ClientStats::default()), false)];
        let report = build_report(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            &clients,
            &aggregate(&clients),
        );
        assert!(report.contains("No alerts - All systems healthy"));
        assert!(report.contains("show-ups No appointments"));
        assert!(report.contains("No trend data available."));
    }
}
