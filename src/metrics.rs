use crate::models::{ClientRecord, ClientStats, PortfolioMetrics};

/// Portfolio-wide averages over settled clients. Averages with no contributing
/// clients are `0`, which callers render as "no data".
pub fn aggregate(clients: &[ClientRecord]) -> PortfolioMetrics {
    let settled: Vec<&ClientStats> = clients.iter().filter_map(|c| c.settled_stats()).collect();

    let clients_with_alerts = settled.iter().filter(|s| s.alert_count > 0).count();
    let avg_cpl = mean(settled.iter().map(|s| s.cpl_7d));
    let avg_booking_rate = mean(settled.iter().filter_map(|s| s.booking_rate_7d));
    // Zero rates are left out of the mean along with clients without appointments.
    let avg_show_up_rate = mean(
        settled
            .iter()
            .filter_map(|s| show_up_rate(s))
            .filter(|rate| *rate > 0.0),
    );

    PortfolioMetrics {
        total_clients: clients.len(),
        clients_with_alerts,
        avg_cpl,
        avg_booking_rate,
        avg_show_up_rate,
    }
}

/// Show-ups as a percentage of total appointments, if there were any.
pub fn show_up_rate(stats: &ClientStats) -> Option<f64> {
    if stats.total_appointments_7d == 0 {
        None
    } else {
        Some(stats.show_ups_7d as f64 / stats.total_appointments_7d as f64 * 100.0)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
