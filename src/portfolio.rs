use std::future::Future;

use tokio::task::JoinSet;

use crate::metrics;
use crate::models::{ClientData, ClientRecord, ClientStats, PortfolioMetrics};

/// The monitored clients, one slot per subaccount id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    clients: Vec<ClientRecord>,
}

impl Portfolio {
    /// Starts every client in the loading state. An empty list falls back to the placeholder client.
    pub fn from_clients(clients: Vec<ClientData>) -> Self {
        let clients = if clients.is_empty() {
            tracing::warn!("no clients available, using placeholder client");
            vec![ClientData::placeholder()]
        } else {
            clients
        };
        Self {
            clients: clients.into_iter().map(ClientRecord::pending).collect(),
        }
    }

    pub fn clients(&self) -> &[ClientRecord] {
        &self.clients
    }

    /// Replaces the snapshot of every slot keyed `key` wholesale. Other slots are untouched.
    pub fn settle(&mut self, key: &str, stats: Option<ClientStats>) -> bool {
        let mut matched = false;
        for record in self.clients.iter_mut().filter(|c| c.key() == key) {
            record.stats = stats.clone();
            record.loading = false;
            matched = true;
        }
        matched
    }

    pub fn metrics(&self) -> PortfolioMetrics {
        metrics::aggregate(&self.clients)
    }

    /// Fetches stats for every client concurrently, settling each slot as its fetch
    /// completes and recomputing the metrics after each one.
    pub async fn refresh<F, Fut>(&mut self, fetch: F) -> PortfolioMetrics
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = anyhow::Result<ClientStats>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for record in &self.clients {
            let key = record.key().to_string();
            let request = fetch(key.clone());
            tasks.spawn(async move { (key, request.await) });
        }

        let mut latest = self.metrics();
        while let Some(joined) = tasks.join_next().await {
            let (key, result) = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(error = %err, "stats task failed to complete");
                    continue;
                }
            };

            let stats = match result {
                Ok(stats) => Some(stats),
                Err(err) => {
                    tracing::warn!(client = %key, error = %err, "live stats unavailable");
                    None
                }
            };
            if !self.settle(&key, stats) {
                tracing::warn!(client = %key, "stats arrived for an unknown client");
            }
            latest = self.metrics();
            tracing::debug!(client = %key, ?latest, "portfolio metrics recomputed");
        }
        latest
    }
}
