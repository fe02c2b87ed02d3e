//! Prometheus metrics sink for the monitor.
//!
//! Gauges are registered with a dedicated [`Registry`]; exposing it over
//! HTTP is left to the embedding process.

use prometheus::{GaugeVec, Opts, Registry};
use roundlink_oracle::ports::MetricsSink;
use roundlink_types::{OfferId, RoundId};

/// Value of the `app` label attached to every metric.
pub const APP_LABEL: &str = "roundlink-monitor";

const FEED_LABELS: &[&str] = &["oracleName", "oracle", "feed"];
const BALANCE_LABELS: &[&str] = &["oracleName", "oracle", "brand"];

/// Per-oracle observation and balance gauges.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    latest_value: GaugeVec,
    last_observation: GaugeVec,
    last_round: GaugeVec,
    price_deviation: GaugeVec,
    balance: GaugeVec,
    actual_price: GaugeVec,
}

fn gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> prometheus::Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help).const_label("app", APP_LABEL), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl PrometheusMetrics {
    /// Create the gauges on a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric fails to register.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        Ok(Self {
            latest_value: gauge(
                &registry,
                "oracle_latest_value",
                "Latest value submitted by oracle",
                FEED_LABELS,
            )?,
            last_observation: gauge(
                &registry,
                "oracle_last_observation",
                "Last epoch in which oracle made an observation",
                FEED_LABELS,
            )?,
            last_round: gauge(
                &registry,
                "oracle_last_round",
                "Last round in which oracle made an observation",
                FEED_LABELS,
            )?,
            price_deviation: gauge(
                &registry,
                "oracle_price_deviation",
                "Latest price deviation by oracle",
                FEED_LABELS,
            )?,
            balance: gauge(&registry, "oracle_balance", "Oracle balances", BALANCE_LABELS)?,
            actual_price: gauge(
                &registry,
                "actual_price",
                "Actual last price from feed",
                &["feed"],
            )?,
            registry,
        })
    }

    /// Registry holding every gauge, for an exporter to gather.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl MetricsSink for PrometheusMetrics {
    fn record_observation(
        &self,
        oracle_name: &str,
        oracle: &str,
        feed: &str,
        price: f64,
        id: OfferId,
        actual_price: Option<f64>,
        round: RoundId,
    ) {
        let labels = [oracle_name, oracle, feed];
        self.latest_value.with_label_values(&labels).set(price);
        self.last_observation.with_label_values(&labels).set(id as f64);
        self.last_round.with_label_values(&labels).set(round as f64);
        let Some(actual_price) = actual_price else {
            return;
        };
        // Deviation is undefined against a zero reference price.
        if actual_price != 0.0 {
            let deviation = ((price - actual_price) / actual_price).abs() * 100.0;
            self.price_deviation.with_label_values(&labels).set(deviation);
        }
        self.actual_price.with_label_values(&[feed]).set(actual_price);
    }

    fn record_balance(&self, oracle_name: &str, oracle: &str, brand: &str, value: f64) {
        self.balance
            .with_label_values(&[oracle_name, oracle, brand])
            .set(value);
    }
}
