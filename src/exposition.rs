use crate::domain::{MetricKind, MetricPoint, Snapshot};
use crate::metrics::{FAMILIES, family};
use crate::registry::MetricRegistry;
use prometheus::core::Desc;
use prometheus::proto::{LabelPair, MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Exposes the currently published snapshot through a Prometheus registry.
///
/// Every scrape reads the registry's current snapshot once, so a single
/// response never mixes points from two sampling cycles.
#[derive(Clone)]
pub struct SnapshotCollector {
    registry: Arc<MetricRegistry>,
    descs: Vec<Desc>,
}

impl SnapshotCollector {
    pub fn new(registry: Arc<MetricRegistry>) -> anyhow::Result<Self> {
        let mut descs = Vec::with_capacity(FAMILIES.len());
        for family in FAMILIES {
            descs.push(Desc::new(
                family.name.to_owned(),
                family.help.to_owned(),
                family.labels.iter().map(|l| (*l).to_owned()).collect(),
                HashMap::new(),
            )?);
        }

        Ok(Self { registry, descs })
    }

    pub fn register(&self, registry: &Registry) -> anyhow::Result<()> {
        registry.register(Box::new(self.clone()))?;
        Ok(())
    }
}

impl prometheus::core::Collector for SnapshotCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        metric_families(&self.registry.current())
    }
}

fn into_labels(point: &MetricPoint) -> Vec<LabelPair> {
    point
        .labels
        .iter()
        .map(|(k, v)| {
            let mut lp = LabelPair::default();
            lp.set_name(k.clone());
            lp.set_value(v.clone());
            lp
        })
        .collect()
}

fn into_metric(point: &MetricPoint) -> prometheus::proto::Metric {
    let mut m = prometheus::proto::Metric::default();
    m.set_label(into_labels(point));

    match point.kind {
        MetricKind::Gauge => {
            let mut g = prometheus::proto::Gauge::default();
            g.set_value(point.value);
            m.set_gauge(g);
        }
        MetricKind::Counter => {
            let mut c = prometheus::proto::Counter::default();
            c.set_value(point.value);
            m.set_counter(c);
        }
    }

    m
}

/// Groups the snapshot's points into one family per metric name. Names without
/// points produce no family at all.
pub fn metric_families(snapshot: &Snapshot) -> Vec<MetricFamily> {
    let mut grouped: BTreeMap<&str, Vec<&MetricPoint>> = BTreeMap::new();
    for point in snapshot.points() {
        grouped.entry(point.name.as_str()).or_default().push(point);
    }

    grouped
        .into_iter()
        .map(|(name, points)| {
            // the catalog decides the family type, stray points of another kind are dropped
            let kind = family(name).map(|f| f.kind).unwrap_or(points[0].kind);

            let mut mf = MetricFamily::default();
            mf.set_name(name.to_owned());
            mf.set_help(family(name).map(|f| f.help).unwrap_or(name).to_owned());
            mf.set_field_type(match kind {
                MetricKind::Gauge => MetricType::GAUGE,
                MetricKind::Counter => MetricType::COUNTER,
            });
            mf.set_metric(
                points
                    .into_iter()
                    .filter(|p| p.kind == kind)
                    .map(into_metric)
                    .collect(),
            );
            mf
        })
        .collect()
}

/// Renders everything registered in `registry` in the text exposition format.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
