use std::collections::BTreeMap;

use crate::analyzers::types::StationSummary;
use crate::record::UsageRecord;

#[derive(Default)]
struct CountAccumulator {
    sum: u64,
    present: usize,
}

impl CountAccumulator {
    fn push(&mut self, value: Option<u64>) {
        if let Some(v) = value {
            self.sum = self.sum.saturating_add(v);
            self.present += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.present == 0 {
            None
        } else {
            Some(self.sum as f64 / self.present as f64)
        }
    }
}

#[derive(Default)]
struct StationAccumulator {
    rentals: CountAccumulator,
    returns: CountAccumulator,
}

/// Reduces raw usage rows into one [`StationSummary`] per `(district, station)`.
///
/// Names are grouped exactly as given. Missing counts are left out of both
/// the means and the sums. Output is ordered by `(district, station)`, which
/// is the base order every later ranking breaks ties with.
pub fn aggregate_stations(records: &[UsageRecord]) -> Vec<StationSummary> {
    let mut groups: BTreeMap<(&str, &str), StationAccumulator> = BTreeMap::new();

    for record in records {
        let acc = groups
            .entry((record.district.as_str(), record.station.as_str()))
            .or_default();
        acc.rentals.push(record.rentals);
        acc.returns.push(record.returns);
    }

    groups
        .into_iter()
        .map(|((district, station), acc)| {
            StationSummary::from_totals(
                district,
                station,
                acc.rentals.mean(),
                acc.rentals.sum,
                acc.returns.mean(),
                acc.returns.sum,
            )
        })
        .collect()
}

/// The `n` rows with the largest `key`, ties kept in input order.
pub fn top_n_by<F>(rows: &[StationSummary], n: usize, key: F) -> Vec<StationSummary>
where
    F: Fn(&StationSummary) -> f64,
{
    let mut ranked = rows.to_vec();
    sort_desc_by(&mut ranked, key);
    ranked.truncate(n);
    ranked
}

/// The `n` rows with the smallest `key`, ties kept in input order.
pub fn bottom_n_by<F>(rows: &[StationSummary], n: usize, key: F) -> Vec<StationSummary>
where
    F: Fn(&StationSummary) -> f64,
{
    let mut ranked = rows.to_vec();
    ranked.sort_by(|a, b| key(a).total_cmp(&key(b)));
    ranked.truncate(n);
    ranked
}

/// Stable descending sort.
pub fn sort_desc_by<F>(rows: &mut [StationSummary], key: F)
where
    F: Fn(&StationSummary) -> f64,
{
    rows.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

/// Summary table in presentation order: total rentals, descending.
pub fn summarize(records: &[UsageRecord]) -> Vec<StationSummary> {
    let mut summaries = aggregate_stations(records);
    sort_desc_by(&mut summaries, |s| s.total_rentals as f64);
    summaries
}
