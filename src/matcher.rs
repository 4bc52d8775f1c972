//! Dynamic-time-warping search over recorded gesture templates.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::MatcherConfig;
use crate::types::Hand;

/// Best template for a query sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateMatch {
    pub name: String,
    /// Length-normalized DTW cost.
    pub cost: f32,
}

/// Euclidean distance between two hands' flattened coordinate vectors.
///
/// Hands with different landmark counts cannot be aligned and cost infinity.
pub fn hand_distance(a: &Hand, b: &Hand) -> f32 {
    let (a, b) = (a.to_flat_vec(), b.to_flat_vec());
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f32>()
        .sqrt()
}

/// DTW alignment cost between `query` and `template`, divided by the sum of
/// their lengths. Empty sequences cost infinity.
///
/// With `band = Some(w)`, cells farther than `w` frames from the diagonal are
/// excluded; `w` is widened to the length difference so a path always exists.
pub fn dtw_cost(query: &[Hand], template: &[Hand], band: Option<usize>) -> f32 {
    let n = query.len();
    let m = template.len();
    if n == 0 || m == 0 {
        return f32::INFINITY;
    }

    let width = band.map(|w| w.max(n.abs_diff(m)));
    let in_band = |i: usize, j: usize| width.map_or(true, |w| i.abs_diff(j) <= w);

    // Row-major (n x m) cumulative cost matrix.
    let mut acc = vec![f32::INFINITY; n * m];
    for i in 0..n {
        for j in 0..m {
            if !in_band(i, j) {
                continue;
            }
            let d = hand_distance(&query[i], &template[j]);
            let best_prev = match (i, j) {
                (0, 0) => 0.0,
                (0, _) => acc[j - 1],
                (_, 0) => acc[(i - 1) * m],
                _ => acc[(i - 1) * m + j]
                    .min(acc[i * m + j - 1])
                    .min(acc[(i - 1) * m + j - 1]),
            };
            acc[i * m + j] = d + best_prev;
        }
    }

    acc[n * m - 1] / (n + m) as f32
}

/// Matches live sequences against a name-keyed set of templates.
#[derive(Debug, Clone)]
pub struct TemplateMatcher {
    config: MatcherConfig,
}

impl TemplateMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Cost of `query` against every template, cheapest first.
    ///
    /// Ties keep template-name order.
    pub fn rank<'a, I>(&self, query: &[Hand], templates: I) -> Vec<TemplateMatch>
    where
        I: IntoIterator<Item = (&'a String, &'a Vec<Hand>)>,
    {
        let mut ranked: Vec<TemplateMatch> = templates
            .into_iter()
            .map(|(name, seq)| TemplateMatch {
                name: name.clone(),
                cost: dtw_cost(query, seq, self.config.band),
            })
            .collect();
        ranked.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        ranked
    }

    /// Cheapest template whose cost does not exceed the threshold.
    pub fn best_match(
        &self,
        query: &[Hand],
        templates: &BTreeMap<String, Vec<Hand>>,
    ) -> Option<TemplateMatch> {
        if query.is_empty() {
            return None;
        }
        self.rank(query, templates)
            .into_iter()
            .next()
            .filter(|m| m.cost.is_finite() && m.cost <= self.config.threshold)
    }
}
