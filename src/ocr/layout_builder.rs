use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::model::{DetectionSet, Line, TextFragment};

/// Default vertical tolerance, in polygon units, for two fragments to share a line.
pub const DEFAULT_LINE_THRESHOLD: f32 = 18.0;

/// Which member of the open line a new fragment is compared against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineChain {
    /// Compare with the most recently appended fragment. Lines may drift
    /// by up to the threshold at every step.
    #[default]
    Last,
    /// Compare with the fragment that opened the line.
    First,
}

/// Groups OCR fragments into reading-order lines by anchor proximity.
#[derive(Debug, Clone, Copy)]
pub struct LineClusterer {
    threshold: f32,
    chain: LineChain,
}

impl Default for LineClusterer {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_THRESHOLD)
    }
}

impl LineClusterer {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            chain: LineChain::Last,
        }
    }

    pub fn with_chain(mut self, chain: LineChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn cluster(&self, mut fragments: Vec<TextFragment>) -> DetectionSet {
        if fragments.is_empty() {
            return DetectionSet::default();
        }

        // Stable: equal anchors keep detector order.
        fragments.sort_by(reading_order);

        let mut lines = Vec::new();
        let mut iter = fragments.into_iter();
        let mut current = match iter.next() {
            Some(first) => vec![first],
            None => return DetectionSet::default(),
        };

        for fragment in iter {
            let reference = match self.chain {
                LineChain::Last => current.last(),
                LineChain::First => current.first(),
            };
            let joins = reference
                .map(|prev| (fragment.anchor_y() - prev.anchor_y()).abs() <= self.threshold)
                .unwrap_or(false);

            if joins {
                current.push(fragment);
            } else {
                lines.push(Line {
                    fragments: std::mem::replace(&mut current, vec![fragment]),
                });
            }
        }
        lines.push(Line { fragments: current });

        debug!(
            lines = lines.len(),
            threshold = self.threshold,
            "clustered fragments into lines"
        );

        DetectionSet { lines }
    }
}

fn reading_order(a: &TextFragment, b: &TextFragment) -> Ordering {
    a.anchor_y()
        .total_cmp(&b.anchor_y())
        .then_with(|| a.anchor_x().total_cmp(&b.anchor_x()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Quad;
    use pretty_assertions::assert_eq;

    fn fragment(x: f32, y: f32, text: &str) -> TextFragment {
        // 10px tall box centred on `y`.
        TextFragment::new(Quad::from_rect(x, y - 5.0, x + 40.0, y + 5.0), text, 0.9)
    }

    fn texts(set: &DetectionSet) -> Vec<Vec<&str>> {
        set.lines
            .iter()
            .map(|line| line.fragments.iter().map(|f| f.text.as_str()).collect())
            .collect()
    }

    #[test]
    fn empty_input_yields_no_lines() {
        let set = LineClusterer::default().cluster(Vec::new());
        assert!(set.is_empty());
    }

    #[test]
    fn groups_nearby_rows() {
        let set = LineClusterer::default().cluster(vec![
            fragment(50.0, 140.0, "Foo"),
            fragment(120.0, 102.0, "World"),
            fragment(50.0, 100.0, "Hello"),
        ]);
        assert_eq!(texts(&set), vec![vec!["Hello", "World"], vec!["Foo"]]);
    }

    #[test]
    fn chains_step_by_step() {
        let set = LineClusterer::default().cluster(vec![
            fragment(0.0, 100.0, "a"),
            fragment(0.0, 115.0, "b"),
            fragment(0.0, 130.0, "c"),
        ]);
        assert_eq!(set.lines.len(), 1);
        assert_eq!(set.fragment_count(), 3);
    }

    #[test]
    fn first_member_chain_bounds_the_line() {
        let set = LineClusterer::default()
            .with_chain(LineChain::First)
            .cluster(vec![
                fragment(0.0, 100.0, "a"),
                fragment(0.0, 115.0, "b"),
                fragment(0.0, 130.0, "c"),
            ]);
        assert_eq!(texts(&set), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let set = LineClusterer::new(18.0).cluster(vec![
            fragment(0.0, 100.0, "a"),
            fragment(0.0, 118.0, "b"),
            fragment(0.0, 136.5, "c"),
        ]);
        assert_eq!(texts(&set), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn ties_keep_input_order() {
        let set = LineClusterer::default().cluster(vec![
            fragment(10.0, 100.0, "first"),
            fragment(10.0, 100.0, "second"),
        ]);
        assert_eq!(texts(&set), vec![vec!["first", "second"]]);
    }

    #[test]
    fn nan_coordinates_do_not_panic() {
        let set = LineClusterer::default().cluster(vec![
            fragment(0.0, f32::NAN, "nan"),
            fragment(0.0, 10.0, "ok"),
        ]);
        assert_eq!(set.fragment_count(), 2);
    }
}
