use crate::core::model::{DetectionSet, Line, NO_TEXT_FOUND};

/// Renders one line left to right. Empty fragment texts still contribute a
/// separator, so they show up as doubled spaces.
pub fn format_line(line: &Line) -> String {
    let mut ordered: Vec<_> = line.fragments.iter().collect();
    ordered.sort_by(|a, b| a.anchor_x().total_cmp(&b.anchor_x()));
    ordered
        .iter()
        .map(|fragment| fragment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_document(set: &DetectionSet) -> String {
    if set.is_empty() {
        return NO_TEXT_FOUND.to_string();
    }
    set.lines
        .iter()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n")
}
