//! Per-candidate analysis records and their canonical wire format.
//!
//! One entry per root candidate, rendered as
//! `info move <text> visits <n> winrate <n·10⁴> prior <n·10⁴> lcb <n·10⁴>
//! order <n> pv <moves>`, all candidates joined on a single line.

use std::cmp::Ordering;

/// Snapshot of one root candidate for analysis output.
#[derive(Debug, Clone)]
pub struct AnalysisEntry {
    pub move_text: String,
    pub visits: i32,
    pub winrate: f32,
    pub policy_prior: f32,
    pub pv: String,
    pub lcb: f32,
    /// Whether this candidate has enough visits for its LCB to be trusted
    /// in ordering.
    pub lcb_ratio_exceeded: bool,
}

impl AnalysisEntry {
    /// Render this entry. `order` is appended only when non-negative.
    pub fn info_string(&self, order: i32) -> String {
        let mut out = format!(
            "info move {} visits {} winrate {} prior {} lcb {}",
            self.move_text,
            self.visits,
            (self.winrate * 10000.0) as i32,
            (self.policy_prior * 10000.0) as i32,
            (self.lcb.max(0.0) * 10000.0) as i32,
        );
        if order >= 0 {
            out.push_str(&format!(" order {order}"));
        }
        out.push_str(&format!(" pv {}", self.pv));
        out
    }
}

/// "Worse-than" ordering: trusted LCBs first, then visits, then winrate as
/// the tie-break.
fn entry_cmp(a: &AnalysisEntry, b: &AnalysisEntry) -> Ordering {
    if a.lcb_ratio_exceeded && b.lcb_ratio_exceeded && a.lcb != b.lcb {
        return a.lcb.partial_cmp(&b.lcb).unwrap_or(Ordering::Equal);
    }
    if a.visits == b.visits {
        return a
            .winrate
            .partial_cmp(&b.winrate)
            .unwrap_or(Ordering::Equal);
    }
    a.visits.cmp(&b.visits)
}

/// Sort entries best-first and render the whole candidate set as one
/// newline-terminated line.
pub fn render_analysis_line(mut entries: Vec<AnalysisEntry>) -> String {
    entries.sort_by(|a, b| entry_cmp(b, a));
    let mut line = String::new();
    for (order, entry) in entries.iter().enumerate() {
        if order > 0 {
            line.push(' ');
        }
        line.push_str(&entry.info_string(order as i32));
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(move_text: &str, visits: i32, winrate: f32, lcb: f32) -> AnalysisEntry {
        AnalysisEntry {
            move_text: move_text.to_string(),
            visits,
            winrate,
            policy_prior: 0.125,
            pv: move_text.to_string(),
            lcb,
            lcb_ratio_exceeded: visits > 10,
        }
    }

    #[test]
    fn test_info_string_format() {
        let e = entry("D3", 42, 0.5519, 0.4012);
        assert_eq!(
            e.info_string(0),
            "info move D3 visits 42 winrate 5519 prior 1250 lcb 4012 order 0 pv D3"
        );
        // Negative order is omitted.
        assert_eq!(
            e.info_string(-1),
            "info move D3 visits 42 winrate 5519 prior 1250 lcb 4012 pv D3"
        );
    }

    #[test]
    fn test_negative_lcb_clamps_to_zero() {
        let e = entry("C4", 1, 0.5, -3.0);
        assert!(e.info_string(-1).contains(" lcb 0 "));
    }

    #[test]
    fn test_render_orders_by_visits() {
        let line = render_analysis_line(vec![
            entry("A1", 3, 0.4, 0.0),
            entry("B2", 9, 0.6, 0.0),
        ]);
        assert!(line.starts_with("info move B2"));
        assert!(line.contains("order 0"));
        assert!(line.contains("info move A1"));
        assert!(line.contains("order 1"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_trusted_lcb_wins_over_visits() {
        let line = render_analysis_line(vec![
            entry("A1", 50, 0.5, 0.48),
            entry("B2", 40, 0.5, 0.52),
        ]);
        // Both exceed the ratio; higher LCB sorts first despite fewer
        // visits.
        assert!(line.starts_with("info move B2"));
    }
}
