//! Rebuild printed lines from positioned runs.
//!
//! Runs are bucketed by rounded baseline, buckets closer than the layout
//! tolerance merge into one line, and horizontal gaps turn back into spaces
//! so that print columns stay apart in the resulting text.

use super::glyphs::PositionedRun;
use crate::config::LayoutProfile;
use std::collections::BTreeMap;
use tracing::debug;

/// Runs placed further out than this are off any real page.
const MAX_COORDINATE: f64 = 1.0e5;

/// Widest gap rendered as spaces; larger gaps only occur between stray runs.
const MAX_GAP_SPACES: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedLine {
    pub text: String,
    /// Baseline of the topmost bucket in the line.
    pub y: f64,
}

/// Lines of one page. `stop_marker` is set when a duplicate-copy marker was
/// found; `lines` then holds only what came before it, and the caller must
/// not read any further content of the document.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub lines: Vec<ReconstructedLine>,
    pub stop_marker: Option<String>,
}

pub struct LineReconstructor<'a> {
    profile: LayoutProfile,
    stop_markers: &'a [String],
}

impl<'a> LineReconstructor<'a> {
    pub fn new(profile: LayoutProfile, stop_markers: &'a [String]) -> Self {
        Self {
            profile,
            stop_markers,
        }
    }

    pub fn reconstruct(&self, runs: &[PositionedRun]) -> PageLayout {
        let mut buckets: BTreeMap<i64, Vec<&PositionedRun>> = BTreeMap::new();
        let mut off_page = 0usize;
        for run in runs {
            if !on_page(run) {
                off_page += 1;
                continue;
            }
            buckets.entry(run.y.round() as i64).or_default().push(run);
        }
        if off_page > 0 {
            debug!(dropped = off_page, "Ignoring runs outside the page coordinate range");
        }

        // top of page first
        let mut groups: Vec<(i64, Vec<&PositionedRun>)> = Vec::new();
        let mut previous_key: Option<i64> = None;
        for (key, bucket) in buckets.into_iter().rev() {
            let merge = previous_key
                .is_some_and(|prev| (prev.abs_diff(key) as f64) < self.profile.line_tolerance);
            match groups.last_mut() {
                Some((_, group)) if merge => group.extend(bucket),
                _ => groups.push((key, bucket)),
            }
            previous_key = Some(key);
        }

        let mut layout = PageLayout::default();
        for (key, mut group) in groups {
            if let Some(marker) = group.iter().find_map(|r| self.find_marker(&r.text)) {
                layout.stop_marker = Some(marker);
                return layout;
            }
            group.sort_by(|a, b| a.x.total_cmp(&b.x));
            let text = self.assemble(&group);
            if let Some(marker) = self.find_marker(&text) {
                layout.stop_marker = Some(marker);
                return layout;
            }
            layout.lines.push(ReconstructedLine {
                text,
                y: key as f64,
            });
        }
        layout
    }

    /// Concatenate x-sorted runs, one space per `units_per_space` of gap.
    fn assemble(&self, runs: &[&PositionedRun]) -> String {
        let per_space = self.profile.units_per_space;
        let mut text = String::new();
        let mut cursor: Option<f64> = None;
        for run in runs {
            if let Some(end) = cursor {
                let gap = (run.x - end).max(0.0);
                let spaces = ((gap / per_space).floor() as usize).min(MAX_GAP_SPACES);
                text.extend(std::iter::repeat_n(' ', spaces));
            }
            text.push_str(&run.text);
            let estimated = run.text.chars().count() as f64 * per_space;
            cursor = Some(run.x + run.width.max(estimated));
        }
        text
    }

    pub fn find_marker(&self, text: &str) -> Option<String> {
        self.stop_markers
            .iter()
            .find(|m| !m.is_empty() && text.contains(m.as_str()))
            .cloned()
    }
}

fn on_page(run: &PositionedRun) -> bool {
    [run.x, run.y, run.width]
        .iter()
        .all(|v| v.is_finite() && v.abs() <= MAX_COORDINATE)
}
