//! Ruling-free table detection.
//!
//! Spans sharing a baseline form rows. Left edges that recur across rows,
//! bucketed to a few points, become column starts. A run of rows whose spans
//! start on those columns is a table, unless its first column is nothing but
//! list markers.

use std::collections::{HashMap, HashSet};

use super::layout::{by_value, TextSpan};
use crate::geometry::BoundingBox;
use crate::model::TableGrid;

/// Bullet glyphs that open list items.
const BULLETS: &[&str] = &[
    "-", "–", "—", "•", "·", "*", "○", "▪", "◦", "▸", "▹", "►", "■", "●", "※", "□", "◆", "◇",
    "▶", "▷", "☞", "➤", "➜",
];

/// Spans on one baseline, left to right.
#[derive(Debug, Clone)]
pub struct SpanRow {
    /// Mean baseline of the spans (PDF space)
    pub baseline: f32,
    pub spans: Vec<TextSpan>,
}

impl SpanRow {
    fn tallest_font(&self) -> f32 {
        self.spans.iter().map(|s| s.font_size).fold(0.0, f32::max)
    }
}

/// A table found on a page, in PDF space.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    /// Column start positions, ascending
    pub columns: Vec<f32>,
    /// Rows from top to bottom
    pub rows: Vec<SpanRow>,
    /// Leftmost span start
    pub left: f32,
    /// Rightmost span end
    pub right: f32,
}

impl DetectedTable {
    fn from_rows(rows: Vec<SpanRow>, columns: Vec<f32>) -> Self {
        let spans = || rows.iter().flat_map(|r| r.spans.iter());
        let left = spans().map(|s| s.x).min_by(by_value).unwrap_or(0.0);
        let right = spans().map(|s| s.x + s.width).max_by(by_value).unwrap_or(0.0);
        Self {
            columns,
            rows,
            left,
            right,
        }
    }

    /// Region covered by the table in PDF user space (y grows upward).
    ///
    /// The first baseline is raised by the ascent of its tallest font and
    /// the last one lowered by the descent.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let (first, last) = (self.rows.first()?, self.rows.last()?);
        let top = first.baseline + first.tallest_font() * 0.8;
        let bottom = last.baseline - last.tallest_font() * 0.2;

        BoundingBox::new(self.left, bottom, self.right, top)
    }

    /// Column holding a span that starts at `x`.
    ///
    /// A column owns `[start - slack, next_start - slack)`; starts outside
    /// every range go to the nearest column.
    fn column_of(&self, x: f32, slack: f32) -> usize {
        let last_end = self.right + 100.0;
        let owner = self.columns.iter().enumerate().position(|(i, &start)| {
            let end = self.columns.get(i + 1).copied().unwrap_or(last_end);
            x >= start - slack && x < end - slack
        });

        owner.unwrap_or_else(|| {
            self.columns
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| by_value(&(x - **a).abs(), &(x - **b).abs()))
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
    }
}

/// Thresholds for [`TableDetector`] (points unless noted).
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub min_rows: usize,
    pub min_columns: usize,
    /// More columns than this is usually word-level splitting
    pub max_columns: usize,
    /// Baseline distance allowed within a row, as a fraction of font size
    pub row_tolerance: f32,
    /// Share of rows (and of a row's spans) that must align with the columns
    pub min_alignment: f32,
    /// Column starts closer than this are merged
    pub column_gap: f32,
    /// Width of the buckets left edges are counted in
    pub edge_bucket: f32,
    /// Distance from a column start that still counts as aligned
    pub align_tolerance: f32,
    /// Spans may start this far left of their column
    pub cell_slack: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            row_tolerance: 0.4,
            min_alignment: 0.3,
            column_gap: 15.0,
            edge_bucket: 5.0,
            align_tolerance: 5.0,
            cell_slack: 10.0,
        }
    }
}

/// Finds tables among a page's text spans.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: DetectorConfig,
}

impl TableDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Split spans into detected tables and the spans left over.
    pub fn detect(&self, spans: Vec<TextSpan>) -> (Vec<DetectedTable>, Vec<TextSpan>) {
        let cfg = &self.config;
        if spans.len() < cfg.min_rows * cfg.min_columns {
            return (Vec::new(), spans);
        }

        let rows = self.group_rows(&spans);
        if rows.len() < cfg.min_rows {
            return (Vec::new(), spans);
        }

        let page_rows: Vec<Vec<&TextSpan>> = rows
            .iter()
            .map(|members| members.iter().map(|&i| &spans[i]).collect())
            .collect();

        let columns = self.column_starts(&page_rows);
        if columns.len() < cfg.min_columns {
            log::trace!("{} column starts, no table", columns.len());
            return (Vec::new(), spans);
        }

        let mut tables = Vec::new();
        let mut used: HashSet<usize> = HashSet::new();

        for (first, last) in self.aligned_runs(&page_rows, &columns) {
            let run = &page_rows[first..=last];
            let table_columns = self.column_starts(run);

            if table_columns.len() < cfg.min_columns {
                continue;
            }
            if table_columns.len() > cfg.max_columns {
                log::debug!(
                    "Rows {}..={}: {} columns, treated as running text",
                    first,
                    last,
                    table_columns.len()
                );
                continue;
            }
            if self.looks_like_list(run, &table_columns) {
                log::debug!("Rows {}..={}: list markers, not a table", first, last);
                continue;
            }

            used.extend(rows[first..=last].iter().flatten().copied());
            let table_rows = run
                .iter()
                .map(|members| SpanRow {
                    baseline: mean_baseline(members),
                    spans: members.iter().map(|s| (*s).clone()).collect(),
                })
                .collect();
            tables.push(DetectedTable::from_rows(table_rows, table_columns));
        }

        let rest = spans
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, span)| span)
            .collect();

        (tables, rest)
    }

    /// Span indices grouped into rows, top to bottom, each row left to right.
    fn group_rows(&self, spans: &[TextSpan]) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..spans.len()).collect();
        order.sort_by(|&a, &b| {
            by_value(&spans[b].y, &spans[a].y).then_with(|| by_value(&spans[a].x, &spans[b].x))
        });

        let mut rows: Vec<Vec<usize>> = Vec::new();
        let mut anchor = f32::NAN;
        for i in order {
            let span = &spans[i];
            let same_row = (span.y - anchor).abs() <= span.font_size * self.config.row_tolerance;
            match rows.last_mut() {
                Some(row) if same_row => row.push(i),
                _ => {
                    anchor = span.y;
                    rows.push(vec![i]);
                }
            }
        }

        for row in &mut rows {
            row.sort_by(|&a, &b| by_value(&spans[a].x, &spans[b].x));
        }
        rows
    }

    /// Left edges shared by enough rows, merged by the column gap.
    ///
    /// When at least `min_rows` rows hold several spans only those rows vote,
    /// once per bucket; otherwise every span of every row votes.
    fn column_starts(&self, rows: &[Vec<&TextSpan>]) -> Vec<f32> {
        let bucket = self.config.edge_bucket;
        let key = |span: &TextSpan| (span.x / bucket).round() as i32;

        let multi: Vec<&Vec<&TextSpan>> = rows.iter().filter(|r| r.len() >= 2).collect();
        let mut votes: HashMap<i32, usize> = HashMap::new();
        let voters = if multi.len() >= self.config.min_rows {
            for row in &multi {
                let buckets: HashSet<i32> = row.iter().map(|s| key(*s)).collect();
                for b in buckets {
                    *votes.entry(b).or_default() += 1;
                }
            }
            multi.len()
        } else {
            for span in rows.iter().flatten() {
                *votes.entry(key(*span)).or_default() += 1;
            }
            rows.len()
        };

        let quorum = ((voters as f32 * self.config.min_alignment) as usize).max(2);
        let mut edges: Vec<f32> = votes
            .into_iter()
            .filter(|&(_, n)| n >= quorum)
            .map(|(b, _)| b as f32 * bucket)
            .collect();
        edges.sort_by(by_value);

        let mut merged: Vec<f32> = Vec::with_capacity(edges.len());
        for edge in edges {
            if merged
                .last()
                .map_or(true, |&prev| edge - prev >= self.config.column_gap)
            {
                merged.push(edge);
            }
        }
        merged
    }

    /// Inclusive index ranges of consecutive aligned rows, at least
    /// `min_rows` long.
    fn aligned_runs(&self, rows: &[Vec<&TextSpan>], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            let aligned = self.alignment(row, columns) >= self.config.min_alignment;
            match (aligned, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    if i - s >= self.config.min_rows {
                        runs.push((s, i - 1));
                    }
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                runs.push((s, rows.len() - 1));
            }
        }
        runs
    }

    /// Share of a row's spans that start on a column.
    fn alignment(&self, row: &[&TextSpan], columns: &[f32]) -> f32 {
        if row.is_empty() || columns.is_empty() {
            return 0.0;
        }
        let tolerance = self.config.align_tolerance;
        let on_column = row
            .iter()
            .filter(|s| columns.iter().any(|c| (s.x - c).abs() <= tolerance))
            .count();
        on_column as f32 / row.len() as f32
    }

    /// True when the first column reads as bullets or enumerators.
    ///
    /// Half the rows opening with a bullet is always a list; enumerators
    /// only count against two-column candidates so numbered first columns
    /// of real tables survive.
    fn looks_like_list(&self, rows: &[Vec<&TextSpan>], columns: &[f32]) -> bool {
        if rows.is_empty() || columns.len() < 2 {
            return false;
        }

        let (mut bullets, mut enumerators) = (0usize, 0usize);
        for row in rows {
            let first = row.iter().min_by(|a, b| by_value(&a.x, &b.x));
            match first.map(|s| s.text.trim()) {
                Some(t) if is_bullet(t) => bullets += 1,
                Some(t) if is_enumerator(t) => enumerators += 1,
                _ => {}
            }
        }

        let total = rows.len() as f32;
        bullets as f32 / total >= 0.5
            || (columns.len() == 2 && (bullets + enumerators) as f32 / total >= 0.5)
    }

    /// Cell grid of a detected table, one cell per column.
    ///
    /// Spans falling into the same cell are joined with a space.
    pub fn to_grid(&self, table: &DetectedTable) -> TableGrid {
        let width = table.columns.len();
        let rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| {
                let mut cells: Vec<Vec<&str>> = vec![Vec::new(); width];
                let mut spans: Vec<&TextSpan> = row.spans.iter().collect();
                spans.sort_by(|a, b| by_value(&a.x, &b.x));
                for span in spans {
                    let col = table.column_of(span.x, self.config.cell_slack);
                    if let Some(cell) = cells.get_mut(col) {
                        cell.push(span.text.trim());
                    }
                }
                cells
                    .into_iter()
                    .map(|parts| parts.join(" "))
                    .collect::<Vec<String>>()
            })
            .collect();

        TableGrid::new(rows)
    }
}

fn mean_baseline(spans: &[&TextSpan]) -> f32 {
    if spans.is_empty() {
        return 0.0;
    }
    spans.iter().map(|s| s.y).sum::<f32>() / spans.len() as f32
}

fn is_bullet(text: &str) -> bool {
    BULLETS.contains(&text.trim())
}

/// "3", "12.", "4)", "a." or "B)", ignoring inner whitespace.
fn is_enumerator(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let (body, punctuated) = match compact.strip_suffix(&['.', ')'][..]) {
        Some(body) => (body, true),
        None => (compact.as_str(), false),
    };

    if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let mut chars = body.chars();
    punctuated
        && matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text.to_string(), x, y, 12.0, "Helvetica".to_string())
    }

    fn price_list() -> Vec<TextSpan> {
        vec![
            cell("Item", 72.0, 500.0),
            cell("Price", 220.0, 500.0),
            cell("Stock", 340.0, 500.0),
            cell("Router", 72.0, 484.0),
            cell("129", 220.0, 484.0),
            cell("12", 340.0, 484.0),
            cell("Switch", 72.0, 468.0),
            cell("89", 220.0, 468.0),
            cell("40", 340.0, 468.0),
        ]
    }

    #[test]
    fn test_rows_group_by_baseline() {
        let detector = TableDetector::new();
        let mut spans = price_list();
        // 3pt below the header baseline, within 40% of 12pt
        spans.push(cell("(USD)", 260.0, 497.0));

        let rows = detector.group_rows(&spans);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 4);
        let xs: Vec<f32> = rows[0].iter().map(|&i| spans[i].x).collect();
        assert_eq!(xs, vec![72.0, 220.0, 260.0, 340.0]);
    }

    #[test]
    fn test_detect_price_list() {
        let detector = TableDetector::new();
        let mut spans = price_list();
        spans.push(cell("Prices include shipping to all regions.", 150.0, 420.0));

        let (tables, rest) = detector.detect(spans);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 3);
        assert_eq!(tables[0].columns, vec![70.0, 220.0, 340.0]);
        assert_eq!(rest.len(), 1);
        assert!(rest[0].text.starts_with("Prices include"));
    }

    #[test]
    fn test_single_column_is_not_a_table() {
        let detector = TableDetector::new();
        let spans = vec![
            cell("First line of prose", 72.0, 500.0),
            cell("second line of prose", 72.0, 486.0),
            cell("third line of prose", 72.0, 472.0),
            cell("fourth line of prose", 72.0, 458.0),
        ];
        let (tables, rest) = detector.detect(spans);
        assert!(tables.is_empty());
        assert_eq!(rest.len(), 4);
    }

    #[test]
    fn test_too_many_columns_rejected() {
        let detector = TableDetector::new();
        let words = ["a", "quick", "look", "at", "the", "whole", "row"];
        let spans: Vec<TextSpan> = [500.0, 486.0]
            .iter()
            .flat_map(|&y| {
                words
                    .iter()
                    .enumerate()
                    .map(move |(i, w)| cell(w, 72.0 + i as f32 * 40.0, y))
            })
            .collect();
        let (tables, rest) = detector.detect(spans.clone());
        assert!(tables.is_empty());
        assert_eq!(rest.len(), 14);

        let wide = TableDetector::with_config(DetectorConfig {
            max_columns: 8,
            ..DetectorConfig::default()
        });
        let (tables, rest) = wide.detect(spans);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].columns.len(), 7);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_enumerated_list_rejected() {
        let detector = TableDetector::new();
        let spans = vec![
            cell("1.", 72.0, 500.0),
            cell("Install the package", 100.0, 500.0),
            cell("2.", 72.0, 480.0),
            cell("Edit the config file", 100.0, 480.0),
            cell("3.", 72.0, 460.0),
            cell("Restart the service", 100.0, 460.0),
        ];
        let (tables, rest) = detector.detect(spans);
        assert!(tables.is_empty());
        assert_eq!(rest.len(), 6);
    }

    #[test]
    fn test_bullet_list_rejected() {
        let detector = TableDetector::new();
        let spans = vec![
            cell("•", 72.0, 500.0),
            cell("Firewall rules", 90.0, 500.0),
            cell("•", 72.0, 480.0),
            cell("Port forwarding", 90.0, 480.0),
        ];
        let (tables, _) = detector.detect(spans);
        assert!(tables.is_empty());
    }

    #[test]
    fn test_markers() {
        for marker in ["1.", "12.", "4)", "1 .", "3", "a.", "B)"] {
            assert!(is_enumerator(marker), "{}", marker);
        }
        for text in ["", "a", "12.5", "Name", "ab."] {
            assert!(!is_enumerator(text), "{}", text);
        }
        assert!(is_bullet("•"));
        assert!(is_bullet(" - "));
        assert!(!is_bullet("Item"));
    }

    #[test]
    fn test_grid_from_detection() {
        let detector = TableDetector::new();
        let mut spans = price_list();
        // Second word of a cell, inside the first column's range
        spans.push(cell("Pro", 120.0, 484.0));

        let (tables, _) = detector.detect(spans);
        let grid = detector.to_grid(&tables[0]);
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.column_count(), 3);
        assert_eq!(grid.rows()[0], vec!["Item", "Price", "Stock"]);
        assert_eq!(grid.rows()[1], vec!["Router Pro", "129", "12"]);
    }

    #[test]
    fn test_bounds_cover_ascent_and_descent() {
        let table = DetectedTable::from_rows(
            vec![
                SpanRow {
                    baseline: 100.0,
                    spans: vec![cell("Name", 10.0, 100.0), cell("Age", 60.0, 100.0)],
                },
                SpanRow {
                    baseline: 85.0,
                    spans: vec![cell("Alice", 10.0, 85.0), cell("30", 60.0, 85.0)],
                },
            ],
            vec![10.0, 60.0],
        );
        assert_eq!(table.left, 10.0);
        // "Age" at 12pt ends 18pt after its start
        assert_eq!(table.right, 78.0);

        let bounds = table.bounds().unwrap();
        // 12pt font: top = 100 + 9.6, bottom = 85 - 2.4
        assert!((bounds.y0() - 82.6).abs() < 1e-3);
        assert!((bounds.y1() - 109.6).abs() < 1e-3);
    }
}
