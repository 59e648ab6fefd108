//! Fixed-width text tables for query results

/// Suffix appended when output is cut short
pub const TRUNCATED_MARKER: &str = "\n(truncated)";

/// Border characters may not exceed this share of truncated output
const MAX_BORDER_RATIO: f64 = 0.1;

/// Rendering style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStyle {
    /// Header, dashed rule, rows
    Simple,
    /// Header and rows, no rule
    Plain,
}

/// Rows of already-rendered cells under a header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// One-column table carrying a single message
    pub fn message(header: &str, text: impl Into<String>) -> Self {
        Self {
            headers: vec![header.to_string()],
            rows: vec![vec![text.into()]],
        }
    }

    fn numeric_column(&self, col: usize) -> bool {
        let mut seen = false;
        for row in &self.rows {
            match row.get(col).map(String::as_str) {
                Some("NONE") | None => {}
                Some(cell) => {
                    if cell.parse::<f64>().is_err() {
                        return false;
                    }
                    seen = true;
                }
            }
        }
        seen
    }

    /// Render in the given style
    pub fn render(&self, style: TableStyle) -> String {
        let columns = self.headers.len();
        if columns == 0 {
            return String::new();
        }

        let widths: Vec<usize> = (0..columns)
            .map(|c| {
                let header = self.headers[c].chars().count();
                let cells = self
                    .rows
                    .iter()
                    .filter_map(|r| r.get(c))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0);
                header.max(cells)
            })
            .collect();
        let numeric: Vec<bool> = (0..columns).map(|c| self.numeric_column(c)).collect();

        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = (0..columns)
                .map(|c| {
                    let cell = cells.get(c).map(String::as_str).unwrap_or("");
                    if numeric[c] {
                        format!("{:>width$}", cell, width = widths[c])
                    } else {
                        format!("{:<width$}", cell, width = widths[c])
                    }
                })
                .collect();
            padded.join("  ").trim_end().to_string()
        };

        let mut lines = vec![line(&self.headers)];
        if style == TableStyle::Simple {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            lines.push(rule.join("  "));
        }
        lines.extend(self.rows.iter().map(|row| line(row)));

        lines.join("\n")
    }

    /// Render for the model. Uses the simple style unless its truncated
    /// form is mostly rule dashes, then the plain style.
    pub fn render_bounded(&self, limit: Option<usize>) -> String {
        let cap = limit.unwrap_or(usize::MAX);

        let simple = self.render(TableStyle::Simple);
        let chosen = if border_ratio(&truncate(&simple, cap)) > MAX_BORDER_RATIO {
            self.render(TableStyle::Plain)
        } else {
            simple
        };

        match limit {
            Some(length) => truncate(&chosen, length),
            None => chosen,
        }
    }
}

fn border_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    text.chars().filter(|c| *c == '-').count() as f64 / total as f64
}

/// Cut `content` at the first newline at or after `length` characters.
/// Text without a later newline is cut at `length` itself.
pub fn truncate(content: &str, length: usize) -> String {
    if content.chars().count() <= length {
        return content.to_string();
    }

    let boundary = content
        .char_indices()
        .nth(length)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    let cut = content[boundary..]
        .find('\n')
        .map(|offset| boundary + offset)
        .unwrap_or(boundary);

    format!("{}{}", &content[..cut], TRUNCATED_MARKER)
}
