use console::{measure_text_width, pad_str, style, truncate_str, Alignment};

/// Widest a single cell may render before it is cut with an ellipsis.
const MAX_CELL_WIDTH: usize = 60;

/// Plain left-aligned table for terminal output.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        let row = row
            .into_iter()
            .map(|cell| {
                let flat = cell.replace(['\n', '\r'], " ");
                truncate_str(&flat, MAX_CELL_WIDTH, "…").into_owned()
            })
            .collect();
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| measure_text_width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(measure_text_width(cell));
                }
            }
        }
        widths
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let line = |cells: &[String]| -> String {
            widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    pad_str(cell, *w, Alignment::Left, None).into_owned()
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(style(line(self.headers.as_slice())).bold().to_string());
        out.push(style("─".repeat(total)).dim().to_string());
        for row in &self.rows {
            out.push(line(row.as_slice()));
        }
        out.join("\n")
    }
}
