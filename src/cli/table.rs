//! Column-aligned rendering of a [`RowSet`] for the REPL.

use crate::sql::RowSet;

/// Renders a result as aligned columns with a header line, or an empty
/// string for DDL/DML results with no rows and no columns.
pub fn format_row_set(result: &RowSet) -> String {
    if result.schema.is_empty() && result.rows.is_empty() {
        return String::new();
    }

    let headers: Vec<String> = result
        .schema
        .iter()
        .map(|column| column.name.clone())
        .collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();

    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|value| value.to_string()).collect())
        .collect();
    for row in &rendered {
        for (index, cell) in row.iter().enumerate() {
            if index < widths.len() {
                widths[index] = widths[index].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    let line = |cells: &[String], out: &mut String| {
        let mut first = true;
        for (index, cell) in cells.iter().enumerate() {
            if !first {
                out.push_str("  ");
            }
            first = false;
            let width = widths.get(index).copied().unwrap_or(cell.len());
            out.push_str(&format!("{cell:<width$}"));
        }
        while out.ends_with(' ') {
            out.pop();
        }
        out.push('\n');
    };

    if !headers.is_empty() {
        line(&headers, &mut out);
    }
    for row in &rendered {
        line(row, &mut out);
    }
    out
}
