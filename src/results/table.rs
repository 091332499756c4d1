//! 终端表格输出（`speedlog list`）

use std::fmt::Write;

use super::model::MeasurementRecord;
use crate::common::truncate_with_ellipsis;

const HEADERS: [&str; 6] = [
    "Timestamp",
    "Download (Mbps)",
    "Upload (Mbps)",
    "Ping (ms)",
    "Server",
    "Location",
];

/// 文本列最大宽度
const MAX_TEXT_WIDTH: usize = 28;

/// 按存储列顺序渲染记录，列宽取表头和内容的最大值
pub fn render_table(records: &[MeasurementRecord]) -> String {
    let rows: Vec<[String; 6]> = records
        .iter()
        .map(|r| {
            [
                r.timestamp.clone(),
                format!("{:.2}", r.download),
                format!("{:.2}", r.upload),
                format!("{:.2}", r.ping),
                truncate_with_ellipsis(&r.server_name, MAX_TEXT_WIDTH),
                truncate_with_ellipsis(&r.server_location, MAX_TEXT_WIDTH),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_row(&mut out, &HEADERS.map(str::to_string), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &rows {
        write_row(&mut out, row, &widths);
    }
    out
}

fn write_row(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, w))| {
            let pad = w.saturating_sub(cell.chars().count());
            // 数值列右对齐
            if (1..=3).contains(&i) {
                format!("{}{}", " ".repeat(pad), cell)
            } else {
                format!("{}{}", cell, " ".repeat(pad))
            }
        })
        .collect();
    let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
}
