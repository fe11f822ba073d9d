use eframe::egui::{self, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::model::{TableView, Value};

// ---------------------------------------------------------------------------
// Data preview (bottom panel)
// ---------------------------------------------------------------------------

/// Virtualised preview of the displayed rows. The first column is the
/// source row number, so filtered rows keep their original numbering.
pub fn data_table(ui: &mut Ui, view: &TableView, decimal_places: usize) {
    let text_height = egui::TextStyle::Body.resolve(ui.style()).size;
    let row_height = text_height + 4.0;
    let n_cols = view.column_names().len();

    egui::ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .column(Column::exact(56.0))
            .columns(Column::initial(90.0).at_least(40.0).clip(true), n_cols)
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("#");
                });
                for name in view.column_names() {
                    header.col(|ui| {
                        ui.strong(name);
                    });
                }
            })
            .body(|body| {
                body.rows(row_height, view.n_rows(), |mut row| {
                    let r = row.index();
                    row.col(|ui| {
                        ui.weak(view.source_row(r).to_string());
                    });
                    for c in 0..n_cols {
                        row.col(|ui| {
                            ui.label(format_cell(view.value(r, c), decimal_places));
                        });
                    }
                });
            });
    });
}

fn format_cell(value: &Value, decimal_places: usize) -> String {
    match value {
        v if v.is_null() => String::new(),
        Value::Float(f) => format!("{f:.decimal_places$}"),
        other => other.display_short(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_follow_decimal_places() {
        assert_eq!(format_cell(&Value::Float(1.23456), 2), "1.23");
        assert_eq!(format_cell(&Value::Float(f64::NAN), 2), "");
        assert_eq!(format_cell(&Value::Integer(52500), 2), "52500");
        assert_eq!(format_cell(&Value::Null, 2), "");
    }
}
