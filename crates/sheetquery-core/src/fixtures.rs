//! Spreadsheet fixtures written at test time.

use std::path::{Path, PathBuf};

/// `sales.xlsx`: sheets `Q1` (default) and `Q2`.
///
/// Q1 has columns `region, revenue, units, closed`; East has no revenue.
pub(crate) fn write_sales(dir: &Path) -> PathBuf {
    let path = dir.join("sales.xlsx");
    let mut book = umya_spreadsheet::new_file();
    {
        let q1 = book.get_sheet_by_name_mut("Sheet1").expect("default sheet");
        q1.set_name("Q1");
        for (col, header) in ["region", "revenue", "units", "closed"].iter().enumerate() {
            q1.get_cell_mut((col as u32 + 1, 1)).set_value(*header);
        }
        let rows: [(&str, Option<f64>, f64, bool); 4] = [
            ("North", Some(100.0), 10.0, true),
            ("South", Some(250.5), 5.0, false),
            ("East", None, 7.0, true),
            ("West", Some(400.0), 12.0, false),
        ];
        for (idx, (region, revenue, units, closed)) in rows.iter().enumerate() {
            let row = idx as u32 + 2;
            q1.get_cell_mut((1, row)).set_value(*region);
            if let Some(revenue) = revenue {
                q1.get_cell_mut((2, row)).set_value_number(*revenue);
            }
            q1.get_cell_mut((3, row)).set_value_number(*units);
            q1.get_cell_mut((4, row)).set_value_bool(*closed);
        }
    }
    let _ = book.new_sheet("Q2");
    {
        let q2 = book.get_sheet_by_name_mut("Q2").expect("Q2 sheet");
        q2.get_cell_mut((1, 1)).set_value("region");
        q2.get_cell_mut((2, 1)).set_value("revenue");
        q2.get_cell_mut((1, 2)).set_value("North");
        q2.get_cell_mut((2, 2)).set_value_number(50.0);
    }
    umya_spreadsheet::writer::xlsx::write(&book, &path).expect("write sales workbook");
    path
}

/// `headers.xlsx`: a header row with a blank and a repeated name.
pub(crate) fn write_headers(dir: &Path) -> PathBuf {
    let path = dir.join("headers.xlsx");
    let mut book = umya_spreadsheet::new_file();
    {
        let sheet = book.get_sheet_by_name_mut("Sheet1").expect("default sheet");
        sheet.get_cell_mut((1, 1)).set_value("id");
        sheet.get_cell_mut((3, 1)).set_value("id");
        sheet.get_cell_mut((4, 1)).set_value_number(2024.0);
        sheet.get_cell_mut((1, 2)).set_value_number(1.0);
        sheet.get_cell_mut((2, 2)).set_value("a");
        sheet.get_cell_mut((3, 2)).set_value_number(3.0);
        sheet.get_cell_mut((4, 2)).set_value_number(4.0);
    }
    umya_spreadsheet::writer::xlsx::write(&book, &path).expect("write headers workbook");
    path
}

/// `broken.xlsx`: not a spreadsheet at all.
pub(crate) fn write_corrupt(dir: &Path) -> PathBuf {
    let path = dir.join("broken.xlsx");
    std::fs::write(&path, b"this is not a zip archive").expect("write corrupt file");
    path
}
