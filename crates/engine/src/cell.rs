use gridlink_core::CellValue;
use serde::{Deserialize, Serialize};

/// Number format type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum NumberFormat {
    #[default]
    General,
    Number { decimals: u8 },
    Currency { decimals: u8 },
    Date,
}

/// Cell formatting options. `CellFormat::default()` is the host's default
/// import formatting; freshly imported data bodies are reset to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub number_format: NumberFormat,
}

/// Cell content: a literal value, or a row-position formula.
///
/// A row formula evaluates to `row + 1 + offset` (1-based position plus an
/// offset). The synthetic key column is built from these rather than from
/// literals so the key keeps counting correctly if the rows it sits on are
/// later reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Literal(CellValue),
    RowFormula(i64),
}

impl Cell {
    /// The value this cell shows when it sits on `row` (0-based).
    pub fn value_at(&self, row: usize) -> CellValue {
        match self {
            Cell::Literal(v) => v.clone(),
            Cell::RowFormula(offset) => CellValue::Number((row as i64 + 1 + offset) as f64),
        }
    }

    /// Source text for formula cells, `None` for literals.
    pub fn formula_text(&self) -> Option<String> {
        match self {
            Cell::Literal(_) => None,
            Cell::RowFormula(0) => Some("=ROW()".to_string()),
            Cell::RowFormula(offset) if *offset > 0 => Some(format!("=ROW()+{offset}")),
            Cell::RowFormula(offset) => Some(format!("=ROW(){offset}")),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Literal(CellValue::Empty))
    }
}
