//! In-memory tables read from spreadsheet exports.
//!
//! A [`Table`] is a header row plus data rows of typed [`Cell`]s. The KB
//! exports are not uniform, so consumers locate columns by keyword
//! ([`Table::find_column`]) rather than by fixed position.

use std::fmt;

/// A single spreadsheet cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric view of the cell. Text is parsed after trimming; blanks,
    /// unparsable text and non-finite values yield `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Cell::Empty => return None,
            Cell::Number(n) => *n,
            Cell::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }

    /// Integer part of [`Cell::as_number`].
    pub fn as_count(&self) -> Option<i64> {
        self.as_number().map(|n| n.trunc() as i64)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            // Whole numbers print without a fractional part so numeric IDs
            // read back as "12345", not "12345.0".
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Bool(true) => f.write_str("True"),
            Cell::Bool(false) => f.write_str("False"),
        }
    }
}

/// Header plus rows, every row padded to the header width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds a table from a raw cell grid.
    ///
    /// The first `skip_rows` physical rows are dropped and the next row
    /// becomes the header. Blank header cells are named `Unnamed: <index>`.
    /// Data rows with no non-empty cell are dropped.
    pub fn from_grid(grid: Vec<Vec<Cell>>, skip_rows: usize) -> Self {
        let mut rows = grid.into_iter().skip(skip_rows);
        let header = match rows.next() {
            Some(h) => h,
            None => return Table::default(),
        };
        let data: Vec<Vec<Cell>> = rows
            .filter(|r| r.iter().any(|c| !c.is_empty()))
            .collect();

        let width = data
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);

        let columns = (0..width)
            .map(|i| match header.get(i) {
                Some(c) if !c.to_string().trim().is_empty() => c.to_string(),
                _ => format!("Unnamed: {}", i),
            })
            .collect();

        let rows = data
            .into_iter()
            .map(|mut r| {
                r.resize(width, Cell::Empty);
                r
            })
            .collect();

        Table { columns, rows }
    }

    /// True when there is no column or no data row.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    /// Index of the column named exactly `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of the first column (in header order) whose lowercased name
    /// contains any of `keywords`.
    pub fn find_column(&self, keywords: &[&str]) -> Option<usize> {
        self.columns.iter().position(|c| {
            let lower = c.to_lowercase();
            keywords.iter().any(|k| lower.contains(k))
        })
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }
}

/// True when `s`, ignoring `-` and `_`, is a non-empty run of digits.
/// Such values are article IDs rather than human search terms or titles.
pub fn is_numeric_id(s: &str) -> bool {
    let mut digits = s.chars().filter(|c| *c != '-' && *c != '_').peekable();
    digits.peek().is_some() && digits.all(|c| c.is_ascii_digit())
}
