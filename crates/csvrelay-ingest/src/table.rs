//! In-memory CSV table
//!
//! Every cell is kept as text. Nothing downstream needs typed values: the
//! table is written straight back out as CSV.

use crate::config::CsvOptions;
use crate::error::FetchError;
use tracing::warn;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Rows of text cells under named columns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Build a table, padding short rows with empty cells.
    ///
    /// Returns `None` when a row is wider than the header.
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<String>>) -> Option<Self> {
        for row in &mut rows {
            if row.len() > columns.len() {
                return None;
            }
            row.resize(columns.len(), String::new());
        }
        Some(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Parse CSV bytes with the given options. `origin` names the data in errors.
    pub fn parse(data: &[u8], options: &CsvOptions, origin: &str) -> Result<Self, FetchError> {
        for key in options.unsupported.keys() {
            warn!(option = %key, source_url = %origin, "Ignoring unsupported parser option");
        }

        let delimiter = single_byte("sep", options.separator())?.unwrap_or(b',');
        let quote = single_byte("quotechar", options.quotechar.as_deref())?.unwrap_or(b'"');
        let comment = single_byte("comment", options.comment.as_deref())?;

        let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .quote(quote)
            .comment(comment)
            .from_reader(data);

        let mut records = reader
            .records()
            .skip(options.skiprows)
            .map(|record| {
                record
                    .map(|r| r.iter().map(str::to_string).collect::<Vec<_>>())
                    .map_err(|e| FetchError::parse(origin, e.to_string()))
            });

        let mut columns = options.names.clone();

        if let Some(header_row) = options.header.resolve(options.names.is_some()) {
            for _ in 0..header_row {
                if records.next().transpose()?.is_none() {
                    break;
                }
            }
            let header = records
                .next()
                .transpose()?
                .ok_or_else(|| FetchError::parse(origin, "no columns to parse from file"))?;
            // explicit names win over the file's header row
            columns.get_or_insert(header);
        }

        let limit = options.nrows.unwrap_or(usize::MAX);
        let rows = records.take(limit).collect::<Result<Vec<_>, _>>()?;

        let columns = match columns {
            Some(columns) => columns,
            None => {
                let width = rows
                    .iter()
                    .map(Vec::len)
                    .max()
                    .ok_or_else(|| FetchError::parse(origin, "no columns to parse from file"))?;
                (0..width).map(|i| i.to_string()).collect()
            },
        };

        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() > columns.len())
        {
            return Err(FetchError::parse(
                origin,
                format!(
                    "data row {} has {} fields, expected {}",
                    index + 1,
                    row.len(),
                    columns.len()
                ),
            ));
        }

        let table = Self::new(columns, rows)
            .ok_or_else(|| FetchError::parse(origin, "row wider than header"))?;

        match options.usecols {
            Some(ref wanted) => table.select(wanted),
            None => Ok(table),
        }
    }

    /// Keep only the named columns, in their original order.
    fn select(self, wanted: &[String]) -> Result<Self, FetchError> {
        let mut indices = Vec::with_capacity(wanted.len());
        for name in wanted {
            let index = self
                .columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| FetchError::options("usecols", format!("column '{name}' not found")))?;
            indices.push(index);
        }
        indices.sort_unstable();
        indices.dedup();

        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Self { columns, rows })
    }
}

fn single_byte(option: &str, value: Option<&str>) -> Result<Option<u8>, FetchError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(Some(*byte)),
        _ => Err(FetchError::options(
            option,
            format!("expected a single ASCII character, got {value:?}"),
        )),
    }
}
