//! Binary table (`BINTABLE`) extensions: the HDU layout used both by the
//! pixel masks this crate reads and by the match tables it writes.
//!
//! Cells are stored row-major and big-endian. Decoding is lazy: the table
//! keeps the raw row bytes and materializes a column or a cell on request.

use crate::fits::header::{Card, Header};
use crate::skymatch_errors::SkymatchError;

/// Scalar element types of a binary table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    /// `L` logical, one byte, `T`/`F`.
    Logical,
    /// `B` unsigned byte.
    Byte,
    /// `I` 16-bit signed integer.
    Int16,
    /// `J` 32-bit signed integer.
    Int32,
    /// `K` 64-bit signed integer.
    Int64,
    /// `E` 32-bit IEEE float.
    Float32,
    /// `D` 64-bit IEEE float.
    Float64,
    /// `A` ASCII characters; the repeat count is the string width.
    Ascii,
}

impl Dtype {
    /// Bytes occupied by one element.
    fn width(&self) -> usize {
        match self {
            Dtype::Logical | Dtype::Byte | Dtype::Ascii => 1,
            Dtype::Int16 => 2,
            Dtype::Int32 | Dtype::Float32 => 4,
            Dtype::Int64 | Dtype::Float64 => 8,
        }
    }
}

/// One column of a binary table.
#[derive(Debug, Clone)]
pub struct ColumnDesc {
    pub name: String,
    pub dtype: Dtype,
    /// Element count per cell; for `A` columns, the string width.
    pub repeat: usize,
    /// Byte offset of the cell within a row.
    offset: usize,
}

impl ColumnDesc {
    fn cell_bytes(&self) -> usize {
        self.repeat * self.dtype.width()
    }

    /// A cell this crate can render as a single value: any `A` string, or a
    /// one-element numeric/logical cell.
    pub fn is_scalar(&self) -> bool {
        self.dtype == Dtype::Ascii || self.repeat == 1
    }
}

/// Parse a `TFORMn` value such as `D`, `1024E`, or `16A`.
fn parse_tform(tform: &str) -> Result<(usize, Dtype), SkymatchError> {
    let tform = tform.trim();
    let digits: String = tform.chars().take_while(|c| c.is_ascii_digit()).collect();
    let repeat = if digits.is_empty() {
        1
    } else {
        digits
            .parse::<usize>()
            .map_err(|_| SkymatchError::InvalidFits(format!("bad TFORM repeat: {tform:?}")))?
    };
    let dtype = match tform[digits.len()..].chars().next() {
        Some('L') => Dtype::Logical,
        Some('B') => Dtype::Byte,
        Some('I') => Dtype::Int16,
        Some('J') => Dtype::Int32,
        Some('K') => Dtype::Int64,
        Some('E') => Dtype::Float32,
        Some('D') => Dtype::Float64,
        Some('A') => Dtype::Ascii,
        other => {
            return Err(SkymatchError::InvalidFits(format!(
                "unsupported TFORM type {other:?} in {tform:?}"
            )))
        }
    };
    Ok((repeat, dtype))
}

/// A decoded binary table HDU.
#[derive(Debug, Clone)]
pub struct BinTable {
    columns: Vec<ColumnDesc>,
    row_len: usize,
    nrows: usize,
    data: Vec<u8>,
}

impl BinTable {
    /// Interpret the data area of a `BINTABLE` extension.
    ///
    /// Arguments
    /// ---------
    /// * `header`: the extension header, already parsed.
    /// * `data`: the full data area, including any heap and block padding.
    pub fn from_hdu(header: &Header, data: &[u8]) -> Result<BinTable, SkymatchError> {
        let row_len = header.require_usize("NAXIS1")?;
        let nrows = header.require_usize("NAXIS2")?;
        let tfields = header.require_usize("TFIELDS")?;

        let mut columns = Vec::with_capacity(tfields);
        let mut offset = 0usize;
        for i in 1..=tfields {
            let tform = header
                .get_string(&format!("TFORM{i}"))
                .ok_or_else(|| SkymatchError::InvalidFits(format!("missing TFORM{i}")))?;
            let (repeat, dtype) = parse_tform(tform)?;
            let name = header
                .get_string(&format!("TTYPE{i}"))
                .unwrap_or("")
                .trim()
                .to_string();
            let desc = ColumnDesc {
                name,
                dtype,
                repeat,
                offset,
            };
            offset += desc.cell_bytes();
            columns.push(desc);
        }

        if offset != row_len {
            return Err(SkymatchError::InvalidFits(format!(
                "row width mismatch: TFORM columns sum to {offset} bytes, NAXIS1 is {row_len}"
            )));
        }
        let table_len = row_len.checked_mul(nrows).ok_or_else(|| {
            SkymatchError::InvalidFits("table size overflows".into())
        })?;
        if data.len() < table_len {
            return Err(SkymatchError::InvalidFits(format!(
                "table data truncated: need {table_len} bytes, have {}",
                data.len()
            )));
        }

        Ok(BinTable {
            columns,
            row_len,
            nrows,
            data: data[..table_len].to_vec(),
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Index of the column with the given (trimmed) name.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name.trim())
    }

    fn cell_slice(&self, row: usize, col: usize) -> &[u8] {
        let desc = &self.columns[col];
        let start = row * self.row_len + desc.offset;
        &self.data[start..start + desc.cell_bytes()]
    }

    /// All elements of a numeric column, flattened across rows.
    ///
    /// Multi-element cells contribute `repeat` values per row, which is how
    /// HEALPix maps are conventionally chunked. Logicals map to 0/1; ASCII
    /// columns are rejected.
    pub fn number_column_flat(&self, col: usize) -> Result<Vec<f64>, SkymatchError> {
        let desc = &self.columns[col];
        if desc.dtype == Dtype::Ascii {
            return Err(SkymatchError::InvalidFits(format!(
                "column {:?} is not numeric",
                desc.name
            )));
        }
        let width = desc.dtype.width();
        let mut out = Vec::with_capacity(self.nrows * desc.repeat);
        for row in 0..self.nrows {
            let cell = self.cell_slice(row, col);
            for elem in cell.chunks_exact(width) {
                out.push(decode_number(desc.dtype, elem));
            }
        }
        Ok(out)
    }

    /// Render a scalar cell as text, the form row normalization consumes.
    pub fn cell_string(&self, row: usize, col: usize) -> Result<String, SkymatchError> {
        let desc = &self.columns[col];
        if !desc.is_scalar() {
            return Err(SkymatchError::InvalidFits(format!(
                "column {:?} holds {}-element arrays",
                desc.name, desc.repeat
            )));
        }
        let cell = self.cell_slice(row, col);
        Ok(match desc.dtype {
            Dtype::Ascii => String::from_utf8_lossy(cell)
                .trim_end_matches([' ', '\0'])
                .to_string(),
            Dtype::Logical => if cell[0] == b'T' { "T" } else { "F" }.to_string(),
            dtype => {
                let v = decode_number(dtype, cell);
                if v.fract() == 0.0 && matches!(dtype, Dtype::Byte | Dtype::Int16 | Dtype::Int32 | Dtype::Int64)
                {
                    format!("{}", v as i64)
                } else {
                    format!("{v}")
                }
            }
        })
    }
}

fn decode_number(dtype: Dtype, bytes: &[u8]) -> f64 {
    match dtype {
        Dtype::Logical => f64::from(bytes[0] == b'T'),
        Dtype::Byte => f64::from(bytes[0]),
        Dtype::Int16 => f64::from(i16::from_be_bytes([bytes[0], bytes[1]])),
        Dtype::Int32 => f64::from(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        Dtype::Int64 => i64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]) as f64,
        Dtype::Float32 => f64::from(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        Dtype::Float64 => f64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]),
        Dtype::Ascii => f64::NAN,
    }
}

/// A column to serialize into a new binary table.
#[derive(Debug, Clone)]
pub struct TableColumn {
    pub name: String,
    pub data: ColumnData,
}

/// Column payloads the writer supports: double-precision numbers and
/// fixed-width ASCII strings.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Float64(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Float64(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }
}

impl TableColumn {
    pub fn float(name: &str, data: Vec<f64>) -> TableColumn {
        TableColumn {
            name: name.to_string(),
            data: ColumnData::Float64(data),
        }
    }

    pub fn text(name: &str, data: Vec<String>) -> TableColumn {
        TableColumn {
            name: name.to_string(),
            data: ColumnData::Text(data),
        }
    }

    fn tform(&self) -> String {
        match &self.data {
            ColumnData::Float64(_) => "D".to_string(),
            ColumnData::Text(values) => format!("{}A", text_width(values)),
        }
    }

    fn cell_bytes(&self) -> usize {
        match &self.data {
            ColumnData::Float64(_) => 8,
            ColumnData::Text(values) => text_width(values),
        }
    }
}

/// Width of an ASCII column: the longest value in bytes, at least one.
fn text_width(values: &[String]) -> usize {
    values.iter().map(|s| s.len()).max().unwrap_or(0).max(1)
}

/// Build the extension header and row data for a binary table.
///
/// Return
/// ------
/// * `(header, rows)`: the `XTENSION` header (without `END`) and the packed
///   row bytes, not yet padded to a block boundary.
///
/// All columns must have the same length; an empty column list or ragged
/// lengths are a caller bug and return [`SkymatchError::InvalidFits`].
pub fn encode_table(
    columns: &[TableColumn],
    extra_cards: &[Card],
) -> Result<(Header, Vec<u8>), SkymatchError> {
    let nrows = match columns.first() {
        Some(first) => first.data.len(),
        None => {
            return Err(SkymatchError::InvalidFits(
                "cannot encode a table with no columns".into(),
            ))
        }
    };
    if columns.iter().any(|c| c.data.len() != nrows) {
        return Err(SkymatchError::InvalidFits(
            "table columns have unequal lengths".into(),
        ));
    }

    let row_len: usize = columns.iter().map(|c| c.cell_bytes()).sum();

    let mut header = Header::new();
    header.push(Card::string("XTENSION", "BINTABLE").with_comment("binary table extension"));
    header.push(Card::integer("BITPIX", 8));
    header.push(Card::integer("NAXIS", 2));
    header.push(Card::integer("NAXIS1", row_len as i64).with_comment("bytes per row"));
    header.push(Card::integer("NAXIS2", nrows as i64).with_comment("number of rows"));
    header.push(Card::integer("PCOUNT", 0));
    header.push(Card::integer("GCOUNT", 1));
    header.push(Card::integer("TFIELDS", columns.len() as i64));
    for (i, col) in columns.iter().enumerate() {
        let n = i + 1;
        header.push(Card::string(&format!("TTYPE{n}"), &col.name));
        header.push(Card::string(&format!("TFORM{n}"), &col.tform()));
    }
    for card in extra_cards {
        header.push(card.clone());
    }

    let mut rows = vec![0u8; row_len * nrows];
    let mut offset = 0usize;
    for col in columns {
        let cell = col.cell_bytes();
        match &col.data {
            ColumnData::Float64(values) => {
                for (row, v) in values.iter().enumerate() {
                    let start = row * row_len + offset;
                    rows[start..start + 8].copy_from_slice(&v.to_be_bytes());
                }
            }
            ColumnData::Text(values) => {
                for (row, v) in values.iter().enumerate() {
                    let start = row * row_len + offset;
                    let dst = &mut rows[start..start + cell];
                    dst.fill(b' ');
                    let n = v.len().min(cell);
                    dst[..n].copy_from_slice(&v.as_bytes()[..n]);
                }
            }
        }
        offset += cell;
    }

    Ok((header, rows))
}

#[cfg(test)]
mod bintable_test {
    use super::*;

    #[test]
    fn test_parse_tform() {
        assert_eq!(parse_tform("D").unwrap(), (1, Dtype::Float64));
        assert_eq!(parse_tform("1024E").unwrap(), (1024, Dtype::Float32));
        assert_eq!(parse_tform("16A").unwrap(), (16, Dtype::Ascii));
        assert_eq!(parse_tform(" J ").unwrap(), (1, Dtype::Int32));
        assert!(parse_tform("P").is_err());
        assert!(parse_tform("2X").is_err());
    }

    #[test]
    fn test_encode_decode_table() {
        let columns = vec![
            TableColumn::float("RA", vec![10.5, 350.25]),
            TableColumn::text("object_id", vec!["ACO_1".into(), "ACO_2656".into()]),
        ];
        let (header, rows) = encode_table(&columns, &[]).unwrap();
        assert_eq!(header.get_integer("NAXIS2"), Some(2));
        assert_eq!(header.get_string("TFORM1"), Some("D"));
        assert_eq!(header.get_string("TFORM2"), Some("8A"));

        let table = BinTable::from_hdu(&header, &rows).unwrap();
        assert_eq!(table.nrows(), 2);
        assert_eq!(table.find_column("RA"), Some(0));
        assert_eq!(table.number_column_flat(0).unwrap(), vec![10.5, 350.25]);
        assert_eq!(table.cell_string(0, 1).unwrap(), "ACO_1");
        assert_eq!(table.cell_string(1, 1).unwrap(), "ACO_2656");
    }

    #[test]
    fn test_multi_element_column_flattens() {
        // Maps are chunked as fixed repeat counts per row
        let mut header = Header::new();
        header.push(Card::integer("NAXIS1", 16));
        header.push(Card::integer("NAXIS2", 3));
        header.push(Card::integer("TFIELDS", 1));
        header.push(Card::string("TFORM1", "4E"));
        header.push(Card::string("TTYPE1", "TEMPERATURE"));

        let mut data = Vec::new();
        for v in 0..12 {
            data.extend_from_slice(&(v as f32).to_be_bytes());
        }
        let table = BinTable::from_hdu(&header, &data).unwrap();
        let flat = table.number_column_flat(0).unwrap();
        assert_eq!(flat.len(), 12);
        assert_eq!(flat[0], 0.0);
        assert_eq!(flat[11], 11.0);
        // A 4-element cell is not a scalar
        assert!(table.cell_string(0, 0).is_err());
    }

    #[test]
    fn test_row_width_mismatch_rejected() {
        let mut header = Header::new();
        header.push(Card::integer("NAXIS1", 7));
        header.push(Card::integer("NAXIS2", 1));
        header.push(Card::integer("TFIELDS", 1));
        header.push(Card::string("TFORM1", "D"));
        assert!(BinTable::from_hdu(&header, &[0u8; 8]).is_err());
    }

    #[test]
    fn test_integer_cells_render_without_fraction() {
        let columns = vec![TableColumn::float("z", vec![3.0])];
        let (header, rows) = encode_table(&columns, &[]).unwrap();
        let table = BinTable::from_hdu(&header, &rows).unwrap();
        // Float columns keep their own rendering even for whole numbers
        assert_eq!(table.cell_string(0, 0).unwrap(), "3");
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let columns = vec![
            TableColumn::float("a", vec![1.0]),
            TableColumn::float("b", vec![1.0, 2.0]),
        ];
        assert!(encode_table(&columns, &[]).is_err());
    }
}
