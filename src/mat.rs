//! Reader for MATLAB level 5 MAT-files.
//!
//! Only the subset needed for ground-truth containers is supported: numeric,
//! character, struct and cell arrays, optionally wrapped in zlib-compressed
//! elements. Numeric data of every storage type is widened to `f64` and kept
//! in MATLAB's column-major order.

use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const HEADER_LEN: usize = 128;
const TAG_LEN: usize = 8;

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;

// Array classes
const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_OBJECT: u8 = 3;
const MX_CHAR: u8 = 4;
const MX_SPARSE: u8 = 5;
const MX_DOUBLE: u8 = 6;
const MX_UINT64: u8 = 15;

#[derive(Debug, Error)]
pub enum MatError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("not a level 5 MAT-file: {0}")]
    BadHeader(&'static str),

    #[error("truncated data element at byte {0}")]
    Truncated(usize),

    #[error("unexpected data type {found} for {what}")]
    UnexpectedType { what: &'static str, found: u32 },

    #[error("unsupported array class {0}")]
    UnsupportedClass(u8),

    #[error("{0}")]
    Invalid(String),
}

/// An array decoded from a MAT-file.
#[derive(Debug, Clone, PartialEq)]
pub enum MatArray {
    Numeric(NumericArray),
    Char(CharArray),
    Struct(StructArray),
    Cell(CellArray),
}

impl MatArray {
    pub fn dims(&self) -> &[usize] {
        match self {
            MatArray::Numeric(array) => &array.dims,
            MatArray::Char(array) => &array.dims,
            MatArray::Struct(array) => &array.dims,
            MatArray::Cell(array) => &array.dims,
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            MatArray::Numeric(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructArray> {
        match self {
            MatArray::Struct(array) => Some(array),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MatArray::Numeric(_) => "numeric",
            MatArray::Char(_) => "char",
            MatArray::Struct(_) => "struct",
            MatArray::Cell(_) => "cell",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    pub dims: Vec<usize>,
    /// Column-major values.
    pub data: Vec<f64>,
}

impl NumericArray {
    pub fn new(dims: Vec<usize>, data: Vec<f64>) -> Self {
        Self { dims, data }
    }

    /// The `0x0` array MATLAB writes for `[]`.
    pub fn empty() -> Self {
        Self::new(vec![0, 0], Vec::new())
    }

    /// Column vector holding `values`.
    pub fn column(values: &[f64]) -> Self {
        Self::new(vec![values.len(), 1], values.to_vec())
    }

    /// Build a matrix from row-major rows.
    pub fn from_rows<const N: usize>(rows: &[[f64; N]]) -> Self {
        let mut data = Vec::with_capacity(rows.len() * N);
        for col in 0..N {
            data.extend(rows.iter().map(|row| row[col]));
        }
        Self::new(vec![rows.len(), N], data)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    pub fn cols(&self) -> usize {
        self.dims.get(1..).map_or(1, |rest| rest.iter().product())
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        self.data.get(col * self.rows() + row).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharArray {
    pub dims: Vec<usize>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructArray {
    pub dims: Vec<usize>,
    pub field_names: Vec<String>,
    /// One value per field name, for each element in column-major order.
    pub elements: Vec<Vec<MatArray>>,
}

impl StructArray {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn field(&self, index: usize, name: &str) -> Option<&MatArray> {
        let position = self.field_names.iter().position(|field| field == name)?;
        self.elements.get(index)?.get(position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellArray {
    pub dims: Vec<usize>,
    pub elements: Vec<MatArray>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        }
    }

    fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        }
    }

    fn u64(self, bytes: [u8; 8]) -> u64 {
        match self {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        }
    }
}

/// Read every variable stored in a MAT-file.
pub fn read_mat_file(path: &Path) -> Result<HashMap<String, MatArray>, MatError> {
    let bytes = fs::read(path)?;
    parse_mat(&bytes)
}

/// Decode the variables of an in-memory MAT-file.
pub fn parse_mat(bytes: &[u8]) -> Result<HashMap<String, MatArray>, MatError> {
    if bytes.len() < HEADER_LEN {
        return Err(MatError::BadHeader("file shorter than the 128-byte header"));
    }
    let endian = match &bytes[126..128] {
        b"IM" => Endian::Little,
        b"MI" => Endian::Big,
        _ => return Err(MatError::BadHeader("missing endian indicator")),
    };
    if endian.u16([bytes[124], bytes[125]]) != 0x0100 {
        return Err(MatError::BadHeader("unsupported version"));
    }

    let mut variables = HashMap::new();
    let mut reader = ElementReader::new(&bytes[HEADER_LEN..], endian);
    while let Some(element) = reader.next_element()? {
        let (name, array) = match element.data_type {
            MI_MATRIX => parse_matrix(element.data, endian)?,
            MI_COMPRESSED => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(element.data).read_to_end(&mut inflated)?;
                let mut inner = ElementReader::new(&inflated, endian);
                match inner.next_element()? {
                    Some(matrix) if matrix.data_type == MI_MATRIX => {
                        parse_matrix(matrix.data, endian)?
                    }
                    Some(other) => {
                        log::debug!("Ignoring compressed element of type {}", other.data_type);
                        continue;
                    }
                    None => continue,
                }
            }
            other => {
                log::debug!("Ignoring top-level element of type {}", other);
                continue;
            }
        };
        variables.insert(name, array);
    }
    Ok(variables)
}

struct Element<'a> {
    data_type: u32,
    data: &'a [u8],
}

struct ElementReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> ElementReader<'a> {
    fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self {
            bytes,
            pos: 0,
            endian,
        }
    }

    fn word(&self, at: usize) -> Result<u32, MatError> {
        let raw = self
            .bytes
            .get(at..at + 4)
            .ok_or(MatError::Truncated(at))?;
        Ok(self.endian.u32([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn next_element(&mut self) -> Result<Option<Element<'a>>, MatError> {
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let start = self.pos;
        let first = self.word(start)?;

        // Small data element: size and type share the first word
        if first >> 16 != 0 {
            let size = (first >> 16) as usize;
            if size > 4 {
                return Err(MatError::Invalid(format!(
                    "small data element of {} bytes at byte {}",
                    size, start
                )));
            }
            let data = self
                .bytes
                .get(start + 4..start + 4 + size)
                .ok_or(MatError::Truncated(start))?;
            self.pos = start + TAG_LEN;
            return Ok(Some(Element {
                data_type: first & 0xFFFF,
                data,
            }));
        }

        let size = self.word(start + 4)? as usize;
        let data_start = start + TAG_LEN;
        let data = self
            .bytes
            .get(data_start..data_start + size)
            .ok_or(MatError::Truncated(start))?;
        // Compressed payloads are not padded to the 8-byte boundary
        self.pos = if first == MI_COMPRESSED {
            data_start + size
        } else {
            data_start + padded(size)
        };
        Ok(Some(Element {
            data_type: first,
            data,
        }))
    }

    fn expect_element(&mut self, what: &'static str) -> Result<Element<'a>, MatError> {
        self.next_element()?
            .ok_or_else(|| MatError::Invalid(format!("missing {}", what)))
    }
}

fn padded(size: usize) -> usize {
    (size + 7) & !7
}

fn parse_matrix(data: &[u8], endian: Endian) -> Result<(String, MatArray), MatError> {
    if data.is_empty() {
        return Ok((String::new(), MatArray::Numeric(NumericArray::empty())));
    }
    let mut reader = ElementReader::new(data, endian);

    let flags = reader.expect_element("array flags")?;
    if flags.data_type != MI_UINT32 || flags.data.len() < 4 {
        return Err(MatError::UnexpectedType {
            what: "array flags",
            found: flags.data_type,
        });
    }
    let class = (endian.u32([flags.data[0], flags.data[1], flags.data[2], flags.data[3]]) & 0xFF) as u8;

    let dims_element = reader.expect_element("dimensions")?;
    let dims = decode_numeric(dims_element.data_type, dims_element.data, endian)?
        .into_iter()
        .map(|dim| {
            if dim < 0.0 {
                Err(MatError::Invalid(format!("negative dimension {}", dim)))
            } else {
                Ok(dim as usize)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    let count = dims
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| MatError::Invalid(format!("dimensions {:?} overflow the element count", dims)))?;

    let name_element = reader.expect_element("array name")?;
    let name = String::from_utf8_lossy(name_element.data).into_owned();

    let array = match class {
        MX_CELL => {
            let elements = (0..count)
                .map(|_| read_nested_matrix(&mut reader, endian))
                .collect::<Result<Vec<_>, _>>()?;
            MatArray::Cell(CellArray { dims, elements })
        }
        MX_STRUCT => {
            let field_names = read_field_names(&mut reader, endian)?;
            // Each field value takes at least one tag, so a larger count cannot be stored
            if count > data.len() {
                return Err(MatError::Invalid(format!(
                    "struct '{}' declares {} elements in {} bytes",
                    name,
                    count,
                    data.len()
                )));
            }
            let elements = (0..count)
                .map(|_| {
                    field_names
                        .iter()
                        .map(|_| read_nested_matrix(&mut reader, endian))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            MatArray::Struct(StructArray {
                dims,
                field_names,
                elements,
            })
        }
        MX_CHAR => {
            let text = match reader.next_element()? {
                Some(element) => decode_text(element.data_type, element.data, endian)?,
                None => String::new(),
            };
            MatArray::Char(CharArray { dims, text })
        }
        MX_DOUBLE..=MX_UINT64 => {
            let data = match reader.next_element()? {
                Some(real) => decode_numeric(real.data_type, real.data, endian)?,
                None => Vec::new(),
            };
            if data.len() != count {
                return Err(MatError::Invalid(format!(
                    "array '{}' declares {} values but stores {}",
                    name,
                    count,
                    data.len()
                )));
            }
            // Imaginary parts, when present, are ignored
            MatArray::Numeric(NumericArray::new(dims, data))
        }
        MX_OBJECT | MX_SPARSE => return Err(MatError::UnsupportedClass(class)),
        other => return Err(MatError::UnsupportedClass(other)),
    };
    Ok((name, array))
}

fn read_nested_matrix(reader: &mut ElementReader<'_>, endian: Endian) -> Result<MatArray, MatError> {
    let element = reader.expect_element("nested array")?;
    if element.data_type != MI_MATRIX {
        return Err(MatError::UnexpectedType {
            what: "nested array",
            found: element.data_type,
        });
    }
    parse_matrix(element.data, endian).map(|(_, array)| array)
}

fn read_field_names(reader: &mut ElementReader<'_>, endian: Endian) -> Result<Vec<String>, MatError> {
    let length_element = reader.expect_element("field name length")?;
    let name_length = decode_numeric(length_element.data_type, length_element.data, endian)?
        .first()
        .copied()
        .unwrap_or(0.0) as usize;
    let names_element = reader.expect_element("field names")?;
    if name_length == 0 {
        return Ok(Vec::new());
    }
    Ok(names_element
        .data
        .chunks(name_length)
        .map(|chunk| {
            let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
            String::from_utf8_lossy(&chunk[..end]).into_owned()
        })
        .collect())
}

fn decode_text(data_type: u32, data: &[u8], endian: Endian) -> Result<String, MatError> {
    match data_type {
        MI_UINT16 | MI_UTF16 => {
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|c| endian.u16([c[0], c[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        }
        MI_INT8 | MI_UINT8 | MI_UTF8 => Ok(String::from_utf8_lossy(data).into_owned()),
        other => Err(MatError::UnexpectedType {
            what: "char data",
            found: other,
        }),
    }
}

fn decode_numeric(data_type: u32, data: &[u8], endian: Endian) -> Result<Vec<f64>, MatError> {
    let width = match data_type {
        MI_INT8 | MI_UINT8 => 1,
        MI_INT16 | MI_UINT16 => 2,
        MI_INT32 | MI_UINT32 | MI_SINGLE => 4,
        MI_DOUBLE | MI_INT64 | MI_UINT64 => 8,
        other => {
            return Err(MatError::UnexpectedType {
                what: "numeric data",
                found: other,
            })
        }
    };
    if data.len() % width != 0 {
        return Err(MatError::Invalid(format!(
            "{} bytes is not a multiple of the {}-byte element width",
            data.len(),
            width
        )));
    }

    let values = data.chunks_exact(width).map(|c| match data_type {
        MI_INT8 => c[0] as i8 as f64,
        MI_UINT8 => c[0] as f64,
        MI_INT16 => endian.u16([c[0], c[1]]) as i16 as f64,
        MI_UINT16 => endian.u16([c[0], c[1]]) as f64,
        MI_INT32 => endian.u32([c[0], c[1], c[2], c[3]]) as i32 as f64,
        MI_UINT32 => endian.u32([c[0], c[1], c[2], c[3]]) as f64,
        MI_SINGLE => f32::from_bits(endian.u32([c[0], c[1], c[2], c[3]])) as f64,
        MI_DOUBLE => f64::from_bits(endian.u64([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])),
        MI_INT64 => endian.u64([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as i64 as f64,
        _ => endian.u64([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f64,
    });
    Ok(values.collect())
}
