//! This module provides utilities for loading test problems from files.
//!
//! It reads square sparse matrices in the Matrix Market exchange format
//! (coordinate layout) and assembles them as `faer` sparse matrices, which can
//! then be handed to the solvers through [`crate::LinOpOperator`].
//!
//! Supported headers are `%%MatrixMarket matrix coordinate <field> <symmetry>`
//! with field `real`, `integer`, `complex` or `pattern` and symmetry `general`,
//! `symmetric`, `skew-symmetric` or `hermitian`. Only the stored triangle of a
//! symmetric matrix appears in the file; the other one is filled in here.

use faer::{
    c64,
    sparse::{SparseColMat, Triplet},
};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};
use thiserror::Error;

/// Represents all possible errors that can occur during data loading and parsing.
#[derive(Error, Debug)]
pub enum DataLoaderError {
    /// Wraps a standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Occurs when a string cannot be parsed into an integer.
    #[error("Parse error: Failed to parse integer from '{0}'")]
    ParseInt(String),
    /// Occurs when a string cannot be parsed into a float.
    #[error("Parse error: Failed to parse float from '{0}'")]
    ParseFloat(String),
    /// Occurs if the `%%MatrixMarket` banner is missing or malformed.
    #[error("Format error: The '%%MatrixMarket' header was not found or was malformed.")]
    HeaderMissing,
    /// The header names a layout, field or symmetry this loader does not read.
    #[error("Format error: Unsupported Matrix Market variant '{0}'.")]
    Unsupported(String),
    /// Occurs when the end of a file is reached unexpectedly during parsing.
    #[error("Format error: Unexpected end of file while reading data.")]
    UnexpectedEof,
    /// The matrix is not square.
    #[error("Dimension mismatch: the matrix is {rows} x {cols}, expected a square matrix.")]
    NotSquare { rows: usize, cols: usize },
    /// An entry refers to a row or column outside the declared size.
    #[error("Format error: Entry ({row}, {col}) lies outside the declared size.")]
    IndexOutOfBounds { row: usize, col: usize },
    /// The number of entries does not match the size line.
    #[error("Dimension mismatch: the size line declares {declared} entries, the file has {found}.")]
    EntryCountMismatch { declared: usize, found: usize },
    /// Occurs if the sparse matrix construction fails internally.
    #[error("Internal error: Failed to construct the sparse matrix from triplets.")]
    SparseMatrixConstructionError,
}

/// A loaded matrix, tagged with its scalar type.
pub enum LoadedMatrix {
    Real(SparseColMat<usize, f64>),
    Complex(SparseColMat<usize, c64>),
}

impl LoadedMatrix {
    /// Dimension of the (square) matrix.
    pub fn nrows(&self) -> usize {
        match self {
            LoadedMatrix::Real(a) => a.nrows(),
            LoadedMatrix::Complex(a) => a.nrows(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Real,
    Complex,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symmetry {
    General,
    Symmetric,
    SkewSymmetric,
    Hermitian,
}

fn parse_header(line: &str) -> Result<(Field, Symmetry), DataLoaderError> {
    let parts: Vec<String> = line
        .split_whitespace()
        .map(|s| s.to_ascii_lowercase())
        .collect();
    if parts.len() != 5 || parts[0] != "%%matrixmarket" {
        return Err(DataLoaderError::HeaderMissing);
    }
    if parts[1] != "matrix" || parts[2] != "coordinate" {
        return Err(DataLoaderError::Unsupported(format!("{} {}", parts[1], parts[2])));
    }
    let field = match parts[3].as_str() {
        "real" | "integer" | "double" => Field::Real,
        "complex" => Field::Complex,
        "pattern" => Field::Pattern,
        other => return Err(DataLoaderError::Unsupported(other.to_string())),
    };
    let symmetry = match parts[4].as_str() {
        "general" => Symmetry::General,
        "symmetric" => Symmetry::Symmetric,
        "skew-symmetric" => Symmetry::SkewSymmetric,
        "hermitian" if field == Field::Complex => Symmetry::Hermitian,
        other => return Err(DataLoaderError::Unsupported(other.to_string())),
    };
    Ok((field, symmetry))
}

fn parse_usize(token: &str) -> Result<usize, DataLoaderError> {
    token
        .parse::<usize>()
        .map_err(|_| DataLoaderError::ParseInt(token.to_string()))
}

fn parse_f64(token: &str) -> Result<f64, DataLoaderError> {
    token
        .parse::<f64>()
        .map_err(|_| DataLoaderError::ParseFloat(token.to_string()))
}

/// Loads a square Matrix Market file.
///
/// Real, integer and pattern files become [`LoadedMatrix::Real`] (pattern
/// entries are `1`), complex files become [`LoadedMatrix::Complex`].
pub fn load_matrix_market(path: impl AsRef<Path>) -> Result<LoadedMatrix, DataLoaderError> {
    let file = File::open(path)?;
    read_matrix_market(BufReader::new(file))
}

/// [`load_matrix_market`] over any buffered reader.
pub fn read_matrix_market(reader: impl BufRead) -> Result<LoadedMatrix, DataLoaderError> {
    let mut lines = reader.lines();

    let header = lines.next().ok_or(DataLoaderError::HeaderMissing)??;
    let (field, symmetry) = parse_header(&header)?;

    // Skip comments up to the size line.
    let size_line = loop {
        let line = lines.next().ok_or(DataLoaderError::UnexpectedEof)??;
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('%') {
            break line;
        }
    };
    let size: Vec<usize> = size_line
        .split_whitespace()
        .map(parse_usize)
        .collect::<Result<_, _>>()?;
    let [rows, cols, declared] = size[..] else {
        return Err(DataLoaderError::UnexpectedEof);
    };
    if rows != cols {
        return Err(DataLoaderError::NotSquare { rows, cols });
    }
    let n = rows;

    let mut entries: Vec<(usize, usize, c64)> = Vec::with_capacity(declared);
    for line in lines {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() || parts[0].starts_with('%') {
            continue;
        }
        let needed = match field {
            Field::Pattern => 2,
            Field::Real => 3,
            Field::Complex => 4,
        };
        if parts.len() < needed {
            return Err(DataLoaderError::UnexpectedEof);
        }

        // Matrix Market indices are 1-based.
        let row = parse_usize(parts[0])?;
        let col = parse_usize(parts[1])?;
        if row == 0 || col == 0 || row > n || col > n {
            return Err(DataLoaderError::IndexOutOfBounds { row, col });
        }
        let val = match field {
            Field::Pattern => c64::new(1.0, 0.0),
            Field::Real => c64::new(parse_f64(parts[2])?, 0.0),
            Field::Complex => c64::new(parse_f64(parts[2])?, parse_f64(parts[3])?),
        };
        entries.push((row - 1, col - 1, val));
    }
    if entries.len() != declared {
        return Err(DataLoaderError::EntryCountMismatch {
            declared,
            found: entries.len(),
        });
    }

    // Mirror the stored triangle.
    let stored = entries.len();
    for e in 0..stored {
        let (row, col, val) = entries[e];
        if row == col {
            continue;
        }
        let mirrored = match symmetry {
            Symmetry::General => continue,
            Symmetry::Symmetric => val,
            Symmetry::SkewSymmetric => -val,
            Symmetry::Hermitian => val.conj(),
        };
        entries.push((col, row, mirrored));
    }

    match field {
        Field::Complex => {
            let triplets: Vec<Triplet<usize, usize, c64>> = entries
                .into_iter()
                .map(|(row, col, val)| Triplet { row, col, val })
                .collect();
            let a = SparseColMat::try_new_from_triplets(n, n, &triplets)
                .map_err(|_| DataLoaderError::SparseMatrixConstructionError)?;
            Ok(LoadedMatrix::Complex(a))
        }
        Field::Real | Field::Pattern => {
            let triplets: Vec<Triplet<usize, usize, f64>> = entries
                .into_iter()
                .map(|(row, col, val)| Triplet {
                    row,
                    col,
                    val: val.re,
                })
                .collect();
            let a = SparseColMat::try_new_from_triplets(n, n, &triplets)
                .map_err(|_| DataLoaderError::SparseMatrixConstructionError)?;
            Ok(LoadedMatrix::Real(a))
        }
    }
}
