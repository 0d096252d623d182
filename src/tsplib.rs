//! TSPLIB explicit ATSP writer and tour-file reader.

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::transform::AtspTransformer;

const TOUR_SECTION_HEADER: &str = "TOUR_SECTION";
const TOUR_END_MARKER: &str = "-1";
const EOF_MARKER: &str = "EOF";
const TSPLIB_NODE_ID_OFFSET: usize = 1;

/// Header of an explicit `FULL_MATRIX` ATSP instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtspHeader {
    pub name: String,
    pub dimension: usize,
}

impl Display for AtspHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "NAME : {}", self.name)?;
        writeln!(f, "TYPE : ATSP")?;
        writeln!(f, "DIMENSION : {}", self.dimension)?;
        writeln!(f, "EDGE_WEIGHT_TYPE : EXPLICIT")?;
        writeln!(f, "EDGE_WEIGHT_FORMAT : FULL_MATRIX")?;
        writeln!(f, "EDGE_WEIGHT_SECTION")
    }
}

/// Write a complete ATSP instance: header, matrix rows, `EOF`.
pub fn write_atsp<W: Write>(name: &str, transformer: &AtspTransformer, out: &mut W) -> io::Result<()> {
    let header = AtspHeader {
        name: name.to_string(),
        dimension: transformer.dimension(),
    };
    write!(out, "{}", header)?;
    transformer.write_matrix(out)?;
    writeln!(out, "{}", EOF_MARKER)?;
    out.flush()
}

/// A TSPLIB tour as produced by ATSP solvers such as LKH.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TsplibTour {
    pub name: Option<String>,
    pub dimension: Option<usize>,
    /// Node identifiers as stored in the file (1-based)
    pub nodes: Vec<usize>,
}

impl TsplibTour {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConvertError::input_open(path, e))?;
        Self::parse(&text)
    }

    /// Parse tour text. Unknown header keys are ignored; parsing stops at
    /// the `-1` terminator or `EOF`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tour = TsplibTour::default();
        let mut in_tour_section = false;

        'lines: for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case(EOF_MARKER) {
                break;
            }

            if !in_tour_section {
                if line.eq_ignore_ascii_case(TOUR_SECTION_HEADER) {
                    in_tour_section = true;
                    continue;
                }
                if let Some((key, value)) = line.split_once(':') {
                    let value = value.trim();
                    match key.trim().to_ascii_uppercase().as_str() {
                        "NAME" => tour.name = Some(value.to_string()),
                        "DIMENSION" => {
                            let parsed = value.parse::<usize>().map_err(|_| {
                                ConvertError::invalid_tour(format!("bad DIMENSION value '{}'", value))
                            })?;
                            tour.dimension = Some(parsed);
                        }
                        "TYPE" if !value.eq_ignore_ascii_case("TOUR") => {
                            return Err(ConvertError::invalid_tour(format!(
                                "unsupported tour TYPE '{}'",
                                value
                            )));
                        }
                        _ => {}
                    }
                }
                continue;
            }

            for token in line.split_whitespace() {
                if token == TOUR_END_MARKER || token.eq_ignore_ascii_case(EOF_MARKER) {
                    break 'lines;
                }
                let id: usize = token.parse().map_err(|_| {
                    ConvertError::invalid_tour(format!("bad tour token '{}'", token))
                })?;
                if id < TSPLIB_NODE_ID_OFFSET {
                    return Err(ConvertError::invalid_tour(format!(
                        "bad node id {}; TSPLIB ids start at {}",
                        id, TSPLIB_NODE_ID_OFFSET
                    )));
                }
                tour.nodes.push(id);
            }
        }

        if !in_tour_section {
            return Err(ConvertError::invalid_tour("missing TOUR_SECTION"));
        }
        Ok(tour)
    }

    /// Node order with 0-based indices
    pub fn zero_based(&self) -> Vec<usize> {
        self.nodes.iter().map(|&id| id - TSPLIB_NODE_ID_OFFSET).collect()
    }
}
