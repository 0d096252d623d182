//! Module for parsing and representing MDMTSP instances.
//!
//! An instance file is a stream of whitespace-separated tokens: the number of
//! customers and the number of depots, followed by one `x y` pair per node,
//! depots first. The loader builds the extended index space used by the
//! ATSP transformation, where every depot appears a second time at the end.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::transform::SCALE;

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Represents a complete MDMTSP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdmtspInstance {
    /// Name of the instance (written as the ATSP `NAME`)
    pub name: String,
    /// Number of depots, one vehicle slot each
    pub depots: usize,
    /// Number of customers
    pub customers: usize,
    /// Depot points followed by customer points
    pub points: Vec<Point>,
}

impl MdmtspInstance {
    /// Build an instance from depot and customer points.
    pub fn new(name: impl Into<String>, depots: Vec<Point>, customers: Vec<Point>) -> Result<Self> {
        if depots.is_empty() {
            return Err(ConvertError::malformed("an instance needs at least one depot"));
        }
        let num_depots = depots.len();
        let num_customers = customers.len();
        let mut points = depots;
        points.extend(customers);

        Ok(MdmtspInstance {
            name: name.into(),
            depots: num_depots,
            customers: num_customers,
            points,
        })
    }

    /// Parse an instance from a `.dat` file. The instance is named after the file stem.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ConvertError::input_open(path, e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::debug!("Reading instance {} from {:?}", name, path);
        Self::from_reader(name, BufReader::new(file))
    }

    /// Parse an instance from any buffered reader.
    pub fn from_reader<R: BufRead>(name: impl Into<String>, reader: R) -> Result<Self> {
        let mut tokens = Tokens::read(reader)?;

        let customers = tokens.next_count("number of customers")?;
        let depots = tokens.next_count("number of depots")?;
        if depots == 0 {
            return Err(ConvertError::malformed(format!(
                "line {}: an instance needs at least one depot",
                tokens.line()
            )));
        }

        let total = depots
            .checked_add(customers)
            .filter(|total| total.checked_add(depots).is_some())
            .ok_or_else(|| {
                ConvertError::malformed(format!(
                    "line {}: {} customers and {} depots exceed the addressable dimension",
                    tokens.line(),
                    customers,
                    depots
                ))
            })?;
        // capacity bounded by the tokens actually present
        let mut points = Vec::with_capacity(total.min(tokens.remaining() / 2));
        for k in 0..total {
            let what = if k < depots {
                format!("depot {}", k + 1)
            } else {
                format!("customer {}", k - depots + 1)
            };
            let x = tokens.next_coordinate(&what, "x")?;
            let y = tokens.next_coordinate(&what, "y")?;
            points.push(Point::new(x, y));
        }

        let extra = tokens.remaining();
        if extra > 0 {
            log::warn!("Ignoring {} token(s) after the last coordinate", extra);
        }

        Ok(MdmtspInstance {
            name: name.into(),
            depots,
            customers,
            points,
        })
    }

    /// Parse an instance from an in-memory string.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        Self::from_reader(name, text.as_bytes())
    }

    /// Size of the extended index space: depots + customers + duplicated depots
    pub fn dimension(&self) -> usize {
        self.customers + 2 * self.depots
    }

    pub fn depot_points(&self) -> &[Point] {
        &self.points[..self.depots]
    }

    pub fn customer_points(&self) -> &[Point] {
        &self.points[self.depots..]
    }

    /// Build the extended index space for the ATSP transformation
    pub fn index_space(&self) -> IndexSpace {
        IndexSpace::new(self)
    }

    /// Lower-left and upper-right corners of the points' bounding box
    pub fn bounding_box(&self) -> (Point, Point) {
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Upper bound on any scaled edge cost: the bounding-box diagonal, scaled and ceiled.
    pub fn max_edge_bound(&self) -> u64 {
        let (min, max) = self.bounding_box();
        (SCALE * min.distance(&max)).ceil() as u64
    }

    /// Upper bound on the sum of real edge costs of any Hamiltonian cycle
    /// over the extended index space.
    pub fn tour_cost_bound(&self) -> u64 {
        (self.dimension() as u64).saturating_mul(self.max_edge_bound())
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let (min, max) = self.bounding_box();
        InstanceStatistics {
            name: self.name.clone(),
            depots: self.depots,
            customers: self.customers,
            dimension: self.dimension(),
            min_x: min.x,
            min_y: min.y,
            max_x: max.x,
            max_y: max.y,
            max_edge_bound: self.max_edge_bound(),
            tour_cost_bound: self.tour_cost_bound(),
        }
    }
}

/// Token stream over an instance file, remembering the line each token came from.
struct Tokens {
    tokens: std::vec::IntoIter<(usize, String)>,
    line: usize,
}

impl Tokens {
    fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut tokens = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData => {
                    ConvertError::malformed(format!("line {}: {}", idx + 1, e))
                }
                _ => ConvertError::Io(e),
            })?;
            tokens.extend(line.split_whitespace().map(|t| (idx + 1, t.to_string())));
        }
        Ok(Tokens {
            tokens: tokens.into_iter(),
            line: 1,
        })
    }

    fn line(&self) -> usize {
        self.line
    }

    fn remaining(&self) -> usize {
        self.tokens.len()
    }

    fn next(&mut self, what: &str) -> Result<String> {
        match self.tokens.next() {
            Some((line, token)) => {
                self.line = line;
                Ok(token)
            }
            None => Err(ConvertError::malformed(format!(
                "unexpected end of input after line {} while reading {}",
                self.line, what
            ))),
        }
    }

    fn next_count(&mut self, what: &str) -> Result<usize> {
        let token = self.next(what)?;
        token.parse().map_err(|_| {
            ConvertError::malformed(format!(
                "line {}: invalid {} '{}'",
                self.line, what, token
            ))
        })
    }

    fn next_coordinate(&mut self, node: &str, axis: &str) -> Result<f64> {
        let what = format!("{} coordinate of {}", axis, node);
        let token = self.next(&what)?;
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(ConvertError::malformed(format!(
                "line {}: invalid {} '{}'",
                self.line, what, token
            ))),
        }
    }
}

/// Which part of the extended index space an index belongs to
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum NodeClass {
    /// Original depot (`V`)
    Depot,
    /// Customer (`T`)
    Customer,
    /// Duplicated depot (`V'`)
    DuplicateDepot,
}

/// Extended index space: depots, customers, then a copy of every depot.
///
/// Index `i < depots` and index `i + depots + customers` share coordinates.
#[derive(Debug, Clone)]
pub struct IndexSpace {
    depots: usize,
    customers: usize,
    points: Vec<Point>,
    classes: Vec<NodeClass>,
}

impl IndexSpace {
    pub fn new(instance: &MdmtspInstance) -> Self {
        let depots = instance.depots;
        let customers = instance.customers;

        let mut points = Vec::with_capacity(instance.dimension());
        points.extend_from_slice(&instance.points);
        points.extend_from_slice(instance.depot_points());

        let mut classes = Vec::with_capacity(points.len());
        classes.extend(std::iter::repeat(NodeClass::Depot).take(depots));
        classes.extend(std::iter::repeat(NodeClass::Customer).take(customers));
        classes.extend(std::iter::repeat(NodeClass::DuplicateDepot).take(depots));

        IndexSpace {
            depots,
            customers,
            points,
            classes,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn depots(&self) -> usize {
        self.depots
    }

    #[inline]
    pub fn customers(&self) -> usize {
        self.customers
    }

    /// First index of the duplicated depots
    #[inline]
    pub fn duplicate_offset(&self) -> usize {
        self.depots + self.customers
    }

    #[inline]
    pub fn class(&self, i: usize) -> NodeClass {
        self.classes[i]
    }

    #[inline]
    pub fn point(&self, i: usize) -> &Point {
        &self.points[i]
    }

    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.points[i].distance(&self.points[j])
    }

    /// Index of the duplicate of original depot `i`
    pub fn duplicate_of(&self, i: usize) -> Option<usize> {
        (i < self.depots).then(|| i + self.duplicate_offset())
    }

    /// Original depot index of duplicated depot `i`
    pub fn original_of(&self, i: usize) -> Option<usize> {
        (i >= self.duplicate_offset() && i < self.dimension()).then(|| i - self.duplicate_offset())
    }
}

/// Statistics about an MDMTSP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub depots: usize,
    pub customers: usize,
    pub dimension: usize,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_edge_bound: u64,
    pub tour_cost_bound: u64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Depots: {}", self.depots)?;
        writeln!(f, "  Customers: {}", self.customers)?;
        writeln!(f, "  ATSP dimension: {}", self.dimension)?;
        writeln!(
            f,
            "  Bounding box: ({:.2}, {:.2}) - ({:.2}, {:.2})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )?;
        writeln!(f, "  Max edge cost (bound): {}", self.max_edge_bound)?;
        writeln!(f, "  Tour cost (bound): {}", self.tour_cost_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "2 1\n0 0\n3 0\n0 4\n";

    #[test]
    fn test_parse_small_instance() {
        let inst = MdmtspInstance::parse("small", SMALL).unwrap();
        assert_eq!(inst.name, "small");
        assert_eq!(inst.depots, 1);
        assert_eq!(inst.customers, 2);
        assert_eq!(inst.dimension(), 4);
        assert_eq!(inst.depot_points(), &[Point::new(0.0, 0.0)]);
        assert_eq!(inst.customer_points()[1], Point::new(0.0, 4.0));
    }

    #[test]
    fn test_tokens_may_span_lines_freely() {
        let inst = MdmtspInstance::parse("flat", "1 2 0 0 10 10 5.5 -2").unwrap();
        assert_eq!(inst.depots, 2);
        assert_eq!(inst.customers, 1);
        assert_eq!(inst.points[2], Point::new(5.5, -2.0));
    }

    #[test]
    fn test_no_customers() {
        let inst = MdmtspInstance::parse("empty", "0 2\n1 1\n2 2\n").unwrap();
        assert_eq!(inst.customers, 0);
        assert_eq!(inst.dimension(), 4);
    }

    #[test]
    fn test_missing_coordinates_is_malformed() {
        let err = MdmtspInstance::parse("short", "2 1\n0 0\n3 0\n").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput(_)));
        assert!(err.to_string().contains("customer 2"));
    }

    #[test]
    fn test_bad_tokens_are_malformed() {
        for text in ["x 1\n0 0\n", "1.5 1\n0 0\n1 1\n", "-1 1\n0 0\n", "0 1\nfoo 0\n", "0 1\nnan 0\n"] {
            let err = MdmtspInstance::parse("bad", text).unwrap_err();
            assert!(matches!(err, ConvertError::MalformedInput(_)), "{}", text);
        }
    }

    #[test]
    fn test_oversized_customer_count_is_malformed() {
        let err = MdmtspInstance::parse("huge", "100000000000000000 1\n0 0\n1 1\n").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput(_)));
        assert!(err.to_string().contains("customer 2"));
    }

    #[test]
    fn test_overflowing_counts_are_malformed() {
        for text in [
            "18446744073709551615 1\n0 0\n",
            "1 18446744073709551614\n0 0\n",
            "0 9223372036854775808\n0 0\n",
        ] {
            let err = MdmtspInstance::parse("ovf", text).unwrap_err();
            assert!(matches!(err, ConvertError::MalformedInput(_)), "{}", text);
        }
    }

    #[test]
    fn test_zero_depots_is_malformed() {
        let err = MdmtspInstance::parse("nodepot", "1 0\n0 0\n").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput(_)));
    }

    #[test]
    fn test_trailing_tokens_are_ignored() {
        let inst = MdmtspInstance::parse("trail", "0 1\n1 2\n99 99\n").unwrap();
        assert_eq!(inst.points, vec![Point::new(1.0, 2.0)]);
    }

    #[test]
    fn test_missing_file_is_input_open_error() {
        let err = MdmtspInstance::from_file("/nonexistent/DAT/x/y.dat").unwrap_err();
        assert!(matches!(err, ConvertError::InputOpen { .. }));
    }

    #[test]
    fn test_from_file_uses_stem_as_name() {
        use std::io::Write;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mdmtsp_10.dat");
        let mut file = File::create(&path).unwrap();
        file.write_all(SMALL.as_bytes()).unwrap();

        let inst = MdmtspInstance::from_file(&path).unwrap();
        assert_eq!(inst.name, "mdmtsp_10");
    }

    #[test]
    fn test_index_space_classes_and_duplicates() {
        let inst = MdmtspInstance::parse("s", "2 2\n0 0\n10 0\n1 1\n2 2\n").unwrap();
        let space = inst.index_space();

        assert_eq!(space.dimension(), 6);
        assert_eq!(space.duplicate_offset(), 4);
        let classes: Vec<NodeClass> = (0..6).map(|i| space.class(i)).collect();
        assert_eq!(
            classes,
            vec![
                NodeClass::Depot,
                NodeClass::Depot,
                NodeClass::Customer,
                NodeClass::Customer,
                NodeClass::DuplicateDepot,
                NodeClass::DuplicateDepot,
            ]
        );
        for i in 0..2 {
            let dup = space.duplicate_of(i).unwrap();
            assert_eq!(space.point(dup), space.point(i));
            assert_eq!(space.original_of(dup), Some(i));
        }
        assert_eq!(space.duplicate_of(2), None);
        assert_eq!(space.original_of(3), None);
    }

    #[test]
    fn test_statistics_bounds() {
        let inst = MdmtspInstance::parse("s", SMALL).unwrap();
        let stats = inst.statistics();
        assert_eq!(stats.max_edge_bound, 500);
        assert_eq!(stats.tour_cost_bound, 2000);
        assert!(stats.to_string().contains("ATSP dimension: 4"));
    }
}
