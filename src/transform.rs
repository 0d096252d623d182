//! MDMTSP to ATSP matrix transformation.
//!
//! Every depot is duplicated at the end of the index space. Real travel costs
//! only exist from a depot to a customer and from a customer to a customer or
//! a duplicated depot. Zero-cost edges tie each depot to its duplicate (an
//! unused vehicle), each duplicate to the next original depot, and the last
//! duplicate back to index 0. Everything else carries the sentinel cost, so an
//! optimal ATSP tour is a concatenation of vehicle routes.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::instance::{IndexSpace, MdmtspInstance, NodeClass};

/// Euclidean distances are multiplied by this factor before rounding.
pub const SCALE: f64 = 100.0;

/// Cost of a forbidden edge unless configured otherwise.
pub const DEFAULT_SENTINEL: u64 = 1_000_000;

/// Rows formatted per parallel block; bounds memory held at once.
const ROW_BLOCK: usize = 64;

/// How scaled distances are turned into integers
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Round up
    #[default]
    Ceil,
    /// Round to nearest, halves away from zero
    Round,
}

impl Rounding {
    #[inline]
    pub fn apply(self, value: f64) -> u64 {
        match self {
            Rounding::Ceil => value.ceil() as u64,
            Rounding::Round => value.round() as u64,
        }
    }
}

impl fmt::Display for Rounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rounding::Ceil => write!(f, "ceil"),
            Rounding::Round => write!(f, "round"),
        }
    }
}

/// Cost written for forbidden edges
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Sentinel {
    Fixed(u64),
    /// One more than the instance's tour cost bound
    Auto,
}

impl Default for Sentinel {
    fn default() -> Self {
        Sentinel::Fixed(DEFAULT_SENTINEL)
    }
}

impl Sentinel {
    /// Concrete sentinel value for an instance
    pub fn resolve(self, instance: &MdmtspInstance) -> u64 {
        match self {
            Sentinel::Fixed(value) => value,
            Sentinel::Auto => instance.tour_cost_bound().saturating_add(1),
        }
    }
}

impl FromStr for Sentinel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Sentinel::Auto);
        }
        s.parse::<u64>()
            .map(Sentinel::Fixed)
            .map_err(|_| format!("expected a non-negative integer or 'auto', got '{}'", s))
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentinel::Fixed(value) => write!(f, "{}", value),
            Sentinel::Auto => write!(f, "auto"),
        }
    }
}

/// Transformation configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformConfig {
    pub rounding: Rounding,
    pub sentinel: Sentinel,
    /// Format rows on the rayon thread pool
    pub parallel: bool,
}

/// Kind of an edge of the ATSP instance
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Scaled Euclidean distance
    Distance,
    /// Forced zero-cost edge
    Zero,
    /// Sentinel-cost edge
    Forbidden,
}

/// Computes ATSP costs over the extended index space of an instance.
#[derive(Debug, Clone)]
pub struct AtspTransformer {
    space: IndexSpace,
    rounding: Rounding,
    sentinel: u64,
    parallel: bool,
}

impl AtspTransformer {
    pub fn new(instance: &MdmtspInstance, config: TransformConfig) -> Self {
        let sentinel = config.sentinel.resolve(instance);
        if let Sentinel::Fixed(value) = config.sentinel {
            let bound = instance.tour_cost_bound();
            if bound >= value {
                log::warn!(
                    "{}: sentinel {} does not exceed the tour cost bound {}; \
                     consider --sentinel auto",
                    instance.name,
                    value,
                    bound
                );
            }
        }
        log::debug!(
            "{}: dimension {}, rounding {}, sentinel {}",
            instance.name,
            instance.dimension(),
            config.rounding,
            sentinel
        );

        AtspTransformer {
            space: instance.index_space(),
            rounding: config.rounding,
            sentinel,
            parallel: config.parallel,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.space.dimension()
    }

    pub fn sentinel(&self) -> u64 {
        self.sentinel
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    pub fn space(&self) -> &IndexSpace {
        &self.space
    }

    /// Classify the edge `i -> j`. First matching rule wins.
    pub fn classify(&self, i: usize, j: usize) -> EdgeKind {
        let dim = self.space.dimension();
        let offset = self.space.duplicate_offset();

        match (self.space.class(i), self.space.class(j)) {
            (NodeClass::Customer, NodeClass::Customer)
            | (NodeClass::Customer, NodeClass::DuplicateDepot)
            | (NodeClass::Depot, NodeClass::Customer) => EdgeKind::Distance,
            (NodeClass::Depot, _) if j == i + offset => EdgeKind::Zero,
            (NodeClass::DuplicateDepot, _) if i + 1 < dim && j == i - offset + 1 => {
                EdgeKind::Zero
            }
            _ if i + 1 == dim && j == 0 => EdgeKind::Zero,
            _ => EdgeKind::Forbidden,
        }
    }

    /// Cost of the edge `i -> j`
    #[inline]
    pub fn cost(&self, i: usize, j: usize) -> u64 {
        match self.classify(i, j) {
            EdgeKind::Distance => self.rounding.apply(SCALE * self.space.distance(i, j)),
            EdgeKind::Zero => 0,
            EdgeKind::Forbidden => self.sentinel,
        }
    }

    /// Row `i` of the cost matrix
    pub fn row(&self, i: usize) -> Vec<u64> {
        (0..self.dimension()).map(|j| self.cost(i, j)).collect()
    }

    /// Append row `i` to `buf`: every value followed by a space, then a newline.
    fn format_row(&self, i: usize, buf: &mut String) {
        for j in 0..self.dimension() {
            buf.push_str(&self.cost(i, j).to_string());
            buf.push(' ');
        }
        buf.push('\n');
    }

    /// Stream the whole matrix, row by row, in index order.
    pub fn write_matrix<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let dim = self.dimension();

        if !self.parallel {
            let mut buf = String::new();
            for i in 0..dim {
                buf.clear();
                self.format_row(i, &mut buf);
                out.write_all(buf.as_bytes())?;
            }
            return Ok(());
        }

        for start in (0..dim).step_by(ROW_BLOCK) {
            let end = (start + ROW_BLOCK).min(dim);
            let rows: Vec<String> = (start..end)
                .into_par_iter()
                .map(|i| {
                    let mut buf = String::new();
                    self.format_row(i, &mut buf);
                    buf
                })
                .collect();
            for row in rows {
                out.write_all(row.as_bytes())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Point;

    const S: u64 = DEFAULT_SENTINEL;

    fn small() -> MdmtspInstance {
        MdmtspInstance::parse("small", "2 1\n0 0\n3 0\n0 4\n").unwrap()
    }

    fn two_depots() -> MdmtspInstance {
        MdmtspInstance::new(
            "two",
            vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            vec![
                Point::new(1.0, 1.0),
                Point::new(2.5, 0.0),
                Point::new(0.333, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_small_instance_rows() {
        let t = AtspTransformer::new(&small(), TransformConfig::default());
        assert_eq!(t.dimension(), 4);
        assert_eq!(t.row(0), vec![S, 300, 400, 0]);
        assert_eq!(t.row(1), vec![S, 0, 500, 300]);
        assert_eq!(t.row(2), vec![S, 500, 0, 400]);
        assert_eq!(t.row(3), vec![0, S, S, S]);
    }

    #[test]
    fn test_zero_edges() {
        let inst = two_depots();
        let t = AtspTransformer::new(&inst, TransformConfig::default());
        let dim = t.dimension();
        let offset = inst.depots + inst.customers;

        for i in 0..inst.depots {
            assert_eq!(t.cost(i, i + offset), 0);
        }
        for i in offset..dim - 1 {
            assert_eq!(t.cost(i, i - offset + 1), 0);
        }
        assert_eq!(t.cost(dim - 1, 0), 0);
    }

    #[test]
    fn test_every_entry_matches_its_kind() {
        let inst = two_depots();
        for rounding in [Rounding::Ceil, Rounding::Round] {
            let t = AtspTransformer::new(
                &inst,
                TransformConfig {
                    rounding,
                    ..Default::default()
                },
            );
            let space = t.space();
            for i in 0..t.dimension() {
                for j in 0..t.dimension() {
                    let expected = match t.classify(i, j) {
                        EdgeKind::Distance => rounding.apply(SCALE * space.distance(i, j)),
                        EdgeKind::Zero => 0,
                        EdgeKind::Forbidden => S,
                    };
                    assert_eq!(t.cost(i, j), expected, "({}, {})", i, j);
                }
            }
        }
    }

    #[test]
    fn test_forbidden_transitions() {
        let inst = two_depots();
        let t = AtspTransformer::new(&inst, TransformConfig::default());
        // depot -> depot, customer -> depot, duplicate -> customer
        assert_eq!(t.classify(0, 1), EdgeKind::Forbidden);
        assert_eq!(t.classify(0, 0), EdgeKind::Forbidden);
        assert_eq!(t.classify(2, 0), EdgeKind::Forbidden);
        assert_eq!(t.classify(5, 2), EdgeKind::Forbidden);
        // depot -> other depot's duplicate
        assert_eq!(t.classify(0, 6), EdgeKind::Forbidden);
        // first duplicate -> next depot, last duplicate -> first depot
        assert_eq!(t.classify(5, 1), EdgeKind::Zero);
        assert_eq!(t.classify(6, 0), EdgeKind::Zero);
        assert_eq!(t.classify(6, 1), EdgeKind::Forbidden);
    }

    #[test]
    fn test_rounding_modes() {
        let inst = two_depots();
        let ceil = AtspTransformer::new(&inst, TransformConfig::default());
        let round = AtspTransformer::new(
            &inst,
            TransformConfig {
                rounding: Rounding::Round,
                ..Default::default()
            },
        );
        // depot (0,0) -> customer (0.333,0): 33.3
        assert_eq!(ceil.cost(0, 4), 34);
        assert_eq!(round.cost(0, 4), 33);
        // depot (0,0) -> customer (2.5,0): exact 250
        assert_eq!(ceil.cost(0, 3), 250);
        assert_eq!(round.cost(0, 3), 250);
        // depot (0,0) -> customer (1,1): 141.42..
        assert_eq!(ceil.cost(0, 2), 142);
        assert_eq!(round.cost(0, 2), 141);
    }

    #[test]
    fn test_duplicate_uses_original_coordinates() {
        let inst = two_depots();
        let t = AtspTransformer::new(&inst, TransformConfig::default());
        // customer (1,1) -> duplicate of depot (10,10)
        assert_eq!(t.cost(2, 6), Rounding::Ceil.apply(SCALE * (2.0f64 * 81.0).sqrt()));
    }

    #[test]
    fn test_single_depot_without_customers() {
        let inst = MdmtspInstance::parse("lone", "0 1\n5 5\n").unwrap();
        let t = AtspTransformer::new(&inst, TransformConfig::default());
        assert_eq!(t.row(0), vec![S, 0]);
        assert_eq!(t.row(1), vec![0, S]);
    }

    #[test]
    fn test_sentinel_policies() {
        let inst = small();
        let fixed = AtspTransformer::new(
            &inst,
            TransformConfig {
                sentinel: Sentinel::Fixed(42),
                ..Default::default()
            },
        );
        assert_eq!(fixed.row(3), vec![0, 42, 42, 42]);

        let auto = AtspTransformer::new(
            &inst,
            TransformConfig {
                sentinel: Sentinel::Auto,
                ..Default::default()
            },
        );
        assert_eq!(auto.sentinel(), inst.tour_cost_bound() + 1);
    }

    #[test]
    fn test_sentinel_from_str() {
        assert_eq!("auto".parse::<Sentinel>().unwrap(), Sentinel::Auto);
        assert_eq!("2500000".parse::<Sentinel>().unwrap(), Sentinel::Fixed(2_500_000));
        assert!("-3".parse::<Sentinel>().is_err());
    }

    #[test]
    fn test_matrix_text_layout() {
        let t = AtspTransformer::new(&small(), TransformConfig::default());
        let mut out = Vec::new();
        t.write_matrix(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "1000000 300 400 0 ");
        assert_eq!(lines[3], "0 1000000 1000000 1000000 ");
    }

    #[test]
    fn test_parallel_output_matches_sequential() {
        let customers: Vec<Point> = (0..150)
            .map(|k| Point::new((k * 7 % 31) as f64 * 1.37, (k * 11 % 29) as f64 * 0.91))
            .collect();
        let depots = vec![Point::new(0.0, 0.0), Point::new(20.0, 5.0), Point::new(3.0, 17.0)];
        let inst = MdmtspInstance::new("grid", depots, customers).unwrap();

        let mut sequential = Vec::new();
        AtspTransformer::new(&inst, TransformConfig::default())
            .write_matrix(&mut sequential)
            .unwrap();
        let mut parallel = Vec::new();
        AtspTransformer::new(
            &inst,
            TransformConfig {
                parallel: true,
                ..Default::default()
            },
        )
        .write_matrix(&mut parallel)
        .unwrap();

        assert_eq!(sequential, parallel);
    }
}
