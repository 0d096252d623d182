//! Decoding ATSP tours back into MDMTSP vehicle routes.
//!
//! Walking the cycle from index 0, every original depot opens a route,
//! customers are appended to the open route and the next duplicated depot
//! closes it. A depot followed directly by its own duplicate is an unused
//! vehicle.

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::instance::NodeClass;
use crate::transform::{AtspTransformer, EdgeKind};
use crate::tsplib::TsplibTour;

/// One vehicle's route, in MDMTSP numbering (0-based depots and customers)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRoute {
    /// Depot the vehicle leaves from
    pub start_depot: usize,
    /// Depot the vehicle returns to, if the route was closed by a duplicated depot
    pub end_depot: Option<usize>,
    /// Customers in visiting order
    pub customers: Vec<usize>,
    /// Sum of the ATSP costs along the route
    pub cost: u64,
}

impl VehicleRoute {
    pub fn is_used(&self) -> bool {
        !self.customers.is_empty()
    }
}

/// Result of decoding an ATSP tour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourDecoding {
    pub routes: Vec<VehicleRoute>,
    /// Customers reached without an open route (only through forbidden edges)
    pub unassigned: Vec<usize>,
    /// ATSP objective of the whole cycle
    pub tour_cost: u64,
    /// Number of forbidden edges on the cycle
    pub forbidden_edges: usize,
}

impl TourDecoding {
    /// A tour is a valid MDMTSP solution when it uses no forbidden edge
    pub fn feasible(&self) -> bool {
        self.forbidden_edges == 0 && self.unassigned.is_empty()
    }

    pub fn routes_cost(&self) -> u64 {
        self.routes.iter().map(|r| r.cost).sum()
    }

    pub fn used_vehicles(&self) -> usize {
        self.routes.iter().filter(|r| r.is_used()).count()
    }
}

impl std::fmt::Display for TourDecoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for route in &self.routes {
            write!(f, "  Vehicle at depot {}: ", route.start_depot + 1)?;
            if !route.is_used() {
                writeln!(f, "unused")?;
                continue;
            }
            write!(f, "D{}", route.start_depot + 1)?;
            for c in &route.customers {
                write!(f, " -> C{}", c + 1)?;
            }
            match route.end_depot {
                Some(d) => write!(f, " -> D{}", d + 1)?,
                None => write!(f, " -> ?")?,
            }
            writeln!(f, " (cost {})", route.cost)?;
        }
        if !self.unassigned.is_empty() {
            let ids: Vec<String> = self.unassigned.iter().map(|c| format!("C{}", c + 1)).collect();
            writeln!(f, "  Unassigned customers: {}", ids.join(" "))?;
        }
        writeln!(f, "Vehicles used: {}/{}", self.used_vehicles(), self.routes.len())?;
        writeln!(f, "Routes cost: {}", self.routes_cost())?;
        writeln!(f, "Tour cost: {}", self.tour_cost)?;
        writeln!(f, "Forbidden edges: {}", self.forbidden_edges)?;
        writeln!(f, "Feasible: {}", self.feasible())
    }
}

/// Decode a TSPLIB tour, checking its declared dimension first.
pub fn decode_tsplib_tour(transformer: &AtspTransformer, tour: &TsplibTour) -> Result<TourDecoding> {
    if let Some(dimension) = tour.dimension {
        if dimension != transformer.dimension() {
            return Err(ConvertError::invalid_tour(format!(
                "tour DIMENSION {} does not match instance dimension {}",
                dimension,
                transformer.dimension()
            )));
        }
    }
    decode_tour(transformer, &tour.zero_based())
}

/// Decode a 0-based permutation of the extended index space.
pub fn decode_tour(transformer: &AtspTransformer, tour: &[usize]) -> Result<TourDecoding> {
    let space = transformer.space();
    let dim = space.dimension();
    check_permutation(tour, dim)?;

    let mut order = tour.to_vec();
    if let Some(start) = order.iter().position(|&n| n == 0) {
        order.rotate_left(start);
    }

    let mut routes = Vec::new();
    let mut unassigned = Vec::new();
    let mut open: Option<Vec<usize>> = None;

    for &node in &order {
        match space.class(node) {
            NodeClass::Depot => {
                if let Some(path) = open.take() {
                    routes.push(close_route(transformer, path));
                }
                open = Some(vec![node]);
            }
            NodeClass::Customer => match open.as_mut() {
                Some(path) => path.push(node),
                None => unassigned.push(node - space.depots()),
            },
            NodeClass::DuplicateDepot => {
                if let Some(mut path) = open.take() {
                    path.push(node);
                    routes.push(close_route(transformer, path));
                }
            }
        }
    }
    if let Some(path) = open.take() {
        routes.push(close_route(transformer, path));
    }

    let mut tour_cost = 0u64;
    let mut forbidden_edges = 0;
    for k in 0..dim {
        let (a, b) = (order[k], order[(k + 1) % dim]);
        tour_cost = tour_cost.saturating_add(transformer.cost(a, b));
        if transformer.classify(a, b) == EdgeKind::Forbidden {
            forbidden_edges += 1;
        }
    }

    if forbidden_edges > 0 {
        log::warn!("Tour uses {} forbidden edge(s)", forbidden_edges);
    }

    Ok(TourDecoding {
        routes,
        unassigned,
        tour_cost,
        forbidden_edges,
    })
}

fn check_permutation(tour: &[usize], dim: usize) -> Result<()> {
    if tour.len() != dim {
        return Err(ConvertError::invalid_tour(format!(
            "tour visits {} nodes, expected {}",
            tour.len(),
            dim
        )));
    }
    let mut seen = vec![false; dim];
    for &node in tour {
        if node >= dim {
            return Err(ConvertError::invalid_tour(format!(
                "node {} is outside the instance (dimension {})",
                node + 1,
                dim
            )));
        }
        if seen[node] {
            return Err(ConvertError::invalid_tour(format!("node {} is visited twice", node + 1)));
        }
        seen[node] = true;
    }
    Ok(())
}

/// `path` holds ATSP indices: a depot, its customers and possibly the closing duplicate.
fn close_route(transformer: &AtspTransformer, path: Vec<usize>) -> VehicleRoute {
    let space = transformer.space();
    let start_depot = path[0];
    let end_depot = path.last().and_then(|&n| space.original_of(n));
    let customers = path
        .iter()
        .filter(|&&n| space.class(n) == NodeClass::Customer)
        .map(|&n| n - space.depots())
        .collect();
    let cost = path
        .windows(2)
        .map(|w| transformer.cost(w[0], w[1]))
        .fold(0u64, u64::saturating_add);

    VehicleRoute {
        start_depot,
        end_depot,
        customers,
        cost,
    }
}
