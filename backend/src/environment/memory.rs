//! In-memory environment
//!
//! A small deterministic traffic world implementing [`Environment`]: a
//! directed road network, vehicles that drive along registered routes, a
//! crude emission model and a step clock. It backs the integration tests and
//! the CLI demo run, and supports failure injection so soft and fatal error
//! paths can be exercised without a real simulator.
//!
//! Semantics follow a real traffic simulator closely enough for the core:
//! - vehicles added during a turn appear after the next `advance_time`
//! - vehicles reaching the end of their route are removed and reported as
//!   departed until the following advance
//! - lanes are named `<edge>_<index>`

use super::{Attribute, EnvError, EnvResult, Environment};
use crate::models::command::Command;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Default physical parameters of inserted vehicles
const DEFAULT_MAX_SPEED: f64 = 50.0;
const DEFAULT_ACCELERATION: f64 = 2.6;
const DEFAULT_MIN_GAP: f64 = 2.5;

/// Emission model: idle + speed² + acceleration terms (mg/s)
const IDLE_CO2: f64 = 1500.0;
const CO2_PER_SPEED_SQUARED: f64 = 4.0;
const CO2_PER_ACCELERATION: f64 = 400.0;

/// One directed road segment
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEdge {
    pub id: String,
    pub from_node: String,
    pub to_node: String,
    pub lanes: u8,
    /// Lane speed ceiling (m/s)
    pub max_speed: f64,
    /// Length (m)
    pub length: f64,
}

impl NetworkEdge {
    pub fn new(id: &str, from_node: &str, to_node: &str, lanes: u8, max_speed: f64, length: f64) -> Self {
        Self {
            id: id.to_string(),
            from_node: from_node.to_string(),
            to_node: to_node.to_string(),
            lanes,
            max_speed,
            length,
        }
    }
}

#[derive(Debug, Clone)]
struct Vehicle {
    route: Vec<String>,
    edge_index: usize,
    progress: f64,
    lane_index: u8,
    speed: f64,
    max_speed: f64,
    acceleration: f64,
    min_gap: f64,
    co2: f64,
}

#[derive(Debug, Clone)]
struct PendingInsertion {
    entity: String,
    route_id: String,
    lane_index: u8,
    depart_tick: u64,
}

/// Deterministic in-memory traffic world
#[derive(Debug, Clone)]
pub struct InMemoryEnvironment {
    edges: Vec<NetworkEdge>,
    edge_index: HashMap<String, usize>,
    routes: HashMap<String, Vec<String>>,
    vehicles: BTreeMap<String, Vehicle>,
    pending: Vec<PendingInsertion>,
    departed: Vec<String>,
    time: u64,
    /// Time units per step; 1 unless the clock is scaled
    time_step: u64,
    /// Seconds of driving per step
    step_seconds: f64,
    end_time: Option<u64>,
    closed: bool,
    disconnected: bool,
    command_failures: VecDeque<EnvError>,
    advance_failure: Option<EnvError>,
    applied: Vec<Command>,
}

impl InMemoryEnvironment {
    pub fn new(edges: Vec<NetworkEdge>) -> Self {
        let edge_index = edges
            .iter()
            .enumerate()
            .map(|(index, edge)| (edge.id.clone(), index))
            .collect();

        Self {
            edges,
            edge_index,
            routes: HashMap::new(),
            vehicles: BTreeMap::new(),
            pending: Vec::new(),
            departed: Vec::new(),
            time: 0,
            time_step: 1,
            step_seconds: 1.0,
            end_time: None,
            closed: false,
            disconnected: false,
            command_failures: VecDeque::new(),
            advance_failure: None,
            applied: Vec::new(),
        }
    }

    /// Bidirectional ring of `segments` nodes: forward edges `e<i>` and
    /// reverse edges `r<i>`, alternating urban and arterial speed ceilings.
    pub fn ring(segments: usize) -> Self {
        let segments = segments.max(2);
        let mut edges = Vec::with_capacity(segments * 2);
        for i in 0..segments {
            let from = format!("n{}", i);
            let to = format!("n{}", (i + 1) % segments);
            let (lanes, max_speed) = if i % 2 == 0 { (1, 13.89) } else { (2, 27.78) };
            let length = 150.0 + 50.0 * (i % 4) as f64;
            edges.push(NetworkEdge::new(&format!("e{}", i), &from, &to, lanes, max_speed, length));
            edges.push(NetworkEdge::new(&format!("r{}", i), &to, &from, lanes, max_speed, length));
        }
        Self::new(edges)
    }

    /// Report time in larger units (e.g. 1000 for milliseconds)
    pub fn with_time_step(mut self, time_step: u64) -> Self {
        self.time_step = time_step.max(1);
        self
    }

    /// Environment reports finished once its time reaches `end_time`
    pub fn with_end_time(mut self, end_time: u64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    // ========================================================================
    // Failure injection and inspection
    // ========================================================================

    /// The next `apply_command` fails with `error`
    pub fn inject_command_failure(&mut self, error: EnvError) {
        self.command_failures.push_back(error);
    }

    /// The next `advance_time` fails with `error`
    pub fn inject_advance_failure(&mut self, error: EnvError) {
        self.advance_failure = Some(error);
    }

    /// Every later request fails with a connection loss
    pub fn disconnect(&mut self) {
        self.disconnected = true;
    }

    /// Remove a vehicle right away and report it as departed
    pub fn remove_vehicle(&mut self, entity: &str) -> bool {
        if self.vehicles.remove(entity).is_some() {
            self.departed.push(entity.to_string());
            true
        } else {
            false
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Commands accepted so far, in application order
    pub fn applied_commands(&self) -> &[Command] {
        &self.applied
    }

    pub fn route(&self, route_id: &str) -> Option<&[String]> {
        self.routes.get(route_id).map(Vec::as_slice)
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_connected(&self) -> EnvResult<()> {
        if self.disconnected {
            return Err(EnvError::ConnectionLost("connection reset".to_string()));
        }
        if self.closed {
            return Err(EnvError::ConnectionLost("connection closed".to_string()));
        }
        Ok(())
    }

    fn edge(&self, id: &str) -> EnvResult<&NetworkEdge> {
        self.edge_index
            .get(id)
            .map(|&index| &self.edges[index])
            .ok_or_else(|| EnvError::Rejected(format!("unknown edge {}", id)))
    }

    fn vehicle_mut(&mut self, entity: &str) -> EnvResult<&mut Vehicle> {
        self.vehicles
            .get_mut(entity)
            .ok_or_else(|| EnvError::UnknownEntity(entity.to_string()))
    }

    fn check_value(value: f64, what: &str) -> EnvResult<()> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(EnvError::Rejected(format!("invalid {}: {}", what, value)))
        }
    }

    fn execute(&mut self, command: &Command) -> EnvResult<()> {
        match command {
            Command::AddRoute { route_id, edges } => {
                if self.routes.contains_key(route_id) {
                    return Err(EnvError::Rejected(format!("route {} already exists", route_id)));
                }
                if edges.is_empty() {
                    return Err(EnvError::Rejected(format!("route {} has no edges", route_id)));
                }
                for edge in edges {
                    self.edge(edge)?;
                }
                self.routes.insert(route_id.clone(), edges.clone());
            }
            Command::AddVehicle {
                entity,
                route_id,
                depart_tick,
                lane_index,
                ..
            } => {
                let route = self
                    .routes
                    .get(route_id)
                    .ok_or_else(|| EnvError::Rejected(format!("unknown route {}", route_id)))?;
                let start_edge = self.edge(&route[0])?;
                if *lane_index >= start_edge.lanes {
                    return Err(EnvError::Rejected(format!(
                        "lane {} out of range on {}",
                        lane_index, start_edge.id
                    )));
                }
                let already_pending = self.pending.iter().any(|p| &p.entity == entity);
                if self.vehicles.contains_key(entity) || already_pending {
                    return Err(EnvError::Rejected(format!("vehicle {} already exists", entity)));
                }
                self.pending.push(PendingInsertion {
                    entity: entity.clone(),
                    route_id: route_id.clone(),
                    lane_index: *lane_index,
                    depart_tick: *depart_tick,
                });
            }
            Command::SetMaxSpeed { entity, value } => {
                Self::check_value(*value, "max speed")?;
                self.vehicle_mut(entity)?.max_speed = *value;
            }
            Command::SetMinGap { entity, value } => {
                Self::check_value(*value, "min gap")?;
                self.vehicle_mut(entity)?.min_gap = *value;
            }
            Command::SetAcceleration { entity, value } => {
                Self::check_value(*value, "acceleration")?;
                self.vehicle_mut(entity)?.acceleration = *value;
            }
        }
        Ok(())
    }

    fn insert_pending(&mut self) {
        let time = self.time;
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.depart_tick <= time);
        self.pending = waiting;

        for insertion in due {
            if let Some(route) = self.routes.get(&insertion.route_id) {
                self.vehicles.insert(
                    insertion.entity,
                    Vehicle {
                        route: route.clone(),
                        edge_index: 0,
                        progress: 0.0,
                        lane_index: insertion.lane_index,
                        speed: 0.0,
                        max_speed: DEFAULT_MAX_SPEED,
                        acceleration: DEFAULT_ACCELERATION,
                        min_gap: DEFAULT_MIN_GAP,
                        co2: IDLE_CO2,
                    },
                );
            }
        }
    }

    fn drive(&mut self) {
        let mut finished = Vec::new();

        for (id, vehicle) in self.vehicles.iter_mut() {
            let Some(edge) = self
                .edge_index
                .get(&vehicle.route[vehicle.edge_index])
                .map(|&index| &self.edges[index])
            else {
                finished.push(id.clone());
                continue;
            };

            let previous_speed = vehicle.speed;
            vehicle.speed = (vehicle.speed + vehicle.acceleration * self.step_seconds)
                .min(vehicle.max_speed)
                .min(edge.max_speed);
            let accelerated = (vehicle.speed - previous_speed).max(0.0) / self.step_seconds;
            vehicle.co2 = IDLE_CO2
                + CO2_PER_SPEED_SQUARED * vehicle.speed * vehicle.speed
                + CO2_PER_ACCELERATION * accelerated;

            vehicle.progress += vehicle.speed * self.step_seconds;
            let mut length = edge.length;
            while vehicle.progress >= length {
                vehicle.progress -= length;
                vehicle.edge_index += 1;
                if vehicle.edge_index >= vehicle.route.len() {
                    finished.push(id.clone());
                    break;
                }
                let next = &vehicle.route[vehicle.edge_index];
                length = match self.edge_index.get(next) {
                    Some(&index) => self.edges[index].length,
                    None => {
                        finished.push(id.clone());
                        break;
                    }
                };
                let lanes = self.edge_index.get(next).map(|&i| self.edges[i].lanes).unwrap_or(1);
                vehicle.lane_index = vehicle.lane_index.min(lanes.saturating_sub(1));
            }
        }

        for id in finished {
            self.vehicles.remove(&id);
            self.departed.push(id);
        }
    }
}

impl Environment for InMemoryEnvironment {
    fn present_entities(&mut self) -> EnvResult<Vec<String>> {
        self.ensure_connected()?;
        Ok(self.vehicles.keys().cloned().collect())
    }

    fn departed_entities(&mut self) -> EnvResult<Vec<String>> {
        self.ensure_connected()?;
        Ok(self.departed.clone())
    }

    fn network_edges(&mut self) -> EnvResult<Vec<String>> {
        self.ensure_connected()?;
        Ok(self.edges.iter().map(|edge| edge.id.clone()).collect())
    }

    fn find_route(
        &mut self,
        from: &str,
        to: &str,
        _vehicle_class: &str,
    ) -> EnvResult<Option<Vec<String>>> {
        self.ensure_connected()?;
        self.edge(from)?;
        self.edge(to)?;

        if from == to {
            return Ok(Some(vec![from.to_string()]));
        }

        // Breadth-first over edges; neighbors in declaration order
        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let end_node = &self.edges[self.edge_index[current]].to_node;
            for next in self.edges.iter().filter(|edge| &edge.from_node == end_node) {
                if !visited.insert(next.id.as_str()) {
                    continue;
                }
                parents.insert(next.id.as_str(), current);
                if next.id == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while let Some(&parent) = parents.get(cursor) {
                        path.push(parent.to_string());
                        cursor = parent;
                    }
                    path.reverse();
                    return Ok(Some(path));
                }
                queue.push_back(next.id.as_str());
            }
        }

        Ok(None)
    }

    fn lane_count(&mut self, edge: &str) -> EnvResult<u8> {
        self.ensure_connected()?;
        Ok(self.edge(edge)?.lanes)
    }

    fn lane_of(&mut self, entity: &str) -> EnvResult<Option<String>> {
        self.ensure_connected()?;
        let vehicle = self
            .vehicles
            .get(entity)
            .ok_or_else(|| EnvError::UnknownEntity(entity.to_string()))?;
        Ok(vehicle
            .route
            .get(vehicle.edge_index)
            .map(|edge| format!("{}_{}", edge, vehicle.lane_index)))
    }

    fn lane_ceiling(&mut self, lane: &str) -> EnvResult<f64> {
        self.ensure_connected()?;
        let (edge, _) = lane
            .rsplit_once('_')
            .ok_or_else(|| EnvError::Rejected(format!("malformed lane id {}", lane)))?;
        Ok(self.edge(edge)?.max_speed)
    }

    fn scalar_attribute(&mut self, entity: &str, attribute: Attribute) -> EnvResult<Option<f64>> {
        self.ensure_connected()?;
        let vehicle = self
            .vehicles
            .get(entity)
            .ok_or_else(|| EnvError::UnknownEntity(entity.to_string()))?;
        let value = match attribute {
            Attribute::Speed => vehicle.speed,
            Attribute::MaxSpeed => vehicle.max_speed,
            Attribute::Acceleration => vehicle.acceleration,
            Attribute::MinGap => vehicle.min_gap,
            Attribute::Co2Emission => vehicle.co2,
        };
        Ok(Some(value))
    }

    fn population_average(&mut self, attribute: Attribute) -> EnvResult<Option<f64>> {
        self.ensure_connected()?;
        if self.vehicles.is_empty() {
            return Ok(None);
        }
        let ids: Vec<String> = self.vehicles.keys().cloned().collect();
        let mut total = 0.0;
        for id in &ids {
            total += self.scalar_attribute(id, attribute)?.unwrap_or(0.0);
        }
        Ok(Some(total / ids.len() as f64))
    }

    fn apply_command(&mut self, command: &Command) -> EnvResult<()> {
        self.ensure_connected()?;
        if let Some(error) = self.command_failures.pop_front() {
            return Err(error);
        }
        self.execute(command)?;
        self.applied.push(command.clone());
        Ok(())
    }

    fn advance_time(&mut self) -> EnvResult<()> {
        self.ensure_connected()?;
        if let Some(error) = self.advance_failure.take() {
            return Err(error);
        }

        self.departed.clear();
        self.drive();
        self.time += self.time_step;
        self.insert_pending();
        Ok(())
    }

    fn current_time(&mut self) -> EnvResult<u64> {
        self.ensure_connected()?;
        Ok(self.time)
    }

    fn is_finished(&mut self) -> EnvResult<bool> {
        self.ensure_connected()?;
        Ok(matches!(self.end_time, Some(end) if self.time >= end))
    }

    fn close(&mut self) {
        if !self.closed {
            tracing::debug!("closing in-memory environment");
        }
        self.closed = true;
    }
}
