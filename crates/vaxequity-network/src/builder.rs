//! Distribution network construction
//!
//! One node per supply hub, one node per country, and one edge for every
//! (hub, country) pair. Capacities are recomputed from scratch on every build.

use tracing::{debug, info};
use vaxequity_core::{CapacityModel, ConfigurationError, CountryTable, NetworkConfig};

use crate::graph::{DistributionNetwork, NetworkEdge, NetworkNode};

/// Capacity of the edge from a hub with `output` to a country with `population`
pub fn edge_capacity(
    model: CapacityModel,
    output: f64,
    population: f64,
    total_population: f64,
) -> f64 {
    let share = match model {
        CapacityModel::PopulationShare => population / total_population,
        CapacityModel::PopulationScaled {
            reference_population,
        } => population / reference_population,
    };
    (output * share).max(0.0)
}

/// Builds a [`DistributionNetwork`] from a country table.
pub struct NetworkBuilder<'a> {
    config: &'a NetworkConfig,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(config: &'a NetworkConfig) -> Self {
        Self { config }
    }

    /// Build the network.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` when the supply configuration is invalid
    /// (including zero total capacity) or the table has no countries.
    pub fn build(&self, table: &CountryTable) -> Result<DistributionNetwork, ConfigurationError> {
        self.config.validate()?;
        if table.is_empty() {
            return Err(ConfigurationError::EmptyCountryTable);
        }

        let total_population = table.total_population();
        let supply = &self.config.supply;

        let mut nodes = Vec::with_capacity(supply.len() + table.len());
        nodes.extend(supply.iter().map(|spec| NetworkNode::Supply {
            id: spec.id.clone(),
            output_capacity: spec.output_capacity,
        }));
        nodes.extend(table.iter().map(|record| NetworkNode::Demand {
            country_code: record.country_code.clone(),
            population: record.population,
            vaccination_rate: record.vaccination_rate,
        }));

        let mut edges = Vec::with_capacity(supply.len() * table.len());
        for (source, spec) in supply.iter().enumerate() {
            for (offset, record) in table.iter().enumerate() {
                edges.push(NetworkEdge {
                    source,
                    target: supply.len() + offset,
                    capacity: edge_capacity(
                        self.config.capacity_model,
                        spec.output_capacity,
                        record.population,
                        total_population,
                    ),
                });
            }
            debug!(hub = %spec.id, output = spec.output_capacity, "supply node connected");
        }

        let network = DistributionNetwork::from_parts(nodes, edges);
        info!(
            nodes = network.node_count(),
            edges = network.edge_count(),
            total_supply = network.total_supply(),
            "distribution network built"
        );
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaxequity_core::{BottleneckMethod, CountryRecord, PathWeighting, SupplyNodeSpec};

    use crate::bottleneck::find_bottlenecks;
    use crate::centrality::Centrality;

    fn table() -> CountryTable {
        CountryTable::from_records(vec![
            CountryRecord::new("KE", 300.0, 0.2),
            CountryRecord::new("BR", 100.0, 0.7),
        ])
        .unwrap()
    }

    #[test]
    fn test_hub_and_spoke_shape() {
        let config = NetworkConfig::with_supply(vec![
            SupplyNodeSpec::new("hub-a", 40.0),
            SupplyNodeSpec::new("hub-b", 8.0),
        ]);
        let network = NetworkBuilder::new(&config).build(&table()).unwrap();

        assert_eq!(network.node_count(), 4);
        assert_eq!(network.edge_count(), 4);
        for edge in network.edges() {
            assert!(edge.source < 2);
            assert!(edge.target >= 2);
        }
        // demand nodes are ordered by code
        assert_eq!(network.node(2).id(), "BR");
        assert_eq!(network.node(3).id(), "KE");
    }

    #[test]
    fn test_population_share_capacities() {
        let config = NetworkConfig::with_supply(vec![
            SupplyNodeSpec::new("hub-a", 40.0),
            SupplyNodeSpec::new("hub-b", 8.0),
        ]);
        let network = NetworkBuilder::new(&config).build(&table()).unwrap();

        assert!((network.inbound_capacity("KE").unwrap() - 36.0).abs() < 1e-9);
        assert!((network.inbound_capacity("BR").unwrap() - 12.0).abs() < 1e-9);
        let total: f64 = network.inbound_capacities().values().sum();
        assert!((total - network.total_supply()).abs() < 1e-9);
    }

    #[test]
    fn test_single_country_receives_full_output() {
        let config = NetworkConfig::with_supply(vec![
            SupplyNodeSpec::new("a", 10.0),
            SupplyNodeSpec::new("b", 5.0),
        ]);
        let table = CountryTable::from_records(vec![CountryRecord::new("KE", 1000.0, 0.1)]).unwrap();
        let network = NetworkBuilder::new(&config).build(&table).unwrap();
        assert_eq!(network.inbound_capacity("KE"), Some(15.0));
    }

    #[test]
    fn test_population_scaled_model() {
        let config = NetworkConfig {
            capacity_model: CapacityModel::PopulationScaled {
                reference_population: 1000.0,
            },
            ..NetworkConfig::with_supply(vec![SupplyNodeSpec::new("a", 50.0)])
        };
        let network = NetworkBuilder::new(&config).build(&table()).unwrap();
        assert!((network.inbound_capacity("KE").unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_fails() {
        let config = NetworkConfig::with_supply(vec![SupplyNodeSpec::new("a", 0.0)]);
        assert!(matches!(
            NetworkBuilder::new(&config).build(&table()),
            Err(ConfigurationError::ZeroTotalCapacity)
        ));
    }

    #[test]
    fn test_build_is_idempotent() {
        let config = NetworkConfig::default();
        let first = NetworkBuilder::new(&config).build(&table()).unwrap();
        let second = NetworkBuilder::new(&config).build(&table()).unwrap();
        assert_eq!(first, second);

        for weighting in [PathWeighting::Unweighted, PathWeighting::InverseCapacity] {
            assert_eq!(
                Centrality::compute(&first, weighting),
                Centrality::compute(&second, weighting)
            );
        }
        for method in [
            BottleneckMethod::MinCut,
            BottleneckMethod::Percentile { percentile: 50.0 },
        ] {
            assert_eq!(
                find_bottlenecks(&first, method, 0.5),
                find_bottlenecks(&second, method, 0.5)
            );
        }
    }

    #[test]
    fn test_supply_and_demand_namespaces_are_disjoint() {
        let config = NetworkConfig::with_supply(vec![SupplyNodeSpec::new("KE", 10.0)]);
        let network = NetworkBuilder::new(&config).build(&table()).unwrap();
        assert_eq!(network.supply_node("KE"), Some(0));
        assert_eq!(network.demand_node("KE"), Some(2));
    }
}
