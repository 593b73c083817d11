/// Annotated configuration printed by `vaxequity example-config`.
pub const EXAMPLE_CONFIG: &str = r#"# vaxequity configuration
# Every section is optional; omitted values fall back to the defaults shown here.

[data]
# Coverage assumed when no rate, persons vaccinated or doses are reported
missing_rate_fallback = 0.0
# Restrict the analysis to these ISO3 codes
# countries = ["KEN", "NGA", "IND"]

[data.invalid_population]
# drop | abort | minimum (with population = ...)
policy = "drop"

[network]
# unweighted | inverse_capacity
path_weighting = "unweighted"
# Countries whose inbound capacity covers less than this share of
# their unvaccinated population are reported as bottlenecks
country_coverage_threshold = 0.5

[network.capacity_model]
# population_share | population_scaled (with reference_population = ...)
model = "population_share"

[network.bottleneck]
# min_cut | percentile (with percentile = 0-100)
method = "min_cut"

[[network.supply]]
id = "US"
output_capacity = 2.0e8

[[network.supply]]
id = "IN"
output_capacity = 2.0e8

[[network.supply]]
id = "CN"
output_capacity = 2.0e8

[need]
coverage_weight = 0.3
recency_weight = 0.7
recency_horizon_days = 180.0

[allocation]
budget = 1.0e9
# 1 = pure need prioritization, 0 = population-proportional coverage
alpha = 0.8
normalize_need = false

[allocation.cap]
# none | unvaccinated_share | population_share | budget_share
policy = "unvaccinated_share"
fraction = 1.0

[solver]
# simplex | greedy
backend = "simplex"
max_iterations = 10000
# timeout_secs = 30.0
verbose = false

[equity]
# population | uniform
weighting = "population"
"#;
