//! Demonstrates rule resolution without touching the filesystem.
//!
//! Builds a schema and an aggregation rule set from inline rule text,
//! then resolves a handful of metric names the way the storage layer
//! would when it first learns each series.

use emberd::loader;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let schemas = loader::parse_retention_rules(
        "\
[carbon]
pattern = ^carbon\\.
retentions = 60:90d

[high_res_collectd]
pattern = ^collectd\\.
retentions = 10s:6h,1m:30d,10m:5y

[default_1min_for_1day]
pattern = .*
retentions = 60:1440
",
    )?;

    let aggregation = loader::parse_aggregation_rules(
        "\
[min_series]
pattern = \\.min$
xFilesFactor = 0.1
aggregationMethod = min

[counts]
pattern = \\.count$
aggregationMethod = sum
",
    )?;

    for metric in [
        "carbon.agents.web1.metricsReceived",
        "collectd.db01.load.shortterm",
        "stats.timers.api.req.min",
        "stats.timers.api.req.count",
        "servers.web1.cpu.user",
    ] {
        let rule = schemas
            .resolve_rule(metric)
            .map_or("(default)", |r| r.name());
        let retention = schemas.resolve(metric);
        let policy = aggregation.resolve(metric);

        let tiers: Vec<String> = retention
            .tiers()
            .iter()
            .map(|t| format!("{}s:{}pts", t.interval.as_secs(), t.points()))
            .collect();

        println!(
            "{metric}\n  schema {rule}: {}\n  aggregation: {} (xff {})",
            tiers.join(", "),
            policy.method,
            policy.x_files_factor
        );
    }

    Ok(())
}
