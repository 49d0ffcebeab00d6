use anyhow::Result;
use flowcal_cli::cli::TopologyCommands;
use flowcal_core::graph_utils;
use flowcal_io::{load_topology, write_topology};

pub fn handle(command: &TopologyCommands) -> Result<()> {
    match command {
        TopologyCommands::Stats { dir } => {
            let topology = load_topology(dir)?;
            let stats = graph_utils::topology_stats(&topology);
            println!("Topology statistics for {}:", dir.display());
            println!("  Buses         : {}", stats.bus_count);
            println!("  AC branches   : {}", stats.branch_count);
            println!("  DC links      : {}", stats.link_count);
            println!("  Components    : {}", stats.connected_components);
            println!(
                "  Degree [min/avg/max]: {}/{:.2}/{}",
                stats.min_degree, stats.avg_degree, stats.max_degree
            );
            println!("  Zones         : {}", topology.zones().len());
            Ok(())
        }
        TopologyCommands::Islands { dir, emit } => {
            let topology = load_topology(dir)?;
            let analysis = graph_utils::find_islands(&topology);
            for (idx, summary) in analysis.islands.iter().enumerate() {
                let marker = if analysis.main_island == Some(idx) {
                    " (main)"
                } else {
                    ""
                };
                println!(
                    "Island {}: {} bus(es){}",
                    summary.island_id,
                    summary.buses.len(),
                    marker
                );
                if *emit {
                    for bus in &summary.buses {
                        println!("  {bus}");
                    }
                }
            }
            Ok(())
        }
        TopologyCommands::Prepare { dir, year, out } => {
            let mut topology = load_topology(dir)?;
            let report = topology.prepare(*year)?;
            write_topology(&topology, out)?;
            println!(
                "Prepared topology written to {} ({} buses, {} removed by year, {} islanded)",
                out.display(),
                topology.buses.len(),
                report.removed_by_year,
                report.islanded.len()
            );
            Ok(())
        }
    }
}
