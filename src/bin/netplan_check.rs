use clap::{Parser, ValueEnum};
use netplan_rs::config::PlanConfig;
use netplan_rs::demo::{IpOverWdmOpts, LineOpts, RingOpts, build_ip_over_wdm, build_line, build_ring};
use netplan_rs::net::{LayerId, LinkId, NetPlan, NodeId, RoutingType};
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DemoKind {
    Line,
    Ring,
    IpOverWdm,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoutingArg {
    Source,
    HopByHop,
}

impl From<RoutingArg> for RoutingType {
    fn from(r: RoutingArg) -> Self {
        match r {
            RoutingArg::Source => RoutingType::SourceRouting,
            RoutingArg::HopByHop => RoutingType::HopByHopRouting,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "netplan-check",
    about = "Load a network plan, apply failures, and verify cache consistency"
)]
struct Args {
    /// Path to plan.json
    #[arg(long, conflicts_with = "demo")]
    plan: Option<PathBuf>,

    /// Build a demo topology instead of loading a plan
    #[arg(long, value_enum)]
    demo: Option<DemoKind>,

    /// Write the resulting plan document here
    #[arg(long)]
    out: Option<PathBuf>,

    /// Link ids to set down
    #[arg(long, value_delimiter = ',')]
    fail_link: Vec<u64>,

    /// Node ids to set down
    #[arg(long, value_delimiter = ',')]
    fail_node: Vec<u64>,

    /// Link ids to set up
    #[arg(long, value_delimiter = ',')]
    repair_link: Vec<u64>,

    /// Node ids to set up
    #[arg(long, value_delimiter = ',')]
    repair_node: Vec<u64>,

    /// Convert the routing type of `--layer` (default layer if omitted)
    #[arg(long, value_enum)]
    routing_type: Option<RoutingArg>,

    /// Layer id used by `--routing-type`
    #[arg(long)]
    layer: Option<u64>,

    /// Override the precision factor
    #[arg(long)]
    precision: Option<f64>,

    /// Disable logging
    #[arg(long)]
    quiet: bool,
}

fn link_ids(ids: &[u64]) -> Vec<LinkId> {
    ids.iter().map(|&i| LinkId(i)).collect()
}

fn node_ids(ids: &[u64]) -> Vec<NodeId> {
    ids.iter().map(|&i| NodeId(i)).collect()
}

fn print_summary(plan: &NetPlan) -> Result<(), Box<dyn Error>> {
    for layer in plan.layers() {
        let id = layer.layer_id();
        let offered: f64 = plan.demand_offered_traffic_vector(id)?.iter().sum();
        let carried: f64 = plan.demand_carried_traffic_vector(id)?.iter().sum();
        let blocked = plan.demands_of(id)?.filter(|d| d.is_blocked(plan.precision_factor())).count();
        println!(
            "layer id={} name={:?} routing={:?} links={} links_down={} demands={} routes={} offered={:.6} carried={:.6} blocked_demands={} oversubscribed_links={}",
            id.0,
            layer.name(),
            layer.routing_type(),
            plan.links_of(id)?.count(),
            layer.links_down().len(),
            plan.demands_of(id)?.count(),
            plan.routes_of(id)?.count(),
            offered,
            carried,
            blocked,
            plan.oversubscribed_links(id)?.len(),
        );
    }
    println!(
        "plan nodes={} nodes_down={} layers={}",
        plan.number_of_nodes(),
        plan.nodes_down().len(),
        plan.number_of_layers()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = if args.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut config = PlanConfig::default();
    if let Some(p) = args.precision {
        config.precision_factor = p;
    }
    config.validate()?;

    let mut plan = match (&args.plan, args.demo) {
        (Some(path), _) => NetPlan::load_json_file(path, config)?,
        (None, Some(kind)) => {
            let mut plan = NetPlan::new(config);
            match kind {
                DemoKind::Line => {
                    build_line(&mut plan, &LineOpts::default())?;
                }
                DemoKind::Ring => {
                    build_ring(&mut plan, &RingOpts::default())?;
                }
                DemoKind::IpOverWdm => {
                    build_ip_over_wdm(&mut plan, &IpOverWdmOpts::default())?;
                }
            }
            plan
        }
        (None, None) => return Err("either --plan or --demo is required".into()),
    };

    if !(args.fail_link.is_empty() && args.fail_node.is_empty() && args.repair_link.is_empty() && args.repair_node.is_empty())
    {
        plan.set_links_and_nodes_failure_state(
            &link_ids(&args.repair_link),
            &link_ids(&args.fail_link),
            &node_ids(&args.repair_node),
            &node_ids(&args.fail_node),
        )?;
    }

    if let Some(rt) = args.routing_type {
        let layer = args.layer.map(LayerId).unwrap_or_else(|| plan.default_layer());
        plan.set_routing_type(layer, rt.into())?;
    }

    match plan.check_caches_consistency() {
        Ok(()) => println!("consistency ok"),
        Err(e) => {
            println!("consistency FAILED: {e}");
            return Err(e.into());
        }
    }
    print_summary(&plan)?;

    if let Some(path) = args.out {
        plan.save_json_file(&path)?;
        info!(path = %path.display(), "💾 规划文档已写出");
        eprintln!("wrote plan to {}", path.display());
    }
    Ok(())
}
