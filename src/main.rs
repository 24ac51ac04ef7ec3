use std::fs::File;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcglib::mesh::{focus_oracle, MeshConfig, Semiregular48, Topology};
use gcglib::ordered::{AvlTree, HashTable, HashTableConfig, NaturalOrder, Order, StdHashOrder};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gcg", about = "Exercise the GCGlib containers and 4-8 mesh engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an AVL tree from integer keys and print it in order.
    Tree {
        /// Keys to insert, in order.
        keys: Vec<i64>,
        /// Keys to remove afterwards.
        #[arg(long, num_args = 1..)]
        remove: Vec<i64>,
    },
    /// Fill a hash table with `count` keys and report its shape.
    Hash {
        /// Number of keys to insert.
        count: u64,
        /// Initial bucket count.
        #[arg(long)]
        capacity: Option<usize>,
        /// Shrink below this load (0 disables).
        #[arg(long, default_value_t = 0.0)]
        min_load: f64,
        /// Grow above this load (0 disables).
        #[arg(long, default_value_t = 0.8)]
        max_load: f64,
    },
    /// Tessellate the unit square around a focus point.
    Mesh {
        /// Edge identification of the base square.
        #[arg(long, value_enum, default_value_t = TopologyArg::Plane)]
        topology: TopologyArg,
        /// Deepest subdivision level.
        #[arg(long, default_value_t = 10)]
        max_level: u32,
        /// Triangle budget for breadth-first refinement.
        #[arg(long, default_value_t = 4096)]
        budget: usize,
        /// Refine depth-first instead (ignores the budget).
        #[arg(long)]
        depth_first: bool,
        /// Point the refinement concentrates on.
        #[arg(long, num_args = 2, default_values_t = [0.3, 0.3])]
        focus: Vec<f64>,
        /// Write the visible triangles as Wavefront OBJ.
        #[arg(long)]
        obj: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TopologyArg {
    Plane,
    Cylinder,
    Torus,
}

impl From<TopologyArg> for Topology {
    fn from(arg: TopologyArg) -> Self {
        match arg {
            TopologyArg::Plane => Topology::Plane,
            TopologyArg::Cylinder => Topology::Cylinder,
            TopologyArg::Torus => Topology::Torus,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tree { keys, remove } => run_tree(keys, remove)?,
        Commands::Hash {
            count,
            capacity,
            min_load,
            max_load,
        } => run_hash(count, capacity, min_load, max_load)?,
        Commands::Mesh {
            topology,
            max_level,
            budget,
            depth_first,
            focus,
            obj,
        } => run_mesh(topology.into(), max_level, budget, depth_first, &focus, obj)?,
    }

    Ok(())
}

fn run_tree(keys: Vec<i64>, remove: Vec<i64>) -> Result<()> {
    let mut tree = AvlTree::new(NaturalOrder);
    for key in keys {
        if !tree.insert(key).context("tree insertion failed")?.is_inserted() {
            println!("duplicate key {key} ignored");
        }
    }
    for key in &remove {
        if tree.remove(key).is_none() {
            println!("key {key} not found");
        }
    }

    let ordered: Vec<String> = tree.iter(Order::Ascending).map(i64::to_string).collect();
    println!("items:    [{}]", ordered.join(", "));
    println!("count:    {}", tree.len());
    println!("height:   {}", tree.height());
    println!("balanced: {}", tree.is_balanced());
    Ok(())
}

fn run_hash(count: u64, capacity: Option<usize>, min_load: f64, max_load: f64) -> Result<()> {
    let mut config = HashTableConfig::new().with_load_limits(min_load, max_load);
    if let Some(capacity) = capacity {
        config = config.with_initial_capacity(capacity);
    }
    let mut table = HashTable::with_config(StdHashOrder, config).context("invalid table configuration")?;

    for key in 0..count {
        let outcome = table
            .insert(key)
            .with_context(|| format!("inserting key {key} failed"))?;
        ensure!(outcome.is_inserted(), "key {key} reported as duplicate");
    }
    info!(count, "hash table filled");

    println!("items:    {}", table.len());
    println!("capacity: {}", table.capacity());
    println!("load:     {:.3}", table.load());
    println!("resizes:  {}", table.resize_count());
    println!("buckets:  {} occupied", table.occupied_buckets());
    Ok(())
}

fn run_mesh(
    topology: Topology,
    max_level: u32,
    budget: usize,
    depth_first: bool,
    focus: &[f64],
    obj: Option<PathBuf>,
) -> Result<()> {
    let config = MeshConfig::new()
        .with_topology(topology)
        .with_max_level(max_level);
    let mut mesh = Semiregular48::new(config).context("invalid mesh configuration")?;
    let mut oracle = focus_oracle([focus[0], focus[1]], 1.0);

    let stats = if depth_first {
        mesh.tessellate_depth_first(&mut oracle)
    } else {
        mesh.tessellate_breadth_first(budget, &mut oracle)
    }
    .context("tessellation failed")?;

    println!("topology:    {topology:?}");
    println!("triangles:   {}", stats.triangles);
    println!("nodes:       {}", stats.nodes);
    println!("vertices:    {}", oracle.positions().len());
    println!("splits:      {} ({} forced)", stats.splits, stats.forced_splits);
    println!("deepest:     {}", stats.deepest_level);
    println!("fingerprint: {}", mesh.fingerprint().to_hex());

    if let Some(path) = obj {
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        oracle
            .write_obj(&mesh, file)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
