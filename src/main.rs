use clap::Parser;

use gcsim::{Algorithm, HeapConfig, Simulator, WorkloadGenerator};

/// Runs a mixed workload through all four collection strategies and prints
/// the recorded metrics.
#[derive(Parser, Debug)]
#[command(name = "gcsim", version, about)]
struct Opts {
    /// Simulated heap size in bytes.
    #[arg(long, default_value_t = 1024)]
    heap_size: usize,
    /// Bytes represented by one heap unit.
    #[arg(long, default_value_t = 16)]
    unit_size: usize,
    /// Workload/collection rounds per strategy.
    #[arg(long, default_value_t = 3)]
    rounds: usize,
    /// Seed for the workload generator; random when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    env_logger::init();
    let opts = Opts::parse();

    let mut sim = Simulator::new(HeapConfig {
        total_size: opts.heap_size,
        unit_size: opts.unit_size,
        ..Default::default()
    });
    let mut workload = match opts.seed {
        Some(seed) => WorkloadGenerator::with_seed(seed),
        None => WorkloadGenerator::new(),
    };

    for algorithm in Algorithm::ALL {
        sim.reset_heap();
        for _ in 0..opts.rounds {
            workload.mixed_workload(sim.heap_mut());
            workload.create_circular_reference(sim.heap_mut(), 3);
            let result = sim.collect(algorithm);
            println!(
                "{:<22} scanned {:>3}, freed {:>3}, reclaimed {:>5} bytes in {:.3}ms",
                result.algorithm.to_string(),
                result.objects_scanned,
                result.objects_freed,
                result.bytes_reclaimed,
                result.pause_ms,
            );
        }
        let stats = sim.stats();
        println!(
            "{:<22} heap after: {} objects, {}/{} units used, fragmentation {:.2}%",
            "", stats.total_objects, stats.used_units, stats.capacity_units, stats.fragmentation,
        );
    }

    println!();
    print!("{}", sim.summary());

    println!();
    println!("Per-strategy comparison:");
    for (algorithm, stats) in sim.comparison() {
        println!(
            "  {:<22} {} cycles, {} freed, {} bytes, avg pause {:.3}ms, throughput {:.2}/cycle",
            algorithm.to_string(),
            stats.cycles,
            stats.total_objects_freed,
            stats.total_bytes_reclaimed,
            stats.avg_pause_ms,
            stats.throughput,
        );
    }

    println!();
    println!("{}", sim.export_csv());
}
