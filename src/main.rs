//            ,--.        ,--.,--.        ,--.
//  ,--,--.,--.--.,--.--.  |  |`--',--,--, |  |,-.
// ' ,-.  ||  .--'|  .--'  |  |,--.|      \|     /
// \ '-'  ||  |   |  |     |  ||  ||  ||  ||  \  \
//  `--`--'`--'   `--'     `--'`--'`--''--'`--'`--'

// Drives a contention-window control loop over a simulated 802.11 cell.
// The interesting part is not the radio (there is none); it is handing the
// CW knob to an external learner every step and seeing what it does to
// aggregate throughput.

// Copyright 2026 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use airlink::prelude::*;
use airlink::metrics::append_flow_csv;
use airlink::simulation::config::HEADER_OVERHEAD_BYTES;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};

use tracing_subscriber;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Hand the CW knob to an external agent over TCP.
    Run {
        #[arg(short = 'n', long, default_value_t = 5)]
        stations: u32,
        #[arg(short, long, default_value_t = 10)]
        duration: u64,
        #[arg(long, default_value_t = 1.0)]
        step_interval: f64,
        #[arg(long, default_value_t = 0)]
        cw: u32,
        #[arg(short, long, default_value = "127.0.0.1:5555")]
        listen: String,
        #[arg(short, long, default_value = "constant")]
        traffic: String,
        #[arg(long, default_value_t = 150.0)]
        offered_load: f64,
        #[arg(long, default_value_t = 10)]
        burst_size: u32,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(short, long, default_value = "results/cw.csv")]
        output: PathBuf,
    },

    /// Same scenario with a fixed window and no agent attached.
    Baseline {
        #[arg(short = 'n', long, default_value_t = 5)]
        stations: u32,
        #[arg(short, long, default_value_t = 10)]
        duration: u64,
        #[arg(long)]
        cw: u32,
        #[arg(short, long, default_value = "constant")]
        traffic: String,
        #[arg(long, default_value_t = 150.0)]
        offered_load: f64,
        #[arg(long, default_value_t = 10)]
        burst_size: u32,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(short, long, default_value = "results/cw.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            stations,
            duration,
            step_interval,
            cw,
            listen,
            traffic,
            offered_load,
            burst_size,
            seed,
            output,
        } => {
            let config = build_config(
                "rl-run",
                stations,
                duration,
                step_interval,
                cw,
                &traffic,
                offered_load,
                burst_size,
                seed,
            )?;
            run_with_agent(config, &listen, &output).await?;
        }

        Commands::Baseline {
            stations,
            duration,
            cw,
            traffic,
            offered_load,
            burst_size,
            seed,
            output,
        } => {
            let config = build_config(
                "baseline",
                stations,
                duration,
                1.0,
                cw,
                &traffic,
                offered_load,
                burst_size,
                seed,
            )?;
            run_baseline(config, &output).await?;
        }
    }

    Ok(())
}

async fn run_with_agent(config: SimConfig, listen: &str, output: &Path) -> Result<()> {
    info!("AirLink: agent-driven run");

    let listener = AgentListener::bind(listen).await?;
    let channel = listener.accept().await?;

    let mut sim = Simulation::new(config.clone())?.with_agent(channel);

    let cancel = sim.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c, stopping after the current step");
            cancel.cancel();
        }
    });

    let report = sim.run().await?;
    finish(&config, &report, output)
}

async fn run_baseline(config: SimConfig, output: &Path) -> Result<()> {
    info!("AirLink: baseline run (no agent)");
    let mut sim = Simulation::new(config.clone())?;
    let report = sim.run().await?;
    finish(&config, &report, output)
}

fn finish(config: &SimConfig, report: &SimReport, output: &Path) -> Result<()> {
    flow_table(report);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    append_flow_csv(
        output,
        &report.flows,
        report.final_cw,
        config.num_stations,
        config.seed,
    )?;
    info!("flow rows appended to {}", output.display());
    Ok(())
}

fn flow_table(report: &SimReport) {
    println!("\nFlow        Rx packets    Rx bytes       Throughput");
    for flow in &report.flows {
        println!(
            "  sta {:<4} {:>10} {:>12} {:>12.3} Mbit/s",
            flow.src, flow.rx_packets, flow.rx_bytes, flow.throughput_mbps
        );
    }
    let total: f64 = report.flows.iter().map(|f| f.throughput_mbps).sum();
    println!(
        "\nTotal: {:.3} Mbit/s over {:.1}s | delivered {} | dropped {} | collisions {} | final CW {}\n",
        total,
        report.sim_duration.as_secs_f64(),
        report.delivered_packets,
        report.dropped_packets,
        report.collisions,
        report.final_cw,
    );
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    name: &str,
    stations: u32,
    duration: u64,
    step_interval: f64,
    cw: u32,
    traffic: &str,
    offered_load: f64,
    burst_size: u32,
    seed: u64,
) -> Result<SimConfig> {
    let mut config = SimConfig {
        name: name.to_string(),
        num_stations: stations,
        sim_duration: Duration::from_secs(duration),
        step_interval: Duration::from_secs_f64(step_interval),
        initial_cw: cw,
        seed,
        ..SimConfig::default()
    };
    config.traffic_pattern = parse_traffic_pattern(
        traffic,
        offered_load,
        config.packet_size - HEADER_OVERHEAD_BYTES,
        burst_size,
    )?;
    config.validate()?;
    Ok(config)
}

fn parse_traffic_pattern(
    name: &str,
    offered_load_mbps: f64,
    payload_bytes: u32,
    burst_size: u32,
) -> Result<TrafficPattern> {
    let rate_pps = offered_load_mbps * 1_000_000.0 / (payload_bytes as f64 * 8.0);
    match name.to_lowercase().as_str() {
        "constant" => Ok(TrafficPattern::Constant { rate_pps }),
        "poisson" => Ok(TrafficPattern::Poisson { lambda: rate_pps }),
        "bursty" => Ok(TrafficPattern::Bursty {
            avg_rate_pps: rate_pps,
            burst_size,
        }),
        _ => anyhow::bail!("Unknown traffic pattern: {}", name),
    }
}
