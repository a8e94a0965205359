use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use log::info;

use pulse_host::{Host, HostConfig, HostEvent};

#[derive(Parser)]
#[command(name = "pulse-host")]
#[command(about = "Headless authoritative game host")]
struct Args {
    #[arg(short, long, default_value_t = pulse::net::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = pulse::net::MAX_PLAYERS)]
    max_players: usize,

    #[arg(short, long, default_value_t = pulse::net::TICK_RATE)]
    tick_rate: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = HostConfig {
        tick_rate: args.tick_rate,
        max_players: args.max_players,
        ..Default::default()
    };

    let mut host = Host::new(config);
    host.start(args.port)?;

    let mut last = Instant::now();
    loop {
        let now = Instant::now();
        let dt = (now - last).as_secs_f32();
        last = now;

        host.update(dt);
        let events: Vec<HostEvent> = host.drain_events().collect();
        for event in events {
            match event {
                HostEvent::PlayerConnected { player_id } => {
                    info!("+ player {} ({} online)", player_id, host.player_count());
                }
                HostEvent::PlayerDisconnected { player_id, reason } => {
                    info!(
                        "- player {} {} ({} online)",
                        player_id,
                        reason.as_str(),
                        host.player_count()
                    );
                }
            }
        }

        thread::sleep(Duration::from_millis(1));
    }
}
