use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Parser;
use log::info;

use pulse::net::PlayerInput;
use pulse_client::{Client, ClientConfig, ClientEvent};

#[derive(Parser)]
#[command(name = "pulse-client")]
#[command(about = "Headless client that connects and flies forward")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = pulse::net::DEFAULT_PORT)]
    port: u16,

    /// How long to stay connected before disconnecting.
    #[arg(short, long, default_value_t = 10.0)]
    seconds: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut client = Client::new(ClientConfig::default());
    client.connect((args.host.as_str(), args.port))?;

    let started = Instant::now();
    let mut last = started;
    let mut last_report = started;

    while started.elapsed().as_secs_f32() < args.seconds {
        let now = Instant::now();
        let dt = (now - last).as_secs_f32();
        last = now;

        client.update(dt);

        let events: Vec<ClientEvent> = client.drain_events().collect();
        for event in events {
            match event {
                ClientEvent::Connected { player_id } => info!("joined as player {}", player_id),
                ClientEvent::Disconnected => info!("session ended"),
                ClientEvent::EntityCreated {
                    entity_id,
                    entity_type,
                    position,
                } => info!(
                    "entity {} (type {}) at {:?}",
                    entity_id, entity_type, position
                ),
                ClientEvent::EntityDestroyed { entity_id } => {
                    info!("entity {} removed", entity_id)
                }
            }
        }

        if client.is_connected() {
            let mut input = PlayerInput {
                yaw: client.local_state().yaw,
                pitch: client.local_state().pitch,
                delta_time: dt,
                ..Default::default()
            };
            input.set_key(PlayerInput::KEY_FORWARD, true);
            client.send_input(input);

            if last_report.elapsed() >= Duration::from_secs(1) {
                last_report = Instant::now();
                info!(
                    "tick {} rtt {:.0}ms pos {:?} ({} players)",
                    client.server_tick(),
                    client.rtt() * 1000.0,
                    client.local_state().position,
                    client.player_count()
                );
            }
        } else if !client.is_connecting() {
            bail!("connection lost");
        }

        thread::sleep(Duration::from_millis(16));
    }

    client.disconnect();
    Ok(())
}
