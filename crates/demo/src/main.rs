mod actors;
mod link;
mod world;

use anyhow::Result;
use clap::Parser;
use glam::Vec2;

use parallax::{SyncConfig, Tick};

use actors::{KIND_DRONE, KIND_PAWN, ScriptedController};
use link::{LinkConfig, LossyLink};
use world::{ClientWorld, ServerWorld};

#[derive(Parser)]
#[command(name = "parallax-demo")]
#[command(about = "Headless client/server replication demo over a lossy loopback link")]
struct Args {
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    #[arg(long, default_value_t = 3, help = "Tick stride between snapshots")]
    send_rate: u32,

    #[arg(long, default_value_t = 64)]
    buffer_length: usize,

    #[arg(long, default_value_t = 10, help = "Tick gap before remote entities freeze")]
    ticks_before_freeze: u32,

    #[arg(long, default_value_t = 10.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 2)]
    latency_ticks: u32,

    #[arg(long, default_value_t = 3)]
    jitter_ticks: u32,

    #[arg(long, default_value_t = 7)]
    seed: u64,

    #[arg(long, default_value_t = 300, help = "Tick at which the link stalls")]
    stall_at: u32,

    #[arg(long, default_value_t = 40, help = "Length of the stall in ticks")]
    stall_ticks: u32,

    #[arg(long, help = "Skip frames whose dirty mask is empty")]
    no_force_updates: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = SyncConfig {
        dejitter_buffer_length: args.buffer_length,
        network_send_rate: args.send_rate,
        ticks_before_freeze: args.ticks_before_freeze,
        force_updates: !args.no_force_updates,
    };

    let mut server = ServerWorld::new(config.clone());
    let pawn = server.spawn(KIND_PAWN, Vec2::ZERO);
    let drone = server.spawn(KIND_DRONE, Vec2::new(50.0, -20.0));
    let courier = server.spawn(KIND_DRONE, Vec2::new(-40.0, 10.0));

    let script = ScriptedController::default();
    server.set_controller(pawn, Some(Box::new(script.clone())));

    let mut client = ClientWorld::new(config.clone());
    let mut client_owns_pawn = false;

    let mut link = LossyLink::new(
        LinkConfig {
            loss_percent: args.loss_percent,
            latency_ticks: args.latency_ticks,
            jitter_ticks: args.jitter_ticks,
        },
        args.seed,
    );

    log::info!(
        "running {} ticks: send rate {}, loss {:.0}%, latency {}±{} ticks",
        args.ticks,
        args.send_rate,
        args.loss_percent,
        args.latency_ticks,
        args.jitter_ticks
    );

    let courier_removal = args.ticks / 3;
    let mut max_pawn_error = 0.0f32;
    let mut max_drone_error = 0.0f32;

    for raw in 1..=args.ticks {
        let tick = Tick::new(raw);

        // One input sample per tick, read by the server simulation now and by
        // client-side replay until the server confirms it.
        script.sample(tick);
        link.set_blocked(raw >= args.stall_at && raw < args.stall_at + args.stall_ticks);

        server.run_tick();
        if raw == courier_removal {
            server.mark_for_remove(courier);
        }
        if raw % args.send_rate == 0 {
            let packet = server.encode_packet(client.ack(), pawn);
            link.send(packet, raw);
        }
        server.sweep_removed();

        for packet in link.deliver(raw) {
            client.receive_packet(packet);
        }
        script.confirm(client.ack());

        if !client_owns_pawn && client.contains(pawn) {
            client.set_controller(pawn, Some(Box::new(script.clone())));
            client_owns_pawn = true;
        }

        client.run_tick();

        if let (Some(server_side), Some(client_side)) = (server.entity(pawn), client.entity(pawn)) {
            let error = server_side.state.pos.distance(client_side.state.pos);
            max_pawn_error = max_pawn_error.max(error);
        }
        if let (Some(server_side), Some(client_side)) = (server.entity(drone), client.entity(drone))
        {
            if !client_side.is_frozen() {
                let error = server_side.state.pos.distance(client_side.state.pos);
                max_drone_error = max_drone_error.max(error);
            }
        }

        if raw % 120 == 0 {
            if let Some(view) = client.smoothed(pawn, 0.5) {
                log::info!(
                    "tick {raw}: pawn at ({:.1}, {:.1}) heading {:.0}, {} pending commands",
                    view.pos.x,
                    view.pos.y,
                    view.heading,
                    script.pending_len()
                );
            }
        }
    }

    let stats = link.stats();
    println!("--- replication summary ---");
    println!(
        "packets: {} sent, {} dropped, {} delivered ({} bits on the wire)",
        stats.packets_sent, stats.packets_dropped, stats.packets_delivered, stats.bits_sent
    );
    println!(
        "frames: {} sent, {} suppressed, {} received, {} orphaned, {} packets discarded",
        server.frames_sent,
        server.frames_suppressed,
        client.frames_received,
        client.orphan_frames,
        client.decode_errors
    );
    println!(
        "worst divergence: pawn {:.2} (predicted), drone {:.2} (smoothed, unfrozen)",
        max_pawn_error, max_drone_error
    );
    println!(
        "courier removed at tick {}, client still tracks it: {}",
        courier_removal,
        client.contains(courier)
    );

    Ok(())
}
