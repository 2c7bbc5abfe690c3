use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;
use thiserror::Error;

use millstream_core::export::{handle_all_positions, CodeGenerator, ExportError, TextGenerator};
use millstream_core::vm::transform::TransformError;
use millstream_core::{parse, Machine, ParseError, VmError};
use millstream_host::cli::Args;
use millstream_host::stream::{grbl, GrblStreamer, StreamError, Streamer};
use millstream_host::{config, prompt::ManualPrompts};

#[derive(Debug, Error)]
enum HostError {
    #[error("{0}")]
    Config(#[from] config::ConfigError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Vm(#[from] VmError),
    #[error("{0}")]
    Transform(#[from] TransformError),
    #[error("{0}")]
    Export(#[from] ExportError),
    #[error("{0}")]
    Stream(#[from] StreamError),
}

impl HostError {
    fn exit_code(&self) -> u8 {
        match self {
            HostError::Parse(_) => 2,
            HostError::Vm(_) | HostError::Transform(_) | HostError::Export(_) => 3,
            HostError::Io(_) | HostError::Config(_) => 4,
            HostError::Stream(StreamError::Interrupted) => 130,
            HostError::Stream(_) => 5,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(args: Args) -> Result<(), HostError> {
    let file_config = config::load(args.config.as_deref())?;
    let settings = config::resolve(&file_config, &args);

    let source = std::fs::read_to_string(&args.input)?;
    let doc = parse(&source)?;

    let mut machine = Machine::new();
    machine.max_arc_deviation = settings.max_arc_deviation;
    machine.min_arc_line_length = settings.min_arc_line_length;
    machine.tolerance = settings.tolerance;
    machine.lenient = args.lenient;
    machine.process(&doc)?;
    tracing::info!(
        blocks = doc.len(),
        positions = machine.positions.len(),
        "interpreted {}",
        args.input.display()
    );

    if args.flip_xy {
        machine.flip_xy();
    }
    if let Some(limit) = args.feed_limit {
        machine.limit_feedrate(limit);
    }
    if let Some(multiplier) = args.feed_multiplier {
        machine.multiply_feedrate(multiplier);
    }
    if let Some(rpm) = args.spindle_cw {
        machine.enforce_spindle(true, true, rpm);
    } else if let Some(rpm) = args.spindle_ccw {
        machine.enforce_spindle(true, false, rpm);
    }

    if args.opt_floating_z {
        machine.opt_floating_z();
    }
    if !args.no_opt_drill {
        machine.opt_drill_speed();
    }
    if !args.no_opt_route {
        if let Err(err) = machine.opt_route_grouping() {
            tracing::warn!("route grouping skipped: {err}");
        }
    }
    if !args.no_opt_lifts {
        machine.opt_lift_speed();
    }
    if !args.no_opt_vector {
        machine.opt_bogus_moves();
    }

    if let Some(height) = args.safety_height {
        machine.set_safety_height(height)?;
    }
    if args.enforce_return {
        machine.return_home();
    }

    if args.stats {
        let info = machine.info();
        println!(
            "dimensions: {:.3} x {:.3} x {:.3} mm",
            info.max.x - info.min.x,
            info.max.y - info.min.y,
            info.max.z - info.min.z
        );
        println!(
            "bounds: X {:.3}..{:.3}  Y {:.3}..{:.3}  Z {:.3}..{:.3}",
            info.min.x, info.max.x, info.min.y, info.max.y, info.min.z, info.max.z
        );
        let feeds: Vec<String> = info.feedrates.iter().map(|f| format!("{f}")).collect();
        println!("feedrates: {}", feeds.join(", "));
        println!("estimated runtime: {:?}", info.eta);
    }
    if args.debug_dump {
        print!("{}", machine.dump());
    }

    if let Some(device) = &args.device {
        stream_to_device(&machine, device, settings.precision, settings.baud, &args).await?;
    }

    if args.device.is_none() || args.output.is_some() || args.stdout {
        let mut gen = TextGenerator::new(settings.precision);
        handle_all_positions(&mut gen, &machine)?;
        let output = gen.retrieve();
        if let Some(path) = &args.output {
            std::fs::write(path, &output)?;
            tracing::info!("wrote {}", path.display());
        }
        if args.stdout || (args.output.is_none() && args.device.is_none()) {
            print!("{output}");
        }
    }

    Ok(())
}

async fn stream_to_device(
    machine: &Machine,
    device: &str,
    precision: usize,
    baud: u32,
    args: &Args,
) -> Result<(), HostError> {
    // Fail on dialect violations before the controller sees anything.
    grbl::check(machine, precision)?;

    let mut streamer = GrblStreamer::connect(device, baud, precision).await?;
    tracing::info!(device, baud, "connected");

    let interrupt = streamer.interrupt_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.store(true, Ordering::SeqCst);
        }
    });

    let mut prompts = ManualPrompts::new(
        args.manual_toolchange,
        args.manual_spindle,
        args.manual_coolant,
    );
    let mut companions: [&mut dyn CodeGenerator; 1] = [&mut prompts];

    let total = machine.positions.len();
    let result = streamer
        .send_with(machine, &mut companions, |idx| {
            if idx % 64 == 0 || idx + 1 == total {
                tracing::info!(position = idx + 1, total, "streaming");
            }
        })
        .await;

    match result {
        // Acknowledged lines may still be executing from the planner
        // buffer; just let the port close.
        Ok(()) => Ok(()),
        Err(err) => {
            // Best-effort reset so the machine does not keep cutting.
            let _ = streamer.stop().await;
            Err(err.into())
        }
    }
}
