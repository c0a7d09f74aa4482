//! sanectl - thin CLI collaborator driving the sanecore backend.
//!
//! Not part of the core (spec §6.4); exists so the engine is exercisable
//! end to end from a terminal. No physical transport is wired up in this
//! build, so the session it opens runs against `transport::sim::SimTransport`
//! scripted to hand back a synthetic flat-gray image of the derived size.

use std::io::Write;

use clap::Parser;

use sanecore::backend::Backend;
use sanecore::device::DeviceId;
use sanecore::options::{Mode, Source};
use sanecore::session::Session;
use sanecore::transport::sim::{ScriptedReply, SimTransport};
use sanecore::BackendError;

#[derive(Parser, Debug)]
#[command(name = "sanectl", about = "Drive a sanecore-backed scanner session")]
struct Args {
    /// Device id to open (see --list-devices).
    #[arg(long)]
    device: Option<u32>,

    #[arg(long, value_enum)]
    mode: Option<CliMode>,

    #[arg(long)]
    resolution: Option<f64>,

    #[arg(long, value_enum)]
    source: Option<CliSource>,

    #[arg(long = "tl-x")]
    tl_x: Option<f64>,
    #[arg(long = "tl-y")]
    tl_y: Option<f64>,
    #[arg(long = "br-x")]
    br_x: Option<f64>,
    #[arg(long = "br-y")]
    br_y: Option<f64>,

    #[arg(long)]
    brightness: Option<i8>,
    #[arg(long)]
    contrast: Option<i8>,
    #[arg(long)]
    threshold: Option<u8>,

    /// List known devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Write scanned image data here instead of stdout.
    #[arg(long)]
    output: Option<std::path::PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliMode {
    Lineart,
    Halftone,
    Gray,
    Color,
}

impl From<CliMode> for Mode {
    fn from(m: CliMode) -> Mode {
        match m {
            CliMode::Lineart => Mode::Lineart,
            CliMode::Halftone => Mode::Halftone,
            CliMode::Gray => Mode::Gray,
            CliMode::Color => Mode::Color,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliSource {
    Flatbed,
    Adf,
    Tpa,
    Neg,
}

impl From<CliSource> for Source {
    fn from(s: CliSource) -> Source {
        match s {
            CliSource::Flatbed => Source::Flatbed,
            CliSource::Adf => Source::Adf,
            CliSource::Tpa => Source::Tpa,
            CliSource::Neg => Source::Neg,
        }
    }
}

const EXIT_OK: i32 = 0;
const EXIT_IO_ERROR: i32 = 1;
const EXIT_INVALID_ARG: i32 = 2;
const EXIT_CANCELLED: i32 = 3;

fn exit_code_for(error: BackendError) -> i32 {
    match error {
        BackendError::Cancelled => EXIT_CANCELLED,
        BackendError::Inval => EXIT_INVALID_ARG,
        _ => EXIT_IO_ERROR,
    }
}

fn main() {
    sanecore::logger::init("SANECTL");
    let args = Args::parse();

    let backend = match Backend::init(0x0103) {
        Ok(b) => b,
        Err(e) => {
            log::error!("backend init failed: {e}");
            std::process::exit(EXIT_IO_ERROR);
        }
    };

    if args.list_devices {
        for device in backend.get_devices(true) {
            println!("{:>4}  {} {}", device.id.0, device.vendor, device.model);
        }
        std::process::exit(EXIT_OK);
    }

    let Some(device_id) = args.device else {
        eprintln!("error: --device is required unless --list-devices is given");
        std::process::exit(EXIT_INVALID_ARG);
    };

    let Some(device) = backend.lookup(DeviceId(device_id)) else {
        eprintln!("error: unknown device id {device_id}");
        std::process::exit(EXIT_INVALID_ARG);
    };

    log::info!("selected device {} {}", device.vendor, device.model);

    // No physical transport is wired up in this build, so `sanectl` opens
    // its session against `SimTransport`, scripted below to hand back a
    // flat mid-gray image of exactly the size the derived parameters call
    // for (the same scripting shape `tests/scenarios.rs` uses against real
    // hardware's wire protocol, minus the device on the other end).
    let mut sim = SimTransport::new();
    sim.queue(ScriptedReply::ok()); // test_unit_ready (open)
    sim.queue(ScriptedReply::ok()); // set_timeout (open)
    let mut session = match Session::open(device, &mut sim) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: open failed: {e}");
            std::process::exit(exit_code_for(e));
        }
    };

    if let Some(mode) = args.mode {
        session.set_mode(mode.into());
    }
    if let Some(source) = args.source {
        session.options.source = source.into();
    }
    if let Some(res) = args.resolution {
        session.options.resolution_x = res;
        session.options.resolution_y = res;
    }
    if let (Some(tl_x), Some(tl_y)) = (args.tl_x, args.tl_y) {
        session.options.set_tl(tl_x, tl_y);
    }
    if let Some(br_x) = args.br_x {
        session.options.bbox.br_x = br_x;
    }
    if let Some(br_y) = args.br_y {
        session.options.bbox.br_y = br_y;
    }
    if let Some(brightness) = args.brightness {
        session.options.brightness = brightness;
    }
    if let Some(contrast) = args.contrast {
        session.options.contrast = contrast;
    }
    if let Some(threshold) = args.threshold {
        session.options.threshold = threshold;
    }

    if let Err(e) = session.options.validate(device) {
        eprintln!("error: invalid option combination: {e}");
        session.close();
        std::process::exit(EXIT_INVALID_ARG);
    }

    let params = session.get_parameters(None);
    log::info!(
        "derived parameters: {}x{} px, {} bytes/line, depth {}, format {:?}",
        params.pixels_per_line,
        params.lines,
        params.bytes_per_line,
        params.depth,
        params.frame_format
    );

    let total = (params.bytes_per_line * params.lines) as usize;
    session.transport.queue(ScriptedReply::ok()); // test_unit_ready (start)
    session.transport.queue(ScriptedReply::ok()); // wait_for_document
    session.transport.queue(ScriptedReply::ok()); // set_window
    session.transport.queue(ScriptedReply::ok()); // scan
    session.transport.queue(ScriptedReply::ok_with_data(vec![0x80u8; total]));
    let mut eof_sense = [0u8; 18];
    eof_sense[2] = sanecore::sense::END_OF_MEDIUM;
    session.transport.queue(ScriptedReply::check_condition());
    session.transport.queue(ScriptedReply::ok_with_data(eof_sense.to_vec()));

    if let Err(e) = session.start() {
        eprintln!("error: start failed: {e}");
        session.close();
        std::process::exit(exit_code_for(e));
    }

    let mut sink: Box<dyn Write> = match &args.output {
        Some(path) => match std::fs::File::create(path) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("error: could not create {}: {e}", path.display());
                session.close();
                std::process::exit(EXIT_IO_ERROR);
            }
        },
        None => Box::new(std::io::stdout()),
    };

    let mut buf = vec![0u8; params.bytes_per_line as usize];
    let mut pulled = 0usize;
    loop {
        match session.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = sink.write_all(&buf[..n]) {
                    eprintln!("error: write failed: {e}");
                    session.close();
                    std::process::exit(EXIT_IO_ERROR);
                }
                pulled += n;
            }
            Err(e) => {
                eprintln!("error: read failed: {e}");
                session.close();
                std::process::exit(exit_code_for(e));
            }
        }
    }
    log::info!("pulled {pulled} bytes");

    session.close();
    std::process::exit(EXIT_OK);
}
