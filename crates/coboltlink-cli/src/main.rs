//! Command line control for Cobolt lasers.
//!
//! Subcommands:
//! - `ports`: list serial ports
//! - `scan`: list every port with a laser on it
//! - `info`: identify a laser
//! - `status`: read on state, fault, mode and readings
//! - `on` / `off`: turn the laser on or off
//! - `power` / `current`: enter constant power or current mode
//! - `modulation`: enter a modulation mode
//! - `send`: send a raw command

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coboltlink_core::prelude::*;
use tracing_subscriber::EnvFilter;

/// Port name of the simulated laser
const SIM_PORT: &str = "SIM0";

/// Cobolt laser control tool
#[derive(Parser, Debug)]
#[command(name = "coboltlink")]
#[command(about = "Control Cobolt lasers over a serial link")]
#[command(version)]
struct Args {
    /// Serial port the laser is on
    #[arg(long, global = true, conflicts_with = "serial")]
    port: Option<String>,

    /// Find the laser by serial number
    #[arg(long, global = true)]
    serial: Option<String>,

    /// Config file (defaults to the per-user config file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Baud rate override
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Reply timeout override in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Talk to a simulated laser instead of real ports
    #[arg(long, global = true)]
    simulate: bool,

    /// Print JSON instead of text where supported
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports
    Ports,

    /// Find every laser on the host
    Scan,

    /// Identify the laser
    Info,

    /// Read the laser status
    Status,

    /// Turn the laser on
    On,

    /// Turn the laser off
    Off,

    /// Enter constant power mode and read the output power
    Power {
        /// Power setpoint in mW
        mw: Option<f64>,
    },

    /// Enter constant current mode and read the current
    Current {
        /// Current setpoint in mA
        ma: Option<f64>,
    },

    /// Enter a modulation mode
    Modulation {
        /// digital, analog, on-off or command
        mode: ModulationSubMode,

        /// Modulation power (mW) or, on 06-DPL lasers, high current (mA)
        #[arg(short, long)]
        level: Option<f64>,
    },

    /// Send a raw command and print the reply
    Send {
        /// Command text, without terminator
        command: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    let provider: Box<dyn PortProvider> = if args.simulate {
        Box::new(simulated_bus())
    } else {
        Box::new(SystemPorts)
    };

    match &args.command {
        Command::Ports => {
            for port in provider.list_ports() {
                println!("{}\t{}", port.name, port.hardware_id);
            }
            Ok(())
        }
        Command::Scan => {
            let lasers = list_lasers(provider.as_ref(), &config);
            if lasers.is_empty() {
                println!("No lasers found");
            }
            for laser in &lasers {
                println!("{}: {laser}", laser.port_name().unwrap_or("?"));
            }
            Ok(())
        }
        command => {
            let mut laser = open_laser(provider.as_ref(), &args, config)?;
            run(&mut laser, command, args.json)
        }
    }
}

fn run(laser: &mut Laser, command: &Command, json: bool) -> Result<()> {
    match command {
        Command::Info => {
            if json {
                let identity = laser.identity().context("laser is not identified")?;
                println!("{}", serde_json::to_string_pretty(identity)?);
            } else {
                println!("{laser}");
            }
        }
        Command::Status => print_status(laser, json)?,
        Command::On => laser.turn_on().context("turning on")?,
        Command::Off => laser.turn_off().context("turning off")?,
        Command::Power { mw } => {
            laser.constant_power(*mw).context("entering constant power")?;
            println!("P = {} mW", laser.power()?);
        }
        Command::Current { ma } => {
            laser
                .constant_current(*ma)
                .context("entering constant current")?;
            println!("I = {} mA", laser.current()?);
        }
        Command::Modulation { mode, level } => {
            laser
                .enter_modulation(*mode, *level)
                .with_context(|| format!("entering {mode} modulation"))?;
            println!("{}", laser.modulation_state()?);
        }
        Command::Send { command } => {
            let reply = laser
                .send(command)
                .with_context(|| format!("sending {command:?}"))?;
            println!("{reply}");
        }
        Command::Ports | Command::Scan => {}
    }
    Ok(())
}

fn print_status(laser: &mut Laser, json: bool) -> Result<()> {
    let on = laser.is_on()?;
    let interlock_open = laser.interlock_open()?;
    let fault = laser.fault()?;
    let mode = laser.operating_mode()?;
    let state = laser.autostart_state()?;
    let power = laser.power()?;
    let power_setpoint = laser.power_setpoint()?;
    let current = laser.current()?;
    let hours = laser.operating_hours()?;

    if json {
        let status = serde_json::json!({
            "on": on,
            "interlock_open": interlock_open,
            "fault": fault.to_string(),
            "operating_mode": mode.to_string(),
            "autostart_state": state.to_string(),
            "power_mw": power,
            "power_setpoint_mw": power_setpoint,
            "current_ma": current,
            "operating_hours": hours,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{laser}");
    println!("  On:              {}", if on { "yes" } else { "no" });
    println!(
        "  Interlock:       {}",
        if interlock_open { "open" } else { "closed" }
    );
    println!("  Fault:           {fault}");
    println!("  Operating mode:  {mode}");
    println!("  Autostart state: {state}");
    println!("  Power:           {power} mW (setpoint {power_setpoint} mW)");
    println!("  Current:         {current} mA");
    println!("  Operating hours: {hours}");
    Ok(())
}

fn open_laser(provider: &dyn PortProvider, args: &Args, config: LaserConfig) -> Result<Laser> {
    let target = match (&args.port, &args.serial) {
        (Some(port), _) => ConnectTarget::ByPort(port.clone()),
        (None, Some(serial)) => ConnectTarget::BySerial(serial.clone()),
        (None, None) if args.simulate => ConnectTarget::ByPort(SIM_PORT.to_string()),
        (None, None) => bail!("either --port or --serial is required"),
    };

    Laser::connect_with(provider, &target, config, &mut |skip| {
        tracing::info!("Skipped {skip}");
    })
    .with_context(|| format!("connecting to laser at {target}"))
}

fn load_config(args: &Args) -> Result<LaserConfig> {
    let mut config = match &args.config {
        Some(path) => LaserConfig::load(path)?,
        None => match LaserConfig::default_path() {
            Ok(path) => LaserConfig::load_or_default(&path)?,
            Err(_) => LaserConfig::default(),
        },
    };
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    Ok(config)
}

fn simulated_bus() -> SimulatedBus {
    SimulatedBus::new().with_laser(
        SIM_PORT,
        SimulatedLaser::new("12345", "0405-06-01-0100-100"),
    )
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
