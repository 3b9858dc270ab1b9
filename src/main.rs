use parkflow::actuator::gpio::{LedPin, PwmServo};
use parkflow::config::{self, Config, GatePins};
use parkflow::control::ControlLoop;
use parkflow::error::AppError;
use parkflow::gate::entry::{EntryGate, FixedClassifier};
use parkflow::gate::exit::ExitGate;
use parkflow::gate::{GateHardware, GateRole};
use parkflow::remote::http::HttpCoordinator;
use parkflow::sensor::hcsr04::HcSr04;
use parkflow::sensor::mcp3208::Mcp3208;
use parkflow::slot::SlotMonitor;
use std::sync::atomic::AtomicBool;

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match config::load_default() {
        Ok(config) => config,
        Err(err) => {
            init_tracing(tracing::Level::INFO);
            tracing::error!(
                config_path = config::DEFAULT_CONFIG_PATH,
                error = %err,
                "Failed to load configuration"
            );
            return Err(err.into());
        }
    };
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "parkflow starting"
    );

    let slots = build_slots(&config)?;
    let adc = Mcp3208::new()?;
    let entry = EntryGate::new(
        build_gate_hardware(GateRole::Entry, &adc, config.entry_gate())?,
        Box::new(FixedClassifier(config.vehicle_class())),
        config.gate_timing(),
    );
    let exit = ExitGate::new(
        build_gate_hardware(GateRole::Exit, &adc, config.exit_gate())?,
        config.gate_timing(),
        config.approval_timeout(),
    );
    if config.approval_timeout().is_none() {
        tracing::warn!("No approval_timeout_ms configured, exit approval waits indefinitely");
    }

    let remote = HttpCoordinator::new(config.remote_base_url(), config.remote_timeout())?;
    tracing::info!(remote = ?remote, "Coordination service configured");

    let mut control = ControlLoop::new(slots, entry, exit, remote);
    let stop = AtomicBool::new(false);
    control.run(&stop, config.tick_interval(), config.reconnect_interval());

    Ok(())
}

fn build_slots(config: &Config) -> Result<Vec<SlotMonitor>, AppError> {
    let timing = config.slot_timing();
    let mut slots = Vec::new();
    for slot in config.slot_configs() {
        let sensor = HcSr04::new(slot.pins.trig, slot.pins.echo, config.sensor_timeout())?;
        let led = LedPin::new(slot.pins.led)?;
        tracing::info!(
            slot = slot.slot_id,
            trig = slot.pins.trig,
            echo = slot.pins.echo,
            led = slot.pins.led,
            "Slot sensor ready"
        );
        slots.push(SlotMonitor::new(
            slot.slot_id,
            Box::new(sensor),
            Box::new(led),
            timing,
        ));
    }
    Ok(slots)
}

fn build_gate_hardware(
    role: GateRole,
    adc: &Mcp3208,
    pins: GatePins,
) -> Result<GateHardware, AppError> {
    let ir = adc.channel(pins.ir_channel)?;
    let servo = PwmServo::new(pins.servo_pin)?;
    let led = LedPin::new(pins.led_pin)?;
    tracing::info!(
        gate = %role,
        ir_channel = pins.ir_channel,
        servo_pin = pins.servo_pin,
        led_pin = pins.led_pin,
        "Gate hardware ready"
    );
    Ok(GateHardware::new(
        role,
        Box::new(ir),
        Box::new(servo),
        Box::new(led),
    ))
}
