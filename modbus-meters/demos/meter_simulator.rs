/// Carlo Gavazzi EM24 TCP Modbus simulator
use modbus_meters::measurement::Measurement;
use modbus_meters::models::em24::Em24Producer;
use modbus_meters::simulator::{bind_tcp, run_tcp_simulator, Device, SimulatedMeter, Simulator};
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use rand_distr::{Distribution, Normal};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio_modbus::{Exception, Request, Response};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct NoisyMeter {
    meter: SimulatedMeter,
    rng: ChaCha8Rng,
    voltage: Normal<f64>,
    power: Normal<f64>,
}

impl Device for NoisyMeter {
    fn service_call(
        &mut self,
        req: Request,
    ) -> futures::future::Ready<Result<Response, Exception>> {
        self.meter.service_call(req)
    }

    fn update_state(&mut self) {
        let mut power = 0.0;
        for (voltage, phase_power) in [
            (Measurement::VoltageL1, Measurement::PowerL1),
            (Measurement::VoltageL2, Measurement::PowerL2),
            (Measurement::VoltageL3, Measurement::PowerL3),
        ] {
            let p = self.power.sample(&mut self.rng);
            power += p;
            let _ = self.meter.set(voltage, self.voltage.sample(&mut self.rng));
            let _ = self.meter.set(phase_power, p);
        }
        let _ = self.meter.set(Measurement::Power, power);

        // 200 ms worth of energy, in kWh
        let import = self.meter.get(Measurement::Import).unwrap_or_default();
        let _ = self
            .meter
            .set(Measurement::Import, import + power.max(0.0) * 0.2 / 3.6e6);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut meter = SimulatedMeter::new(&Em24Producer::new())?;
    meter.set(Measurement::Frequency, 50.0)?;
    meter.set(Measurement::Cosphi, 0.98)?;

    let device = NoisyMeter {
        meter,
        rng: ChaCha8Rng::seed_from_u64(7),
        voltage: Normal::new(230.0, 1.5)?,
        power: Normal::new(800.0, 150.0)?,
    };
    let simulator = Simulator::new(device);
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 5020);
    let (listener, local_addr) = bind_tcp(socket_addr).await?;
    let state_update_period = std::time::Duration::from_millis(200);

    info!("Simulating EM24 on {}", local_addr);
    run_tcp_simulator(listener, simulator, state_update_period).await;
    Ok(())
}
