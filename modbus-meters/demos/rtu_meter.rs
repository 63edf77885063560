/// RTU Modbus client reading two SDM630 meters on one serial bus
use modbus_meters::connection::{Connection, RtuConnection};
use modbus_meters::models::sdm::SdmProducer;
use modbus_meters::query;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let producer = SdmProducer::new();
    let mut conn = RtuConnection::rtu("/dev/ttyUSB0", 9600);
    conn.timeout(Duration::from_millis(500));

    loop {
        for slave_id in [1, 2] {
            conn.slave(slave_id).await;
            match query::query(&mut conn, &producer).await {
                Ok(readings) => println!("slave {slave_id}: {:?}", readings),
                Err(e) => eprintln!("slave {slave_id}: {e}"),
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
