use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;
use crate::measurement::Measurement;
use crate::operation::Operation;
use crate::producer::Producer;

/// Scaled value of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub measurement: Measurement,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Run `op` on the currently addressed slave.
pub async fn read(conn: &mut dyn Connection, op: &Operation) -> Result<Reading> {
    let words = conn
        .read_registers(op.function(), op.address(), op.count())
        .await?;
    let value = op.decode(&words)?;

    Ok(Reading {
        measurement: op.measurement(),
        value,
        timestamp: Utc::now(),
    })
}

/// Check the device answers the model's probe read.
pub async fn probe(conn: &mut dyn Connection, producer: &dyn Producer) -> Result<Reading> {
    let op = producer.probe()?;
    read(conn, &op).await
}

/// Read every measurement the model produces. The first failure is returned as is.
pub async fn query(conn: &mut dyn Connection, producer: &dyn Producer) -> Result<Vec<Reading>> {
    let ops = producer.produce()?;
    let mut readings = Vec::with_capacity(ops.len());

    for op in &ops {
        readings.push(read(conn, op).await?);
    }

    debug!(
        "Read {} measurements from {} ({})",
        readings.len(),
        conn,
        producer.description()
    );
    Ok(readings)
}
