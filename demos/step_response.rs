//! Canonical step-response run of the 200 kHz buck loop, logged to MCAP.
//!
//! Feeds the reference coefficient set a feedback step from zero to the
//! setpoint while the soft-start ramp is active, and records the demand
//! sequence for inspection in Foxglove or similar tooling.

use std::{collections::BTreeMap, fs::File, io::BufWriter, sync::Arc};

use pcmc::{iq::Iq15, Compensator2p2z, CompensatorConfig, RampDirection};
use serde::Serialize;

#[derive(Serialize)]
struct Values {
    time_ns: u64,
    feedback_counts: i32,
    demand_counts: i32,
    ramp_limit_counts: i32,
    error_counts: i32,
}

const PERIOD_NS: u64 = 5000;
const REF_COUNTS: i32 = 2048;

fn main() -> Result<(), anyhow::Error> {
    let mut writer = mcap::Writer::new(BufWriter::new(File::create("out.mcap")?))?;
    let my_channel = mcap::Channel {
        topic: String::from("pcmc"),
        schema: Some(Arc::new(mcap::Schema {
            name: "".to_owned(),
            encoding: "".to_owned(),
            data: std::borrow::Cow::default(),
        })),
        message_encoding: "cbor".to_owned(),
        metadata: BTreeMap::default(),
    };
    let channel_id = writer.add_channel(&my_channel)?;

    let config = CompensatorConfig::new(
        Iq15::from_bits(REF_COUNTS),
        [1.69020338, -0.69020338],
        3.22868006,
        [0.29060216, -2.93807791],
        0.5,
        Iq15::ZERO,
        Iq15::from_bits(1023),
    )?;
    let mut compensator = Compensator2p2z::new(config);
    compensator.configure_soft_start(5, PERIOD_NS as u32, RampDirection::PowerUp)?;

    let mut time_ns = 0u64;
    for period in 0..4000u64 {
        // Step the feedback to the setpoint partway through the soft-start
        // ramp, approximating the output rail coming up.
        let feedback_counts = if period < 400 { 0 } else { REF_COUNTS };

        let feedback = Iq15::from_bits(feedback_counts);
        let demand = compensator.update(feedback);

        let mut buffer = Vec::with_capacity(128);
        ciborium::into_writer(
            &Values {
                time_ns,
                feedback_counts,
                demand_counts: demand.to_bits(),
                ramp_limit_counts: compensator.soft_start().limit().to_bits(),
                error_counts: REF_COUNTS - feedback_counts,
            },
            &mut buffer,
        )
        .unwrap();
        writer
            .write_to_known_channel(
                &mcap::records::MessageHeader {
                    channel_id,
                    sequence: 0,
                    log_time: time_ns,
                    publish_time: time_ns,
                },
                &buffer,
            )
            .unwrap();

        compensator.soft_start_update();
        time_ns += PERIOD_NS;
    }

    writer.finish().unwrap();

    Ok(())
}
