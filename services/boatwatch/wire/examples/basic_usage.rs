//! Basic usage example for the boatwatch wire formats.

use boatwatch_wire::{
    AlarmCommand, AlarmFrame, AlarmMode, CompactMessage, CompactPacket, Detection, DetectionKind,
    EnvironmentalReading, Envelope, Profile, TelemetryFlags, TelemetryFrame, TelemetryPayload,
    Zone, BROADCAST_ADDRESS, HUB_ADDRESS,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Boatwatch Wire Example ===\n");

    // 1. Environmental reading from node 0x01
    println!("1. Encoding an environmental packet...");
    let reading = EnvironmentalReading::from_measurements(14.2, 78.5, 1011.8, 3710, -81);
    let packet = CompactPacket::new(0x01, CompactMessage::Environmental(reading));
    let bytes = packet.encode()?;
    println!("   Encoded {} bytes: {:02X?}", bytes.len(), bytes.as_ref());

    // 2. Decode it back through the envelope
    println!("\n2. Decoding as a compact packet...");
    if let Envelope::Compact(decoded) = Envelope::decode(Profile::Compact, &bytes)? {
        if let CompactMessage::Environmental(env) = decoded.message {
            println!("   From node 0x{:02X}", decoded.source);
            println!("   Temperature: {:.2} °C", env.temperature_c());
            println!("   Humidity: {:.2} %", env.humidity_pct());
            println!("   Pressure: {:.1} hPa", env.pressure_hpa());
        }
    }

    // 3. Corruption is caught by the trailer
    println!("\n3. Flipping one bit...");
    let mut corrupted = bytes.to_vec();
    corrupted[3] ^= 0x10;
    match CompactPacket::decode(&corrupted) {
        Ok(_) => println!("   Unexpectedly accepted"),
        Err(e) => println!("   Rejected: {}", e),
    }

    // 4. Detection and the hub's broadcast answer
    println!("\n4. Detection followed by a broadcast trigger...");
    let detection = CompactPacket::new(
        0x02,
        CompactMessage::Detection(Detection {
            kind: DetectionKind::Entry,
            confidence: 91,
            distance_cm: 180,
            zone: Zone::Near,
        }),
    );
    println!("   Detection: {:02X?}", detection.encode()?.as_ref());
    let trigger = CompactPacket::new(
        HUB_ADDRESS,
        CompactMessage::Alarm(AlarmFrame::new(
            AlarmCommand::Trigger,
            AlarmMode::Full,
            BROADCAST_ADDRESS,
        )),
    );
    println!("   Trigger:   {:02X?}", trigger.encode()?.as_ref());

    // 5. Telemetry motion frame asking for an ack
    println!("\n5. Telemetry motion frame...");
    let motion = TelemetryFrame::new(0xB032, 17, TelemetryPayload::Motion { age_ms: 40 })
        .with_flags(TelemetryFlags::ACK_REQUESTED);
    let frame_bytes = motion.encode();
    println!("   Encoded {} bytes: {:02X?}", frame_bytes.len(), frame_bytes.as_ref());

    let decoded = TelemetryFrame::decode(&frame_bytes)?;
    let ack = decoded.ack_from(0x0000, 1);
    println!(
        "   Ack for sequence {} -> {:02X?}",
        decoded.sequence,
        ack.encode().as_ref()
    );

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
