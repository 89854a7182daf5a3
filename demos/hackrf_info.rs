//! Discover attached HackRF boards and print what each one reports.
//!
//! ```sh
//! cargo run --example hackrf_info
//! ```

use rs_hackrf::{DeviceSelector, ErrorCode};
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let devices = rs_hackrf::list_devices()?;
    if devices.is_empty() {
        println!("No HackRF boards found.");
        println!("Error Code: {} ({})", ErrorCode::NotFound.name(), ErrorCode::NotFound as i32);
        return Ok(());
    }

    for info in devices {
        println!("Found HackRF");
        println!("Index: {}", info.index);
        if let Some(serial) = &info.serial_number {
            println!("Serial number: {}", serial);
        }
        println!("Bus {:03} Device {:03}", info.bus_number, info.device_address);

        let device = match rs_hackrf::open(&DeviceSelector::Index(info.index)) {
            Ok(device) => device,
            Err(e) => {
                println!("Could not open: {} ({})", e, e.code().name());
                println!();
                continue;
            }
        };

        let board_id = device.board_id().await?;
        println!("Board ID Number: {} ({})", board_id, board_id_name(board_id));

        match device.version_string().await {
            Ok(version) => println!(
                "Firmware Version: {} (API:{:x}.{:02x})",
                version,
                info.usb_api_version >> 8,
                info.usb_api_version & 0xff
            ),
            Err(e) => tracing::warn!("Failed to read version: {}", e),
        }

        match device.board_partid_serialno().await {
            Ok(ids) => println!(
                "Part ID Number: 0x{:08x} 0x{:08x}",
                ids.part_id[0], ids.part_id[1]
            ),
            Err(e) => tracing::debug!("Failed to read partid/serial: {}", e),
        }

        if let Ok(rev) = device.board_rev().await {
            println!("Hardware Revision: {}", rev);
        }

        device.release();
        println!();
    }
    Ok(())
}

fn board_id_name(id: u8) -> &'static str {
    match id {
        0 => "Jellybean",
        1 => "Jawbreaker",
        2 => "HackRF One",
        3 => "rad1o",
        4 => "HackRF One (r9)",
        _ => "Unknown Board",
    }
}
