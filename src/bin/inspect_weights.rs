//! Diagnostic dump of a classifier weight blob.
//!
//! Usage:
//!   inspect-weights emotion_model.bin
//!   inspect-weights emotion_model.bin.bz2

use std::env;
use std::fs::File;
use std::io::Read;

use face_emotion::EmotionNet;

const HEADER_BYTES: u64 = 64;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <weights.bin>", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    println!("Inspecting weights: {}", path);

    match read_header(path) {
        Ok(header) => print_hex(&header),
        Err(e) => {
            eprintln!("Cannot read {}: {}", path, e);
            std::process::exit(1);
        }
    }

    println!();
    match EmotionNet::load(path) {
        Ok(net) => {
            println!("Blob loaded and validated:");
            println!(
                "  {:<20} {:<18} {:>10} {:>12} {:>12}",
                "parameter", "shape", "count", "min", "max"
            );
            let mut total = 0usize;
            for (name, values) in net.parameters() {
                let min = values.iter().copied().fold(f32::INFINITY, f32::min);
                let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                total += values.len();
                println!(
                    "  {:<20} {:<18} {:>10} {:>12.5} {:>12.5}",
                    name,
                    format!("{:?}", values.shape()),
                    values.len(),
                    min,
                    max
                );
            }
            println!("  total parameters: {}", total);
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}

/// The first bytes of the file as stored (compressed blobs are not inflated).
fn read_header(path: &str) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::new();
    File::open(path)?.take(HEADER_BYTES).read_to_end(&mut header)?;
    Ok(header)
}

fn print_hex(header: &[u8]) {
    println!("\nFirst {} bytes:", header.len());
    for (i, chunk) in header.chunks(16).enumerate() {
        print!("{:04x}: ", i * 16);
        for b in chunk {
            print!("{:02x} ", b);
        }
        print!(" ");
        for b in chunk {
            if *b >= 32 && *b < 127 {
                print!("{}", *b as char);
            } else {
                print!(".");
            }
        }
        println!();
    }
}
