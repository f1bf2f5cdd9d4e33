use std::{env, fs, path::Path, process};

use cinder::bytecode::binary;
use cinder::bytecode::disasm::disassemble_buffer;
use cinder::bytecode::instruction::Instruction;
use cinder::bytecode::intermediate::parse_buffer;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage();
        return;
    }

    let encode = args.contains(&"--encode".to_string());
    let decode = args.contains(&"--decode".to_string());

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    let Some(filename) = filename else {
        print_usage();
        return;
    };

    if encode {
        encode_file(filename);
    } else if decode {
        decode_file(filename);
    } else {
        show_file(filename);
    }
}

fn print_usage() {
    println!("cinder - instruction buffer tool");
    println!();
    println!("Usage:");
    println!("  cinder <file.cin>           Check a text buffer and print its canonical form");
    println!("  cinder <file.cinb>          Print a binary buffer as text");
    println!("  cinder --encode <file.cin>  Write the binary form next to the input");
    println!("  cinder --decode <file.cinb> Print a binary buffer as text");
    println!("  cinder --help, -h           Show this help");
}

fn extension(filename: &str) -> &str {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
}

fn load(filename: &str) -> Vec<Instruction> {
    match extension(filename) {
        "cin" => {
            let source = read(filename);
            match parse_buffer(&source) {
                Ok(instructions) => instructions,
                Err(e) => {
                    eprintln!("{}: {}", filename, e);
                    process::exit(1);
                }
            }
        }
        "cinb" => {
            let bytes = match fs::read(filename) {
                Ok(bytes) => bytes,
                Err(e) => {
                    eprintln!("Failed to read '{}': {}", filename, e);
                    process::exit(1);
                }
            };
            match binary::decode(&bytes) {
                Ok(instructions) => instructions,
                Err(e) => {
                    eprintln!("{}: {}", filename, e);
                    process::exit(1);
                }
            }
        }
        other => {
            eprintln!(
                "Error: expected a .cin or .cinb file, got {} ({:?})",
                filename, other
            );
            process::exit(1);
        }
    }
}

fn read(filename: &str) -> String {
    match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    }
}

fn show_file(filename: &str) {
    let instructions = load(filename);
    print!("{}", disassemble_buffer(&instructions));
}

fn encode_file(filename: &str) {
    if extension(filename) != "cin" {
        eprintln!("Error: --encode expects a .cin file, got {}", filename);
        process::exit(1);
    }

    let instructions = load(filename);
    let bytes = match binary::encode(&instructions) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}: {}", filename, e);
            process::exit(1);
        }
    };

    let output = Path::new(filename).with_extension("cinb");
    if let Err(e) = fs::write(&output, bytes) {
        eprintln!("Failed to write '{}': {}", output.display(), e);
        process::exit(1);
    }

    println!("{} instruction(s) -> {}", instructions.len(), output.display());
}

fn decode_file(filename: &str) {
    if extension(filename) != "cinb" {
        eprintln!("Error: --decode expects a .cinb file, got {}", filename);
        process::exit(1);
    }

    let instructions = load(filename);
    print!("{}", disassemble_buffer(&instructions));
}
