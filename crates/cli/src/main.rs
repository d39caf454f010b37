//! # CLI - hash-indexed store interactive shell
//!
//! A REPL-style command-line interface for the storage engine. Reads
//! commands from stdin, executes them against the engine, and prints
//! results to stdout. Designed for both interactive use and scripted
//! testing (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! SET key value      Insert or update a key-value pair
//! GET key            Look up a key (prints value or "(nil)")
//! STATS              Print engine debug info
//! EXIT / QUIT        Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables, read by
//! [`config::Options::from_env`]:
//!
//! ```text
//! HASHKV_PATH             Storage directory        (default: "data")
//! HASHKV_MEMTABLE_SIZE    Memtable byte capacity    (default: 4 MiB)
//! HASHKV_L0_FILES         L0 compaction trigger     (default: 4)
//! HASHKV_MAX_L1_SIZE      L1 split size ceiling     (default: 64 MiB)
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! started (path=data, memtable_size=4194304, l0_files=4, max_l1_size=67108864)
//! > SET name Alice
//! OK
//! > GET name
//! Alice
//! > EXIT
//! bye
//! ```
use anyhow::Result;
use config::Options;
use engine::Engine;
use std::io::{self, BufRead, Write};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let options = Options::from_env()?;
    let engine = Engine::new(options.clone())?;

    println!(
        "started (path={}, memtable_size={}, l0_files={}, max_l1_size={})",
        options.path.display(),
        options.memtable_size,
        options.no_of_l0_files,
        options.max_l1_size
    );
    println!("Commands: SET key value | GET key | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SET" => {
                    if let Some(k) = parts.next() {
                        let v: String = parts.collect::<Vec<&str>>().join(" ");
                        if v.is_empty() {
                            println!("ERR usage: SET key value");
                        } else {
                            match engine.set(k.as_bytes().to_vec(), v.as_bytes().to_vec()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR set failed: {}", e),
                            }
                        }
                    } else {
                        println!("ERR usage: SET key value");
                    }
                }
                "GET" => {
                    if let Some(k) = parts.next() {
                        match engine.get(k.as_bytes()) {
                            Ok(Some(v)) => println!("{}", String::from_utf8_lossy(&v)),
                            Ok(None) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "STATS" => {
                    println!("{:?}", engine);
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    engine.close()?;
    Ok(())
}
