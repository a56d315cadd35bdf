//! Interactive line client for manual testing
//!
//! Reads a command per line, sends it as a RESP array of bulk strings,
//! and prints the decoded reply. `quit` exits.

use anyhow::Context;
use cinderkv::protocol::{decode, Frame};
use clap::Parser;
use std::io::{BufRead, Read, Write};
use std::net::TcpStream;

/// Interactive cinderkv client
#[derive(Parser, Debug)]
#[command(name = "cinderkv-cli")]
#[command(about = "Interactive client for a cinderkv server")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = cinderkv::DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = cinderkv::DEFAULT_PORT)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let mut stream =
        TcpStream::connect(&addr).with_context(|| format!("failed to connect to {}", addr))?;

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        write!(stdout, "{}> ", addr)?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens[0].eq_ignore_ascii_case("quit") {
            break;
        }

        let request = Frame::array(tokens.iter().map(|t| Frame::bulk(t.to_string())).collect());
        stream.write_all(&request.encode())?;

        // Read until one whole reply frame is buffered
        loop {
            match decode(&buffer)? {
                Some((reply, consumed)) => {
                    buffer.drain(..consumed);
                    println!("{}", reply);
                    break;
                }
                None => {
                    let mut chunk = [0u8; 1024];
                    let n = stream.read(&mut chunk)?;
                    if n == 0 {
                        anyhow::bail!("server closed the connection");
                    }
                    buffer.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }

    Ok(())
}
