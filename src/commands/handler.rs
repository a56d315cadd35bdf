//! Command dispatcher
//!
//! Maps one decoded request frame to a store (and persister) operation
//! and produces the reply frame. Every failure surfaces as an `ERR` /
//! `WRONGTYPE` error frame; nothing here panics on client input.
//!
//! Requests are arrays of bulk strings, `COMMAND arg1 arg2 ...`, with the
//! command name matched case-insensitively. Mutating commands (SET, DEL,
//! INCR, DECR, LPUSH, RPUSH) are appended to the persister after they
//! apply; read-only commands never touch it.

use crate::persistence::Persister;
use crate::protocol::Frame;
use crate::storage::{DataStore, StoreError};
use std::sync::Arc;
use tracing::error;

/// Commands that change the store and therefore get logged.
const MUTATING_COMMANDS: [&str; 6] = ["SET", "DEL", "INCR", "DECR", "LPUSH", "RPUSH"];

/// Executes decoded command frames against a shared [`DataStore`],
/// optionally journaling mutations through a [`Persister`].
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<DataStore>,
    persister: Option<Arc<Persister>>,
}

impl Dispatcher {
    /// A dispatcher with no persistence attached (replies only).
    pub fn new(store: Arc<DataStore>) -> Self {
        Self {
            store,
            persister: None,
        }
    }

    /// A dispatcher that appends every successful mutation to `persister`.
    pub fn with_persister(store: Arc<DataStore>, persister: Arc<Persister>) -> Self {
        Self {
            store,
            persister: Some(persister),
        }
    }

    /// Executes one request and returns the reply frame.
    pub fn execute(&self, request: Frame) -> Frame {
        let tokens = match command_tokens(request) {
            Ok(tokens) => tokens,
            Err(reply) => return reply,
        };
        let name = tokens[0].to_ascii_uppercase();

        if MUTATING_COMMANDS.contains(&name.as_str()) {
            // Holding the log lock across apply+append keeps replay order
            // identical to the order mutations became visible.
            let mut log = self.persister.as_ref().map(|p| p.begin());
            let reply = self.run(&name, &tokens);
            if !reply.is_error() {
                if let Some(log) = log.as_mut() {
                    if let Err(err) = log.log_command(&tokens) {
                        error!(error = %err, command = %name, "append-only log write failed");
                        return Frame::error("ERR append-only log write failed");
                    }
                }
            }
            reply
        } else {
            self.run(&name, &tokens)
        }
    }

    fn run(&self, name: &str, tokens: &[String]) -> Frame {
        match name {
            "ECHO" => self.cmd_echo(tokens),
            "PING" => self.cmd_ping(tokens),
            "SET" => self.cmd_set(tokens),
            "GET" => self.cmd_get(tokens),
            "EXISTS" => self.cmd_exists(tokens),
            "DEL" => self.cmd_del(tokens),
            "INCR" => self.cmd_incr(tokens),
            "DECR" => self.cmd_decr(tokens),
            "LPUSH" => self.cmd_lpush(tokens),
            "RPUSH" => self.cmd_rpush(tokens),
            "LRANGE" => self.cmd_lrange(tokens),
            _ => cmd_unknown(tokens),
        }
    }

    /// ECHO message
    fn cmd_echo(&self, tokens: &[String]) -> Frame {
        if tokens.len() != 2 {
            return arity_error("echo");
        }
        Frame::bulk(tokens[1].clone())
    }

    /// PING [message]
    fn cmd_ping(&self, tokens: &[String]) -> Frame {
        match tokens.len() {
            1 => Frame::pong(),
            2 => Frame::bulk(tokens[1].clone()),
            _ => arity_error("ping"),
        }
    }

    /// SET key value [EX seconds | PX milliseconds]
    fn cmd_set(&self, tokens: &[String]) -> Frame {
        match tokens.len() {
            0..=2 => arity_error("set"),
            3 => {
                self.store.set(tokens[1].clone(), tokens[2].clone());
                Frame::ok()
            }
            5 => {
                let unit = tokens[3].to_ascii_uppercase();
                if unit != "EX" && unit != "PX" {
                    return Frame::error("ERR syntax error");
                }
                let amount: u64 = match tokens[4].parse() {
                    Ok(n) => n,
                    Err(_) => {
                        return Frame::error("ERR value is not an integer or out of range")
                    }
                };
                let ttl_ms = if unit == "EX" {
                    amount.saturating_mul(1000)
                } else {
                    amount
                };
                self.store
                    .set_with_expiry(tokens[1].clone(), tokens[2].clone(), ttl_ms);
                Frame::ok()
            }
            _ => Frame::error("ERR syntax error"),
        }
    }

    /// GET key
    fn cmd_get(&self, tokens: &[String]) -> Frame {
        if tokens.len() != 2 {
            return arity_error("get");
        }
        match self.store.get(&tokens[1]) {
            Ok(Some(value)) => Frame::bulk(value),
            Ok(None) => Frame::null_bulk(),
            Err(err) => store_error_reply(err),
        }
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, tokens: &[String]) -> Frame {
        if tokens.len() < 2 {
            return arity_error("exists");
        }
        let count = tokens[1..]
            .iter()
            .filter(|key| self.store.contains(key))
            .count();
        Frame::integer(count as i64)
    }

    /// DEL key [key ...]
    fn cmd_del(&self, tokens: &[String]) -> Frame {
        if tokens.len() < 2 {
            return arity_error("del");
        }
        let removed = tokens[1..]
            .iter()
            .filter(|key| self.store.remove(key))
            .count();
        Frame::integer(removed as i64)
    }

    /// INCR key
    fn cmd_incr(&self, tokens: &[String]) -> Frame {
        if tokens.len() != 2 {
            return arity_error("incr");
        }
        match self.store.incr(&tokens[1]) {
            Ok(n) => Frame::integer(n),
            Err(err) => store_error_reply(err),
        }
    }

    /// DECR key
    fn cmd_decr(&self, tokens: &[String]) -> Frame {
        if tokens.len() != 2 {
            return arity_error("decr");
        }
        match self.store.decr(&tokens[1]) {
            Ok(n) => Frame::integer(n),
            Err(err) => store_error_reply(err),
        }
    }

    /// LPUSH key value [value ...]
    fn cmd_lpush(&self, tokens: &[String]) -> Frame {
        if tokens.len() < 3 {
            return arity_error("lpush");
        }
        match self.store.prepend(&tokens[1], tokens[2..].to_vec()) {
            Ok(len) => Frame::integer(len as i64),
            Err(err) => store_error_reply(err),
        }
    }

    /// RPUSH key value [value ...]
    fn cmd_rpush(&self, tokens: &[String]) -> Frame {
        if tokens.len() < 3 {
            return arity_error("rpush");
        }
        match self.store.append(&tokens[1], tokens[2..].to_vec()) {
            Ok(len) => Frame::integer(len as i64),
            Err(err) => store_error_reply(err),
        }
    }

    /// LRANGE key start stop
    fn cmd_lrange(&self, tokens: &[String]) -> Frame {
        if tokens.len() != 4 {
            return arity_error("lrange");
        }
        let (start, stop) = match (tokens[2].parse(), tokens[3].parse()) {
            (Ok(start), Ok(stop)) => (start, stop),
            _ => return Frame::error("ERR value is not an integer or out of range"),
        };
        match self.store.lrange(&tokens[1], start, stop) {
            Ok(values) => Frame::array(values.into_iter().map(Frame::bulk).collect()),
            Err(err) => store_error_reply(err),
        }
    }
}

/// Validates the request shape and pulls the command tokens out of it.
fn command_tokens(request: Frame) -> Result<Vec<String>, Frame> {
    let items = match request {
        Frame::Array(Some(items)) if !items.is_empty() => items,
        Frame::Array(Some(_)) => return Err(Frame::error("ERR empty command")),
        _ => return Err(Frame::error("ERR invalid command format")),
    };

    let mut tokens = Vec::with_capacity(items.len());
    for item in items {
        let Frame::BulkString(Some(data)) = item else {
            return Err(Frame::error("ERR invalid command format"));
        };
        match std::str::from_utf8(&data) {
            Ok(s) => tokens.push(s.to_string()),
            Err(_) => return Err(Frame::error("ERR invalid command format")),
        }
    }
    Ok(tokens)
}

fn arity_error(name: &str) -> Frame {
    Frame::error(format!(
        "ERR wrong number of arguments for '{}' command",
        name
    ))
}

fn store_error_reply(err: StoreError) -> Frame {
    match err {
        StoreError::NotAnInteger => Frame::error(format!("ERR {}", err)),
        StoreError::WrongType => Frame::error(format!("WRONGTYPE {}", err)),
    }
}

fn cmd_unknown(tokens: &[String]) -> Frame {
    let args = tokens[1..]
        .iter()
        .map(|arg| format!("'{}'", arg))
        .collect::<Vec<_>>()
        .join(" ");
    Frame::error(format!(
        "ERR unknown command '{}', with args beginning with: {}",
        tokens[0], args
    ))
}
