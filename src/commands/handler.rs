//! Command Handler Module
//!
//! This module implements every RedDB command. It receives one decoded
//! request frame, tokenizes it, enforces the authentication gate, routes
//! the command to the session's current database, and returns the value
//! the connection handler will encode.
//!
//! ## Supported Commands
//!
//! ### Session Commands
//! - `AUTH password` - authenticate this connection
//! - `SET_PASSWORD new_password` - set or disable the server password
//! - `SELECT id` - switch the session to another database
//!
//! ### Database Management
//! - `NEW_DB [id]` - create a database (auto-assigns the smallest free id)
//! - `LIST_DBS` - list databases with live key counts
//! - `DROP_DB id` - remove a database (id 0 is protected)
//!
//! ### Data Commands (scoped to the session's database)
//! - `GET key` - value, or `*` for all values, `**` for all pairs
//! - `SET key value [ttl]` - write a value, optionally with a TTL in seconds
//! - `DELETE key` / `EXISTS key` / `DEL_TIME key`
//! - `BULK_GET key [key ...]` / `BULK_SET key value [key value ...]`
//!
//! ### Persistence (password-gated when a password is configured)
//! - `FLUSH [password]` - clear the database, returns the prior size
//! - `DUMP [password] [filename]` - snapshot to disk
//! - `LOAD [password] filename` - restore from a snapshot
//! - `TIME_DUMP interval` - periodic snapshots of every database
//!
//! ## Authentication
//!
//! With no password configured nothing is gated. With one configured,
//! FLUSH/DUMP/LOAD require a prior successful AUTH on this connection,
//! and a password argument supplied to them is validated as well.
//! Authentication is per-session; nothing persists across connections.

use crate::protocol::Value;
use crate::snapshot::{self, SnapshotError, TimedDumper};
use crate::storage::{Keyspace, Registry, TtlUpdate};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Commands that require AUTH when a password is configured.
const PROTECTED_COMMANDS: [&str; 3] = ["FLUSH", "DUMP", "LOAD"];

/// Per-connection state. Lives on the connection task and is never
/// persisted or shared.
#[derive(Debug, Clone)]
pub struct Session {
    /// Whether AUTH succeeded on this connection
    pub authenticated: bool,
    /// The database id commands are routed to
    pub current_db: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            authenticated: false,
            current_db: 0,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes commands against the shared server state.
///
/// Cheap to clone: every connection task carries its own copy of the
/// `Arc` handles.
#[derive(Clone)]
pub struct CommandHandler {
    /// The database registry
    registry: Arc<Registry>,
    /// The optional server password; `None` disables protection
    password: Arc<RwLock<Option<String>>>,
    /// The running TIME_DUMP task, if any
    timed_dump: Arc<Mutex<Option<TimedDumper>>>,
    /// Directory snapshot files are written to and read from
    dump_dir: PathBuf,
}

impl CommandHandler {
    /// Creates a command handler over a registry, with an optional
    /// initial password.
    pub fn new(registry: Arc<Registry>, password: Option<String>) -> Self {
        Self {
            registry,
            password: Arc::new(RwLock::new(password)),
            timed_dump: Arc::new(Mutex::new(None)),
            dump_dir: PathBuf::new(),
        }
    }

    /// Resolves snapshot filenames against `dir` instead of the working
    /// directory.
    pub fn with_dump_dir(mut self, dir: PathBuf) -> Self {
        self.dump_dir = dir;
        self
    }

    /// Executes one request and returns the response value.
    ///
    /// Command failures come back as [`Value::Error`]; nothing here is
    /// fatal to the connection.
    pub fn execute(&self, request: Value, session: &mut Session) -> Value {
        let tokens = match tokenize(request) {
            Ok(tokens) => tokens,
            Err(message) => return Value::error(message),
        };

        if tokens.is_empty() {
            return Value::error("Missing command");
        }

        let command = tokens[0].to_uppercase();
        let args = &tokens[1..];

        if self.password_configured()
            && PROTECTED_COMMANDS.contains(&command.as_str())
            && !session.authenticated
        {
            return Value::error("Authentication required");
        }

        match command.as_str() {
            "AUTH" => self.cmd_auth(args, session),
            "SET_PASSWORD" => self.cmd_set_password(args),
            "SELECT" => self.cmd_select(args, session),
            "NEW_DB" => self.cmd_new_db(args),
            "LIST_DBS" => self.cmd_list_dbs(),
            "DROP_DB" => self.cmd_drop_db(args),
            "GET" => self.cmd_get(args, session),
            "SET" => self.cmd_set(args, session),
            "DELETE" => self.cmd_delete(args, session),
            "EXISTS" => self.cmd_exists(args, session),
            "DEL_TIME" => self.cmd_del_time(args, session),
            "FLUSH" => self.cmd_flush(args, session),
            "DUMP" => self.cmd_dump(args, session),
            "LOAD" => self.cmd_load(args, session),
            "TIME_DUMP" => self.cmd_time_dump(args),
            "BULK_GET" => self.cmd_bulk_get(args, session),
            "BULK_SET" => self.cmd_bulk_set(args, session),
            _ => Value::error(format!("Unrecognized command: {}", command)),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    fn password_configured(&self) -> bool {
        self.password.read().unwrap().is_some()
    }

    /// Checks a password argument against the configured password.
    fn password_matches(&self, supplied: &str) -> bool {
        self.password.read().unwrap().as_deref() == Some(supplied)
    }

    /// Resolves the session's current database, or the error to send
    /// when it was dropped.
    fn keyspace(&self, session: &Session) -> Result<Arc<Keyspace>, Value> {
        self.registry.get(session.current_db).ok_or_else(|| {
            Value::error(format!("Database {} does not exist", session.current_db))
        })
    }

    // ========================================================================
    // Session Commands
    // ========================================================================

    /// AUTH password
    fn cmd_auth(&self, args: &[String], session: &mut Session) -> Value {
        let Some(supplied) = args.first() else {
            return Value::error("Missing password");
        };

        if !self.password_configured() {
            return Value::error("No password set on server");
        }

        if self.password_matches(supplied) {
            session.authenticated = true;
            Value::ok()
        } else {
            Value::error("Invalid password")
        }
    }

    /// SET_PASSWORD new_password
    ///
    /// An empty argument disables password protection entirely.
    fn cmd_set_password(&self, args: &[String]) -> Value {
        let Some(new_password) = args.first() else {
            return Value::error("Missing password");
        };

        let mut password = self.password.write().unwrap();
        if new_password.is_empty() {
            *password = None;
            Value::bulk_string("Password disabled")
        } else {
            *password = Some(new_password.clone());
            Value::bulk_string("Password set")
        }
    }

    /// SELECT id
    fn cmd_select(&self, args: &[String], session: &mut Session) -> Value {
        let Some(token) = args.first() else {
            return Value::error("Missing database ID");
        };

        let id = match token.parse::<i64>() {
            Ok(id) => id,
            Err(_) => return Value::error("Database ID must be an integer"),
        };

        if id >= 0 && self.registry.contains(id as u64) {
            session.current_db = id as u64;
            Value::ok()
        } else {
            Value::error(format!("Database {} does not exist", id))
        }
    }

    // ========================================================================
    // Database Management
    // ========================================================================

    /// NEW_DB [id]
    fn cmd_new_db(&self, args: &[String]) -> Value {
        let id = match args.first() {
            None => None,
            Some(token) => match token.parse::<i64>() {
                Ok(id) if id < 0 => return Value::error("Database ID must be non-negative"),
                Ok(id) => Some(id as u64),
                Err(_) => return Value::error("Database ID must be an integer"),
            },
        };

        match self.registry.create(id) {
            Ok(id) => Value::bulk_string(format!("Database {} created", id)),
            Err(e) => Value::error(e.to_string()),
        }
    }

    /// LIST_DBS
    fn cmd_list_dbs(&self) -> Value {
        let rows = self
            .registry
            .list()
            .into_iter()
            .map(|(id, keys)| Value::bulk_string(format!("DB {}: {} keys", id, keys)))
            .collect();
        Value::array(rows)
    }

    /// DROP_DB id
    fn cmd_drop_db(&self, args: &[String]) -> Value {
        let Some(token) = args.first() else {
            return Value::error("Missing database ID");
        };

        let id = match token.parse::<i64>() {
            Ok(id) => id,
            Err(_) => return Value::error("Database ID must be an integer"),
        };

        if id < 0 {
            return Value::error(format!("Database {} does not exist", id));
        }

        match self.registry.drop_db(id as u64) {
            Ok(()) => Value::bulk_string(format!("Database {} dropped", id)),
            Err(e) => Value::error(e.to_string()),
        }
    }

    // ========================================================================
    // Data Commands
    // ========================================================================

    /// GET key
    ///
    /// `GET *` returns all values; `GET **` returns all key/value pairs.
    fn cmd_get(&self, args: &[String], session: &Session) -> Value {
        let Some(key) = args.first() else {
            return Value::error("Invalid arguments for GET");
        };

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        match key.as_str() {
            "*" => all_values(&keyspace),
            "**" => all_entries(&keyspace),
            _ => match keyspace.get(key) {
                Some(value) => Value::bulk_string(value),
                None => Value::null(),
            },
        }
    }

    /// SET key value [ttl]
    ///
    /// A positive integer TTL sets a deadline that many seconds out,
    /// zero or negative clears any deadline, and a non-numeric TTL is
    /// ignored (the value is still written). Always returns 1.
    fn cmd_set(&self, args: &[String], session: &Session) -> Value {
        if args.len() < 2 {
            return Value::error("SET requires at least key and value");
        }

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        let ttl = match args.get(2) {
            None => TtlUpdate::Keep,
            Some(token) => match token.parse::<i64>() {
                Ok(seconds) if seconds > 0 => TtlUpdate::ExpireIn(seconds as u64),
                Ok(_) => TtlUpdate::Clear,
                Err(_) => TtlUpdate::Keep, // Invalid TTL, ignore it
            },
        };

        keyspace.set(args[0].clone(), args[1].clone(), ttl);
        Value::integer(1)
    }

    /// DELETE key
    fn cmd_delete(&self, args: &[String], session: &Session) -> Value {
        let Some(key) = args.first() else {
            return Value::error("Invalid arguments for DELETE");
        };

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        Value::integer(keyspace.delete(key) as i64)
    }

    /// EXISTS key
    fn cmd_exists(&self, args: &[String], session: &Session) -> Value {
        let Some(key) = args.first() else {
            return Value::error("Invalid arguments for EXISTS");
        };

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        Value::integer(keyspace.exists(key) as i64)
    }

    /// DEL_TIME key
    ///
    /// Removes any expiration deadline from a key.
    fn cmd_del_time(&self, args: &[String], session: &Session) -> Value {
        let Some(key) = args.first() else {
            return Value::error("Invalid arguments for DEL_TIME");
        };

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        Value::integer(keyspace.clear_deadline(key) as i64)
    }

    /// BULK_GET key [key ...]
    ///
    /// A single `*` or `**` argument behaves like GET with that key.
    fn cmd_bulk_get(&self, args: &[String], session: &Session) -> Value {
        if args.is_empty() {
            return Value::error("Invalid arguments for BULK_GET");
        }

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        if args.len() == 1 {
            match args[0].as_str() {
                "*" => return all_values(&keyspace),
                "**" => return all_entries(&keyspace),
                _ => {}
            }
        }

        let results = keyspace
            .bulk_get(args)
            .into_iter()
            .map(|result| match result {
                Some(value) => Value::bulk_string(value),
                None => Value::null(),
            })
            .collect();
        Value::array(results)
    }

    /// BULK_SET key value [key value ...]
    ///
    /// An unpaired trailing key is ignored. Returns the number of pairs
    /// written.
    fn cmd_bulk_set(&self, args: &[String], session: &Session) -> Value {
        if args.len() < 2 {
            return Value::error("Invalid arguments for BULK_SET");
        }

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        let pairs = args
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        Value::integer(keyspace.bulk_set(pairs) as i64)
    }

    // ========================================================================
    // Persistence Commands
    // ========================================================================

    /// FLUSH [password]
    ///
    /// The password argument is only meaningful (and validated) when a
    /// password is configured; AUTH is already required by the gate.
    fn cmd_flush(&self, args: &[String], session: &Session) -> Value {
        if self.password_configured() {
            if let Some(supplied) = args.first() {
                if !self.password_matches(supplied) {
                    return Value::error("Invalid password");
                }
            }
        }

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        Value::integer(keyspace.flush() as i64)
    }

    /// DUMP [password] [filename]
    ///
    /// With a password configured the first argument must be the
    /// password; the filename defaults to an auto-generated name
    /// containing the database id and timestamp.
    fn cmd_dump(&self, args: &[String], session: &Session) -> Value {
        let filename = if self.password_configured() {
            let Some(supplied) = args.first() else {
                return Value::error("Password required for DUMP");
            };
            if !self.password_matches(supplied) {
                return Value::error("Invalid password");
            }
            args.get(1)
        } else {
            args.first()
        };

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        let path = match filename {
            Some(name) => self.dump_dir.join(name),
            None => snapshot::dump_path(&self.dump_dir, keyspace.id()),
        };

        match snapshot::dump_keyspace(&keyspace, &path) {
            Ok(()) => Value::bulk_string(format!(
                "Database {} dumped to {}",
                keyspace.id(),
                path.display()
            )),
            Err(e) => Value::error(format!("Failed to dump database: {}", e)),
        }
    }

    /// LOAD [password] filename
    fn cmd_load(&self, args: &[String], session: &Session) -> Value {
        let filename = if self.password_configured() {
            if args.len() < 2 {
                return Value::error("Password and filename required for LOAD");
            }
            if !self.password_matches(&args[0]) {
                return Value::error("Invalid password");
            }
            &args[1]
        } else {
            let Some(filename) = args.first() else {
                return Value::error("Filename required for LOAD");
            };
            filename
        };

        let keyspace = match self.keyspace(session) {
            Ok(ks) => ks,
            Err(e) => return e,
        };

        let path = self.dump_dir.join(filename);
        match snapshot::load_keyspace(&keyspace, &path) {
            Ok(report) => {
                let source = match report.source_db {
                    Some(id) => id.to_string(),
                    None => "unknown".to_string(),
                };
                Value::bulk_string(format!(
                    "Database loaded from {} (source DB: {}). Replaced {} keys with {} keys in DB {}.",
                    path.display(),
                    source,
                    report.replaced,
                    report.loaded,
                    keyspace.id()
                ))
            }
            Err(SnapshotError::Io(e)) => {
                Value::error(format!("Failed to load database: {}", e))
            }
            Err(e) => Value::error(e.to_string()),
        }
    }

    /// TIME_DUMP interval
    ///
    /// A positive interval (re)starts the periodic dumper; zero or a
    /// negative value stops it. Stopping when none is running is a
    /// no-op that still confirms.
    fn cmd_time_dump(&self, args: &[String]) -> Value {
        let interval = args.first().and_then(|token| token.parse::<i64>().ok());

        let Some(interval) = interval else {
            return Value::error("Invalid interval value");
        };

        let mut timed_dump = self.timed_dump.lock().unwrap();

        if interval <= 0 {
            *timed_dump = None;
            return Value::bulk_string("Time dump stopped");
        }

        // Replacing the slot drops (and thereby stops) any running task.
        *timed_dump = Some(TimedDumper::start(
            Arc::clone(&self.registry),
            Duration::from_secs(interval as u64),
            self.dump_dir.clone(),
        ));

        Value::bulk_string(format!(
            "Time dump started with interval {} seconds",
            interval
        ))
    }
}

/// Converts a request frame into command tokens.
///
/// Requests are normally arrays of bulk strings; a lone string is
/// tokenized on whitespace. Anything else is rejected.
fn tokenize(request: Value) -> Result<Vec<String>, &'static str> {
    match request {
        Value::Array(items) => {
            let mut tokens = Vec::with_capacity(items.len());
            for item in &items {
                match item {
                    Value::BulkString(_) | Value::SimpleString(_) => match item.as_str() {
                        Some(s) => tokens.push(s.to_string()),
                        None => return Err("invalid protocol"),
                    },
                    _ => return Err("Request must be list or simple string."),
                }
            }
            Ok(tokens)
        }
        Value::BulkString(_) | Value::SimpleString(_) => match request.as_str() {
            Some(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
            None => Err("invalid protocol"),
        },
        _ => Err("Request must be list or simple string."),
    }
}

/// `GET *`: every non-expired value, in key order.
fn all_values(keyspace: &Keyspace) -> Value {
    Value::array(
        keyspace
            .values()
            .into_iter()
            .map(Value::bulk_string)
            .collect(),
    )
}

/// `GET **`: every non-expired key/value pair, in key order.
fn all_entries(keyspace: &Keyspace) -> Value {
    Value::map(
        keyspace
            .entries()
            .into_iter()
            .map(|(key, value)| (Value::bulk_string(key), Value::bulk_string(value)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::path::Path;

    fn handler(password: Option<&str>) -> CommandHandler {
        CommandHandler::new(
            Arc::new(Registry::new()),
            password.map(str::to_string),
        )
    }

    fn request(tokens: &[&str]) -> Value {
        Value::array(
            tokens
                .iter()
                .map(|t| Value::bulk_string(Bytes::from(t.to_string())))
                .collect(),
        )
    }

    fn run(h: &CommandHandler, session: &mut Session, tokens: &[&str]) -> Value {
        h.execute(request(tokens), session)
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "reddb_cmd_{}_{}",
            std::process::id(),
            name
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_set_and_get() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(run(&h, &mut s, &["SET", "a", "1"]), Value::integer(1));
        assert_eq!(
            run(&h, &mut s, &["GET", "a"]),
            Value::bulk_string("1")
        );
        assert_eq!(run(&h, &mut s, &["GET", "missing"]), Value::null());
    }

    #[test]
    fn test_command_name_is_case_insensitive() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(run(&h, &mut s, &["set", "a", "1"]), Value::integer(1));
        assert_eq!(run(&h, &mut s, &["gEt", "a"]), Value::bulk_string("1"));
    }

    #[test]
    fn test_lone_string_is_tokenized() {
        let h = handler(None);
        let mut s = Session::new();

        let response = h.execute(Value::bulk_string("SET a 1"), &mut s);
        assert_eq!(response, Value::integer(1));
        assert_eq!(run(&h, &mut s, &["GET", "a"]), Value::bulk_string("1"));
    }

    #[test]
    fn test_bad_request_shapes() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(
            h.execute(Value::integer(7), &mut s),
            Value::error("Request must be list or simple string.")
        );
        assert_eq!(
            h.execute(Value::array(vec![Value::integer(7)]), &mut s),
            Value::error("Request must be list or simple string.")
        );
        assert_eq!(
            h.execute(Value::array(vec![]), &mut s),
            Value::error("Missing command")
        );
    }

    #[test]
    fn test_unknown_command() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(
            run(&h, &mut s, &["NOPE", "x"]),
            Value::error("Unrecognized command: NOPE")
        );
    }

    #[test]
    fn test_auth_flow() {
        let h = handler(Some("s3cret"));
        let mut s = Session::new();

        assert_eq!(
            run(&h, &mut s, &["AUTH", "wrong"]),
            Value::error("Invalid password")
        );
        assert!(!s.authenticated);

        assert_eq!(run(&h, &mut s, &["AUTH", "s3cret"]), Value::ok());
        assert!(s.authenticated);
    }

    #[test]
    fn test_auth_without_configured_password() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(
            run(&h, &mut s, &["AUTH", "whatever"]),
            Value::error("No password set on server")
        );
        assert_eq!(
            run(&h, &mut s, &["AUTH"]),
            Value::error("Missing password")
        );
    }

    #[test]
    fn test_protected_commands_require_auth() {
        let h = handler(Some("s3cret"));
        let mut s = Session::new();

        for command in ["FLUSH", "DUMP", "LOAD"] {
            assert_eq!(
                run(&h, &mut s, &[command]),
                Value::error("Authentication required")
            );
        }

        // Without a password configured, FLUSH is open.
        let open = handler(None);
        let mut s2 = Session::new();
        assert_eq!(run(&open, &mut s2, &["FLUSH"]), Value::integer(0));
    }

    #[test]
    fn test_flush_after_auth() {
        let h = handler(Some("s3cret"));
        let mut s = Session::new();

        run(&h, &mut s, &["AUTH", "s3cret"]);
        run(&h, &mut s, &["SET", "a", "1"]);

        // Bare FLUSH relies on the session auth...
        assert_eq!(run(&h, &mut s, &["FLUSH"]), Value::integer(1));
        // ...and a supplied password argument is still validated.
        assert_eq!(
            run(&h, &mut s, &["FLUSH", "wrong"]),
            Value::error("Invalid password")
        );
        assert_eq!(run(&h, &mut s, &["FLUSH", "s3cret"]), Value::integer(0));
    }

    #[test]
    fn test_set_password_and_disable() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(
            run(&h, &mut s, &["SET_PASSWORD", "pw"]),
            Value::bulk_string("Password set")
        );
        assert_eq!(run(&h, &mut s, &["AUTH", "pw"]), Value::ok());

        assert_eq!(
            run(&h, &mut s, &["SET_PASSWORD", ""]),
            Value::bulk_string("Password disabled")
        );
        assert_eq!(
            run(&h, &mut s, &["AUTH", "pw"]),
            Value::error("No password set on server")
        );
    }

    #[test]
    fn test_select_and_database_isolation() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(
            run(&h, &mut s, &["NEW_DB"]),
            Value::bulk_string("Database 1 created")
        );
        assert_eq!(run(&h, &mut s, &["SELECT", "1"]), Value::ok());
        assert_eq!(s.current_db, 1);

        run(&h, &mut s, &["SET", "k", "v"]);

        assert_eq!(run(&h, &mut s, &["SELECT", "0"]), Value::ok());
        assert_eq!(run(&h, &mut s, &["GET", "k"]), Value::null());

        assert_eq!(run(&h, &mut s, &["SELECT", "1"]), Value::ok());
        assert_eq!(run(&h, &mut s, &["GET", "k"]), Value::bulk_string("v"));
    }

    #[test]
    fn test_select_errors() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(
            run(&h, &mut s, &["SELECT"]),
            Value::error("Missing database ID")
        );
        assert_eq!(
            run(&h, &mut s, &["SELECT", "abc"]),
            Value::error("Database ID must be an integer")
        );
        assert_eq!(
            run(&h, &mut s, &["SELECT", "99"]),
            Value::error("Database 99 does not exist")
        );
        assert_eq!(s.current_db, 0);
    }

    #[test]
    fn test_new_db_errors() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(
            run(&h, &mut s, &["NEW_DB", "-2"]),
            Value::error("Database ID must be non-negative")
        );
        assert_eq!(
            run(&h, &mut s, &["NEW_DB", "abc"]),
            Value::error("Database ID must be an integer")
        );

        run(&h, &mut s, &["NEW_DB", "3"]);
        assert_eq!(
            run(&h, &mut s, &["NEW_DB", "3"]),
            Value::error("Database 3 already exists")
        );
    }

    #[test]
    fn test_drop_db() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(
            run(&h, &mut s, &["DROP_DB", "0"]),
            Value::error("Cannot drop default database (0)")
        );
        assert_eq!(
            run(&h, &mut s, &["DROP_DB", "99"]),
            Value::error("Database 99 does not exist")
        );

        run(&h, &mut s, &["NEW_DB", "2"]);
        assert_eq!(
            run(&h, &mut s, &["DROP_DB", "2"]),
            Value::bulk_string("Database 2 dropped")
        );
    }

    #[test]
    fn test_session_on_dropped_database() {
        let h = handler(None);
        let mut s = Session::new();

        run(&h, &mut s, &["NEW_DB", "1"]);
        run(&h, &mut s, &["SELECT", "1"]);
        run(&h, &mut s, &["DROP_DB", "1"]);

        // The session is not migrated; data commands fail until SELECT.
        assert_eq!(
            run(&h, &mut s, &["GET", "k"]),
            Value::error("Database 1 does not exist")
        );
        assert_eq!(run(&h, &mut s, &["SELECT", "0"]), Value::ok());
        assert_eq!(run(&h, &mut s, &["GET", "k"]), Value::null());
    }

    #[test]
    fn test_list_dbs() {
        let h = handler(None);
        let mut s = Session::new();

        run(&h, &mut s, &["SET", "a", "1"]);
        run(&h, &mut s, &["NEW_DB", "1"]);

        assert_eq!(
            run(&h, &mut s, &["LIST_DBS"]),
            Value::array(vec![
                Value::bulk_string("DB 0: 1 keys"),
                Value::bulk_string("DB 1: 0 keys"),
            ])
        );
    }

    #[test]
    fn test_set_ttl_variants() {
        let h = handler(None);
        let mut s = Session::new();

        // Positive TTL installs a deadline.
        run(&h, &mut s, &["SET", "a", "1", "100"]);
        assert_eq!(run(&h, &mut s, &["DEL_TIME", "a"]), Value::integer(1));

        // TTL of zero clears an existing deadline.
        run(&h, &mut s, &["SET", "a", "1", "100"]);
        run(&h, &mut s, &["SET", "a", "1", "0"]);
        assert_eq!(run(&h, &mut s, &["DEL_TIME", "a"]), Value::integer(0));

        // Non-numeric TTL is ignored; the value is still written.
        run(&h, &mut s, &["SET", "b", "1", "100"]);
        assert_eq!(run(&h, &mut s, &["SET", "b", "2", "soon"]), Value::integer(1));
        assert_eq!(run(&h, &mut s, &["GET", "b"]), Value::bulk_string("2"));
        assert_eq!(run(&h, &mut s, &["DEL_TIME", "b"]), Value::integer(1));

        assert_eq!(
            run(&h, &mut s, &["SET", "only-key"]),
            Value::error("SET requires at least key and value")
        );
    }

    #[test]
    fn test_exists_and_delete() {
        let h = handler(None);
        let mut s = Session::new();

        assert_eq!(run(&h, &mut s, &["EXISTS", "a"]), Value::integer(0));
        run(&h, &mut s, &["SET", "a", "1"]);
        assert_eq!(run(&h, &mut s, &["EXISTS", "a"]), Value::integer(1));

        assert_eq!(run(&h, &mut s, &["DELETE", "a"]), Value::integer(1));
        assert_eq!(run(&h, &mut s, &["DELETE", "a"]), Value::integer(0));
    }

    #[test]
    fn test_get_wildcards() {
        let h = handler(None);
        let mut s = Session::new();

        run(&h, &mut s, &["SET", "a", "1"]);
        run(&h, &mut s, &["SET", "b", "2"]);

        assert_eq!(
            run(&h, &mut s, &["GET", "*"]),
            Value::array(vec![Value::bulk_string("1"), Value::bulk_string("2")])
        );
        assert_eq!(
            run(&h, &mut s, &["GET", "**"]),
            Value::map(vec![
                (Value::bulk_string("a"), Value::bulk_string("1")),
                (Value::bulk_string("b"), Value::bulk_string("2")),
            ])
        );
    }

    #[test]
    fn test_bulk_get() {
        let h = handler(None);
        let mut s = Session::new();

        run(&h, &mut s, &["SET", "a", "1"]);
        run(&h, &mut s, &["SET", "b", "2"]);

        assert_eq!(
            run(&h, &mut s, &["BULK_GET", "a", "missing", "b"]),
            Value::array(vec![
                Value::bulk_string("1"),
                Value::null(),
                Value::bulk_string("2"),
            ])
        );

        // A single wildcard element behaves like GET with that key.
        assert_eq!(
            run(&h, &mut s, &["BULK_GET", "*"]),
            Value::array(vec![Value::bulk_string("1"), Value::bulk_string("2")])
        );
    }

    #[test]
    fn test_bulk_set() {
        let h = handler(None);
        let mut s = Session::new();

        // The unpaired trailing key is ignored.
        assert_eq!(
            run(&h, &mut s, &["BULK_SET", "a", "1", "b", "2", "c"]),
            Value::integer(2)
        );
        assert_eq!(run(&h, &mut s, &["GET", "a"]), Value::bulk_string("1"));
        assert_eq!(run(&h, &mut s, &["GET", "b"]), Value::bulk_string("2"));
        assert_eq!(run(&h, &mut s, &["GET", "c"]), Value::null());
    }

    #[test]
    fn test_dump_load_cycle_with_password() {
        let dir = scratch_dir("dumpload");
        let h = handler(Some("s3cret")).with_dump_dir(dir.clone());
        let mut s = Session::new();

        run(&h, &mut s, &["AUTH", "s3cret"]);
        run(&h, &mut s, &["SET", "k", "v", "60"]);

        let response = run(&h, &mut s, &["DUMP", "s3cret", "snap.json"]);
        let Value::BulkString(message) = &response else {
            panic!("unexpected DUMP response: {:?}", response);
        };
        assert!(std::str::from_utf8(message)
            .unwrap()
            .starts_with("Database 0 dumped to"));

        assert_eq!(run(&h, &mut s, &["FLUSH", "s3cret"]), Value::integer(1));
        assert_eq!(run(&h, &mut s, &["GET", "k"]), Value::null());

        let response = run(&h, &mut s, &["LOAD", "s3cret", "snap.json"]);
        let Value::BulkString(message) = &response else {
            panic!("unexpected LOAD response: {:?}", response);
        };
        let message = std::str::from_utf8(message).unwrap();
        assert!(message.contains("(source DB: 0)"));
        assert!(message.contains("Replaced 0 keys with 1 keys in DB 0."));

        assert_eq!(run(&h, &mut s, &["GET", "k"]), Value::bulk_string("v"));
        // The restored key still expires.
        assert_eq!(run(&h, &mut s, &["DEL_TIME", "k"]), Value::integer(1));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dump_load_argument_shapes() {
        let h = handler(Some("s3cret"));
        let mut s = Session::new();
        run(&h, &mut s, &["AUTH", "s3cret"]);

        assert_eq!(
            run(&h, &mut s, &["DUMP"]),
            Value::error("Password required for DUMP")
        );
        assert_eq!(
            run(&h, &mut s, &["DUMP", "wrong"]),
            Value::error("Invalid password")
        );
        assert_eq!(
            run(&h, &mut s, &["LOAD", "s3cret"]),
            Value::error("Password and filename required for LOAD")
        );

        let open = handler(None);
        let mut s2 = Session::new();
        assert_eq!(
            run(&open, &mut s2, &["LOAD"]),
            Value::error("Filename required for LOAD")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = scratch_dir("loadmissing");
        let h = handler(None).with_dump_dir(dir.clone());
        let mut s = Session::new();

        let response = run(&h, &mut s, &["LOAD", "nope.json"]);
        let Value::Error(message) = &response else {
            panic!("unexpected LOAD response: {:?}", response);
        };
        assert!(message.starts_with("File not found:"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_time_dump_lifecycle() {
        let dir = scratch_dir("timedump");
        let h = handler(None).with_dump_dir(dir.clone());
        let mut s = Session::new();

        // Stopping with nothing running is a no-op that still confirms.
        assert_eq!(
            run(&h, &mut s, &["TIME_DUMP", "0"]),
            Value::bulk_string("Time dump stopped")
        );

        assert_eq!(
            run(&h, &mut s, &["TIME_DUMP", "1"]),
            Value::bulk_string("Time dump started with interval 1 seconds")
        );
        assert_eq!(
            run(&h, &mut s, &["TIME_DUMP", "0"]),
            Value::bulk_string("Time dump stopped")
        );

        assert_eq!(
            run(&h, &mut s, &["TIME_DUMP", "abc"]),
            Value::error("Invalid interval value")
        );
        assert_eq!(
            run(&h, &mut s, &["TIME_DUMP"]),
            Value::error("Invalid interval value")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dump_default_filename() {
        let dir = scratch_dir("autoname");
        let h = handler(None).with_dump_dir(dir.clone());
        let mut s = Session::new();

        run(&h, &mut s, &["SET", "a", "1"]);
        let response = run(&h, &mut s, &["DUMP"]);
        assert!(!response.is_error());

        let produced: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("reddb_dump_db0_"))
            })
            .collect();
        assert_eq!(produced.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dump_dir_join_keeps_absolute_paths() {
        let dir = scratch_dir("absjoin");
        let h = handler(None).with_dump_dir(PathBuf::from("/nonexistent-base"));
        let mut s = Session::new();

        let file = dir.join("abs.json");
        run(&h, &mut s, &["SET", "a", "1"]);
        let response = run(&h, &mut s, &[
            "DUMP",
            file.to_str().unwrap(),
        ]);
        assert!(!response.is_error());
        assert!(Path::new(&file).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
